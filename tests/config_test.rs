// ==========================================
// 导入配置集成测试
// ==========================================
// 测试目标: ConfigManager 读写 / 默认值 / 格式错误 / 服务装配
// ==========================================

mod helpers;
mod test_helpers;

use helpers::mock_config::MockConfig;
use regfile_ingest::config::{config_keys, ConfigManager, IngestConfig, IngestConfigReader};
use regfile_ingest::{IngestError, IngestionService};
use test_helpers::{create_test_db, open_shared};

#[tokio::test]
async fn test_config_manager_defaults() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    let config = IngestConfig::load(&manager).await.unwrap();
    let defaults = IngestConfig::default();
    assert_eq!(config.batch_size, 1000);
    assert_eq!(config.queue_capacity, 16);
    assert_eq!(config.poll_timeout_ms, 500);
    assert_eq!(config.shutdown_grace_ms, 5000);
    assert_eq!(config.lookup_chunk_size, 500);
    assert_eq!(config.worker_count, defaults.worker_count);
    assert!(config.worker_count >= 1);
}

#[tokio::test]
async fn test_config_manager_overrides() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let manager = ConfigManager::new(&db_path).unwrap();

    manager
        .set_global_config_value(config_keys::BATCH_SIZE, "250")
        .unwrap();
    manager
        .set_global_config_value(config_keys::WORKER_COUNT, "3")
        .unwrap();
    // UPSERT: 第二次写入覆盖
    manager
        .set_global_config_value(config_keys::BATCH_SIZE, "300")
        .unwrap();

    assert_eq!(manager.get_batch_size().await.unwrap(), 300);
    assert_eq!(manager.get_worker_count().await.unwrap(), 3);
    assert_eq!(manager.get_queue_capacity().await.unwrap(), 16);

    let snapshot = manager.get_config_snapshot().unwrap();
    assert!(snapshot.contains("ingest/batch_size"));
    assert!(snapshot.contains("300"));
}

#[tokio::test]
async fn test_malformed_value_is_config_error() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let manager = ConfigManager::new(&db_path).unwrap();
    manager
        .set_global_config_value(config_keys::POLL_TIMEOUT_MS, "half a second")
        .unwrap();

    let result = manager.get_poll_timeout_ms().await;
    match result {
        Err(IngestError::ConfigValueError { key, value, .. }) => {
            assert_eq!(key, config_keys::POLL_TIMEOUT_MS);
            assert_eq!(value, "half a second");
        }
        other => panic!("expected ConfigValueError, got {:?}", other),
    }

    assert!(IngestConfig::load(&manager).await.is_err());
}

#[tokio::test]
async fn test_mock_config_is_normalized() {
    let config = IngestConfig::load(&MockConfig::zeros()).await.unwrap();
    assert_eq!(config.batch_size, 1);
    assert_eq!(config.worker_count, 1);
    assert_eq!(config.queue_capacity, 1);
    assert_eq!(config.lookup_chunk_size, 1);

    let tiny = IngestConfig::load(&MockConfig::tiny_batches()).await.unwrap();
    assert_eq!(tiny.batch_size, 2);
    assert_eq!(tiny.queue_capacity, 1);
    assert_eq!(tiny.worker_count, 4);
}

#[tokio::test]
async fn test_service_reads_config_from_store() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    {
        let manager = ConfigManager::from_connection(open_shared(&db_path).unwrap()).unwrap();
        manager
            .set_global_config_value(config_keys::BATCH_SIZE, "7")
            .unwrap();
        manager
            .set_global_config_value(config_keys::LOOKUP_CHUNK_SIZE, "0")
            .unwrap();
    }

    let service = IngestionService::open(&db_path).await.unwrap();
    assert_eq!(service.config().batch_size, 7);
    assert_eq!(service.config().lookup_chunk_size, 1);
}
