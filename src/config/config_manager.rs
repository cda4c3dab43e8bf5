// ==========================================
// 定长监管报送文件导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::ingest_config::{
    default_worker_count, DEFAULT_BATCH_SIZE, DEFAULT_LOOKUP_CHUNK_SIZE, DEFAULT_POLL_TIMEOUT_MS,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_GRACE_MS,
};
use crate::config::ingest_config_trait::IngestConfigReader;
use crate::db::open_sqlite_connection;
use crate::importer::error::{IngestError, IngestResult};
use crate::repository::error::RepositoryError;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> IngestResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> IngestResult<Self> {
        {
            let conn_guard = conn.lock().map_err(RepositoryError::from)?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> IngestResult<Option<String>> {
        let conn = self.conn.lock().map_err(RepositoryError::from)?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> IngestResult<()> {
        let conn = self.conn.lock().map_err(RepositoryError::from)?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    /// 读取并解析配置值, 缺失时使用默认值
    ///
    /// 值存在但无法解析时返回 ConfigValueError（配置缺陷, 不静默回退）
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> IngestResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|e| IngestError::ConfigValueError {
                key: key.to_string(),
                value: raw.clone(),
                message: e.to_string(),
            }),
        }
    }

    /// 获取导入相关配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 导入完成日志中记录实际生效的配置
    pub fn get_config_snapshot(&self) -> IngestResult<String> {
        let conn = self.conn.lock().map_err(RepositoryError::from)?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = ?1 AND key LIKE 'ingest/%' ORDER BY key",
        )?;

        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map))
            .map_err(|e| IngestError::InternalError(e.to_string()))
    }
}

// ==========================================
// IngestConfigReader Trait 实现
// ==========================================
#[async_trait]
impl IngestConfigReader for ConfigManager {
    async fn get_batch_size(&self) -> IngestResult<usize> {
        self.get_parsed_or_default(config_keys::BATCH_SIZE, DEFAULT_BATCH_SIZE)
    }

    async fn get_worker_count(&self) -> IngestResult<usize> {
        self.get_parsed_or_default(config_keys::WORKER_COUNT, default_worker_count())
    }

    async fn get_queue_capacity(&self) -> IngestResult<usize> {
        self.get_parsed_or_default(config_keys::QUEUE_CAPACITY, DEFAULT_QUEUE_CAPACITY)
    }

    async fn get_poll_timeout_ms(&self) -> IngestResult<u64> {
        self.get_parsed_or_default(config_keys::POLL_TIMEOUT_MS, DEFAULT_POLL_TIMEOUT_MS)
    }

    async fn get_shutdown_grace_ms(&self) -> IngestResult<u64> {
        self.get_parsed_or_default(config_keys::SHUTDOWN_GRACE_MS, DEFAULT_SHUTDOWN_GRACE_MS)
    }

    async fn get_lookup_chunk_size(&self) -> IngestResult<usize> {
        self.get_parsed_or_default(config_keys::LOOKUP_CHUNK_SIZE, DEFAULT_LOOKUP_CHUNK_SIZE)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 分片与并发
    pub const BATCH_SIZE: &str = "ingest/batch_size";
    pub const WORKER_COUNT: &str = "ingest/worker_count";

    // 流式落库
    pub const QUEUE_CAPACITY: &str = "ingest/queue_capacity";
    pub const POLL_TIMEOUT_MS: &str = "ingest/poll_timeout_ms";
    pub const SHUTDOWN_GRACE_MS: &str = "ingest/shutdown_grace_ms";

    // 存储查询
    pub const LOOKUP_CHUNK_SIZE: &str = "ingest/lookup_chunk_size";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ingest_config::IngestConfig;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_absent_keys_use_defaults() {
        let manager = manager();
        assert_eq!(manager.get_batch_size().await.unwrap(), DEFAULT_BATCH_SIZE);
        assert_eq!(manager.get_poll_timeout_ms().await.unwrap(), DEFAULT_POLL_TIMEOUT_MS);
    }

    #[tokio::test]
    async fn test_override_is_read_back() {
        let manager = manager();
        manager.set_global_config_value(config_keys::BATCH_SIZE, "250").unwrap();
        manager.set_global_config_value(config_keys::WORKER_COUNT, " 3 ").unwrap();

        let config = IngestConfig::load(&manager).await.unwrap();
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.worker_count, 3);

        let snapshot = manager.get_config_snapshot().unwrap();
        assert!(snapshot.contains("ingest/batch_size"));
    }

    #[tokio::test]
    async fn test_malformed_value_is_config_error() {
        let manager = manager();
        manager.set_global_config_value(config_keys::QUEUE_CAPACITY, "lots").unwrap();

        let err = manager.get_queue_capacity().await.unwrap_err();
        assert!(matches!(err, IngestError::ConfigValueError { ref key, .. } if key == config_keys::QUEUE_CAPACITY));
    }
}
