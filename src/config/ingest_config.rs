// ==========================================
// 定长监管报送文件导入系统 - 导入配置快照
// ==========================================
// 每次运行开始时读取一次, 之后在各分片任务间只读共享
// ==========================================

use crate::config::ingest_config_trait::IngestConfigReader;
use crate::importer::error::IngestResult;
use crate::repository::ingest_repo_impl::MAX_LOOKUP_CHUNK_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5000;
pub const DEFAULT_LOOKUP_CHUNK_SIZE: usize = 500;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "REGFILE_INGEST_DB_PATH";

const APP_DIR: &str = "regfile-ingest";
const DB_FILE: &str = "regfile.db";

/// 可用 CPU 核数（无法获取时为 1）
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// ==========================================
// IngestConfig - 导入配置值对象
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub poll_timeout_ms: u64,
    pub shutdown_grace_ms: u64,
    pub lookup_chunk_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            worker_count: default_worker_count(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            lookup_chunk_size: DEFAULT_LOOKUP_CHUNK_SIZE,
        }
    }
}

impl IngestConfig {
    /// 从配置读取器生成快照
    pub async fn load(reader: &dyn IngestConfigReader) -> IngestResult<Self> {
        let config = Self {
            batch_size: reader.get_batch_size().await?,
            worker_count: reader.get_worker_count().await?,
            queue_capacity: reader.get_queue_capacity().await?,
            poll_timeout_ms: reader.get_poll_timeout_ms().await?,
            shutdown_grace_ms: reader.get_shutdown_grace_ms().await?,
            lookup_chunk_size: reader.get_lookup_chunk_size().await?,
        };
        tracing::debug!(?config, "导入配置已加载");
        Ok(config.normalized())
    }

    /// 零值修正为 1（零分片/零并发没有意义）, 查询分块不超过绑定参数上限
    pub fn normalized(mut self) -> Self {
        self.batch_size = self.batch_size.max(1);
        self.worker_count = self.worker_count.max(1);
        self.queue_capacity = self.queue_capacity.max(1);
        self.lookup_chunk_size = self.lookup_chunk_size.clamp(1, MAX_LOOKUP_CHUNK_SIZE);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity.max(1);
        self
    }

    pub fn with_shutdown_grace_ms(mut self, shutdown_grace_ms: u64) -> Self {
        self.shutdown_grace_ms = shutdown_grace_ms;
        self
    }
}

/// 解析数据库路径
///
/// 优先级: 命令行 --db > 环境变量 REGFILE_INGEST_DB_PATH > 用户数据目录
pub fn resolve_db_path(cli_path: Option<&str>) -> PathBuf {
    if let Some(path) = cli_path.map(str::trim).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    if let Some(path) = std::env::var(DB_PATH_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
    {
        return PathBuf::from(path.trim());
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(DB_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.lookup_chunk_size, 500);
        assert!(config.worker_count >= 1);
    }

    #[test]
    fn test_normalized_rejects_zero() {
        let config = IngestConfig {
            batch_size: 0,
            worker_count: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.worker_count, 1);
    }

    #[test]
    fn test_normalized_caps_lookup_chunk() {
        let config = IngestConfig {
            lookup_chunk_size: 100_000,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.lookup_chunk_size, MAX_LOOKUP_CHUNK_SIZE);

        let config = IngestConfig {
            lookup_chunk_size: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.lookup_chunk_size, 1);
    }

    #[test]
    fn test_cli_path_wins() {
        let path = resolve_db_path(Some("/tmp/custom.db"));
        assert_eq!(path, PathBuf::from("/tmp/custom.db"));
    }

    #[test]
    fn test_fallback_path_ends_with_db_file() {
        // 空白参数视为未提供
        let path = resolve_db_path(Some("  "));
        if std::env::var(DB_PATH_ENV).is_err() {
            assert!(path.ends_with("regfile-ingest/regfile.db"));
        }
    }
}
