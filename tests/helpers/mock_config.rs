// ==========================================
// Mock 配置 - 用于测试
// ==========================================
#![allow(dead_code)]

use async_trait::async_trait;
use regfile_ingest::config::IngestConfigReader;
use regfile_ingest::IngestResult;

/// 内存配置（不依赖 config_kv 表）
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub batch_size: usize,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub poll_timeout_ms: u64,
    pub shutdown_grace_ms: u64,
    pub lookup_chunk_size: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            worker_count: 4,
            queue_capacity: 16,
            poll_timeout_ms: 500,
            shutdown_grace_ms: 5000,
            lookup_chunk_size: 500,
        }
    }
}

impl MockConfig {
    /// 小分片 + 小队列（覆盖多分片并发与背压路径）
    pub fn tiny_batches() -> Self {
        Self {
            batch_size: 2,
            queue_capacity: 1,
            poll_timeout_ms: 50,
            lookup_chunk_size: 3,
            ..Self::default()
        }
    }

    /// 零值配置（验证归一化）
    pub fn zeros() -> Self {
        Self {
            batch_size: 0,
            worker_count: 0,
            queue_capacity: 0,
            poll_timeout_ms: 0,
            shutdown_grace_ms: 0,
            lookup_chunk_size: 0,
        }
    }
}

#[async_trait]
impl IngestConfigReader for MockConfig {
    async fn get_batch_size(&self) -> IngestResult<usize> {
        Ok(self.batch_size)
    }

    async fn get_worker_count(&self) -> IngestResult<usize> {
        Ok(self.worker_count)
    }

    async fn get_queue_capacity(&self) -> IngestResult<usize> {
        Ok(self.queue_capacity)
    }

    async fn get_poll_timeout_ms(&self) -> IngestResult<u64> {
        Ok(self.poll_timeout_ms)
    }

    async fn get_shutdown_grace_ms(&self) -> IngestResult<u64> {
        Ok(self.shutdown_grace_ms)
    }

    async fn get_lookup_chunk_size(&self) -> IngestResult<usize> {
        Ok(self.lookup_chunk_size)
    }
}
