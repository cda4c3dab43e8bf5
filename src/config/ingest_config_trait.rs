// ==========================================
// 定长监管报送文件导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义编排器所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::importer::error::IngestResult;
use async_trait::async_trait;

// ==========================================
// IngestConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）, 测试中的内存实现
#[async_trait]
pub trait IngestConfigReader: Send + Sync {
    // ===== 分片与并发 =====

    /// 每个分片的行数
    ///
    /// # 默认值
    /// - 1000
    async fn get_batch_size(&self) -> IngestResult<usize>;

    /// 工作池大小
    ///
    /// # 默认值
    /// - 可用 CPU 核数
    async fn get_worker_count(&self) -> IngestResult<usize>;

    // ===== 流式落库 =====

    /// 生产者/消费者之间队列容量（分片数）
    ///
    /// # 默认值
    /// - 16
    async fn get_queue_capacity(&self) -> IngestResult<usize>;

    /// 消费者轮询超时（毫秒）
    ///
    /// # 默认值
    /// - 500
    async fn get_poll_timeout_ms(&self) -> IngestResult<u64>;

    /// 致命错误后等待在途分片结束的时间（毫秒）
    ///
    /// # 默认值
    /// - 5000
    async fn get_shutdown_grace_ms(&self) -> IngestResult<u64>;

    // ===== 存储查询 =====

    /// 批量存在性查询每条 IN (...) 的键数量
    ///
    /// # 默认值
    /// - 500
    async fn get_lookup_chunk_size(&self) -> IngestResult<usize>;
}
