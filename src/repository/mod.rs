// ==========================================
// 定长监管报送文件导入系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含校验逻辑
// 职责: 批量存在性/父记录查询, 批量落库, staging ETL
// 约束: 所有值使用参数化; 表名/列名只来自记录类型的静态布局
// ==========================================

pub mod error;
pub mod ingest_repo;
pub mod ingest_repo_impl;
pub mod staging_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use ingest_repo::{
    ErrorTypeRepository, ExistenceLookup, IngestQueryRepository, ParentLookup, PersistenceSink,
};
pub use ingest_repo_impl::IngestRepositoryImpl;
pub use staging_repo::{StagedRow, StagingRepository};
