// ==========================================
// 定长监管报送文件导入系统 - 领域模型层
// ==========================================
// 职责: 定义记录类型、解析后记录、错误记录、导入过程模型
// 红线: 不含数据访问逻辑, 不含校验逻辑
// ==========================================

pub mod error_record;
pub mod ingestion;
pub mod records;
pub mod types;

// 重导出核心类型
pub use error_record::{ErrorCause, ErrorRecord, ErrorType, RecordedCause};
pub use ingestion::{
    FileEnvelope, FileOutcome, IngestionContext, IngestionSummary, ProcessedBatch,
    ReportingPeriod, StagingRejection, StagingResult,
};
pub use records::{
    AccountingDataRecord, LinkageRecord, MerchantRecord, NdgChangeRecord, ParentColumn,
    ParentRef, Record, RecordFields, RelationshipRecord, SubjectRecord, TransactionRecord,
};
pub use types::{ErrorCode, RecordKind};
