// ==========================================
// 定长监管报送文件导入系统 - 导入层
// ==========================================
// 职责: 定长文件 → 解析 → 校验 → 去重 → 落库
// 流程: 行来源 → 文件头尾 → 分片并行 → 跨记录校验 → 批量/流式/staging 落库
// ==========================================

// 模块声明
pub mod batch_orchestrator;
pub mod code_tables;
pub mod conflict_handler;
pub mod envelope;
pub mod error;
pub mod error_assembly;
pub mod field_rules;
pub mod file_parser;
pub mod ingestion_service;
pub mod layout;
pub mod line_parser;
pub mod line_validator;
pub mod record_dispatch;
pub mod staging_engine;

// 重导出核心类型
pub use batch_orchestrator::{BatchOrchestrator, CrossRecordPhase, StoreLookups};
pub use conflict_handler::{ShardedKeySet, StoreSnapshot};
pub use error::{IngestError, IngestResult};
pub use error_assembly::{CachedErrorTypeResolver, ErrorTypeResolver};
pub use file_parser::{FileLineSource, LineSource, MemoryLineSource};
pub use ingestion_service::IngestionService;
pub use line_validator::ValidationContext;
pub use record_dispatch::{handler_for, KindHandler, LineOutcome};
pub use staging_engine::StagingEngine;
