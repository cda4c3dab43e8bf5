// ==========================================
// 定长监管报送文件导入系统 - 核心库
// ==========================================
// 技术栈: Rust + Tokio + SQLite
// 系统定位: 定长监管报送文件的解析、校验、去重与落库
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 记录类型与错误模型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 解析/校验/编排
pub mod importer;

// 配置层 - 导入配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// SQL 性能观测
pub mod perf;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    ErrorCause, ErrorCode, ErrorRecord, IngestionContext, IngestionSummary, Record, RecordKind,
    StagingResult,
};

// 导入层
pub use importer::{
    BatchOrchestrator, FileLineSource, IngestError, IngestResult, IngestionService, LineSource,
    MemoryLineSource, StagingEngine,
};

// 配置
pub use config::{IngestConfig, IngestConfigReader};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "定长监管报送文件导入系统";
