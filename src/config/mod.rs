// ==========================================
// 定长监管报送文件导入系统 - 配置层
// ==========================================
// 职责: 导入配置读取与快照
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod ingest_config;
pub mod ingest_config_trait;

// 重导出核心配置类型
pub use config_manager::{config_keys, ConfigManager};
pub use ingest_config::{resolve_db_path, IngestConfig};
pub use ingest_config_trait::IngestConfigReader;
