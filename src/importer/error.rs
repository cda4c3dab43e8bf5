// ==========================================
// 定长监管报送文件导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 字段级错误按行累积为 ErrorCause, 不走此类型;
//       此处只包含会中断整个文件/整次运行的错误
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum IngestError {
    // ===== 输入相关错误 =====
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    // ===== 文件结构错误（整文件失败）=====
    #[error("文件结构错误:\n{}", reasons.join("\n"))]
    StructuralFileError { reasons: Vec<String> },

    // ===== 配置错误（整次运行失败）=====
    #[error("未配置的错误类型编码: {0}")]
    UnknownErrorType(String),

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    // ===== 编排错误 =====
    #[error("行数核对失败: 输入 {expected} 行, 接受 {accepted} + 拒绝 {rejected}")]
    CountMismatch {
        expected: usize,
        accepted: usize,
        rejected: usize,
    },

    #[error("分片任务失败 (batch {batch_index}): {message}")]
    WorkerFailure { batch_index: usize, message: String },

    #[error("落库消费者失败: {0}")]
    SinkError(String),

    // ===== 仓储错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IngestError {
    /// 是否为文件结构错误
    pub fn is_structural(&self) -> bool {
        matches!(self, IngestError::StructuralFileError { .. })
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => IngestError::FileNotFound(err.to_string()),
            _ => IngestError::FileReadError(err.to_string()),
        }
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for IngestError {
    fn from(err: rusqlite::Error) -> Self {
        IngestError::Repository(RepositoryError::from(err))
    }
}

impl From<tokio::task::JoinError> for IngestError {
    fn from(err: tokio::task::JoinError) -> Self {
        IngestError::InternalError(format!("任务 join 失败: {}", err))
    }
}

/// Result 类型别名
pub type IngestResult<T> = Result<T, IngestError>;
