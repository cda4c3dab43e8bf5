// ==========================================
// 定长监管报送文件导入系统 - 错误记录模型
// ==========================================
// ErrorCause: 单个校验失败 (描述 + 错误码)
// ErrorRecord: 一行被拒记录 + 全部原因, 创建后不再修改
// ==========================================

use crate::domain::types::{ErrorCode, RecordKind};
use serde::{Deserialize, Serialize};

/// 跨记录原因描述（逐行路径与 staging 路径共用）
pub const DUPLICATE_IN_FILE: &str = "record already exists in the same file";
pub const DUPLICATE_IN_STORE: &str = "record already exists for this submission";
pub const MISSING_PARENT: &str = "no linkage record found for this submission";

// ==========================================
// ErrorCause - 校验失败原因
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCause {
    pub description: String,
    pub error_code: ErrorCode,
}

impl ErrorCause {
    pub fn new(error_code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            error_code,
        }
    }
}

// ==========================================
// ErrorType - 错误类型配置（error_type 表）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorType {
    pub id: i64,
    pub code: String,
    pub description: String,
}

/// 已解析错误类型的原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedCause {
    pub error_type: ErrorType,
    pub description: String,
}

impl RecordedCause {
    pub fn code(&self) -> &str {
        &self.error_type.code
    }
}

// ==========================================
// ErrorRecord - 被拒行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub raw_row: String,
    pub ingestion_ref: String,
    pub submission_ref: String,
    pub record_kind: RecordKind,
    pub causes: Vec<RecordedCause>,
}

impl ErrorRecord {
    pub fn codes(&self) -> Vec<&str> {
        self.causes.iter().map(|c| c.code()).collect()
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.causes.iter().any(|c| c.code() == code.as_str())
    }

    pub fn count_code(&self, code: ErrorCode) -> usize {
        self.causes
            .iter()
            .filter(|c| c.code() == code.as_str())
            .count()
    }
}
