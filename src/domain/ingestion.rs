// ==========================================
// 定长监管报送文件导入系统 - 导入过程模型
// ==========================================
// IngestionContext: 一次文件导入的上下文（报送批次 + 导入批次 + 类型）
// ProcessedBatch: 单个分片的处理结果, 归属单个任务直到合并
// StagingResult: 一次 staging ETL 的结果
// ==========================================

use crate::domain::error_record::ErrorRecord;
use crate::domain::records::Record;
use crate::domain::types::RecordKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// IngestionContext - 导入上下文
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionContext {
    pub ingestion_id: String,  // 单个文件
    pub submission_id: String, // 报送周期（多个文件）
    pub kind: RecordKind,
    pub file_name: Option<String>,
}

impl IngestionContext {
    /// 创建新的导入上下文（ingestion_id 自动生成）
    pub fn new(kind: RecordKind, submission_id: impl Into<String>) -> Self {
        Self {
            ingestion_id: Uuid::new_v4().to_string(),
            submission_id: submission_id.into(),
            kind,
            file_name: None,
        }
    }

    pub fn with_ingestion_id(mut self, ingestion_id: impl Into<String>) -> Self {
        self.ingestion_id = ingestion_id.into();
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

// ==========================================
// ReportingPeriod - 报送期间（来自文件头）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportingPeriod {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// 文件头/尾信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEnvelope {
    pub period: Option<ReportingPeriod>,
    pub declared_count: usize,
}

// ==========================================
// ProcessedBatch - 分片处理结果
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessedBatch {
    pub batch_index: usize,
    pub line_count: usize,
    pub accepted: Vec<Record>,
    pub errors: Vec<ErrorRecord>,
}

impl ProcessedBatch {
    pub fn new(batch_index: usize) -> Self {
        Self {
            batch_index,
            ..Default::default()
        }
    }

    /// 行数核对: 输入行 == 接受 + 拒绝
    pub fn is_reconciled(&self) -> bool {
        self.line_count == self.accepted.len() + self.errors.len()
    }
}

/// 批量模式下的整文件结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutcome {
    pub envelope: FileEnvelope,
    pub total_lines: usize,
    pub batches: Vec<ProcessedBatch>,
}

impl FileOutcome {
    pub fn accepted_count(&self) -> usize {
        self.batches.iter().map(|b| b.accepted.len()).sum()
    }

    pub fn error_count(&self) -> usize {
        self.batches.iter().map(|b| b.errors.len()).sum()
    }

    pub fn accepted(&self) -> impl Iterator<Item = &Record> {
        self.batches.iter().flat_map(|b| b.accepted.iter())
    }

    pub fn errors(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.batches.iter().flat_map(|b| b.errors.iter())
    }
}

// ==========================================
// StagingResult - staging ETL 结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingRejection {
    pub raw_row: String,
    pub error_code: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingResult {
    pub inserted_count: usize,
    pub duplicate_count: usize,
    pub missing_reference_count: usize,
    pub error_count: usize,
    pub details: Vec<StagingRejection>,
}

// ==========================================
// IngestionSummary - 面向操作员的导入结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionSummary {
    pub ingestion_id: String,
    pub submission_id: String,
    pub kind: RecordKind,
    pub total_lines: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub error_records: Vec<ErrorRecord>,
    pub elapsed_ms: u128,
}

impl IngestionSummary {
    pub fn is_reconciled(&self) -> bool {
        self.total_lines == self.accepted + self.rejected
    }
}
