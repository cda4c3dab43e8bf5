// ==========================================
// 定长监管报送文件导入系统 - 导入 Repository Trait
// ==========================================
// 职责: 定义导入相关数据访问接口（不包含业务逻辑）
// 红线: Repository 不含校验规则, 只做批量查询与写入
// 约束: 所有查询按报送批次 (submission_id) 限定, 不做全局判断
// ==========================================

use crate::domain::error_record::{ErrorRecord, ErrorType};
use crate::domain::ingestion::{IngestionContext, ProcessedBatch};
use crate::domain::records::ParentColumn;
use crate::domain::types::RecordKind;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use std::collections::HashSet;

// ==========================================
// ExistenceLookup - 库内重复批量查询
// ==========================================
// 实现者: IngestRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait ExistenceLookup: Send + Sync {
    /// 批量查询已存在的去重键
    ///
    /// # 参数
    /// - kind: 记录类型（决定查询的表）
    /// - submission_id: 报送批次
    /// - keys: 候选去重键
    ///
    /// # 返回
    /// - Ok(HashSet): 已存在的键（候选键的子集）
    async fn existing_keys(
        &self,
        kind: RecordKind,
        submission_id: &str,
        keys: Vec<String>,
    ) -> RepositoryResult<HashSet<String>>;
}

// ==========================================
// ParentLookup - Linkage 父记录批量查询
// ==========================================
#[async_trait]
pub trait ParentLookup: Send + Sync {
    /// 批量查询已存在的父引用
    ///
    /// # 参数
    /// - column: linkage 的引用列（subject_ref / relationship_ref）
    /// - submission_id: 报送批次
    /// - keys: 候选父引用键
    async fn existing_parents(
        &self,
        column: ParentColumn,
        submission_id: &str,
        keys: Vec<String>,
    ) -> RepositoryResult<HashSet<String>>;
}

// ==========================================
// PersistenceSink - 校验后批次落库
// ==========================================
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// 在单个事务中写入接受记录与错误记录
    ///
    /// # 返回
    /// - Ok(usize): 写入的接受记录数
    /// - Err: 数据库错误（整个事务回滚）
    async fn save_batch(
        &self,
        ctx: &IngestionContext,
        batch: &ProcessedBatch,
    ) -> RepositoryResult<usize>;
}

// ==========================================
// ErrorTypeRepository - 错误类型配置
// ==========================================
#[async_trait]
pub trait ErrorTypeRepository: Send + Sync {
    async fn load_error_types(&self) -> RepositoryResult<Vec<ErrorType>>;
}

// ==========================================
// IngestQueryRepository - 导入结果查询
// ==========================================
#[async_trait]
pub trait IngestQueryRepository: Send + Sync {
    /// 统计某报送批次某类型的最终记录数
    async fn count_records(&self, kind: RecordKind, submission_id: &str)
        -> RepositoryResult<usize>;

    /// 统计某次导入写入最终表的记录数
    async fn count_ingested(&self, kind: RecordKind, ingestion_id: &str) -> RepositoryResult<usize>;

    /// 读取某导入批次的错误记录（含原因）
    async fn load_error_records(&self, ingestion_id: &str) -> RepositoryResult<Vec<ErrorRecord>>;
}
