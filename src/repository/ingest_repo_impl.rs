// ==========================================
// 定长监管报送文件导入系统 - 导入 Repository 实现
// ==========================================
// 职责: 实现导入相关数据访问（使用 rusqlite）
// 批量查询: 候选键按 lookup_chunk_size 分块, 每块一条 IN (...) 查询
// 批量写入: 单事务 + 预编译语句
// ==========================================

use crate::db::{extra_columns, field_columns, open_sqlite_connection};
use crate::domain::error_record::{ErrorRecord, ErrorType, RecordedCause};
use crate::domain::ingestion::{IngestionContext, ProcessedBatch};
use crate::domain::records::{ParentColumn, Record};
use crate::domain::types::RecordKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ingest_repo::{
    ErrorTypeRepository, ExistenceLookup, IngestQueryRepository, ParentLookup, PersistenceSink,
};
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, Transaction};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// 默认 IN 子句分块大小
pub const DEFAULT_LOOKUP_CHUNK_SIZE: usize = 500;

/// 分块上限（低于 SQLite 绑定参数上限）
pub const MAX_LOOKUP_CHUNK_SIZE: usize = 32_000;

// ==========================================
// IngestRepositoryImpl
// ==========================================
pub struct IngestRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
    lookup_chunk_size: usize,
}

impl IngestRepositoryImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    /// 从已有连接创建（与 ConfigManager / StagingRepository 共享连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            lookup_chunk_size: DEFAULT_LOOKUP_CHUNK_SIZE,
        }
    }

    pub fn with_lookup_chunk_size(mut self, chunk_size: usize) -> Self {
        self.lookup_chunk_size = chunk_size.clamp(1, MAX_LOOKUP_CHUNK_SIZE);
        self
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// 分块执行 `SELECT column FROM table WHERE submission_id = ? AND column IN (...)`
    fn chunked_lookup(
        &self,
        table: &str,
        column: &str,
        submission_id: &str,
        keys: Vec<String>,
    ) -> RepositoryResult<HashSet<String>> {
        let mut found = HashSet::new();
        if keys.is_empty() {
            return Ok(found);
        }

        // 去重后再查, 减少绑定参数
        let unique: Vec<String> = keys
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let conn = self.conn.lock()?;
        for chunk in unique.chunks(self.lookup_chunk_size) {
            let placeholders = (0..chunk.len())
                .map(|i| format!("?{}", i + 2))
                .collect::<Vec<_>>()
                .join(",");
            let query = format!(
                "SELECT DISTINCT {col} FROM {table} WHERE submission_id = ?1 AND {col} IN ({ph})",
                col = column,
                table = table,
                ph = placeholders
            );
            let mut stmt = conn.prepare_cached(&query)?;
            let bound = std::iter::once(submission_id).chain(chunk.iter().map(|k| k.as_str()));
            let rows = stmt.query_map(params_from_iter(bound), |row| row.get::<_, String>(0))?;
            for row in rows {
                found.insert(row?);
            }
        }

        debug!(table, column, found = found.len(), "批量存在性查询完成");
        Ok(found)
    }
}

// ==========================================
// 事务内写入（与 staging 路径共用）
// ==========================================

/// 最终表 INSERT 语句
pub(crate) fn insert_sql(kind: RecordKind) -> String {
    let mut columns = vec!["submission_id", "ingestion_id", "raw_row", "dup_key"];
    columns.extend(field_columns(kind));
    columns.extend(extra_columns(kind).iter().copied());
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        kind.table_name(),
        columns.join(", "),
        placeholders
    )
}

/// 记录 → 绑定值（顺序与 insert_sql 一致）
pub(crate) fn record_values(ctx: &IngestionContext, record: &Record) -> Vec<String> {
    let mut values = vec![
        ctx.submission_id.clone(),
        ctx.ingestion_id.clone(),
        record.raw_row().to_string(),
        record.duplicate_key(),
    ];
    values.extend(record.field_values().into_iter().map(|(_, v)| v.to_string()));
    if let Some((subject_ref, relationship_ref)) = record.linkage_refs() {
        values.push(subject_ref);
        values.push(relationship_ref);
    }
    values
}

pub(crate) fn insert_records_tx(
    tx: &Transaction,
    ctx: &IngestionContext,
    records: &[Record],
) -> RepositoryResult<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    let mut stmt = tx.prepare(&insert_sql(ctx.kind))?;
    let mut count = 0;
    for record in records {
        if record.kind() != ctx.kind {
            return Err(RepositoryError::KindMismatch {
                expected: ctx.kind,
                found: record.kind(),
            });
        }
        stmt.execute(params_from_iter(record_values(ctx, record)))?;
        count += 1;
    }
    Ok(count)
}

pub(crate) fn insert_error_records_tx(
    tx: &Transaction,
    errors: &[ErrorRecord],
) -> RepositoryResult<usize> {
    if errors.is_empty() {
        return Ok(0);
    }
    let mut record_stmt = tx.prepare(
        r#"
        INSERT INTO error_record (ingestion_id, submission_id, record_kind, raw_row)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )?;
    let mut cause_stmt = tx.prepare(
        r#"
        INSERT INTO error_cause (error_record_id, error_type_id, description)
        VALUES (?1, ?2, ?3)
        "#,
    )?;

    for error in errors {
        record_stmt.execute(params![
            error.ingestion_ref,
            error.submission_ref,
            error.record_kind.as_str(),
            error.raw_row,
        ])?;
        let error_record_id = tx.last_insert_rowid();
        for cause in &error.causes {
            cause_stmt.execute(params![
                error_record_id,
                cause.error_type.id,
                cause.description
            ])?;
        }
    }
    Ok(errors.len())
}

// ==========================================
// Trait 实现
// ==========================================

#[async_trait]
impl ExistenceLookup for IngestRepositoryImpl {
    async fn existing_keys(
        &self,
        kind: RecordKind,
        submission_id: &str,
        keys: Vec<String>,
    ) -> RepositoryResult<HashSet<String>> {
        self.chunked_lookup(kind.table_name(), "dup_key", submission_id, keys)
    }
}

#[async_trait]
impl ParentLookup for IngestRepositoryImpl {
    async fn existing_parents(
        &self,
        column: ParentColumn,
        submission_id: &str,
        keys: Vec<String>,
    ) -> RepositoryResult<HashSet<String>> {
        self.chunked_lookup(
            RecordKind::Linkage.table_name(),
            column.column_name(),
            submission_id,
            keys,
        )
    }
}

#[async_trait]
impl PersistenceSink for IngestRepositoryImpl {
    async fn save_batch(
        &self,
        ctx: &IngestionContext,
        batch: &ProcessedBatch,
    ) -> RepositoryResult<usize> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;

        let inserted = insert_records_tx(&tx, ctx, &batch.accepted)?;
        let errors = insert_error_records_tx(&tx, &batch.errors)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        debug!(
            ingestion_id = %ctx.ingestion_id,
            batch_index = batch.batch_index,
            inserted,
            errors,
            "批次落库完成"
        );
        Ok(inserted)
    }
}

#[async_trait]
impl ErrorTypeRepository for IngestRepositoryImpl {
    async fn load_error_types(&self) -> RepositoryResult<Vec<ErrorType>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare("SELECT id, code, description FROM error_type ORDER BY id")?;
        let types = stmt
            .query_map([], |row| {
                Ok(ErrorType {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    description: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(types)
    }
}

#[async_trait]
impl IngestQueryRepository for IngestRepositoryImpl {
    async fn count_records(
        &self,
        kind: RecordKind,
        submission_id: &str,
    ) -> RepositoryResult<usize> {
        let conn = self.conn.lock()?;
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE submission_id = ?1",
                kind.table_name()
            ),
            params![submission_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn count_ingested(&self, kind: RecordKind, ingestion_id: &str) -> RepositoryResult<usize> {
        let conn = self.conn.lock()?;
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE ingestion_id = ?1",
                kind.table_name()
            ),
            params![ingestion_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn load_error_records(&self, ingestion_id: &str) -> RepositoryResult<Vec<ErrorRecord>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT er.id, er.raw_row, er.ingestion_id, er.submission_id, er.record_kind,
                   et.id, et.code, et.description, ec.description
            FROM error_record er
            JOIN error_cause ec ON ec.error_record_id = er.id
            JOIN error_type et ON et.id = ec.error_type_id
            WHERE er.ingestion_id = ?1
            ORDER BY er.id, ec.id
            "#,
        )?;

        let mut rows = stmt.query(params![ingestion_id])?;
        let mut records: Vec<ErrorRecord> = Vec::new();
        let mut current_id: Option<i64> = None;

        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let cause = RecordedCause {
                error_type: ErrorType {
                    id: row.get(5)?,
                    code: row.get(6)?,
                    description: row.get(7)?,
                },
                description: row.get(8)?,
            };

            match (current_id, records.last_mut()) {
                (Some(prev), Some(last)) if prev == id => last.causes.push(cause),
                _ => {
                    let kind_raw: String = row.get(4)?;
                    let record_kind = kind_raw.parse::<RecordKind>().map_err(|message| {
                        RepositoryError::CorruptRow {
                            table: "error_record".to_string(),
                            message,
                        }
                    })?;
                    records.push(ErrorRecord {
                        raw_row: row.get(1)?,
                        ingestion_ref: row.get(2)?,
                        submission_ref: row.get(3)?,
                        record_kind,
                        causes: vec![cause],
                    });
                    current_id = Some(id);
                }
            }
        }

        Ok(records)
    }
}
