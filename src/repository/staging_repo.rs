// ==========================================
// 定长监管报送文件导入系统 - 暂存表 Repository
// ==========================================
// 职责: 暂存行批量装载 + 集合式 ETL（去重 / 父记录 / 搬迁 / 清理）
// 往返次数: 与行数无关, 每个关注点一条语句
// 事务: 一次 staging pass 全部语句在同一事务中, 失败整体回滚
// ==========================================

use crate::db::{extra_columns, field_columns, staging_status};
use crate::domain::error_record::{
    ErrorCause, DUPLICATE_IN_FILE, DUPLICATE_IN_STORE, MISSING_PARENT,
};
use crate::domain::ingestion::{IngestionContext, StagingRejection, StagingResult};
use crate::domain::records::{ParentColumn, Record};
use crate::domain::types::{ErrorCode, RecordKind};
use crate::perf::PerfGuard;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, params_from_iter, Connection, Transaction};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

// ==========================================
// StagedRow - 待装载的暂存行
// ==========================================
#[derive(Debug, Clone)]
pub struct StagedRow {
    pub raw_row: String,
    /// 解析后的记录; 通过校验时为改写后的值, 否则为原始解析值
    pub record: Option<Record>,
    /// 解析值组成的键（文件内去重）
    pub file_key: Option<String>,
    pub status: &'static str,
    /// 字段级原因（INVALID 行）
    pub causes: Vec<ErrorCause>,
}

impl StagedRow {
    pub fn pending(record: Record, file_key: String) -> Self {
        Self {
            raw_row: record.raw_row().to_string(),
            record: Some(record),
            file_key: Some(file_key),
            status: staging_status::PENDING,
            causes: Vec::new(),
        }
    }

    pub fn invalid(
        raw_row: &str,
        record: Option<Record>,
        file_key: Option<String>,
        causes: Vec<ErrorCause>,
    ) -> Self {
        Self {
            raw_row: raw_row.to_string(),
            record,
            file_key,
            status: staging_status::INVALID,
            causes,
        }
    }
}

// ==========================================
// StagingRepository
// ==========================================
pub struct StagingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StagingRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn staging_columns(kind: RecordKind) -> Vec<&'static str> {
        let mut columns = vec!["submission_id", "ingestion_id", "raw_row", "file_key", "dup_key"];
        columns.extend(field_columns(kind));
        columns.extend(extra_columns(kind).iter().copied());
        columns.push("parent_ref");
        columns.push("status");
        columns
    }

    /// 最终表与暂存表共有的列（搬迁用）
    fn final_columns(kind: RecordKind) -> Vec<&'static str> {
        let mut columns = vec!["submission_id", "ingestion_id", "raw_row", "dup_key"];
        columns.extend(field_columns(kind));
        columns.extend(extra_columns(kind).iter().copied());
        columns
    }

    fn row_values(ctx: &IngestionContext, row: &StagedRow) -> Vec<Option<String>> {
        let kind = ctx.kind;
        let mut values = vec![
            Some(ctx.submission_id.clone()),
            Some(ctx.ingestion_id.clone()),
            Some(row.raw_row.clone()),
            row.file_key.clone(),
            row.record.as_ref().map(|r| r.duplicate_key()),
        ];
        match &row.record {
            Some(record) => {
                values.extend(
                    record
                        .field_values()
                        .into_iter()
                        .map(|(_, v)| Some(v.to_string())),
                );
                if let Some((subject_ref, relationship_ref)) = record.linkage_refs() {
                    values.push(Some(subject_ref));
                    values.push(Some(relationship_ref));
                }
                values.push(record.parent_ref().map(|p| p.key));
            }
            None => {
                let blanks = field_columns(kind).len() + extra_columns(kind).len();
                values.extend(std::iter::repeat(Some(String::new())).take(blanks));
                values.push(None);
            }
        }
        values.push(Some(row.status.to_string()));
        values
    }

    /// 批量装载暂存行（单事务, 不做校验）
    ///
    /// # 返回
    /// - Ok(usize): 装载行数
    pub fn load_rows(&self, ctx: &IngestionContext, rows: &[StagedRow]) -> RepositoryResult<usize> {
        let _perf = PerfGuard::new("staging_load").with_rows(rows.len());
        let kind = ctx.kind;
        let table = kind.staging_table_name();
        let columns = Self::staging_columns(kind);
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let insert_row = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        );

        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;
        {
            let mut row_stmt = tx.prepare(&insert_row)?;
            let mut cause_stmt = tx.prepare(
                "INSERT INTO stg_cause (staging_table, staging_id, error_code, description) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in rows {
                row_stmt.execute(params_from_iter(Self::row_values(ctx, row)))?;
                let staging_id = tx.last_insert_rowid();
                for cause in &row.causes {
                    cause_stmt.execute(params![
                        table,
                        staging_id,
                        cause.error_code.as_str(),
                        cause.description
                    ])?;
                }
            }
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        debug!(table = %table, rows = rows.len(), "暂存装载完成");
        Ok(rows.len())
    }

    /// 执行一次集合式 staging pass
    ///
    /// 顺序: 文件内重复 → 缺少父记录 → 库内重复（与逐行路径优先级一致）
    ///
    /// 暂存区内同一报送批次的所有导入一并处理; 文件内重复按导入区分
    ///
    /// # 返回
    /// - Ok(StagingResult): 计数 + 拒绝明细
    /// - Err(UnknownErrorCode): 原因编码无法在 error_type 中解析, 整体回滚
    pub fn run_pass(&self, kind: RecordKind, submission_id: &str) -> RepositoryResult<StagingResult> {
        let _perf = PerfGuard::new("staging_pass");
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;

        Self::mark_duplicate_in_file(&tx, kind, submission_id)?;
        if kind.requires_parent() {
            Self::mark_missing_parent(&tx, kind, submission_id)?;
        }
        Self::mark_duplicate_in_store(&tx, kind, submission_id)?;
        Self::ensure_error_codes(&tx, kind, submission_id)?;

        let mut result = Self::collect_counts(&tx, kind, submission_id)?;
        result.details = Self::collect_details(&tx, kind, submission_id)?;
        result.inserted_count = Self::move_valid_rows(&tx, kind, submission_id)?;
        Self::write_error_records(&tx, kind, submission_id)?;
        Self::purge(&tx, kind, submission_id)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            kind = %kind,
            submission_id,
            inserted = result.inserted_count,
            duplicates = result.duplicate_count,
            missing_parent = result.missing_reference_count,
            invalid = result.error_count,
            "staging pass 完成"
        );
        Ok(result)
    }

    // ===== 集合式步骤 =====

    fn mark_duplicate_in_file(
        tx: &Transaction,
        kind: RecordKind,
        submission_id: &str,
    ) -> RepositoryResult<()> {
        let table = kind.staging_table_name();
        let earlier = format!(
            "EXISTS (SELECT 1 FROM {t} p WHERE p.submission_id = s.submission_id \
             AND p.ingestion_id = s.ingestion_id \
             AND p.file_key = s.file_key AND p.staging_id < s.staging_id)",
            t = table
        );

        // 所有已解析行（含字段无效行）都追加重复原因
        tx.execute(
            &format!(
                "INSERT INTO stg_cause (staging_table, staging_id, error_code, description) \
                 SELECT ?2, s.staging_id, ?3, ?4 FROM {t} s \
                 WHERE s.submission_id = ?1 AND s.file_key IS NOT NULL AND {earlier} \
                 ORDER BY s.staging_id",
                t = table,
                earlier = earlier
            ),
            params![
                submission_id,
                table,
                ErrorCode::DuplicateRecord.as_str(),
                DUPLICATE_IN_FILE
            ],
        )?;
        tx.execute(
            &format!(
                "UPDATE {t} SET status = ?2 WHERE submission_id = ?1 AND status = ?3 \
                 AND staging_id IN (SELECT s.staging_id FROM {t} s \
                 WHERE s.submission_id = ?1 AND s.file_key IS NOT NULL AND {earlier})",
                t = table,
                earlier = earlier
            ),
            params![
                submission_id,
                staging_status::DUPLICATE_FILE,
                staging_status::PENDING
            ],
        )?;
        Ok(())
    }

    fn mark_missing_parent(
        tx: &Transaction,
        kind: RecordKind,
        submission_id: &str,
    ) -> RepositoryResult<()> {
        let column = match kind {
            RecordKind::Subject => ParentColumn::SubjectRef,
            _ => ParentColumn::RelationshipRef,
        };
        let table = kind.staging_table_name();
        tx.execute(
            &format!(
                "UPDATE {t} SET status = ?2 WHERE submission_id = ?1 AND status = ?3 \
                 AND NOT EXISTS (SELECT 1 FROM {linkage} l \
                 WHERE l.submission_id = {t}.submission_id AND l.{col} = {t}.parent_ref)",
                t = table,
                linkage = RecordKind::Linkage.table_name(),
                col = column.column_name()
            ),
            params![
                submission_id,
                staging_status::MISSING_PARENT,
                staging_status::PENDING
            ],
        )?;
        Self::add_status_cause(
            tx,
            &table,
            submission_id,
            staging_status::MISSING_PARENT,
            ErrorCode::MissingParentReference,
            MISSING_PARENT,
        )
    }

    fn mark_duplicate_in_store(
        tx: &Transaction,
        kind: RecordKind,
        submission_id: &str,
    ) -> RepositoryResult<()> {
        let table = kind.staging_table_name();
        // 同批次中先装载的其他导入的 PENDING 行视同已入库（与逐行路径的提交顺序一致）
        tx.execute(
            &format!(
                "UPDATE {t} SET status = ?2 WHERE submission_id = ?1 AND status = ?3 \
                 AND (EXISTS (SELECT 1 FROM {f} f \
                 WHERE f.submission_id = {t}.submission_id AND f.dup_key = {t}.dup_key) \
                 OR EXISTS (SELECT 1 FROM {t} p \
                 WHERE p.submission_id = {t}.submission_id AND p.ingestion_id <> {t}.ingestion_id \
                 AND p.staging_id < {t}.staging_id AND p.status = ?3 AND p.dup_key = {t}.dup_key))",
                t = table,
                f = kind.table_name()
            ),
            params![
                submission_id,
                staging_status::DUPLICATE_STORE,
                staging_status::PENDING
            ],
        )?;
        Self::add_status_cause(
            tx,
            &table,
            submission_id,
            staging_status::DUPLICATE_STORE,
            ErrorCode::DuplicateRecord,
            DUPLICATE_IN_STORE,
        )
    }

    fn add_status_cause(
        tx: &Transaction,
        table: &str,
        submission_id: &str,
        status: &str,
        code: ErrorCode,
        description: &str,
    ) -> RepositoryResult<()> {
        tx.execute(
            &format!(
                "INSERT INTO stg_cause (staging_table, staging_id, error_code, description) \
                 SELECT ?3, staging_id, ?4, ?5 FROM {t} \
                 WHERE submission_id = ?1 AND status = ?2 ORDER BY staging_id",
                t = table
            ),
            params![submission_id, status, table, code.as_str(), description],
        )?;
        Ok(())
    }

    /// 原因编码必须全部能在 error_type 中解析
    fn ensure_error_codes(
        tx: &Transaction,
        kind: RecordKind,
        submission_id: &str,
    ) -> RepositoryResult<()> {
        let table = kind.staging_table_name();
        let mut stmt = tx.prepare(&format!(
            "SELECT DISTINCT c.error_code FROM stg_cause c \
             JOIN {t} s ON s.staging_id = c.staging_id AND c.staging_table = ?2 \
             LEFT JOIN error_type et ON et.code = c.error_code \
             WHERE s.submission_id = ?1 AND et.id IS NULL ORDER BY c.error_code",
            t = table
        ))?;
        let unknown = stmt
            .query_map(params![submission_id, table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(RepositoryError::UnknownErrorCode(unknown))
        }
    }

    fn collect_counts(
        tx: &Transaction,
        kind: RecordKind,
        submission_id: &str,
    ) -> RepositoryResult<StagingResult> {
        let mut stmt = tx.prepare(&format!(
            "SELECT status, COUNT(*) FROM {} WHERE submission_id = ?1 GROUP BY status",
            kind.staging_table_name()
        ))?;
        let mut rows = stmt.query(params![submission_id])?;
        let mut result = StagingResult::default();
        while let Some(row) = rows.next()? {
            let status: String = row.get(0)?;
            let count = row.get::<_, i64>(1)? as usize;
            match status.as_str() {
                staging_status::INVALID => result.error_count += count,
                staging_status::DUPLICATE_FILE | staging_status::DUPLICATE_STORE => {
                    result.duplicate_count += count
                }
                staging_status::MISSING_PARENT => result.missing_reference_count += count,
                _ => {}
            }
        }
        Ok(result)
    }

    fn collect_details(
        tx: &Transaction,
        kind: RecordKind,
        submission_id: &str,
    ) -> RepositoryResult<Vec<StagingRejection>> {
        let table = kind.staging_table_name();
        let mut stmt = tx.prepare(&format!(
            "SELECT s.raw_row, c.error_code, c.description FROM stg_cause c \
             JOIN {t} s ON s.staging_id = c.staging_id AND c.staging_table = ?2 \
             WHERE s.submission_id = ?1 ORDER BY s.staging_id, c.id",
            t = table
        ))?;
        let details = stmt
            .query_map(params![submission_id, table], |row| {
                Ok(StagingRejection {
                    raw_row: row.get(0)?,
                    error_code: row.get(1)?,
                    reason: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(details)
    }

    /// INSERT-SELECT 搬迁 PENDING 行到最终表
    fn move_valid_rows(
        tx: &Transaction,
        kind: RecordKind,
        submission_id: &str,
    ) -> RepositoryResult<usize> {
        let columns = Self::final_columns(kind).join(", ");
        let moved = tx.execute(
            &format!(
                "INSERT INTO {f} ({cols}) SELECT {cols} FROM {t} \
                 WHERE submission_id = ?1 AND status = ?2 ORDER BY staging_id",
                f = kind.table_name(),
                t = kind.staging_table_name(),
                cols = columns
            ),
            params![submission_id, staging_status::PENDING],
        )?;
        Ok(moved)
    }

    /// INSERT-SELECT 生成 error_record / error_cause
    fn write_error_records(
        tx: &Transaction,
        kind: RecordKind,
        submission_id: &str,
    ) -> RepositoryResult<()> {
        let table = kind.staging_table_name();
        tx.execute(
            &format!(
                "INSERT INTO error_record (ingestion_id, submission_id, record_kind, raw_row, source_ref) \
                 SELECT ingestion_id, submission_id, ?2, raw_row, ?3 || ':' || staging_id FROM {t} \
                 WHERE submission_id = ?1 AND status <> ?4 ORDER BY staging_id",
                t = table
            ),
            params![
                submission_id,
                kind.as_str(),
                table,
                staging_status::PENDING
            ],
        )?;
        tx.execute(
            &format!(
                "INSERT INTO error_cause (error_record_id, error_type_id, description) \
                 SELECT er.id, et.id, c.description FROM stg_cause c \
                 JOIN {t} s ON s.staging_id = c.staging_id AND c.staging_table = ?2 \
                 JOIN error_record er ON er.source_ref = ?2 || ':' || s.staging_id \
                 JOIN error_type et ON et.code = c.error_code \
                 WHERE s.submission_id = ?1 AND s.status <> ?3 ORDER BY s.staging_id, c.id",
                t = table
            ),
            params![submission_id, table, staging_status::PENDING],
        )?;
        Ok(())
    }

    fn purge(tx: &Transaction, kind: RecordKind, submission_id: &str) -> RepositoryResult<()> {
        let table = kind.staging_table_name();
        tx.execute(
            &format!(
                "DELETE FROM stg_cause WHERE staging_table = ?2 \
                 AND staging_id IN (SELECT staging_id FROM {t} WHERE submission_id = ?1)",
                t = table
            ),
            params![submission_id, table],
        )?;
        tx.execute(
            &format!("DELETE FROM {} WHERE submission_id = ?1", table),
            params![submission_id],
        )?;
        Ok(())
    }

    /// 暂存区剩余行数（测试 / 运维检查）
    pub fn pending_rows(&self, kind: RecordKind, submission_id: &str) -> RepositoryResult<usize> {
        let conn = self.conn.lock()?;
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE submission_id = ?1",
                kind.staging_table_name()
            ),
            params![submission_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
