// ==========================================
// 定长监管报送文件导入系统 - Staging ETL 引擎
// ==========================================
// 大文件替代路径:
// 1. 装载: 每行解析 + 字段校验后整体写入暂存表（不做跨记录判断）
// 2. 集合式 pass: 文件内重复 / 缺少父记录 / 库内重复, 每个关注点一条语句
// 3. INSERT-SELECT 搬迁通过行, 生成错误记录, 清理暂存区
// 语义与逐行路径一致: 同样按报送批次限定, 同样 缺少父记录 先于 库内重复
// ==========================================

use crate::domain::error_record::ErrorCause;
use crate::domain::ingestion::{IngestionContext, StagingResult};
use crate::domain::types::{ErrorCode, RecordKind};
use crate::importer::envelope::split_envelope;
use crate::importer::error::{IngestError, IngestResult};
use crate::importer::error_assembly::panic_message;
use crate::importer::file_parser::LineSource;
use crate::importer::line_validator::ValidationContext;
use crate::importer::record_dispatch::{handler_for, KindHandler};
use crate::repository::error::RepositoryError;
use crate::repository::staging_repo::{StagedRow, StagingRepository};
use rusqlite::Connection;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, instrument, warn};

pub struct StagingEngine {
    repo: Arc<StagingRepository>,
    handler_override: Option<KindHandler>,
}

impl StagingEngine {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            repo: Arc::new(StagingRepository::from_connection(conn)),
            handler_override: None,
        }
    }

    /// 替换某记录类型的处理器
    pub fn with_handler(mut self, handler: KindHandler) -> Self {
        self.handler_override = Some(handler);
        self
    }

    fn handler(&self, kind: RecordKind) -> KindHandler {
        self.handler_override
            .filter(|h| h.kind == kind)
            .unwrap_or_else(|| handler_for(kind))
    }

    /// 装载文件到暂存表
    ///
    /// # 返回
    /// - Ok(usize): 装载行数（= 文件记录行数）
    /// - Err(StructuralFileError): 文件头尾不合规, 不装载任何行
    #[instrument(skip(self, source, ctx), fields(ingestion_id = %ctx.ingestion_id, kind = %ctx.kind))]
    pub async fn load_staging(
        &self,
        source: &dyn LineSource,
        ctx: &IngestionContext,
    ) -> IngestResult<usize> {
        let start_time = Instant::now();
        let lines = source.read_lines()?;
        let (envelope, body) = split_envelope(&lines)?;

        let handler = self.handler(ctx.kind);
        let vctx = ValidationContext::new(envelope.period);
        let rows: Vec<StagedRow> = body
            .iter()
            .map(|line| stage_line(&handler, line, &vctx))
            .collect();
        let invalid = rows.iter().filter(|r| !r.causes.is_empty()).count();

        let repo = Arc::clone(&self.repo);
        let ctx_owned = ctx.clone();
        let loaded =
            tokio::task::spawn_blocking(move || repo.load_rows(&ctx_owned, &rows)).await??;

        info!(
            file = source.name(),
            loaded,
            invalid,
            elapsed_ms = start_time.elapsed().as_millis(),
            "暂存装载完成"
        );
        Ok(loaded)
    }

    /// 执行集合式 staging pass
    ///
    /// # 返回
    /// - Err(UnknownErrorType): 原因编码在 error_type 中不存在（整体回滚）
    #[instrument(skip(self))]
    pub async fn run_staging_pass(
        &self,
        kind: RecordKind,
        submission_id: &str,
    ) -> IngestResult<StagingResult> {
        let repo = Arc::clone(&self.repo);
        let submission = submission_id.to_string();
        let result = tokio::task::spawn_blocking(move || repo.run_pass(kind, &submission))
            .await?
            .map_err(|e| match e {
                RepositoryError::UnknownErrorCode(codes) => {
                    IngestError::UnknownErrorType(codes.join(", "))
                }
                other => IngestError::Repository(other),
            })?;
        Ok(result)
    }

    /// 暂存区剩余行数
    pub async fn pending_rows(&self, kind: RecordKind, submission_id: &str) -> IngestResult<usize> {
        let repo = Arc::clone(&self.repo);
        let submission = submission_id.to_string();
        Ok(tokio::task::spawn_blocking(move || repo.pending_rows(kind, &submission)).await??)
    }
}

/// 单行 → 暂存行（解析 + 字段校验, panic 降级为 INVALID_FORMAT）
fn stage_line(handler: &KindHandler, line: &str, vctx: &ValidationContext) -> StagedRow {
    let caught = catch_unwind(AssertUnwindSafe(|| {
        let parsed = (handler.parse)(line)?;
        let file_key = parsed.duplicate_key();
        let verdict = (handler.validate)(parsed.clone(), vctx);
        Ok::<_, IngestError>(match verdict {
            Ok(record) => StagedRow::pending(record, file_key),
            Err(causes) => StagedRow::invalid(line, Some(parsed), Some(file_key), causes),
        })
    }));

    match caught {
        Ok(Ok(row)) => row,
        Ok(Err(parse_err)) => StagedRow::invalid(
            line,
            None,
            None,
            vec![ErrorCause::new(ErrorCode::InvalidFormat, parse_err.to_string())],
        ),
        Err(payload) => {
            warn!("暂存行处理 panic, 已降级为 INVALID_FORMAT");
            StagedRow::invalid(
                line,
                None,
                None,
                vec![ErrorCause::new(
                    ErrorCode::InvalidFormat,
                    panic_message(payload.as_ref()),
                )],
            )
        }
    }
}
