// ==========================================
// 定长监管报送文件导入系统 - 导入服务
// ==========================================
// 职责: 组合 编排器 + 存储, 对外提供三种导入模式
// - 批量模式: 整文件校验完成后逐分片落库
// - 流式模式: 分片完成即由单个消费者落库
// - staging 模式: 暂存表 + 集合式 SQL
// 三种模式输出相同的 IngestionSummary（接受数 + 错误记录）
// ==========================================

use crate::config::{ConfigManager, IngestConfig};
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::ingestion::{IngestionContext, IngestionSummary};
use crate::importer::batch_orchestrator::BatchOrchestrator;
use crate::importer::error::{IngestError, IngestResult};
use crate::importer::error_assembly::CachedErrorTypeResolver;
use crate::importer::file_parser::LineSource;
use crate::importer::staging_engine::StagingEngine;
use crate::repository::{
    ErrorTypeRepository, IngestQueryRepository, IngestRepositoryImpl, PersistenceSink,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, instrument};

// ==========================================
// IngestionService
// ==========================================
pub struct IngestionService {
    conn: Arc<Mutex<Connection>>,
    repo: Arc<IngestRepositoryImpl>,
    config: IngestConfig,
    resolver: Arc<CachedErrorTypeResolver>,
}

impl IngestionService {
    /// 打开数据库, 建表, 读取配置与错误类型
    pub async fn open(db_path: &str) -> IngestResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        let conn = Arc::new(Mutex::new(conn));

        let manager = ConfigManager::from_connection(Arc::clone(&conn))?;
        let config = IngestConfig::load(&manager).await?;
        let overrides = manager.get_config_snapshot()?;
        info!(db_path, overrides = %overrides, "导入服务已初始化");

        Self::from_connection(conn, config).await
    }

    /// 使用已有连接与配置创建（连接需已建表）
    pub async fn from_connection(
        conn: Arc<Mutex<Connection>>,
        config: IngestConfig,
    ) -> IngestResult<Self> {
        let config = config.normalized();
        let repo = Arc::new(
            IngestRepositoryImpl::from_connection(Arc::clone(&conn))
                .with_lookup_chunk_size(config.lookup_chunk_size),
        );
        let resolver = Arc::new(CachedErrorTypeResolver::from_types(
            repo.load_error_types().await?,
        ));

        Ok(Self {
            conn,
            repo,
            config,
            resolver,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn repository(&self) -> Arc<IngestRepositoryImpl> {
        Arc::clone(&self.repo)
    }

    /// 带存储查询的编排器
    pub fn orchestrator(&self) -> BatchOrchestrator {
        BatchOrchestrator::new(self.config.clone(), self.resolver.clone())
            .with_store(self.repo.clone(), self.repo.clone())
    }

    pub fn staging_engine(&self) -> StagingEngine {
        StagingEngine::new(Arc::clone(&self.conn))
    }

    // ==========================================
    // 批量模式
    // ==========================================
    #[instrument(skip(self, source, ctx), fields(ingestion_id = %ctx.ingestion_id, kind = %ctx.kind))]
    pub async fn ingest_batch_mode(
        &self,
        source: &dyn LineSource,
        ctx: &IngestionContext,
    ) -> IngestResult<IngestionSummary> {
        let start_time = Instant::now();
        let outcome = self.orchestrator().process_file(source, ctx).await?;

        for batch in &outcome.batches {
            self.repo
                .save_batch(ctx, batch)
                .await
                .map_err(|e| IngestError::SinkError(e.to_string()))?;
        }

        let summary = IngestionSummary {
            ingestion_id: ctx.ingestion_id.clone(),
            submission_id: ctx.submission_id.clone(),
            kind: ctx.kind,
            total_lines: outcome.total_lines,
            accepted: outcome.accepted_count(),
            rejected: outcome.error_count(),
            error_records: outcome.errors().cloned().collect(),
            elapsed_ms: start_time.elapsed().as_millis(),
        };
        log_summary("batch", &summary);
        Ok(summary)
    }

    // ==========================================
    // 流式模式
    // ==========================================
    #[instrument(skip(self, source, ctx), fields(ingestion_id = %ctx.ingestion_id, kind = %ctx.kind))]
    pub async fn ingest_streaming_mode(
        &self,
        source: &dyn LineSource,
        ctx: &IngestionContext,
    ) -> IngestResult<IngestionSummary> {
        let sink: Arc<dyn PersistenceSink> = self.repo.clone();
        let summary = self
            .orchestrator()
            .process_file_streaming(source, ctx, sink)
            .await?;
        log_summary("streaming", &summary);
        Ok(summary)
    }

    // ==========================================
    // staging 模式
    // ==========================================
    #[instrument(skip(self, source, ctx), fields(ingestion_id = %ctx.ingestion_id, kind = %ctx.kind))]
    pub async fn ingest_staging_mode(
        &self,
        source: &dyn LineSource,
        ctx: &IngestionContext,
    ) -> IngestResult<IngestionSummary> {
        let start_time = Instant::now();
        let engine = self.staging_engine();

        let loaded = engine.load_staging(source, ctx).await?;
        let result = engine.run_staging_pass(ctx.kind, &ctx.submission_id).await?;
        // pass 按报送批次处理, 本次导入的计数单独统计
        let accepted = self
            .repo
            .count_ingested(ctx.kind, &ctx.ingestion_id)
            .await?;
        let error_records = self
            .repo
            .load_error_records(&ctx.ingestion_id)
            .await?;

        let summary = IngestionSummary {
            ingestion_id: ctx.ingestion_id.clone(),
            submission_id: ctx.submission_id.clone(),
            kind: ctx.kind,
            total_lines: loaded,
            accepted,
            rejected: error_records.len(),
            error_records,
            elapsed_ms: start_time.elapsed().as_millis(),
        };
        if !summary.is_reconciled() {
            return Err(IngestError::CountMismatch {
                expected: summary.total_lines,
                accepted: summary.accepted,
                rejected: summary.rejected,
            });
        }
        info!(
            pass_inserted = result.inserted_count,
            duplicates = result.duplicate_count,
            missing_parent = result.missing_reference_count,
            invalid = result.error_count,
            "staging 明细"
        );
        log_summary("staging", &summary);
        Ok(summary)
    }
}

fn log_summary(mode: &str, summary: &IngestionSummary) {
    info!(
        mode,
        ingestion_id = %summary.ingestion_id,
        submission_id = %summary.submission_id,
        kind = %summary.kind,
        total_lines = summary.total_lines,
        accepted = summary.accepted,
        rejected = summary.rejected,
        elapsed_ms = summary.elapsed_ms,
        "导入完成"
    );
}
