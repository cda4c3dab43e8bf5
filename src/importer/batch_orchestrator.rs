// ==========================================
// 定长监管报送文件导入系统 - 分片编排器
// ==========================================
// 流程: 读取 → 文件头尾 → 分片 → 并行处理 → 合并 → 跨记录校验 → 完成
// 并发: 有界工作池（Semaphore 许可数 = worker_count）, 每个分片一个阻塞任务
// 共享: 仅文件级去重集合; 分片结果归属单个任务直到合并
// 失败: 行级问题永不中断; 仅文件结构错误 / 配置缺陷 / 存储故障中断整个文件
// ==========================================

use crate::config::IngestConfig;
use crate::domain::error_record::ErrorRecord;
use crate::domain::ingestion::{
    FileEnvelope, FileOutcome, IngestionContext, IngestionSummary, ProcessedBatch,
};
use crate::domain::records::{ParentRef, Record};
use crate::importer::conflict_handler::{cross_validate, ShardedKeySet, StoreSnapshot};
use crate::importer::envelope::split_envelope;
use crate::importer::error::{IngestError, IngestResult};
use crate::importer::error_assembly::{assemble, ErrorTypeResolver};
use crate::importer::file_parser::LineSource;
use crate::importer::line_validator::ValidationContext;
use crate::importer::record_dispatch::{handler_for, process_line, KindHandler, LineOutcome};
use crate::repository::{ExistenceLookup, ParentLookup, PersistenceSink};
use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

// 去重集合分片数 = 工作线程数 × 该倍数
const KEY_SHARDS_PER_WORKER: usize = 4;

// ==========================================
// StoreLookups - 跨记录阶段的存储协作者
// ==========================================
#[derive(Clone)]
pub struct StoreLookups {
    pub existence: Arc<dyn ExistenceLookup>,
    pub parents: Arc<dyn ParentLookup>,
}

// ==========================================
// CrossRecordPhase - 跨记录校验阶段
// ==========================================
// 批量查询一次生成快照, 再用纯函数降级记录
#[derive(Clone)]
pub struct CrossRecordPhase {
    store: Option<StoreLookups>,
    resolver: Arc<dyn ErrorTypeResolver>,
}

impl CrossRecordPhase {
    pub fn new(store: Option<StoreLookups>, resolver: Arc<dyn ErrorTypeResolver>) -> Self {
        Self { store, resolver }
    }

    /// 为一组已接受记录构建存储快照（每个关注点一次批量查询）
    pub async fn snapshot<'a>(
        &self,
        ctx: &IngestionContext,
        records: impl Iterator<Item = &'a Record>,
    ) -> IngestResult<StoreSnapshot> {
        let Some(store) = &self.store else {
            return Ok(StoreSnapshot::default());
        };

        let mut keys = Vec::new();
        let mut parent_refs: Vec<ParentRef> = Vec::new();
        for record in records {
            keys.push(record.duplicate_key());
            if let Some(parent) = record.parent_ref() {
                parent_refs.push(parent);
            }
        }
        if keys.is_empty() {
            return Ok(StoreSnapshot::default());
        }

        // 同一记录类型的父引用列相同
        let parent_column = parent_refs.first().map(|p| p.column);
        let parent_keys: Vec<String> = parent_refs.into_iter().map(|p| p.key).collect();

        let keys_lookup = store
            .existence
            .existing_keys(ctx.kind, &ctx.submission_id, keys);
        let parents_lookup = async {
            match parent_column {
                Some(column) if ctx.kind.requires_parent() => store
                    .parents
                    .existing_parents(column, &ctx.submission_id, parent_keys)
                    .await
                    .map(|found| {
                        found
                            .into_iter()
                            .map(|key| ParentRef { column, key })
                            .collect::<HashSet<_>>()
                    }),
                _ => Ok(HashSet::new()),
            }
        };
        let (existing_keys, existing_parents) =
            futures::future::try_join(keys_lookup, parents_lookup).await?;

        debug!(
            existing_keys = existing_keys.len(),
            existing_parents = existing_parents.len(),
            "跨记录快照已生成"
        );
        Ok(StoreSnapshot {
            existing_keys,
            existing_parents,
        })
    }

    /// 对若干分片执行跨记录校验（共用一次快照）
    pub async fn apply(
        &self,
        ctx: &IngestionContext,
        batches: &mut [ProcessedBatch],
    ) -> IngestResult<usize> {
        if self.store.is_none() {
            return Ok(0);
        }
        let snapshot = self
            .snapshot(ctx, batches.iter().flat_map(|b| b.accepted.iter()))
            .await?;

        let mut demoted = 0;
        for batch in batches.iter_mut() {
            let outcome = cross_validate(std::mem::take(&mut batch.accepted), &snapshot);
            batch.accepted = outcome.accepted;
            for (record, cause) in outcome.rejected {
                batch.errors.push(assemble(
                    vec![cause],
                    record.raw_row(),
                    ctx,
                    self.resolver.as_ref(),
                )?);
                demoted += 1;
            }
        }
        Ok(demoted)
    }
}

// ==========================================
// BatchOrchestrator - 分片编排器
// ==========================================
pub struct BatchOrchestrator {
    config: IngestConfig,
    resolver: Arc<dyn ErrorTypeResolver>,
    store: Option<StoreLookups>,
    handler_override: Option<KindHandler>,
}

/// 单次文件处理共享给各分片任务的只读数据
struct BatchInputs {
    handler: KindHandler,
    lines: Arc<Vec<String>>,
    ctx: Arc<IngestionContext>,
    vctx: Arc<ValidationContext>,
    keys: Arc<ShardedKeySet>,
    resolver: Arc<dyn ErrorTypeResolver>,
}

impl BatchOrchestrator {
    /// 创建不带存储协作者的编排器（跳过跨记录阶段）
    pub fn new(config: IngestConfig, resolver: Arc<dyn ErrorTypeResolver>) -> Self {
        Self {
            config: config.normalized(),
            resolver,
            store: None,
            handler_override: None,
        }
    }

    /// 挂接存储查询（启用跨记录阶段）
    pub fn with_store(
        mut self,
        existence: Arc<dyn ExistenceLookup>,
        parents: Arc<dyn ParentLookup>,
    ) -> Self {
        self.store = Some(StoreLookups { existence, parents });
        self
    }

    /// 替换某记录类型的处理器
    pub fn with_handler(mut self, handler: KindHandler) -> Self {
        self.handler_override = Some(handler);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    fn handler(&self, ctx: &IngestionContext) -> KindHandler {
        self.handler_override
            .filter(|h| h.kind == ctx.kind)
            .unwrap_or_else(|| handler_for(ctx.kind))
    }

    fn cross_phase(&self) -> CrossRecordPhase {
        CrossRecordPhase::new(self.store.clone(), Arc::clone(&self.resolver))
    }

    /// 分片区间
    pub fn partition(total: usize, batch_size: usize) -> Vec<Range<usize>> {
        let batch_size = batch_size.max(1);
        (0..total)
            .step_by(batch_size)
            .map(|start| start..(start + batch_size).min(total))
            .collect()
    }

    /// 读取 + 文件头尾检查, 返回共享输入
    fn prepare(
        &self,
        source: &dyn LineSource,
        ctx: &IngestionContext,
    ) -> IngestResult<(FileEnvelope, BatchInputs)> {
        let lines = source.read_lines()?;
        let (envelope, body) = split_envelope(&lines)?;
        info!(
            file = source.name(),
            records = body.len(),
            declared = envelope.declared_count,
            "文件头尾检查通过"
        );

        let inputs = BatchInputs {
            handler: self.handler(ctx),
            keys: Arc::new(ShardedKeySet::new(
                self.config.worker_count * KEY_SHARDS_PER_WORKER,
                body.len(),
            )),
            lines: Arc::new(body.to_vec()),
            ctx: Arc::new(ctx.clone()),
            vctx: Arc::new(ValidationContext::new(envelope.period)),
            resolver: Arc::clone(&self.resolver),
        };
        Ok((envelope, inputs))
    }

    /// 提交全部分片任务（阻塞线程数受信号量约束）
    fn spawn_batches(
        &self,
        inputs: &BatchInputs,
        permits: &Arc<Semaphore>,
    ) -> JoinSet<IngestResult<ProcessedBatch>> {
        let mut set = JoinSet::new();
        for (batch_index, range) in Self::partition(inputs.lines.len(), self.config.batch_size)
            .into_iter()
            .enumerate()
        {
            let permits = Arc::clone(permits);
            let handler = inputs.handler;
            let lines = Arc::clone(&inputs.lines);
            let ctx = Arc::clone(&inputs.ctx);
            let vctx = Arc::clone(&inputs.vctx);
            let keys = Arc::clone(&inputs.keys);
            let resolver = Arc::clone(&inputs.resolver);

            set.spawn(async move {
                let _permit = permits.acquire_owned().await.map_err(|_| {
                    IngestError::WorkerFailure {
                        batch_index,
                        message: "工作池已关闭".to_string(),
                    }
                })?;
                tokio::task::spawn_blocking(move || {
                    process_batch(
                        &handler,
                        batch_index,
                        &lines[range],
                        &ctx,
                        &vctx,
                        &keys,
                        resolver.as_ref(),
                    )
                })
                .await
                .map_err(|e| IngestError::WorkerFailure {
                    batch_index,
                    message: e.to_string(),
                })?
            });
        }
        set
    }

    /// 致命错误后关闭工作池: 先限时等待在途任务, 再强制终止
    async fn shutdown(&self, set: &mut JoinSet<IngestResult<ProcessedBatch>>, permits: &Semaphore) {
        // 等待许可的任务立即失败退出
        permits.close();
        let grace = Duration::from_millis(self.config.shutdown_grace_ms);
        let drained = tokio::time::timeout(grace, async {
            while set.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = set.len(),
                grace_ms = self.config.shutdown_grace_ms,
                "优雅关闭超时, 强制终止剩余分片任务"
            );
            set.abort_all();
            while set.join_next().await.is_some() {}
        }
    }

    // ==========================================
    // 批量模式
    // ==========================================

    /// 处理整个文件, 返回按分片顺序排列的结果
    #[instrument(skip(self, source, ctx), fields(ingestion_id = %ctx.ingestion_id, kind = %ctx.kind))]
    pub async fn process_file(
        &self,
        source: &dyn LineSource,
        ctx: &IngestionContext,
    ) -> IngestResult<FileOutcome> {
        let start_time = Instant::now();
        let (envelope, inputs) = self.prepare(source, ctx)?;
        let total_lines = inputs.lines.len();

        let permits = Arc::new(Semaphore::new(self.config.worker_count));
        let mut set = self.spawn_batches(&inputs, &permits);
        let mut batches = Vec::with_capacity(set.len());

        while let Some(joined) = set.join_next().await {
            match joined.map_err(IngestError::from).and_then(|r| r) {
                Ok(batch) => batches.push(batch),
                Err(e) => {
                    error!(error = %e, "分片处理失败, 关闭工作池");
                    self.shutdown(&mut set, &permits).await;
                    return Err(e);
                }
            }
        }
        batches.sort_by_key(|b| b.batch_index);

        let demoted = self.cross_phase().apply(ctx, &mut batches).await?;

        let outcome = FileOutcome {
            envelope,
            total_lines,
            batches,
        };
        reconcile(total_lines, outcome.accepted_count(), outcome.error_count())?;

        info!(
            submission_id = %ctx.submission_id,
            total_lines,
            accepted = outcome.accepted_count(),
            rejected = outcome.error_count(),
            demoted,
            elapsed_ms = start_time.elapsed().as_millis(),
            "文件处理完成"
        );
        Ok(outcome)
    }

    // ==========================================
    // 流式模式
    // ==========================================

    /// 处理整个文件, 分片完成即交给单个消费者做跨记录校验并落库
    #[instrument(skip(self, source, ctx, sink), fields(ingestion_id = %ctx.ingestion_id, kind = %ctx.kind))]
    pub async fn process_file_streaming(
        &self,
        source: &dyn LineSource,
        ctx: &IngestionContext,
        sink: Arc<dyn PersistenceSink>,
    ) -> IngestResult<IngestionSummary> {
        let start_time = Instant::now();
        let (_envelope, inputs) = self.prepare(source, ctx)?;
        let total_lines = inputs.lines.len();

        let (tx, rx) = mpsc::channel::<ProcessedBatch>(self.config.queue_capacity);
        let consumer = tokio::spawn(consume_batches(
            rx,
            Arc::clone(&inputs.ctx),
            self.cross_phase(),
            sink,
            Duration::from_millis(self.config.poll_timeout_ms),
        ));

        let permits = Arc::new(Semaphore::new(self.config.worker_count));
        let mut set = self.spawn_batches(&inputs, &permits);
        let mut producer_error = None;

        while let Some(joined) = set.join_next().await {
            match joined.map_err(IngestError::from).and_then(|r| r) {
                Ok(batch) => {
                    // 队列有界: 消费者落后时在此等待
                    if tx.send(batch).await.is_err() {
                        warn!("落库消费者已退出, 停止提交分片");
                        self.shutdown(&mut set, &permits).await;
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "分片处理失败, 关闭工作池");
                    self.shutdown(&mut set, &permits).await;
                    producer_error = Some(e);
                    break;
                }
            }
        }
        drop(tx);

        let consumed = consumer.await?;
        if let Some(e) = producer_error {
            return Err(e);
        }
        let totals = consumed?;
        reconcile(total_lines, totals.accepted, totals.error_records.len())?;

        let summary = IngestionSummary {
            ingestion_id: ctx.ingestion_id.clone(),
            submission_id: ctx.submission_id.clone(),
            kind: ctx.kind,
            total_lines,
            accepted: totals.accepted,
            rejected: totals.error_records.len(),
            error_records: totals.error_records,
            elapsed_ms: start_time.elapsed().as_millis(),
        };
        info!(
            submission_id = %ctx.submission_id,
            total_lines,
            accepted = summary.accepted,
            rejected = summary.rejected,
            saved_batches = totals.batches,
            elapsed_ms = summary.elapsed_ms,
            "流式处理完成"
        );
        Ok(summary)
    }
}

// ==========================================
// 分片任务
// ==========================================

/// 处理单个分片（运行在阻塞线程上）
fn process_batch(
    handler: &KindHandler,
    batch_index: usize,
    lines: &[String],
    ctx: &IngestionContext,
    vctx: &ValidationContext,
    keys: &ShardedKeySet,
    resolver: &dyn ErrorTypeResolver,
) -> IngestResult<ProcessedBatch> {
    let mut batch = ProcessedBatch::new(batch_index);
    batch.line_count = lines.len();
    for line in lines {
        match process_line(handler, line, ctx, vctx, keys, resolver)? {
            LineOutcome::Accepted(record) => batch.accepted.push(record),
            LineOutcome::Rejected(error_record) => batch.errors.push(error_record),
        }
    }
    debug!(
        batch_index,
        accepted = batch.accepted.len(),
        rejected = batch.errors.len(),
        "分片处理完成"
    );
    Ok(batch)
}

/// 行数核对: 输入行 == 接受 + 拒绝
fn reconcile(expected: usize, accepted: usize, rejected: usize) -> IngestResult<()> {
    if expected == accepted + rejected {
        Ok(())
    } else {
        Err(IngestError::CountMismatch {
            expected,
            accepted,
            rejected,
        })
    }
}

// ==========================================
// 流式消费者
// ==========================================

#[derive(Debug, Default)]
struct StreamTotals {
    batches: usize,
    accepted: usize,
    error_records: Vec<ErrorRecord>,
}

/// 单个消费者: 限时轮询队列, 逐分片跨记录校验后落库
async fn consume_batches(
    mut rx: mpsc::Receiver<ProcessedBatch>,
    ctx: Arc<IngestionContext>,
    phase: CrossRecordPhase,
    sink: Arc<dyn PersistenceSink>,
    poll_timeout: Duration,
) -> IngestResult<StreamTotals> {
    let mut totals = StreamTotals::default();
    loop {
        let mut batch = match tokio::time::timeout(poll_timeout, rx.recv()).await {
            Ok(Some(batch)) => batch,
            Ok(None) => break,
            Err(_) => {
                debug!(
                    poll_timeout_ms = poll_timeout.as_millis(),
                    "队列暂无分片, 继续等待"
                );
                continue;
            }
        };

        phase
            .apply(&ctx, std::slice::from_mut(&mut batch))
            .await?;
        sink.save_batch(&ctx, &batch)
            .await
            .map_err(|e| IngestError::SinkError(e.to_string()))?;

        totals.batches += 1;
        totals.accepted += batch.accepted.len();
        totals.error_records.append(&mut batch.errors);
    }
    Ok(totals)
}
