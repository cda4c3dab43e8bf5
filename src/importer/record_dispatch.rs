// ==========================================
// 定长监管报送文件导入系统 - 记录类型分派
// ==========================================
// 静态函数指针表: 记录类型 → (布局, 解析器, 校验器)
// 单行处理: 解析 → 文件内去重 → 校验 → 组装, panic 降级为 INVALID_FORMAT
// ==========================================

use crate::domain::error_record::ErrorRecord;
use crate::domain::ingestion::IngestionContext;
use crate::domain::records::Record;
use crate::domain::types::RecordKind;
use crate::importer::conflict_handler::{duplicate_in_file_cause, scoped_key, ShardedKeySet};
use crate::importer::error::IngestResult;
use crate::importer::error_assembly::{
    assemble, assemble_from_error, assemble_from_panic, ErrorTypeResolver,
};
use crate::importer::layout::{layout_for, FieldSlice};
use crate::importer::line_parser;
use crate::importer::line_validator::{self, ValidationContext, Verdict};
use std::panic::{catch_unwind, AssertUnwindSafe};

pub type ParseFn = fn(&str) -> IngestResult<Record>;
pub type ValidateFn = fn(Record, &ValidationContext) -> Verdict;

/// 单个记录类型的处理器
#[derive(Clone, Copy)]
pub struct KindHandler {
    pub kind: RecordKind,
    pub parse: ParseFn,
    pub validate: ValidateFn,
}

impl KindHandler {
    pub fn layout(&self) -> &'static [FieldSlice] {
        layout_for(self.kind)
    }
}

impl std::fmt::Debug for KindHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindHandler").field("kind", &self.kind).finish()
    }
}

static HANDLERS: [KindHandler; 7] = [
    KindHandler {
        kind: RecordKind::Subject,
        parse: line_parser::parse_subject,
        validate: line_validator::subject::validate,
    },
    KindHandler {
        kind: RecordKind::Relationship,
        parse: line_parser::parse_relationship,
        validate: line_validator::relationship::validate,
    },
    KindHandler {
        kind: RecordKind::AccountingData,
        parse: line_parser::parse_accounting_data,
        validate: line_validator::accounting_data::validate,
    },
    KindHandler {
        kind: RecordKind::Linkage,
        parse: line_parser::parse_linkage,
        validate: line_validator::linkage::validate,
    },
    KindHandler {
        kind: RecordKind::NdgChange,
        parse: line_parser::parse_ndg_change,
        validate: line_validator::ndg_change::validate,
    },
    KindHandler {
        kind: RecordKind::Transaction,
        parse: line_parser::parse_transaction,
        validate: line_validator::transaction::validate,
    },
    KindHandler {
        kind: RecordKind::Merchant,
        parse: line_parser::parse_merchant,
        validate: line_validator::merchant::validate,
    },
];

/// 按记录类型查处理器
pub fn handler_for(kind: RecordKind) -> KindHandler {
    // 表按 RecordKind::ALL 顺序排列
    let idx = match kind {
        RecordKind::Subject => 0,
        RecordKind::Relationship => 1,
        RecordKind::AccountingData => 2,
        RecordKind::Linkage => 3,
        RecordKind::NdgChange => 4,
        RecordKind::Transaction => 5,
        RecordKind::Merchant => 6,
    };
    HANDLERS[idx]
}

// ==========================================
// 单行处理
// ==========================================

/// 单行结论
#[derive(Debug, Clone)]
pub enum LineOutcome {
    Accepted(Record),
    Rejected(ErrorRecord),
}

/// 解析 + 去重 + 校验（可能 panic, 由调用方捕获）
fn evaluate_line(
    handler: &KindHandler,
    line: &str,
    ctx: &IngestionContext,
    vctx: &ValidationContext,
    keys: &ShardedKeySet,
) -> IngestResult<Verdict> {
    let parsed = (handler.parse)(line)?;
    // 所有成功解析的行都登记键, 与调度顺序无关
    let first_seen = keys.insert(scoped_key(&ctx.submission_id, &parsed.duplicate_key()));
    let verdict = (handler.validate)(parsed, vctx);
    if first_seen {
        return Ok(verdict);
    }

    let mut causes = verdict.err().unwrap_or_default();
    causes.push(duplicate_in_file_cause());
    Ok(Err(causes))
}

/// 处理一行
///
/// # 返回
/// - Ok(LineOutcome): 接受或拒绝（数据问题永不中断）
/// - Err: 仅错误类型无法解析（配置缺陷）
pub fn process_line(
    handler: &KindHandler,
    line: &str,
    ctx: &IngestionContext,
    vctx: &ValidationContext,
    keys: &ShardedKeySet,
    resolver: &dyn ErrorTypeResolver,
) -> IngestResult<LineOutcome> {
    let caught = catch_unwind(AssertUnwindSafe(|| {
        evaluate_line(handler, line, ctx, vctx, keys)
    }));

    match caught {
        Ok(Ok(Ok(record))) => Ok(LineOutcome::Accepted(record)),
        Ok(Ok(Err(causes))) => Ok(LineOutcome::Rejected(assemble(
            causes, line, ctx, resolver,
        )?)),
        Ok(Err(parse_err)) => Ok(LineOutcome::Rejected(assemble_from_error(
            &parse_err, line, ctx, resolver,
        )?)),
        Err(payload) => {
            tracing::warn!(
                ingestion_id = %ctx.ingestion_id,
                "行处理 panic, 已降级为 INVALID_FORMAT"
            );
            Ok(LineOutcome::Rejected(assemble_from_panic(
                payload.as_ref(),
                line,
                ctx,
                resolver,
            )?))
        }
    }
}
