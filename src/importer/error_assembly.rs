// ==========================================
// 定长监管报送文件导入系统 - 错误记录组装
// ==========================================
// 职责: 原因列表 → ErrorRecord; 行级异常/panic → 单个 INVALID_FORMAT 原因
// 约束: 错误类型编码无法解析视为配置缺陷, 向上传播
// ==========================================

use crate::domain::error_record::{ErrorCause, ErrorRecord, ErrorType, RecordedCause};
use crate::domain::ingestion::IngestionContext;
use crate::domain::types::ErrorCode;
use crate::importer::error::{IngestError, IngestResult};
use std::any::Any;
use std::collections::HashMap;

// ==========================================
// ErrorTypeResolver Trait
// ==========================================
pub trait ErrorTypeResolver: Send + Sync {
    /// 编码 → 错误类型
    ///
    /// # 返回
    /// - Err(IngestError::UnknownErrorType): 未配置的编码
    fn resolve(&self, code: &str) -> IngestResult<ErrorType>;
}

/// 内存错误类型表（启动时从 error_type 表加载一次）
#[derive(Debug, Clone, Default)]
pub struct CachedErrorTypeResolver {
    by_code: HashMap<String, ErrorType>,
}

impl CachedErrorTypeResolver {
    pub fn from_types(types: impl IntoIterator<Item = ErrorType>) -> Self {
        Self {
            by_code: types.into_iter().map(|t| (t.code.clone(), t)).collect(),
        }
    }

    /// 内置默认表（id 与 schema 初始化顺序一致）
    pub fn defaults() -> Self {
        Self::from_types(ErrorCode::ALL.iter().enumerate().map(|(i, code)| ErrorType {
            id: i as i64 + 1,
            code: code.as_str().to_string(),
            description: code.default_description().to_string(),
        }))
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

impl ErrorTypeResolver for CachedErrorTypeResolver {
    fn resolve(&self, code: &str) -> IngestResult<ErrorType> {
        self.by_code
            .get(code)
            .cloned()
            .ok_or_else(|| IngestError::UnknownErrorType(code.to_string()))
    }
}

// ==========================================
// 组装
// ==========================================

/// 原因列表 → 错误记录
pub fn assemble(
    causes: Vec<ErrorCause>,
    raw_row: &str,
    ctx: &IngestionContext,
    resolver: &dyn ErrorTypeResolver,
) -> IngestResult<ErrorRecord> {
    let causes = causes
        .into_iter()
        .map(|cause| {
            Ok(RecordedCause {
                error_type: resolver.resolve(cause.error_code.as_str())?,
                description: cause.description,
            })
        })
        .collect::<IngestResult<Vec<_>>>()?;

    Ok(ErrorRecord {
        raw_row: raw_row.to_string(),
        ingestion_ref: ctx.ingestion_id.clone(),
        submission_ref: ctx.submission_id.clone(),
        record_kind: ctx.kind,
        causes,
    })
}

/// 行级错误 → 单个 INVALID_FORMAT 原因（消息为空时使用类型名）
pub fn assemble_from_error<E: std::error::Error>(
    err: &E,
    raw_row: &str,
    ctx: &IngestionContext,
    resolver: &dyn ErrorTypeResolver,
) -> IngestResult<ErrorRecord> {
    let message = err.to_string();
    let description = if message.trim().is_empty() {
        std::any::type_name::<E>().to_string()
    } else {
        message
    };
    assemble(
        vec![ErrorCause::new(ErrorCode::InvalidFormat, description)],
        raw_row,
        ctx,
        resolver,
    )
}

/// 提取 panic 消息（非字符串负载时返回负载类型名）
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        std::any::type_name_of_val(payload).to_string()
    }
}

/// 行级 panic → 单个 INVALID_FORMAT 原因
pub fn assemble_from_panic(
    payload: &(dyn Any + Send),
    raw_row: &str,
    ctx: &IngestionContext,
    resolver: &dyn ErrorTypeResolver,
) -> IngestResult<ErrorRecord> {
    assemble(
        vec![ErrorCause::new(
            ErrorCode::InvalidFormat,
            panic_message(payload),
        )],
        raw_row,
        ctx,
        resolver,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::RecordKind;

    fn ctx() -> IngestionContext {
        IngestionContext::new(RecordKind::Subject, "SUB-1").with_ingestion_id("ING-1")
    }

    #[test]
    fn test_assemble_resolves_all_causes() {
        let resolver = CachedErrorTypeResolver::defaults();
        let record = assemble(
            vec![
                ErrorCause::new(ErrorCode::InvalidValue, "sex: 'X' is not an allowed value"),
                ErrorCause::new(ErrorCode::InvalidDateFormat, "birth_date: bad"),
            ],
            "raw",
            &ctx(),
            &resolver,
        )
        .unwrap();
        assert_eq!(record.codes(), vec!["INVALID_VALUE", "INVALID_DATE_FORMAT"]);
        assert_eq!(record.ingestion_ref, "ING-1");
        assert_eq!(record.submission_ref, "SUB-1");
        assert_eq!(record.causes[0].error_type.id, 3);
    }

    #[test]
    fn test_unknown_code_is_fatal() {
        let resolver = CachedErrorTypeResolver::from_types(vec![]);
        let err = assemble(
            vec![ErrorCause::new(ErrorCode::DuplicateRecord, "dup")],
            "raw",
            &ctx(),
            &resolver,
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::UnknownErrorType(code) if code == "DUPLICATE_RECORD"));
    }

    #[test]
    fn test_panic_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(panic_message(payload.as_ref()), "kaboom");

        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert!(!panic_message(payload.as_ref()).is_empty());
    }

    #[test]
    fn test_assemble_from_error_uses_message() {
        let resolver = CachedErrorTypeResolver::defaults();
        let err = IngestError::InvalidInput("empty".to_string());
        let record = assemble_from_error(&err, "", &ctx(), &resolver).unwrap();
        assert_eq!(record.causes.len(), 1);
        assert_eq!(record.codes(), vec!["INVALID_FORMAT"]);
        assert!(record.causes[0].description.contains("empty"));
    }
}
