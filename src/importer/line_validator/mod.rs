// ==========================================
// 定长监管报送文件导入系统 - 行校验器
// ==========================================
// 职责: 类型化记录 → Ok(改写后的记录) / Err(全部原因)
// 红线: 纯函数, 不访问存储; 重复/父记录检查在跨记录阶段
// ==========================================

pub mod accounting_data;
pub mod linkage;
pub mod merchant;
pub mod ndg_change;
pub mod relationship;
pub mod subject;
pub mod transaction;

use crate::domain::error_record::ErrorCause;
use crate::domain::ingestion::ReportingPeriod;
use crate::domain::records::Record;
use crate::domain::types::{ErrorCode, RecordKind};
use crate::importer::code_tables::{self, COUNTRIES_ALPHA3, COUNTRIES_NUMERIC};
use crate::importer::field_rules::{FieldChecks, Rule};
use crate::importer::layout::{END_MARKER, LINE_LENGTH, RECORD_SENTINEL};
use chrono::NaiveDate;

/// 校验结论: 通过则返回（日期已改写的）记录, 否则返回全部原因
pub type Verdict = Result<Record, Vec<ErrorCause>>;

/// 行校验上下文（来自文件头）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationContext {
    pub period: Option<ReportingPeriod>,
}

impl ValidationContext {
    pub fn new(period: Option<ReportingPeriod>) -> Self {
        Self { period }
    }
}

// ==========================================
// 公共检查
// ==========================================

/// 行结构检查: 长度 / 记录类型 / 行尾标志（逐行累积, 不中断文件）
pub fn check_line_structure(raw_row: &str, checks: &mut FieldChecks) {
    let bytes = raw_row.as_bytes();
    if bytes.len() != LINE_LENGTH {
        checks.push(ErrorCause::new(
            ErrorCode::InvalidFormat,
            format!(
                "line length is {} bytes, expected {}",
                bytes.len(),
                LINE_LENGTH
            ),
        ));
    }
    if bytes.first() != Some(&RECORD_SENTINEL) {
        checks.push(ErrorCause::new(
            ErrorCode::InvalidFormat,
            format!("record type must be '{}'", RECORD_SENTINEL as char),
        ));
    }
    if bytes.len() >= LINE_LENGTH && bytes[LINE_LENGTH - 1] != END_MARKER {
        checks.push(ErrorCause::new(
            ErrorCode::InvalidFormat,
            format!("end marker must be '{}'", END_MARKER as char),
        ));
    }
}

/// 开始一行校验: 行结构 + 报送机构代码
pub fn begin(raw_row: &str, intermediary: &str) -> FieldChecks {
    let mut checks = FieldChecks::new();
    check_line_structure(raw_row, &mut checks);
    checks.check(
        "intermediary",
        intermediary,
        &[Rule::Mandatory, Rule::ExactLen(11), Rule::Numeric],
    );
    checks
}

/// NDG 类字段
pub const NDG_RULES: &[Rule] = &[Rule::Mandatory, Rule::MaxLen(16), Rule::Alphanumeric];

/// 关系主键
pub const RELATIONSHIP_KEY_RULES: &[Rule] =
    &[Rule::Mandatory, Rule::MaxLen(50), Rule::Alphanumeric];

pub const CURRENCY_RULES: &[Rule] = &[Rule::Mandatory, Rule::OneOf(code_tables::CURRENCIES)];

/// 国家代码: 3 字母查 alpha-3 表, 3 数字查 numeric 表, 其他格式错误
pub fn check_geography(
    checks: &mut FieldChecks,
    field: &'static str,
    value: &str,
    mandatory: bool,
) {
    if value.is_empty() {
        if mandatory {
            checks.check(field, value, &[Rule::Mandatory]);
        }
        return;
    }
    let is_letters = value.len() == 3 && value.chars().all(|c| c.is_ascii_alphabetic());
    let is_digits = value.len() == 3 && value.chars().all(|c| c.is_ascii_digit());
    if is_letters {
        checks.check(field, value, &[Rule::OneOf(COUNTRIES_ALPHA3)]);
    } else if is_digits {
        checks.check(field, value, &[Rule::OneOf(COUNTRIES_NUMERIC)]);
    } else {
        checks.push(ErrorCause::new(
            ErrorCode::InvalidFormat,
            format!("{}: '{}' is neither a 3-letter nor a 3-digit code", field, value),
        ));
    }
}

/// 日期必须落在报送期间内（文件头未声明期间时跳过）
pub fn check_in_period(
    checks: &mut FieldChecks,
    field: &'static str,
    date: Option<NaiveDate>,
    ctx: &ValidationContext,
) {
    if let (Some(date), Some(period)) = (date, ctx.period) {
        if !period.contains(date) {
            checks.push(ErrorCause::new(
                ErrorCode::InvalidDateFormat,
                format!(
                    "{}: {} outside reporting period {} - {}",
                    field, date, period.start, period.end
                ),
            ));
        }
    }
}

/// 结束日期不得早于开始日期
pub fn check_date_order(
    checks: &mut FieldChecks,
    field: &'static str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            checks.push(ErrorCause::new(
                ErrorCode::InvalidDateFormat,
                format!("{}: {} precedes start date {}", field, end, start),
            ));
        }
    }
}

/// 记录类型与校验器不匹配
pub fn kind_mismatch(expected: RecordKind, record: &Record) -> Verdict {
    Err(vec![ErrorCause::new(
        ErrorCode::InvalidFormat,
        format!("expected {} record, got {}", expected, record.kind()),
    )])
}

/// 按记录类型校验
pub fn validate_record(record: Record, ctx: &ValidationContext) -> Verdict {
    match record.kind() {
        RecordKind::Subject => subject::validate(record, ctx),
        RecordKind::Relationship => relationship::validate(record, ctx),
        RecordKind::AccountingData => accounting_data::validate(record, ctx),
        RecordKind::Linkage => linkage::validate(record, ctx),
        RecordKind::NdgChange => ndg_change::validate(record, ctx),
        RecordKind::Transaction => transaction::validate(record, ctx),
        RecordKind::Merchant => merchant::validate(record, ctx),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::error_record::ErrorCause;
    use crate::domain::types::ErrorCode;
    use crate::importer::layout::LINE_LENGTH;

    /// 结构合法的空白数据行
    pub fn valid_raw() -> String {
        let mut line = String::with_capacity(LINE_LENGTH);
        line.push('1');
        line.push_str(&" ".repeat(LINE_LENGTH - 2));
        line.push('A');
        line
    }

    pub fn codes(causes: &[ErrorCause]) -> Vec<ErrorCode> {
        causes.iter().map(|c| c.error_code).collect()
    }

    pub fn mentions(causes: &[ErrorCause], field: &str) -> bool {
        causes
            .iter()
            .any(|c| c.description.starts_with(&format!("{}:", field)))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_line_structure_accumulates_all_problems() {
        let mut checks = FieldChecks::new();
        let mut raw = valid_raw();
        raw.replace_range(0..1, "2");
        raw.replace_range(LINE_LENGTH - 1..LINE_LENGTH, "B");
        check_line_structure(&raw, &mut checks);
        assert_eq!(checks.causes().len(), 2);

        let mut checks = FieldChecks::new();
        check_line_structure("1short", &mut checks);
        assert_eq!(checks.causes().len(), 1);
    }

    #[test]
    fn test_geography_tables() {
        let mut checks = FieldChecks::new();
        check_geography(&mut checks, "geography_code", "ITA", true);
        check_geography(&mut checks, "geography_code", "380", true);
        check_geography(&mut checks, "geography_code", "", false);
        assert!(checks.is_clean());

        check_geography(&mut checks, "geography_code", "XYZ", false);
        check_geography(&mut checks, "geography_code", "A1B", false);
        check_geography(&mut checks, "geography_code", "", true);
        assert_eq!(
            codes(checks.causes()),
            vec![
                ErrorCode::InvalidValue,
                ErrorCode::InvalidFormat,
                ErrorCode::MandatoryDataMissing
            ]
        );
    }

    #[test]
    fn test_period_check() {
        let ctx = ValidationContext::new(Some(ReportingPeriod {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        }));
        let mut checks = FieldChecks::new();
        check_in_period(&mut checks, "d", NaiveDate::from_ymd_opt(2024, 6, 1), &ctx);
        assert!(checks.is_clean());
        check_in_period(&mut checks, "d", NaiveDate::from_ymd_opt(2025, 1, 1), &ctx);
        assert_eq!(codes(checks.causes()), vec![ErrorCode::InvalidDateFormat]);
    }
}
