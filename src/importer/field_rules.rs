// ==========================================
// 定长监管报送文件导入系统 - 字段规则管道
// ==========================================
// 单字段: 按规则顺序执行, 遇到第一个失败即停止
// 跨字段: 全部执行, 原因逐一累积（不短路）
// 日期: 校验通过后登记 yyyyMMdd → ddMMyyyy 改写, 整行通过才落到记录上
// ==========================================

use crate::domain::error_record::ErrorCause;
use crate::domain::records::Record;
use crate::domain::types::ErrorCode;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

pub const INPUT_DATE_FORMAT: &str = "%Y%m%d";
pub const OUTPUT_DATE_FORMAT: &str = "%d%m%Y";

const MIN_DATE_YEAR: i32 = 1800;
const MAX_DATE_YEAR: i32 = 2999;

// ==========================================
// 字符类正则
// ==========================================
fn numeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+$").expect("numeric regex is valid"))
}

fn alphanumeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9]+$").expect("alphanumeric regex is valid"))
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[\p{L}\p{N}][\p{L}\p{N} '.,&/\-]*$").expect("word regex is valid")
    })
}

fn letters_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]+$").expect("letters regex is valid"))
}

// ==========================================
// Rule - 单条字段规则
// ==========================================
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// 必填; 不含此规则时空值直接通过
    Mandatory,
    ExactLen(usize),
    /// 长度属于给定集合之一
    LenIn(&'static [usize]),
    MaxLen(usize),
    Numeric,
    Alphanumeric,
    Word,
    Letters,
    OneOf(&'static [&'static str]),
    /// 整数范围（数字串）
    Range(i64, i64),
}

impl Rule {
    fn apply(&self, field: &str, value: &str) -> Option<ErrorCause> {
        match self {
            Rule::Mandatory => None,
            Rule::ExactLen(n) => (value.chars().count() != *n).then(|| {
                ErrorCause::new(
                    ErrorCode::MandatoryDataMissing,
                    format!("{}: expected length {}, found {}", field, n, value.chars().count()),
                )
            }),
            Rule::LenIn(lens) => (!lens.contains(&value.chars().count())).then(|| {
                ErrorCause::new(
                    ErrorCode::MandatoryDataMissing,
                    format!("{}: length must be one of {:?}", field, lens),
                )
            }),
            Rule::MaxLen(n) => (value.chars().count() > *n).then(|| {
                ErrorCause::new(
                    ErrorCode::MandatoryDataMissing,
                    format!("{}: longer than {} characters", field, n),
                )
            }),
            Rule::Numeric => (!numeric_re().is_match(value)).then(|| {
                ErrorCause::new(
                    ErrorCode::InvalidFormat,
                    format!("{}: '{}' is not numeric", field, value),
                )
            }),
            Rule::Alphanumeric => (!alphanumeric_re().is_match(value)).then(|| {
                ErrorCause::new(
                    ErrorCode::InvalidFormat,
                    format!("{}: '{}' is not alphanumeric", field, value),
                )
            }),
            Rule::Word => (!word_re().is_match(value)).then(|| {
                ErrorCause::new(
                    ErrorCode::InvalidFormat,
                    format!("{}: '{}' contains invalid characters", field, value),
                )
            }),
            Rule::Letters => (!letters_re().is_match(value)).then(|| {
                ErrorCause::new(
                    ErrorCode::InvalidFormat,
                    format!("{}: '{}' must contain letters only", field, value),
                )
            }),
            Rule::OneOf(allowed) => (!allowed.contains(&value)).then(|| {
                ErrorCause::new(
                    ErrorCode::InvalidValue,
                    format!("{}: '{}' is not an allowed value", field, value),
                )
            }),
            Rule::Range(min, max) => match value.parse::<i64>() {
                Ok(n) if n >= *min && n <= *max => None,
                _ => Some(ErrorCause::new(
                    ErrorCode::InvalidValue,
                    format!("{}: '{}' outside {}..={}", field, value, min, max),
                )),
            },
        }
    }
}

/// 单字段管道: 返回第一个失败原因
///
/// # 参数
/// - field: 字段名（写入原因描述）
/// - value: TRIM 后的值
/// - rules: 规则序列, 含 Rule::Mandatory 时空值报 MANDATORY_DATA_MISSING
pub fn run_pipeline(field: &str, value: &str, rules: &[Rule]) -> Option<ErrorCause> {
    if value.is_empty() {
        if rules.iter().any(|r| matches!(r, Rule::Mandatory)) {
            return Some(ErrorCause::new(
                ErrorCode::MandatoryDataMissing,
                format!("{}: mandatory field missing", field),
            ));
        }
        return None;
    }
    rules.iter().find_map(|rule| rule.apply(field, value))
}

/// 解析 yyyyMMdd 日期
///
/// # 返回
/// - Ok(NaiveDate): 合法日历日期, 年份 1800..=2999
/// - Err(ErrorCause): INVALID_DATE_FORMAT
pub fn parse_input_date(field: &str, value: &str) -> Result<NaiveDate, ErrorCause> {
    let invalid = || {
        ErrorCause::new(
            ErrorCode::InvalidDateFormat,
            format!("{}: '{}' is not a valid yyyyMMdd date", field, value),
        )
    };
    if value.len() != 8 || !numeric_re().is_match(value) {
        return Err(invalid());
    }
    let date = NaiveDate::parse_from_str(value, INPUT_DATE_FORMAT).map_err(|_| invalid())?;
    if date.year() < MIN_DATE_YEAR || date.year() > MAX_DATE_YEAR {
        return Err(invalid());
    }
    Ok(date)
}

// ==========================================
// FieldChecks - 整行校验累加器
// ==========================================
#[derive(Debug, Default)]
pub struct FieldChecks {
    causes: Vec<ErrorCause>,
    rewrites: Vec<(&'static str, String)>,
}

impl FieldChecks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 执行字段管道, 返回是否通过
    pub fn check(&mut self, field: &'static str, value: &str, rules: &[Rule]) -> bool {
        match run_pipeline(field, value, rules) {
            Some(cause) => {
                self.causes.push(cause);
                false
            }
            None => true,
        }
    }

    /// 日期字段
    ///
    /// # 返回
    /// - Some(date): 非空且合法, 已登记格式改写
    /// - None: 空值（可选）或校验失败
    pub fn date(&mut self, field: &'static str, value: &str, mandatory: bool) -> Option<NaiveDate> {
        if value.is_empty() {
            if mandatory {
                self.causes.push(ErrorCause::new(
                    ErrorCode::MandatoryDataMissing,
                    format!("{}: mandatory field missing", field),
                ));
            }
            return None;
        }
        match parse_input_date(field, value) {
            Ok(date) => {
                self.rewrites
                    .push((field, date.format(OUTPUT_DATE_FORMAT).to_string()));
                Some(date)
            }
            Err(cause) => {
                self.causes.push(cause);
                None
            }
        }
    }

    pub fn push(&mut self, cause: ErrorCause) {
        self.causes.push(cause);
    }

    pub fn extend(&mut self, causes: impl IntoIterator<Item = ErrorCause>) {
        self.causes.extend(causes);
    }

    pub fn is_clean(&self) -> bool {
        self.causes.is_empty()
    }

    pub fn causes(&self) -> &[ErrorCause] {
        &self.causes
    }

    /// 结束校验
    ///
    /// # 返回
    /// - Ok(record): 全部通过, 日期已改写为 ddMMyyyy
    /// - Err(causes): 至少一个失败, 记录保持原值
    pub fn finish(self, mut record: Record) -> Result<Record, Vec<ErrorCause>> {
        if !self.causes.is_empty() {
            return Err(self.causes);
        }
        for (field, converted) in self.rewrites {
            if let Some(slot) = record.field_mut(field) {
                *slot = converted;
            }
        }
        Ok(record)
    }
}
