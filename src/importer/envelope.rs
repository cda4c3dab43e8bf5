// ==========================================
// 定长监管报送文件导入系统 - 文件头/尾检查
// ==========================================
// 与记录类型无关的结构检查, 任一失败则整文件失败
// 所有原因聚合为一个 StructuralFileError
// ==========================================

use crate::domain::ingestion::{FileEnvelope, ReportingPeriod};
use crate::importer::error::{IngestError, IngestResult};
use crate::importer::field_rules::INPUT_DATE_FORMAT;
use crate::importer::layout::{
    Slice, END_MARKER, FOOTER_SENTINEL, HEADER_SENTINEL, LINE_LENGTH,
};
use chrono::NaiveDate;

const PERIOD_START: Slice = Slice::new(1, 9);
const PERIOD_END: Slice = Slice::new(9, 17);
const DECLARED_COUNT: Slice = Slice::new(1, 9);

fn check_frame(label: &str, line: &str, sentinel: u8, reasons: &mut Vec<String>) {
    let bytes = line.as_bytes();
    if bytes.len() != LINE_LENGTH {
        reasons.push(format!(
            "{}: line length is {} bytes, expected {}",
            label,
            bytes.len(),
            LINE_LENGTH
        ));
    }
    match bytes.first() {
        Some(b) if *b == sentinel => {}
        found => reasons.push(format!(
            "{}: record type must be '{}', found '{}'",
            label,
            sentinel as char,
            found.map(|b| *b as char).unwrap_or(' ')
        )),
    }
    if bytes.len() >= LINE_LENGTH && bytes[LINE_LENGTH - 1] != END_MARKER {
        reasons.push(format!(
            "{}: end marker must be '{}', found '{}'",
            label,
            END_MARKER as char,
            bytes[LINE_LENGTH - 1] as char
        ));
    }
}

fn parse_period_date(label: &str, value: &str, reasons: &mut Vec<String>) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(value, INPUT_DATE_FORMAT) {
        Ok(date) if value.len() == 8 => Some(date),
        _ => {
            reasons.push(format!("header: {} '{}' is not a valid yyyyMMdd date", label, value));
            None
        }
    }
}

/// 校验文件头
///
/// # 返回
/// - Ok(Some(period)): 声明了报送期间
/// - Ok(None): 期间为空
/// - Err(reasons): 全部失败原因
pub fn check_header(line: &str) -> Result<Option<ReportingPeriod>, Vec<String>> {
    let mut reasons = Vec::new();
    check_frame("header", line, HEADER_SENTINEL, &mut reasons);

    let start_raw = PERIOD_START.extract(line);
    let end_raw = PERIOD_END.extract(line);
    let period = if start_raw.is_empty() && end_raw.is_empty() {
        None
    } else {
        let start = parse_period_date("period start", &start_raw, &mut reasons);
        let end = parse_period_date("period end", &end_raw, &mut reasons);
        match (start, end) {
            (Some(start), Some(end)) if start <= end => Some(ReportingPeriod { start, end }),
            (Some(start), Some(end)) => {
                reasons.push(format!(
                    "header: period start {} is after period end {}",
                    start, end
                ));
                None
            }
            _ => None,
        }
    };

    if reasons.is_empty() {
        Ok(period)
    } else {
        Err(reasons)
    }
}

/// 校验文件尾, 返回声明的记录数
pub fn check_footer(line: &str) -> Result<usize, Vec<String>> {
    let mut reasons = Vec::new();
    check_frame("footer", line, FOOTER_SENTINEL, &mut reasons);

    let raw_count = DECLARED_COUNT.extract(line);
    let declared = if !raw_count.is_empty() && raw_count.bytes().all(|b| b.is_ascii_digit()) {
        raw_count.parse::<usize>().ok()
    } else {
        None
    };
    if declared.is_none() {
        reasons.push(format!(
            "footer: declared record count '{}' is not numeric",
            raw_count
        ));
    }

    match declared {
        Some(count) if reasons.is_empty() => Ok(count),
        _ => Err(reasons),
    }
}

/// 拆分文件头/数据行/文件尾并执行结构检查
///
/// # 参数
/// - lines: 已去除空行的全部行
///
/// # 返回
/// - (文件头尾信息, 数据行切片)
/// - StructuralFileError: 聚合全部原因（含声明行数不符）
pub fn split_envelope(lines: &[String]) -> IngestResult<(FileEnvelope, &[String])> {
    if lines.len() < 2 {
        return Err(IngestError::StructuralFileError {
            reasons: vec![format!(
                "file must contain a header and a footer line, found {} line(s)",
                lines.len()
            )],
        });
    }

    let header = &lines[0];
    let footer = &lines[lines.len() - 1];
    let data = &lines[1..lines.len() - 1];

    let mut reasons = Vec::new();
    let period = check_header(header).unwrap_or_else(|r| {
        reasons.extend(r);
        None
    });
    let declared = match check_footer(footer) {
        Ok(count) => Some(count),
        Err(r) => {
            reasons.extend(r);
            None
        }
    };
    if let Some(count) = declared {
        if count != data.len() {
            reasons.push(format!(
                "footer: declared record count {} does not match {} data line(s)",
                count,
                data.len()
            ));
        }
    }

    if !reasons.is_empty() {
        return Err(IngestError::StructuralFileError { reasons });
    }

    Ok((
        FileEnvelope {
            period,
            declared_count: data.len(),
        },
        data,
    ))
}
