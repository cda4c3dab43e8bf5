// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库初始化、按切片布局生成定长行、组装带头尾的文件
// ==========================================
#![allow(dead_code)]

use regfile_ingest::db::{init_schema, open_sqlite_connection};
use regfile_ingest::domain::{ErrorCode, ErrorRecord, RecordKind};
use regfile_ingest::importer::layout::{find_field, layout_for, LINE_LENGTH};
use regfile_ingest::MemoryLineSource;
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

pub const INTERMEDIARY: &str = "12345678901";
pub const PERIOD_START: &str = "20240101";
pub const PERIOD_END: &str = "20241231";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    regfile_ingest::logging::init_test();
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接（ConfigManager / IngestionService / StagingEngine 共用）
pub fn open_shared(db_path: &str) -> Result<Arc<Mutex<Connection>>, Box<dyn Error>> {
    let conn = open_sqlite_connection(db_path)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 统计表行数
pub fn count_rows(db_path: &str, sql: &str) -> Result<i64, Box<dyn Error>> {
    let conn = open_sqlite_connection(db_path)?;
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}

// ==========================================
// 定长行构造
// ==========================================

/// 按布局把字段值写入 250 字节行（左对齐, 空格填充, 行尾 'A'）
pub fn build_line(kind: RecordKind, fields: &[(&str, &str)]) -> String {
    let mut bytes = vec![b' '; LINE_LENGTH];
    bytes[0] = b'1';
    bytes[LINE_LENGTH - 1] = b'A';
    for (name, value) in fields {
        let slice = find_field(kind, name)
            .unwrap_or_else(|| panic!("{} 布局中没有字段 {}", kind, name));
        assert!(
            value.len() <= slice.width(),
            "字段 {} 超宽: {}",
            name,
            value
        );
        bytes[slice.start..slice.start + value.len()].copy_from_slice(value.as_bytes());
    }
    String::from_utf8(bytes).unwrap()
}

/// 从行中取字段值
pub fn field_of(kind: RecordKind, line: &str, name: &str) -> String {
    find_field(kind, name)
        .map(|slice| slice.extract(line))
        .unwrap_or_default()
}

pub fn header_line(start: &str, end: &str) -> String {
    let mut line = format!("0{}{}", start, end);
    line.push_str(&" ".repeat(LINE_LENGTH - 1 - line.len()));
    line.push('A');
    line
}

pub fn footer_line(count: usize) -> String {
    let mut line = format!("9{:08}", count);
    line.push_str(&" ".repeat(LINE_LENGTH - 1 - line.len()));
    line.push('A');
    line
}

/// 组装带头尾的文件行
pub fn regfile(records: Vec<String>) -> Vec<String> {
    let mut lines = Vec::with_capacity(records.len() + 2);
    lines.push(header_line(PERIOD_START, PERIOD_END));
    let count = records.len();
    lines.extend(records);
    lines.push(footer_line(count));
    lines
}

pub fn source(name: &str, records: Vec<String>) -> MemoryLineSource {
    MemoryLineSource::new(name, regfile(records))
}

// ===== 各记录类型的合法行 =====

pub fn linkage_line(relationship_key: &str, ndg: &str) -> String {
    build_line(
        RecordKind::Linkage,
        &[
            ("intermediary", INTERMEDIARY),
            ("relationship_key", relationship_key),
            ("ndg", ndg),
            ("role", "T"),
            ("role_start_date", "20230101"),
        ],
    )
}

pub fn relationship_line(relationship_key: &str) -> String {
    build_line(
        RecordKind::Relationship,
        &[
            ("intermediary", INTERMEDIARY),
            ("relationship_key", relationship_key),
            ("relationship_type", "01"),
            ("start_date", "20230101"),
            ("currency", "EUR"),
            ("cab", "03069"),
            ("status_flag", "A"),
        ],
    )
}

pub fn subject_fields(ndg: &str) -> Vec<(&'static str, String)> {
    vec![
        ("intermediary", INTERMEDIARY.to_string()),
        ("ndg", ndg.to_string()),
        ("registration_date", "20200115".to_string()),
        ("legal_nature", "PF".to_string()),
        ("tax_code", "RSSMRA80A01H501U".to_string()),
        ("surname", "ROSSI".to_string()),
        ("first_name", "MARIO".to_string()),
        ("sex", "M".to_string()),
        ("birth_date", "19800101".to_string()),
        ("birth_place", "ROMA".to_string()),
        ("birth_province", "RM".to_string()),
    ]
}

/// Subject 行（可覆盖部分字段）
pub fn subject_line(ndg: &str, overrides: &[(&str, &str)]) -> String {
    let mut fields = subject_fields(ndg);
    for (name, value) in overrides {
        if let Some(entry) = fields.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value.to_string();
        } else {
            let known = layout_for(RecordKind::Subject)
                .iter()
                .find(|f| f.name == *name)
                .map(|f| f.name)
                .unwrap_or_else(|| panic!("Subject 布局中没有字段 {}", name));
            fields.push((known, value.to_string()));
        }
    }
    let borrowed: Vec<(&str, &str)> = fields.iter().map(|(n, v)| (*n, v.as_str())).collect();
    build_line(RecordKind::Subject, &borrowed)
}

// ===== 错误记录断言辅助 =====

pub fn codes_of(record: &ErrorRecord) -> Vec<String> {
    record.codes().into_iter().map(str::to_string).collect()
}

/// 全部错误记录的错误码（排序后, 便于跨模式比较）
pub fn sorted_codes(records: &[ErrorRecord]) -> Vec<Vec<String>> {
    let mut all: Vec<Vec<String>> = records.iter().map(codes_of).collect();
    all.sort();
    all
}

pub fn find_by_key<'a>(
    records: &'a [ErrorRecord],
    kind: RecordKind,
    field: &str,
    value: &str,
) -> Vec<&'a ErrorRecord> {
    records
        .iter()
        .filter(|r| field_of(kind, &r.raw_row, field) == value)
        .collect()
}

pub fn only_code(record: &ErrorRecord, code: ErrorCode) -> bool {
    record.causes.len() == 1 && record.has_code(code)
}
