// ==========================================
// 定长监管报送文件导入系统 - 行解析器
// ==========================================
// 职责: 原始行 + 切片布局 → 类型化记录
// 红线: 不做校验, 短行/越界字段解析为空串
// ==========================================

use crate::domain::records::{
    AccountingDataRecord, LinkageRecord, MerchantRecord, NdgChangeRecord, Record, RecordFields,
    RelationshipRecord, SubjectRecord, TransactionRecord,
};
use crate::domain::types::RecordKind;
use crate::importer::error::{IngestError, IngestResult};
use crate::importer::layout::layout_for;

/// 按布局切片填充记录字段
fn slice_into<R: RecordFields + Default>(kind: RecordKind, line: &str) -> R {
    let mut record = R::default();
    for field in layout_for(kind) {
        if let Some(slot) = record.field_mut(field.name) {
            *slot = field.slice.extract(line);
        }
    }
    record
}

fn ensure_line(line: &str) -> IngestResult<()> {
    if line.trim().is_empty() {
        return Err(IngestError::InvalidInput("空行无法解析".to_string()));
    }
    Ok(())
}

pub fn parse_subject(line: &str) -> IngestResult<Record> {
    ensure_line(line)?;
    let mut record: SubjectRecord = slice_into(RecordKind::Subject, line);
    record.raw_row = line.to_string();
    Ok(Record::Subject(record))
}

pub fn parse_relationship(line: &str) -> IngestResult<Record> {
    ensure_line(line)?;
    let mut record: RelationshipRecord = slice_into(RecordKind::Relationship, line);
    record.raw_row = line.to_string();
    Ok(Record::Relationship(record))
}

pub fn parse_accounting_data(line: &str) -> IngestResult<Record> {
    ensure_line(line)?;
    let mut record: AccountingDataRecord = slice_into(RecordKind::AccountingData, line);
    record.raw_row = line.to_string();
    Ok(Record::AccountingData(record))
}

pub fn parse_linkage(line: &str) -> IngestResult<Record> {
    ensure_line(line)?;
    let mut record: LinkageRecord = slice_into(RecordKind::Linkage, line);
    record.raw_row = line.to_string();
    Ok(Record::Linkage(record))
}

pub fn parse_ndg_change(line: &str) -> IngestResult<Record> {
    ensure_line(line)?;
    let mut record: NdgChangeRecord = slice_into(RecordKind::NdgChange, line);
    record.raw_row = line.to_string();
    Ok(Record::NdgChange(record))
}

pub fn parse_transaction(line: &str) -> IngestResult<Record> {
    ensure_line(line)?;
    let mut record: TransactionRecord = slice_into(RecordKind::Transaction, line);
    record.raw_row = line.to_string();
    Ok(Record::Transaction(record))
}

pub fn parse_merchant(line: &str) -> IngestResult<Record> {
    ensure_line(line)?;
    let mut record: MerchantRecord = slice_into(RecordKind::Merchant, line);
    record.raw_row = line.to_string();
    Ok(Record::Merchant(record))
}

/// 按记录类型解析一行
pub fn parse_line(kind: RecordKind, line: &str) -> IngestResult<Record> {
    match kind {
        RecordKind::Subject => parse_subject(line),
        RecordKind::Relationship => parse_relationship(line),
        RecordKind::AccountingData => parse_accounting_data(line),
        RecordKind::Linkage => parse_linkage(line),
        RecordKind::NdgChange => parse_ndg_change(line),
        RecordKind::Transaction => parse_transaction(line),
        RecordKind::Merchant => parse_merchant(line),
    }
}
