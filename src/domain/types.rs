// ==========================================
// 定长监管报送文件导入系统 - 领域类型定义
// ==========================================
// 职责: 记录类型枚举 / 错误分类编码
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 记录类型 (Record Kind)
// ==========================================
// 一个导入文件只包含一种记录类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordKind {
    Subject,        // 主体 (Soggetti)
    Relationship,   // 账户/关系 (Rapporti)
    AccountingData, // 会计数据 (DatiContabili)
    Linkage,        // 关联 (Collegamenti)
    NdgChange,      // NDG 变更 (CambioNdg)
    Transaction,    // 交易
    Merchant,       // 商户
}

impl RecordKind {
    pub const ALL: [RecordKind; 7] = [
        RecordKind::Subject,
        RecordKind::Relationship,
        RecordKind::AccountingData,
        RecordKind::Linkage,
        RecordKind::NdgChange,
        RecordKind::Transaction,
        RecordKind::Merchant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Subject => "SUBJECT",
            RecordKind::Relationship => "RELATIONSHIP",
            RecordKind::AccountingData => "ACCOUNTING_DATA",
            RecordKind::Linkage => "LINKAGE",
            RecordKind::NdgChange => "NDG_CHANGE",
            RecordKind::Transaction => "TRANSACTION",
            RecordKind::Merchant => "MERCHANT",
        }
    }

    /// 最终落库表名
    pub fn table_name(&self) -> &'static str {
        match self {
            RecordKind::Subject => "subject",
            RecordKind::Relationship => "relationship",
            RecordKind::AccountingData => "accounting_data",
            RecordKind::Linkage => "linkage",
            RecordKind::NdgChange => "ndg_change",
            // transaction 是 SQL 关键字
            RecordKind::Transaction => "transaction_record",
            RecordKind::Merchant => "merchant",
        }
    }

    /// 暂存表名（staging ETL 使用）
    pub fn staging_table_name(&self) -> String {
        format!("stg_{}", self.table_name())
    }

    /// 是否需要校验 Linkage 父记录
    pub fn requires_parent(&self) -> bool {
        matches!(
            self,
            RecordKind::Subject | RecordKind::Relationship | RecordKind::AccountingData
        )
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "subject" | "soggetti" => Ok(RecordKind::Subject),
            "relationship" | "rapporti" => Ok(RecordKind::Relationship),
            "accounting_data" | "dati_contabili" | "daticontabili" => {
                Ok(RecordKind::AccountingData)
            }
            "linkage" | "collegamenti" => Ok(RecordKind::Linkage),
            "ndg_change" | "cambio_ndg" | "cambiondg" => Ok(RecordKind::NdgChange),
            "transaction" => Ok(RecordKind::Transaction),
            "merchant" => Ok(RecordKind::Merchant),
            _ => Err(format!("未知记录类型: {}", s)),
        }
    }
}

// ==========================================
// 错误分类 (Error Code)
// ==========================================
// 字段级 / 跨记录级错误, 按行累积, 不抛出
// 文件结构错误不在此列（见 IngestError::StructuralFileError）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidFormat,          // 格式/正则不匹配
    MandatoryDataMissing,   // 必填缺失或长度不符
    InvalidValue,           // 不在枚举允许值内
    InvalidDateFormat,      // 日期无法解析或超出报送期间
    DuplicateRecord,        // 同文件/库内重复
    MissingParentReference, // 缺少 Linkage 父记录
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 6] = [
        ErrorCode::InvalidFormat,
        ErrorCode::MandatoryDataMissing,
        ErrorCode::InvalidValue,
        ErrorCode::InvalidDateFormat,
        ErrorCode::DuplicateRecord,
        ErrorCode::MissingParentReference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::MandatoryDataMissing => "MANDATORY_DATA_MISSING",
            ErrorCode::InvalidValue => "INVALID_VALUE",
            ErrorCode::InvalidDateFormat => "INVALID_DATE_FORMAT",
            ErrorCode::DuplicateRecord => "DUPLICATE_RECORD",
            ErrorCode::MissingParentReference => "MISSING_PARENT_REFERENCE",
        }
    }

    /// error_type 表的默认描述
    pub fn default_description(&self) -> &'static str {
        match self {
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::MandatoryDataMissing => "Mandatory data missing",
            ErrorCode::InvalidValue => "Invalid value",
            ErrorCode::InvalidDateFormat => "Invalid date format",
            ErrorCode::DuplicateRecord => "Duplicate record",
            ErrorCode::MissingParentReference => "Missing parent reference",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        ErrorCode::ALL.into_iter().find(|c| c.as_str() == code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_from_str_aliases() {
        assert_eq!("subject".parse::<RecordKind>(), Ok(RecordKind::Subject));
        assert_eq!("Soggetti".parse::<RecordKind>(), Ok(RecordKind::Subject));
        assert_eq!(
            "accounting-data".parse::<RecordKind>(),
            Ok(RecordKind::AccountingData)
        );
        assert_eq!("cambio_ndg".parse::<RecordKind>(), Ok(RecordKind::NdgChange));
        assert!("unknown".parse::<RecordKind>().is_err());
    }

    #[test]
    fn test_parent_requirement() {
        assert!(RecordKind::Subject.requires_parent());
        assert!(RecordKind::Relationship.requires_parent());
        assert!(RecordKind::AccountingData.requires_parent());
        assert!(!RecordKind::Linkage.requires_parent());
        assert!(!RecordKind::Merchant.requires_parent());
    }

    #[test]
    fn test_error_code_round_trip() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_code(code.as_str()), Some(code));
        }
        assert_eq!(ErrorCode::from_code("NOPE"), None);
    }

    #[test]
    fn test_staging_table_name() {
        assert_eq!(
            RecordKind::Transaction.staging_table_name(),
            "stg_transaction_record"
        );
    }
}
