// ==========================================
// 定长监管报送文件导入系统 - 解析后记录模型
// ==========================================
// 每种记录类型一个结构体, 字段均为 TRIM 后的字符串
// 用途: 解析层写入, 校验层只读, 仓储层映射落库
// 约束: 除日期校验通过后的格式改写外, 不再修改
// ==========================================

use crate::domain::types::RecordKind;
use serde::{Deserialize, Serialize};

/// 组合键分隔符
pub const KEY_SEPARATOR: &str = "|";

fn join_key(parts: &[&str]) -> String {
    parts.join(KEY_SEPARATOR)
}

// ==========================================
// 字段访问 Trait
// ==========================================
// field_values 的字段名与切片布局、落库列名保持一致
pub trait RecordFields {
    /// 按布局顺序返回 (字段名, 值)
    fn field_values(&self) -> Vec<(&'static str, &str)>;

    /// 可变访问（日期改写用）
    fn field_mut(&mut self, name: &str) -> Option<&mut String>;
}

// ==========================================
// 父记录引用
// ==========================================
// 父表固定为 linkage, 按引用列区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParentColumn {
    SubjectRef,      // linkage.subject_ref = intermediary|ndg
    RelationshipRef, // linkage.relationship_ref = intermediary|relationship_key
}

impl ParentColumn {
    pub fn column_name(&self) -> &'static str {
        match self {
            ParentColumn::SubjectRef => "subject_ref",
            ParentColumn::RelationshipRef => "relationship_ref",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    pub column: ParentColumn,
    pub key: String,
}

// ==========================================
// SubjectRecord - 主体 (Soggetti)
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub raw_row: String,
    pub intermediary: String,      // 报送机构代码（11 位）
    pub ndg: String,               // 主体识别码
    pub registration_date: String, // 建档日期
    pub closure_date: String,      // 注销日期（可空）
    pub legal_nature: String,      // PF 自然人 / PNF 非自然人
    pub tax_code: String,          // 税号（11 或 16 位）
    pub surname: String,           // 姓 / 名称
    pub first_name: String,        // 名
    pub sex: String,
    pub birth_date: String,
    pub birth_place: String,
    pub birth_province: String,
    pub geography_code: String, // 国家代码（可空）
}

impl RecordFields for SubjectRecord {
    fn field_values(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("intermediary", &self.intermediary),
            ("ndg", &self.ndg),
            ("registration_date", &self.registration_date),
            ("closure_date", &self.closure_date),
            ("legal_nature", &self.legal_nature),
            ("tax_code", &self.tax_code),
            ("surname", &self.surname),
            ("first_name", &self.first_name),
            ("sex", &self.sex),
            ("birth_date", &self.birth_date),
            ("birth_place", &self.birth_place),
            ("birth_province", &self.birth_province),
            ("geography_code", &self.geography_code),
        ]
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            "intermediary" => Some(&mut self.intermediary),
            "ndg" => Some(&mut self.ndg),
            "registration_date" => Some(&mut self.registration_date),
            "closure_date" => Some(&mut self.closure_date),
            "legal_nature" => Some(&mut self.legal_nature),
            "tax_code" => Some(&mut self.tax_code),
            "surname" => Some(&mut self.surname),
            "first_name" => Some(&mut self.first_name),
            "sex" => Some(&mut self.sex),
            "birth_date" => Some(&mut self.birth_date),
            "birth_place" => Some(&mut self.birth_place),
            "birth_province" => Some(&mut self.birth_province),
            "geography_code" => Some(&mut self.geography_code),
            _ => None,
        }
    }
}

// ==========================================
// RelationshipRecord - 账户/关系 (Rapporti)
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub raw_row: String,
    pub intermediary: String,
    pub relationship_key: String,  // 关系主键 (chiave rapporto)
    pub relationship_type: String, // 关系类型代码
    pub start_date: String,
    pub end_date: String,
    pub currency: String,
    pub geography_code: String, // 境外关系必填
    pub cab: String,            // 网点代码
    pub status_flag: String,
}

impl RecordFields for RelationshipRecord {
    fn field_values(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("intermediary", &self.intermediary),
            ("relationship_key", &self.relationship_key),
            ("relationship_type", &self.relationship_type),
            ("start_date", &self.start_date),
            ("end_date", &self.end_date),
            ("currency", &self.currency),
            ("geography_code", &self.geography_code),
            ("cab", &self.cab),
            ("status_flag", &self.status_flag),
        ]
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            "intermediary" => Some(&mut self.intermediary),
            "relationship_key" => Some(&mut self.relationship_key),
            "relationship_type" => Some(&mut self.relationship_type),
            "start_date" => Some(&mut self.start_date),
            "end_date" => Some(&mut self.end_date),
            "currency" => Some(&mut self.currency),
            "geography_code" => Some(&mut self.geography_code),
            "cab" => Some(&mut self.cab),
            "status_flag" => Some(&mut self.status_flag),
            _ => None,
        }
    }
}

// ==========================================
// AccountingDataRecord - 会计数据 (DatiContabili)
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingDataRecord {
    pub raw_row: String,
    pub intermediary: String,
    pub relationship_key: String,
    pub reference_year: String,
    pub currency: String,
    pub opening_balance: String,
    pub closing_balance: String,
    pub total_credits: String,
    pub total_debits: String,
    pub average_balance: String,
    pub threshold_flag: String,
}

impl RecordFields for AccountingDataRecord {
    fn field_values(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("intermediary", &self.intermediary),
            ("relationship_key", &self.relationship_key),
            ("reference_year", &self.reference_year),
            ("currency", &self.currency),
            ("opening_balance", &self.opening_balance),
            ("closing_balance", &self.closing_balance),
            ("total_credits", &self.total_credits),
            ("total_debits", &self.total_debits),
            ("average_balance", &self.average_balance),
            ("threshold_flag", &self.threshold_flag),
        ]
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            "intermediary" => Some(&mut self.intermediary),
            "relationship_key" => Some(&mut self.relationship_key),
            "reference_year" => Some(&mut self.reference_year),
            "currency" => Some(&mut self.currency),
            "opening_balance" => Some(&mut self.opening_balance),
            "closing_balance" => Some(&mut self.closing_balance),
            "total_credits" => Some(&mut self.total_credits),
            "total_debits" => Some(&mut self.total_debits),
            "average_balance" => Some(&mut self.average_balance),
            "threshold_flag" => Some(&mut self.threshold_flag),
            _ => None,
        }
    }
}

// ==========================================
// LinkageRecord - 关联 (Collegamenti)
// ==========================================
// 父记录: Subject/Relationship/AccountingData 依赖其存在
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkageRecord {
    pub raw_row: String,
    pub intermediary: String,
    pub relationship_key: String,
    pub ndg: String,
    pub role: String,
    pub role_start_date: String,
    pub role_end_date: String,
}

impl LinkageRecord {
    pub fn subject_ref(&self) -> String {
        join_key(&[&self.intermediary, &self.ndg])
    }

    pub fn relationship_ref(&self) -> String {
        join_key(&[&self.intermediary, &self.relationship_key])
    }
}

impl RecordFields for LinkageRecord {
    fn field_values(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("intermediary", &self.intermediary),
            ("relationship_key", &self.relationship_key),
            ("ndg", &self.ndg),
            ("role", &self.role),
            ("role_start_date", &self.role_start_date),
            ("role_end_date", &self.role_end_date),
        ]
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            "intermediary" => Some(&mut self.intermediary),
            "relationship_key" => Some(&mut self.relationship_key),
            "ndg" => Some(&mut self.ndg),
            "role" => Some(&mut self.role),
            "role_start_date" => Some(&mut self.role_start_date),
            "role_end_date" => Some(&mut self.role_end_date),
            _ => None,
        }
    }
}

// ==========================================
// NdgChangeRecord - NDG 变更 (CambioNdg)
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NdgChangeRecord {
    pub raw_row: String,
    pub intermediary: String,
    pub old_ndg: String,
    pub new_ndg: String,
    pub change_date: String,
}

impl RecordFields for NdgChangeRecord {
    fn field_values(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("intermediary", &self.intermediary),
            ("old_ndg", &self.old_ndg),
            ("new_ndg", &self.new_ndg),
            ("change_date", &self.change_date),
        ]
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            "intermediary" => Some(&mut self.intermediary),
            "old_ndg" => Some(&mut self.old_ndg),
            "new_ndg" => Some(&mut self.new_ndg),
            "change_date" => Some(&mut self.change_date),
            _ => None,
        }
    }
}

// ==========================================
// TransactionRecord - 交易
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub raw_row: String,
    pub intermediary: String,
    pub operation_id: String,
    pub relationship_key: String, // 可空（非账户交易）
    pub ndg: String,
    pub operation_date: String,
    pub operation_type: String,
    pub sign: String, // D 借 / A 贷
    pub amount: String,
    pub currency: String,
    pub geography_code: String,
}

impl RecordFields for TransactionRecord {
    fn field_values(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("intermediary", &self.intermediary),
            ("operation_id", &self.operation_id),
            ("relationship_key", &self.relationship_key),
            ("ndg", &self.ndg),
            ("operation_date", &self.operation_date),
            ("operation_type", &self.operation_type),
            ("sign", &self.sign),
            ("amount", &self.amount),
            ("currency", &self.currency),
            ("geography_code", &self.geography_code),
        ]
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            "intermediary" => Some(&mut self.intermediary),
            "operation_id" => Some(&mut self.operation_id),
            "relationship_key" => Some(&mut self.relationship_key),
            "ndg" => Some(&mut self.ndg),
            "operation_date" => Some(&mut self.operation_date),
            "operation_type" => Some(&mut self.operation_type),
            "sign" => Some(&mut self.sign),
            "amount" => Some(&mut self.amount),
            "currency" => Some(&mut self.currency),
            "geography_code" => Some(&mut self.geography_code),
            _ => None,
        }
    }
}

// ==========================================
// MerchantRecord - 商户
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantRecord {
    pub raw_row: String,
    pub intermediary: String,
    pub merchant_id: String,
    pub merchant_tax_code: String,
    pub business_name: String,
    pub mcc: String, // 商户类别码（4 位）
    pub reference_date: String,
    pub operation_count: String,
    pub total_amount: String,
    pub currency: String,
    pub cancellation_flag: String,
}

impl RecordFields for MerchantRecord {
    fn field_values(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("intermediary", &self.intermediary),
            ("merchant_id", &self.merchant_id),
            ("merchant_tax_code", &self.merchant_tax_code),
            ("business_name", &self.business_name),
            ("mcc", &self.mcc),
            ("reference_date", &self.reference_date),
            ("operation_count", &self.operation_count),
            ("total_amount", &self.total_amount),
            ("currency", &self.currency),
            ("cancellation_flag", &self.cancellation_flag),
        ]
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            "intermediary" => Some(&mut self.intermediary),
            "merchant_id" => Some(&mut self.merchant_id),
            "merchant_tax_code" => Some(&mut self.merchant_tax_code),
            "business_name" => Some(&mut self.business_name),
            "mcc" => Some(&mut self.mcc),
            "reference_date" => Some(&mut self.reference_date),
            "operation_count" => Some(&mut self.operation_count),
            "total_amount" => Some(&mut self.total_amount),
            "currency" => Some(&mut self.currency),
            "cancellation_flag" => Some(&mut self.cancellation_flag),
            _ => None,
        }
    }
}

// ==========================================
// Record - 封闭枚举, 按记录类型分派
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Record {
    Subject(SubjectRecord),
    Relationship(RelationshipRecord),
    AccountingData(AccountingDataRecord),
    Linkage(LinkageRecord),
    NdgChange(NdgChangeRecord),
    Transaction(TransactionRecord),
    Merchant(MerchantRecord),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Subject(_) => RecordKind::Subject,
            Record::Relationship(_) => RecordKind::Relationship,
            Record::AccountingData(_) => RecordKind::AccountingData,
            Record::Linkage(_) => RecordKind::Linkage,
            Record::NdgChange(_) => RecordKind::NdgChange,
            Record::Transaction(_) => RecordKind::Transaction,
            Record::Merchant(_) => RecordKind::Merchant,
        }
    }

    pub fn raw_row(&self) -> &str {
        match self {
            Record::Subject(r) => &r.raw_row,
            Record::Relationship(r) => &r.raw_row,
            Record::AccountingData(r) => &r.raw_row,
            Record::Linkage(r) => &r.raw_row,
            Record::NdgChange(r) => &r.raw_row,
            Record::Transaction(r) => &r.raw_row,
            Record::Merchant(r) => &r.raw_row,
        }
    }

    /// 去重组合键（不含报送批次, 批次由调用方限定）
    pub fn duplicate_key(&self) -> String {
        match self {
            Record::Subject(r) => join_key(&[&r.intermediary, &r.ndg]),
            Record::Relationship(r) => join_key(&[&r.intermediary, &r.relationship_key]),
            Record::AccountingData(r) => join_key(&[
                &r.intermediary,
                &r.relationship_key,
                &r.reference_year,
                &r.currency,
            ]),
            Record::Linkage(r) => {
                join_key(&[&r.intermediary, &r.relationship_key, &r.ndg, &r.role])
            }
            Record::NdgChange(r) => join_key(&[&r.intermediary, &r.old_ndg]),
            Record::Transaction(r) => join_key(&[&r.intermediary, &r.operation_id]),
            Record::Merchant(r) => {
                join_key(&[&r.intermediary, &r.merchant_id, &r.reference_date])
            }
        }
    }

    /// Linkage 父记录引用（仅 Subject/Relationship/AccountingData）
    pub fn parent_ref(&self) -> Option<ParentRef> {
        match self {
            Record::Subject(r) => Some(ParentRef {
                column: ParentColumn::SubjectRef,
                key: join_key(&[&r.intermediary, &r.ndg]),
            }),
            Record::Relationship(r) => Some(ParentRef {
                column: ParentColumn::RelationshipRef,
                key: join_key(&[&r.intermediary, &r.relationship_key]),
            }),
            Record::AccountingData(r) => Some(ParentRef {
                column: ParentColumn::RelationshipRef,
                key: join_key(&[&r.intermediary, &r.relationship_key]),
            }),
            _ => None,
        }
    }

    /// Linkage 自身提供的两个引用列
    pub fn linkage_refs(&self) -> Option<(String, String)> {
        match self {
            Record::Linkage(r) => Some((r.subject_ref(), r.relationship_ref())),
            _ => None,
        }
    }

    fn fields(&self) -> &dyn RecordFields {
        match self {
            Record::Subject(r) => r,
            Record::Relationship(r) => r,
            Record::AccountingData(r) => r,
            Record::Linkage(r) => r,
            Record::NdgChange(r) => r,
            Record::Transaction(r) => r,
            Record::Merchant(r) => r,
        }
    }

    fn fields_mut(&mut self) -> &mut dyn RecordFields {
        match self {
            Record::Subject(r) => r,
            Record::Relationship(r) => r,
            Record::AccountingData(r) => r,
            Record::Linkage(r) => r,
            Record::NdgChange(r) => r,
            Record::Transaction(r) => r,
            Record::Merchant(r) => r,
        }
    }

    pub fn field_values(&self) -> Vec<(&'static str, &str)> {
        self.fields().field_values()
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.field_values()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        self.fields_mut().field_mut(name)
    }
}
