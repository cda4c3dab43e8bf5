// ==========================================
// 定长监管报送文件导入系统 - 切片布局
// ==========================================
// 每种记录类型一张静态切片表: [start, end) 字节区间
// 纯数据, 跨线程只读共享
// ==========================================

use crate::domain::types::RecordKind;

/// 定长行长度
pub const LINE_LENGTH: usize = 250;

/// 记录类型标志位（第 0 字节）
pub const HEADER_SENTINEL: u8 = b'0';
pub const RECORD_SENTINEL: u8 = b'1';
pub const FOOTER_SENTINEL: u8 = b'9';

/// 行尾标志位（第 249 字节）
pub const END_MARKER: u8 = b'A';

// ==========================================
// Slice - 半开字节区间
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub start: usize,
    pub end: usize,
}

impl Slice {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// 截取 [start, min(end, len)) 并 TRIM
    ///
    /// 越界或短行返回空串, 长度问题留给校验层
    pub fn extract(&self, line: &str) -> String {
        let bytes = line.as_bytes();
        let end = self.end.min(bytes.len());
        if self.start >= end {
            return String::new();
        }
        String::from_utf8_lossy(&bytes[self.start..end])
            .trim()
            .to_string()
    }

    pub fn width(&self) -> usize {
        self.end - self.start
    }
}

/// 字段名 + 切片
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSlice {
    pub name: &'static str,
    pub slice: Slice,
}

const fn field(name: &'static str, start: usize, end: usize) -> FieldSlice {
    FieldSlice {
        name,
        slice: Slice::new(start, end),
    }
}

// 所有类型共有
pub const RECORD_TYPE: Slice = Slice::new(0, 1);
pub const END_MARKER_SLICE: Slice = Slice::new(249, 250);

// ==========================================
// 各记录类型布局
// ==========================================

const SUBJECT_LAYOUT: &[FieldSlice] = &[
    field("intermediary", 1, 12),
    field("ndg", 12, 28),
    field("registration_date", 28, 36),
    field("closure_date", 36, 44),
    field("legal_nature", 44, 47),
    field("tax_code", 47, 63),
    field("surname", 63, 138),
    field("first_name", 138, 168),
    field("sex", 168, 169),
    field("birth_date", 169, 177),
    field("birth_place", 177, 217),
    field("birth_province", 217, 219),
    field("geography_code", 219, 222),
];

const RELATIONSHIP_LAYOUT: &[FieldSlice] = &[
    field("intermediary", 1, 12),
    field("relationship_key", 12, 62),
    field("relationship_type", 62, 64),
    field("start_date", 64, 72),
    field("end_date", 72, 80),
    field("currency", 80, 83),
    field("geography_code", 83, 86),
    field("cab", 86, 91),
    field("status_flag", 91, 92),
];

const ACCOUNTING_DATA_LAYOUT: &[FieldSlice] = &[
    field("intermediary", 1, 12),
    field("relationship_key", 12, 62),
    field("reference_year", 62, 66),
    field("currency", 66, 69),
    field("opening_balance", 69, 87),
    field("closing_balance", 87, 105),
    field("total_credits", 105, 123),
    field("total_debits", 123, 141),
    field("average_balance", 141, 159),
    field("threshold_flag", 159, 160),
];

const LINKAGE_LAYOUT: &[FieldSlice] = &[
    field("intermediary", 1, 12),
    field("relationship_key", 12, 62),
    field("ndg", 62, 78),
    field("role", 78, 79),
    field("role_start_date", 79, 87),
    field("role_end_date", 87, 95),
];

const NDG_CHANGE_LAYOUT: &[FieldSlice] = &[
    field("intermediary", 1, 12),
    field("old_ndg", 12, 28),
    field("new_ndg", 28, 44),
    field("change_date", 44, 52),
];

const TRANSACTION_LAYOUT: &[FieldSlice] = &[
    field("intermediary", 1, 12),
    field("operation_id", 12, 42),
    field("relationship_key", 42, 92),
    field("ndg", 92, 108),
    field("operation_date", 108, 116),
    field("operation_type", 116, 118),
    field("sign", 118, 119),
    field("amount", 119, 137),
    field("currency", 137, 140),
    field("geography_code", 140, 143),
];

const MERCHANT_LAYOUT: &[FieldSlice] = &[
    field("intermediary", 1, 12),
    field("merchant_id", 12, 27),
    field("merchant_tax_code", 27, 43),
    field("business_name", 43, 118),
    field("mcc", 118, 122),
    field("reference_date", 122, 130),
    field("operation_count", 130, 139),
    field("total_amount", 139, 157),
    field("currency", 157, 160),
    field("cancellation_flag", 160, 161),
];

/// 按记录类型取布局
pub fn layout_for(kind: RecordKind) -> &'static [FieldSlice] {
    match kind {
        RecordKind::Subject => SUBJECT_LAYOUT,
        RecordKind::Relationship => RELATIONSHIP_LAYOUT,
        RecordKind::AccountingData => ACCOUNTING_DATA_LAYOUT,
        RecordKind::Linkage => LINKAGE_LAYOUT,
        RecordKind::NdgChange => NDG_CHANGE_LAYOUT,
        RecordKind::Transaction => TRANSACTION_LAYOUT,
        RecordKind::Merchant => MERCHANT_LAYOUT,
    }
}

/// 按字段名查切片
pub fn find_field(kind: RecordKind, name: &str) -> Option<Slice> {
    layout_for(kind)
        .iter()
        .find(|f| f.name == name)
        .map(|f| f.slice)
}
