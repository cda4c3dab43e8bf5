// ==========================================
// 定长监管报送文件导入系统 - 固定代码表
// ==========================================
// 所有允许值区分大小写, 空值不在任何表内
// ==========================================

/// ISO-4217 币种
pub const CURRENCIES: &[&str] = &[
    "AED", "ARS", "AUD", "BGN", "BRL", "CAD", "CHF", "CLP", "CNY", "COP", "CZK", "DKK", "EGP",
    "EUR", "GBP", "HKD", "HUF", "IDR", "ILS", "INR", "ISK", "JPY", "KRW", "MAD", "MXN", "MYR",
    "NOK", "NZD", "PEN", "PHP", "PLN", "QAR", "RON", "RSD", "RUB", "SAR", "SEK", "SGD", "THB",
    "TND", "TRY", "TWD", "UAH", "USD", "ZAR",
];

/// ISO-3166 alpha-3 国家代码
pub const COUNTRIES_ALPHA3: &[&str] = &[
    "ALB", "AND", "ARE", "ARG", "AUS", "AUT", "BEL", "BGR", "BIH", "BRA", "CAN", "CHE", "CHL",
    "CHN", "COL", "CYP", "CZE", "DEU", "DNK", "EGY", "ESP", "EST", "FIN", "FRA", "GBR", "GRC",
    "HKG", "HRV", "HUN", "IDN", "IND", "IRL", "ISL", "ISR", "ITA", "JPN", "KOR", "LIE", "LTU",
    "LUX", "LVA", "MAR", "MCO", "MEX", "MLT", "MNE", "MYS", "NLD", "NOR", "NZL", "PER", "PHL",
    "POL", "PRT", "QAT", "ROU", "RUS", "SAU", "SGP", "SMR", "SRB", "SVK", "SVN", "SWE", "THA",
    "TUN", "TUR", "TWN", "UKR", "USA", "VAT", "ZAF",
];

/// ISO-3166 numeric 国家代码
pub const COUNTRIES_NUMERIC: &[&str] = &[
    "008", "020", "032", "036", "040", "056", "070", "076", "100", "124", "152", "156", "158",
    "170", "191", "196", "203", "208", "233", "246", "250", "276", "300", "344", "348", "352",
    "356", "360", "372", "376", "380", "392", "410", "428", "438", "440", "442", "458", "470",
    "484", "492", "499", "504", "528", "554", "578", "604", "608", "616", "620", "634", "642",
    "643", "674", "682", "688", "702", "703", "705", "710", "724", "752", "756", "764", "784",
    "788", "792", "804", "818", "826", "840",
];

/// 关系类型代码
pub const RELATIONSHIP_TYPES: &[&str] = &[
    "01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "12", "13", "14", "15",
    "16", "17", "18", "19", "20", "96", "97", "98", "99",
];

/// 境外关系类型: 国家代码必填
pub const FOREIGN_RELATIONSHIP_TYPES: &[&str] = &["96", "97", "98", "99"];

/// 交易类型代码
pub const OPERATION_TYPES: &[&str] = &[
    "01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "12", "20", "21", "22",
    "30", "31", "40", "50", "99",
];

pub const LEGAL_NATURES: &[&str] = &["PF", "PNF"];
pub const NATURAL_PERSON: &str = "PF";
pub const SEXES: &[&str] = &["M", "F"];
pub const STATUS_FLAGS: &[&str] = &["A", "C"];
pub const BINARY_FLAGS: &[&str] = &["0", "1"];
pub const ROLES: &[&str] = &["T", "C", "D", "F", "G", "P", "R"];
pub const SIGNS: &[&str] = &["D", "A"];

pub fn contains(table: &[&str], value: &str) -> bool {
    table.contains(&value)
}
