// ==========================================
// 交易校验
// ==========================================
// 交易日期必须落在文件头声明的报送期间内
// ==========================================

use super::{
    begin, check_geography, check_in_period, kind_mismatch, ValidationContext, Verdict,
    CURRENCY_RULES, NDG_RULES,
};
use crate::domain::records::Record;
use crate::domain::types::RecordKind;
use crate::importer::code_tables::{OPERATION_TYPES, SIGNS};
use crate::importer::field_rules::Rule;

pub fn validate(record: Record, ctx: &ValidationContext) -> Verdict {
    let Record::Transaction(r) = &record else {
        return kind_mismatch(RecordKind::Transaction, &record);
    };

    let mut checks = begin(&r.raw_row, &r.intermediary);
    checks.check(
        "operation_id",
        &r.operation_id,
        &[Rule::Mandatory, Rule::MaxLen(30), Rule::Alphanumeric],
    );
    // 非账户交易可不填关系主键
    checks.check(
        "relationship_key",
        &r.relationship_key,
        &[Rule::MaxLen(50), Rule::Alphanumeric],
    );
    checks.check("ndg", &r.ndg, NDG_RULES);

    let operation_date = checks.date("operation_date", &r.operation_date, true);
    check_in_period(&mut checks, "operation_date", operation_date, ctx);

    checks.check(
        "operation_type",
        &r.operation_type,
        &[
            Rule::Mandatory,
            Rule::ExactLen(2),
            Rule::Numeric,
            Rule::OneOf(OPERATION_TYPES),
        ],
    );
    checks.check("sign", &r.sign, &[Rule::Mandatory, Rule::OneOf(SIGNS)]);
    checks.check(
        "amount",
        &r.amount,
        &[Rule::Mandatory, Rule::MaxLen(18), Rule::Numeric],
    );
    checks.check("currency", &r.currency, CURRENCY_RULES);
    check_geography(&mut checks, "geography_code", &r.geography_code, false);

    checks.finish(record)
}
