// ==========================================
// 会计数据 (DatiContabili) 校验
// ==========================================

use super::{begin, kind_mismatch, ValidationContext, Verdict, CURRENCY_RULES, RELATIONSHIP_KEY_RULES};
use crate::domain::records::Record;
use crate::domain::types::RecordKind;
use crate::importer::code_tables::BINARY_FLAGS;
use crate::importer::field_rules::Rule;

const AMOUNT_RULES: &[Rule] = &[Rule::Mandatory, Rule::MaxLen(18), Rule::Numeric];

pub fn validate(record: Record, _ctx: &ValidationContext) -> Verdict {
    let Record::AccountingData(r) = &record else {
        return kind_mismatch(RecordKind::AccountingData, &record);
    };

    let mut checks = begin(&r.raw_row, &r.intermediary);
    checks.check("relationship_key", &r.relationship_key, RELATIONSHIP_KEY_RULES);
    checks.check(
        "reference_year",
        &r.reference_year,
        &[
            Rule::Mandatory,
            Rule::ExactLen(4),
            Rule::Numeric,
            Rule::Range(1900, 2999),
        ],
    );
    checks.check("currency", &r.currency, CURRENCY_RULES);
    checks.check("opening_balance", &r.opening_balance, AMOUNT_RULES);
    checks.check("closing_balance", &r.closing_balance, AMOUNT_RULES);
    checks.check("total_credits", &r.total_credits, AMOUNT_RULES);
    checks.check("total_debits", &r.total_debits, AMOUNT_RULES);
    checks.check("average_balance", &r.average_balance, AMOUNT_RULES);
    checks.check(
        "threshold_flag",
        &r.threshold_flag,
        &[Rule::Mandatory, Rule::OneOf(BINARY_FLAGS)],
    );

    checks.finish(record)
}
