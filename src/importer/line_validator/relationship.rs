// ==========================================
// 账户/关系 (Rapporti) 校验
// ==========================================
// 境外关系类型 (96-99) 国家代码必填
// ==========================================

use super::{
    begin, check_date_order, check_geography, kind_mismatch, ValidationContext, Verdict,
    CURRENCY_RULES, RELATIONSHIP_KEY_RULES,
};
use crate::domain::records::Record;
use crate::domain::types::RecordKind;
use crate::importer::code_tables::{
    self, FOREIGN_RELATIONSHIP_TYPES, RELATIONSHIP_TYPES, STATUS_FLAGS,
};
use crate::importer::field_rules::Rule;

pub fn validate(record: Record, _ctx: &ValidationContext) -> Verdict {
    let Record::Relationship(r) = &record else {
        return kind_mismatch(RecordKind::Relationship, &record);
    };

    let mut checks = begin(&r.raw_row, &r.intermediary);
    checks.check("relationship_key", &r.relationship_key, RELATIONSHIP_KEY_RULES);
    checks.check(
        "relationship_type",
        &r.relationship_type,
        &[
            Rule::Mandatory,
            Rule::ExactLen(2),
            Rule::Numeric,
            Rule::OneOf(RELATIONSHIP_TYPES),
        ],
    );

    let start = checks.date("start_date", &r.start_date, true);
    let end = checks.date("end_date", &r.end_date, false);
    check_date_order(&mut checks, "end_date", start, end);

    checks.check("currency", &r.currency, CURRENCY_RULES);

    let foreign = code_tables::contains(FOREIGN_RELATIONSHIP_TYPES, &r.relationship_type);
    check_geography(&mut checks, "geography_code", &r.geography_code, foreign);

    checks.check("cab", &r.cab, &[Rule::ExactLen(5), Rule::Numeric]);
    checks.check(
        "status_flag",
        &r.status_flag,
        &[Rule::Mandatory, Rule::OneOf(STATUS_FLAGS)],
    );

    checks.finish(record)
}
