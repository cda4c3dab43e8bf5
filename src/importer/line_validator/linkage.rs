// ==========================================
// 关联 (Collegamenti) 校验
// ==========================================

use super::{
    begin, check_date_order, kind_mismatch, ValidationContext, Verdict, NDG_RULES,
    RELATIONSHIP_KEY_RULES,
};
use crate::domain::records::Record;
use crate::domain::types::RecordKind;
use crate::importer::code_tables::ROLES;
use crate::importer::field_rules::Rule;

pub fn validate(record: Record, _ctx: &ValidationContext) -> Verdict {
    let Record::Linkage(r) = &record else {
        return kind_mismatch(RecordKind::Linkage, &record);
    };

    let mut checks = begin(&r.raw_row, &r.intermediary);
    checks.check("relationship_key", &r.relationship_key, RELATIONSHIP_KEY_RULES);
    checks.check("ndg", &r.ndg, NDG_RULES);
    checks.check("role", &r.role, &[Rule::Mandatory, Rule::OneOf(ROLES)]);

    let start = checks.date("role_start_date", &r.role_start_date, true);
    let end = checks.date("role_end_date", &r.role_end_date, false);
    check_date_order(&mut checks, "role_end_date", start, end);

    checks.finish(record)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{codes, valid_raw};
    use super::*;
    use crate::domain::records::LinkageRecord;
    use crate::domain::types::ErrorCode;

    fn linkage() -> LinkageRecord {
        LinkageRecord {
            raw_row: valid_raw(),
            intermediary: "12345678901".to_string(),
            relationship_key: "REL0001".to_string(),
            ndg: "ABC123".to_string(),
            role: "T".to_string(),
            role_start_date: "20230101".to_string(),
            role_end_date: "20231231".to_string(),
        }
    }

    #[test]
    fn test_valid_linkage_converts_both_dates() {
        let record = validate(Record::Linkage(linkage()), &ValidationContext::default()).unwrap();
        assert_eq!(record.field_value("role_start_date"), Some("01012023"));
        assert_eq!(record.field_value("role_end_date"), Some("31122023"));
    }

    #[test]
    fn test_role_and_ndg_rules() {
        let bad = LinkageRecord {
            ndg: "ABC_123".to_string(),
            role: "t".to_string(),
            ..linkage()
        };
        let causes = validate(Record::Linkage(bad), &ValidationContext::default()).unwrap_err();
        assert_eq!(
            codes(&causes),
            vec![ErrorCode::InvalidFormat, ErrorCode::InvalidValue]
        );
    }
}
