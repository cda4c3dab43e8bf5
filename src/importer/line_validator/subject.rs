// ==========================================
// 主体 (Soggetti) 校验
// ==========================================
// 自然人 (PF): 名 / 性别 / 出生日期必填
// 非自然人 (PNF): 上述字段仅做格式检查
// ==========================================

use super::{begin, check_date_order, check_geography, kind_mismatch, ValidationContext, Verdict};
use super::NDG_RULES;
use crate::domain::records::Record;
use crate::domain::types::RecordKind;
use crate::importer::code_tables::{LEGAL_NATURES, NATURAL_PERSON, SEXES};
use crate::importer::field_rules::Rule;

pub fn validate(record: Record, _ctx: &ValidationContext) -> Verdict {
    let Record::Subject(r) = &record else {
        return kind_mismatch(RecordKind::Subject, &record);
    };

    let mut checks = begin(&r.raw_row, &r.intermediary);
    checks.check("ndg", &r.ndg, NDG_RULES);

    let registered = checks.date("registration_date", &r.registration_date, true);
    let closed = checks.date("closure_date", &r.closure_date, false);
    check_date_order(&mut checks, "closure_date", registered, closed);

    checks.check(
        "legal_nature",
        &r.legal_nature,
        &[Rule::Mandatory, Rule::OneOf(LEGAL_NATURES)],
    );
    checks.check(
        "tax_code",
        &r.tax_code,
        &[Rule::Mandatory, Rule::LenIn(&[11, 16]), Rule::Alphanumeric],
    );
    checks.check(
        "surname",
        &r.surname,
        &[Rule::Mandatory, Rule::MaxLen(75), Rule::Word],
    );

    let natural_person = r.legal_nature == NATURAL_PERSON;
    if natural_person {
        checks.check(
            "first_name",
            &r.first_name,
            &[Rule::Mandatory, Rule::MaxLen(30), Rule::Word],
        );
        checks.check("sex", &r.sex, &[Rule::Mandatory, Rule::OneOf(SEXES)]);
    } else {
        checks.check("first_name", &r.first_name, &[Rule::MaxLen(30), Rule::Word]);
        checks.check("sex", &r.sex, &[Rule::OneOf(SEXES)]);
    }
    checks.date("birth_date", &r.birth_date, natural_person);

    checks.check("birth_place", &r.birth_place, &[Rule::MaxLen(40), Rule::Word]);
    checks.check(
        "birth_province",
        &r.birth_province,
        &[Rule::ExactLen(2), Rule::Letters],
    );
    // 主体层国家代码可空
    check_geography(&mut checks, "geography_code", &r.geography_code, false);

    checks.finish(record)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{codes, mentions, valid_raw};
    use super::*;
    use crate::domain::records::SubjectRecord;
    use crate::domain::types::ErrorCode;

    fn natural_person() -> SubjectRecord {
        SubjectRecord {
            raw_row: valid_raw(),
            intermediary: "12345678901".to_string(),
            ndg: "ABC123".to_string(),
            registration_date: "20200115".to_string(),
            closure_date: String::new(),
            legal_nature: "PF".to_string(),
            tax_code: "RSSMRA80A01H501U".to_string(),
            surname: "ROSSI".to_string(),
            first_name: "MARIO".to_string(),
            sex: "M".to_string(),
            birth_date: "19800101".to_string(),
            birth_place: "ROMA".to_string(),
            birth_province: "RM".to_string(),
            geography_code: String::new(),
        }
    }

    #[test]
    fn test_valid_subject_converts_dates() {
        let record = validate(Record::Subject(natural_person()), &ValidationContext::default())
            .unwrap();
        assert_eq!(record.field_value("registration_date"), Some("15012020"));
        assert_eq!(record.field_value("birth_date"), Some("01011980"));
        assert_eq!(record.field_value("closure_date"), Some(""));
    }

    #[test]
    fn test_collects_all_causes_without_geography_error() {
        let mut subject = natural_person();
        subject.birth_date = "20200230".to_string();
        subject.sex = "X".to_string();

        let causes =
            validate(Record::Subject(subject), &ValidationContext::default()).unwrap_err();
        assert_eq!(causes.len(), 2);
        assert_eq!(
            codes(&causes),
            vec![ErrorCode::InvalidValue, ErrorCode::InvalidDateFormat]
        );
        assert!(mentions(&causes, "birth_date"));
        assert!(!mentions(&causes, "geography_code"));
    }

    #[test]
    fn test_failed_line_keeps_original_dates() {
        let mut subject = natural_person();
        subject.tax_code = "SHORT".to_string();
        let causes =
            validate(Record::Subject(subject.clone()), &ValidationContext::default()).unwrap_err();
        assert_eq!(codes(&causes), vec![ErrorCode::MandatoryDataMissing]);
        assert_eq!(subject.registration_date, "20200115");
    }

    #[test]
    fn test_legal_person_tolerates_blank_personal_fields() {
        let subject = SubjectRecord {
            legal_nature: "PNF".to_string(),
            tax_code: "01234567890".to_string(),
            surname: "ACME S.P.A.".to_string(),
            first_name: String::new(),
            sex: String::new(),
            birth_date: String::new(),
            birth_place: String::new(),
            birth_province: String::new(),
            ..natural_person()
        };
        assert!(validate(Record::Subject(subject), &ValidationContext::default()).is_ok());
    }

    #[test]
    fn test_natural_person_requires_personal_fields() {
        let subject = SubjectRecord {
            first_name: String::new(),
            sex: String::new(),
            birth_date: String::new(),
            ..natural_person()
        };
        let causes =
            validate(Record::Subject(subject), &ValidationContext::default()).unwrap_err();
        assert_eq!(causes.len(), 3);
        assert!(causes
            .iter()
            .all(|c| c.error_code == ErrorCode::MandatoryDataMissing));
    }
}
