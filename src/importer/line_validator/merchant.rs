// ==========================================
// 商户校验
// ==========================================

use super::{begin, check_in_period, kind_mismatch, ValidationContext, Verdict, CURRENCY_RULES};
use crate::domain::records::Record;
use crate::domain::types::RecordKind;
use crate::importer::code_tables::BINARY_FLAGS;
use crate::importer::field_rules::Rule;

pub fn validate(record: Record, ctx: &ValidationContext) -> Verdict {
    let Record::Merchant(r) = &record else {
        return kind_mismatch(RecordKind::Merchant, &record);
    };

    let mut checks = begin(&r.raw_row, &r.intermediary);
    checks.check(
        "merchant_id",
        &r.merchant_id,
        &[Rule::Mandatory, Rule::MaxLen(15), Rule::Alphanumeric],
    );
    checks.check(
        "merchant_tax_code",
        &r.merchant_tax_code,
        &[Rule::Mandatory, Rule::LenIn(&[11, 16]), Rule::Alphanumeric],
    );
    checks.check(
        "business_name",
        &r.business_name,
        &[Rule::Mandatory, Rule::MaxLen(75), Rule::Word],
    );
    checks.check(
        "mcc",
        &r.mcc,
        &[Rule::Mandatory, Rule::ExactLen(4), Rule::Numeric],
    );

    let reference_date = checks.date("reference_date", &r.reference_date, true);
    check_in_period(&mut checks, "reference_date", reference_date, ctx);

    checks.check(
        "operation_count",
        &r.operation_count,
        &[Rule::Mandatory, Rule::Numeric],
    );
    checks.check(
        "total_amount",
        &r.total_amount,
        &[Rule::Mandatory, Rule::MaxLen(18), Rule::Numeric],
    );
    checks.check("currency", &r.currency, CURRENCY_RULES);
    checks.check(
        "cancellation_flag",
        &r.cancellation_flag,
        &[Rule::Mandatory, Rule::OneOf(BINARY_FLAGS)],
    );

    checks.finish(record)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{codes, mentions, valid_raw};
    use super::*;
    use crate::domain::ingestion::ReportingPeriod;
    use crate::domain::records::MerchantRecord;
    use crate::domain::types::ErrorCode;
    use chrono::NaiveDate;

    fn merchant() -> MerchantRecord {
        MerchantRecord {
            raw_row: valid_raw(),
            intermediary: "12345678901".to_string(),
            merchant_id: "MRC0001".to_string(),
            merchant_tax_code: "01234567890".to_string(),
            business_name: "BAR CENTRALE".to_string(),
            mcc: "5812".to_string(),
            reference_date: "20240331".to_string(),
            operation_count: "000000120".to_string(),
            total_amount: "000000000000450000".to_string(),
            currency: "EUR".to_string(),
            cancellation_flag: "0".to_string(),
        }
    }

    #[test]
    fn test_valid_merchant() {
        let record = validate(Record::Merchant(merchant()), &ValidationContext::default()).unwrap();
        assert_eq!(record.field_value("reference_date"), Some("31032024"));
    }

    #[test]
    fn test_mcc_and_flag() {
        let bad = MerchantRecord {
            mcc: "58A2".to_string(),
            cancellation_flag: "Y".to_string(),
            ..merchant()
        };
        let causes = validate(Record::Merchant(bad), &ValidationContext::default()).unwrap_err();
        assert_eq!(
            codes(&causes),
            vec![ErrorCode::InvalidFormat, ErrorCode::InvalidValue]
        );
    }

    #[test]
    fn test_reference_date_before_period() {
        let q1 = ValidationContext::new(Some(ReportingPeriod {
            start: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        }));
        let causes = validate(Record::Merchant(merchant()), &q1).unwrap_err();
        assert_eq!(codes(&causes), vec![ErrorCode::InvalidDateFormat]);
        assert!(mentions(&causes, "reference_date"));

        let in_period = MerchantRecord {
            reference_date: "20240630".to_string(),
            ..merchant()
        };
        assert!(validate(Record::Merchant(in_period), &q1).is_ok());
    }
}
