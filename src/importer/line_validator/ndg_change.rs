// ==========================================
// NDG 变更 (CambioNdg) 校验
// ==========================================

use super::{begin, kind_mismatch, ValidationContext, Verdict, NDG_RULES};
use crate::domain::error_record::ErrorCause;
use crate::domain::records::Record;
use crate::domain::types::{ErrorCode, RecordKind};

pub fn validate(record: Record, _ctx: &ValidationContext) -> Verdict {
    let Record::NdgChange(r) = &record else {
        return kind_mismatch(RecordKind::NdgChange, &record);
    };

    let mut checks = begin(&r.raw_row, &r.intermediary);
    let old_ok = checks.check("old_ndg", &r.old_ndg, NDG_RULES);
    let new_ok = checks.check("new_ndg", &r.new_ndg, NDG_RULES);
    if old_ok && new_ok && r.old_ndg == r.new_ndg {
        checks.push(ErrorCause::new(
            ErrorCode::InvalidValue,
            format!("new_ndg: '{}' equals old_ndg", r.new_ndg),
        ));
    }
    checks.date("change_date", &r.change_date, true);

    checks.finish(record)
}
