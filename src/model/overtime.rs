use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One reconciled overtime delta for one employee on one local calendar day.
///
/// `duration` is the effective overtime after threshold clipping, `duration_real`
/// ignores thresholds. At most one non-adjustment row exists per
/// `(employee_id, date)`; adjustment rows are manual corrections the engine
/// never creates, updates, or deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 12,
    "employee_id": 3,
    "date": "2025-01-11",
    "duration": 4.0,
    "duration_real": 4.0,
    "adjustment": false,
    "note": null
}))]
pub struct Overtime {
    #[schema(example = 12)]
    pub id: u64,
    #[schema(example = 3)]
    pub employee_id: u64,
    #[schema(example = "2025-01-11", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = 4.0)]
    pub duration: f64,
    #[schema(example = 4.0)]
    pub duration_real: f64,
    #[schema(example = false)]
    pub adjustment: bool,
    #[schema(example = "forgot badge, corrected by HR", nullable = true)]
    pub note: Option<String>,
}

impl Overtime {
    /// A computed (non-adjustment) row as produced by the reconciliation engine.
    pub fn computed(employee_id: u64, date: NaiveDate, duration: f64, duration_real: f64) -> Self {
        Overtime {
            id: 0,
            employee_id,
            date,
            duration,
            duration_real,
            adjustment: false,
            note: None,
        }
    }
}
