use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A time-off span subtracted from expected working time. Rows without an
/// employee are company-wide (public holidays, collective closures).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 2,
    "company_id": 1,
    "employee_id": null,
    "date_from": "2025-05-01T00:00:00",
    "date_to": "2025-05-02T00:00:00",
    "reason": "Labour Day"
}))]
pub struct TimeOff {
    #[schema(example = 2)]
    pub id: u64,
    #[schema(example = 1)]
    pub company_id: u64,
    /// `NULL` marks a company-wide row.
    #[schema(example = 3, nullable = true)]
    pub employee_id: Option<u64>,
    #[schema(example = "2025-05-01T00:00:00", value_type = String, format = "date-time")]
    pub date_from: NaiveDateTime,
    #[schema(example = "2025-05-02T00:00:00", value_type = String, format = "date-time")]
    pub date_to: NaiveDateTime,
    #[schema(example = "Labour Day", nullable = true)]
    pub reason: Option<String>,
}
