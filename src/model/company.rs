use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Company row. Owns the overtime settings consumed by the reconciliation
/// engine and the display flags surfaced in the employee info projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "name": "Acme Logistics",
    "calendar_id": 1,
    "overtime_enabled": true,
    "overtime_start_date": "2025-01-01",
    "company_threshold_minutes": 15,
    "employee_threshold_minutes": 0,
    "display_overtime": true,
    "display_systray": true,
    "use_pin": false
}))]
pub struct Company {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Acme Logistics")]
    pub name: String,
    /// Default work calendar for employees without their own.
    #[schema(example = 1, nullable = true)]
    pub calendar_id: Option<u64>,
    #[schema(example = true)]
    pub overtime_enabled: bool,
    /// Attendance before this local date is ignored by reconciliation.
    #[schema(example = "2025-01-01", value_type = String, format = "date", nullable = true)]
    pub overtime_start_date: Option<NaiveDate>,
    /// Grace minutes in favor of the company (early arrival / late departure).
    #[schema(example = 15)]
    pub company_threshold_minutes: u32,
    /// Grace minutes in favor of the employee (late arrival / early departure).
    #[schema(example = 0)]
    pub employee_threshold_minutes: u32,
    #[schema(example = true)]
    pub display_overtime: bool,
    #[schema(example = true)]
    pub display_systray: bool,
    #[schema(example = false)]
    pub use_pin: bool,
}

impl Company {
    /// Threshold pair converted to hours, ready for the overtime computation.
    pub fn thresholds_hours(&self) -> (f64, f64) {
        (
            f64::from(self.company_threshold_minutes) / 60.0,
            f64::from(self.employee_threshold_minutes) / 60.0,
        )
    }
}

/// The settings surface applied through `PUT /company/{id}/overtime-settings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "overtime_enabled": true,
    "overtime_start_date": "2025-01-01",
    "company_threshold_minutes": 15,
    "employee_threshold_minutes": 10
}))]
pub struct OvertimeSettings {
    pub overtime_enabled: bool,
    #[schema(value_type = String, format = "date", nullable = true)]
    pub overtime_start_date: Option<NaiveDate>,
    pub company_threshold_minutes: u32,
    pub employee_threshold_minutes: u32,
}

impl From<&Company> for OvertimeSettings {
    fn from(company: &Company) -> Self {
        OvertimeSettings {
            overtime_enabled: company.overtime_enabled,
            overtime_start_date: company.overtime_start_date,
            company_threshold_minutes: company.company_threshold_minutes,
            employee_threshold_minutes: company.employee_threshold_minutes,
        }
    }
}
