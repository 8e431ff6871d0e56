use chrono::{Datelike, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use utoipa::ToSchema;

use crate::error::TimeclockError;
use crate::store::TimelineStore;

use super::rounding::round2;
use super::{to_local, to_utc, EmployeeCtx};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceState {
    CheckedIn,
    CheckedOut,
}

/// Read-time presence figures for one employee. Nothing here is stored;
/// every field is derived from the timeline at the requested instant.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PresenceSummary {
    pub attendance_state: AttendanceState,
    pub hours_today: f64,
    pub hours_previously_today: f64,
    pub last_attendance_worked_hours: f64,
    pub hours_last_month: f64,
    pub total_overtime: f64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_check_in: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_check_out: Option<NaiveDateTime>,
}

pub async fn summary(
    store: &mut dyn TimelineStore,
    ctx: &EmployeeCtx,
    now: NaiveDateTime,
) -> Result<PresenceSummary, TimeclockError> {
    let employee_id = ctx.employee.id;

    let latest = store.latest_attendance(employee_id).await?;
    let attendance_state = match &latest {
        Some(record) if record.is_open() => AttendanceState::CheckedIn,
        _ => AttendanceState::CheckedOut,
    };
    let last_check_in = latest.as_ref().map(|r| r.check_in);
    let last_check_out = latest.as_ref().and_then(|r| r.check_out);

    // Presence overlapping the employee-local day, clipped at local midnight.
    let today = to_local(ctx.tz, now).date();
    let day_start = to_utc(ctx.tz, today.and_time(NaiveTime::MIN));
    let mut hours_today = 0.0;
    let mut last_contribution = 0.0;
    for record in store.attendance_touching(employee_id, day_start, now).await? {
        let stop = record.check_out.unwrap_or(now);
        let start = record.check_in.max(day_start);
        last_contribution = (stop - start).num_seconds() as f64 / 3600.0;
        hours_today += last_contribution;
    }

    let month_first = today.with_day(1).unwrap_or(today);
    let month_start = to_utc(ctx.tz, month_first.and_time(NaiveTime::MIN));
    let hours_last_month = round2(
        store
            .closed_attendance_between(employee_id, month_start, now)
            .await?
            .iter()
            .filter_map(|r| r.worked_hours)
            .sum(),
    );

    let total_overtime = if ctx.company.overtime_enabled {
        round2(
            store
                .overtime_for_employee(employee_id)
                .await?
                .iter()
                .map(|row| row.duration)
                .sum(),
        )
    } else {
        0.0
    };

    Ok(PresenceSummary {
        attendance_state,
        hours_today,
        hours_previously_today: hours_today - last_contribution,
        last_attendance_worked_hours: last_contribution,
        hours_last_month,
        total_overtime,
        last_check_in,
        last_check_out,
    })
}
