pub mod attribution;
pub mod calendar;
pub mod day;
pub mod interval;
pub mod overtime;
pub mod presence;
pub mod rounding;
pub mod settings;
pub mod timeline;

use std::sync::Arc;

use chrono::{Duration, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::error::TimeclockError;
use crate::model::company::Company;
use crate::model::employee::Employee;
use crate::store::TimelineStore;

use self::calendar::WorkCalendar;

/// Converts a naive-UTC instant to the wall clock of `tz`.
pub fn to_local(tz: Tz, utc: NaiveDateTime) -> NaiveDateTime {
    utc.and_utc().with_timezone(&tz).naive_local()
}

/// Converts a wall-clock instant in `tz` back to naive UTC. An ambiguous
/// local time (DST fold) resolves to the earlier offset; a local time
/// skipped by a DST jump is shifted forward an hour to the first valid
/// instant after the jump.
pub fn to_utc(tz: Tz, local: NaiveDateTime) -> NaiveDateTime {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.naive_utc(),
        LocalResult::Ambiguous(earlier, _) => earlier.naive_utc(),
        LocalResult::None => {
            let shifted = local + Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .map_or(shifted, |dt| dt.naive_utc())
        }
    }
}

/// Employee plus everything the engine derives state from: the company
/// (overtime settings), the resolved work calendar and the employee's
/// timezone. Loaded once per mutation, inside its transaction.
pub struct EmployeeCtx {
    pub employee: Employee,
    pub company: Company,
    pub calendar: Option<Arc<WorkCalendar>>,
    pub tz: Tz,
}

impl EmployeeCtx {
    pub async fn load(
        store: &mut dyn TimelineStore,
        employee_id: u64,
    ) -> Result<Self, TimeclockError> {
        let employee = store.employee(employee_id).await?.ok_or(TimeclockError::NotFound {
            entity: "employee",
            id: employee_id,
        })?;
        let company = store.company(employee.company_id).await?.ok_or(TimeclockError::NotFound {
            entity: "company",
            id: employee.company_id,
        })?;
        let calendar = match employee.calendar_id.or(company.calendar_id) {
            Some(calendar_id) => store.calendar(calendar_id).await?,
            None => None,
        };
        // Unknown or empty tz names degrade to UTC rather than failing the request.
        let tz = employee.tz.parse().unwrap_or(chrono_tz::UTC);
        Ok(EmployeeCtx {
            employee,
            company,
            calendar,
            tz,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn local_round_trip_outside_transitions() {
        let tz: Tz = "Europe/Brussels".parse().unwrap();
        let utc = dt(2025, 1, 6, 8, 0);
        let local = to_local(tz, utc);
        assert_eq!(local, dt(2025, 1, 6, 9, 0));
        assert_eq!(to_utc(tz, local), utc);
    }

    #[test]
    fn dst_gap_shifts_forward() {
        let tz: Tz = "Europe/Brussels".parse().unwrap();
        // 2025-03-30 02:30 does not exist in Brussels (clocks jump 02:00 -> 03:00).
        let skipped = dt(2025, 3, 30, 2, 30);
        assert_eq!(to_utc(tz, skipped), dt(2025, 3, 30, 1, 30));
    }

    #[test]
    fn dst_fold_takes_earlier_offset() {
        let tz: Tz = "Europe/Brussels".parse().unwrap();
        // 2025-10-26 02:30 occurs twice; the earlier pass is still CEST (UTC+2).
        let folded = dt(2025, 10, 26, 2, 30);
        assert_eq!(to_utc(tz, folded), dt(2025, 10, 26, 0, 30));
    }
}
