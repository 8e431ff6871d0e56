use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::TimeclockError;
use crate::store::TimelineStore;

use super::{to_local, EmployeeCtx};

/// Redistributes the employee's overtime onto their attendance records so
/// each record exposes its share as `overtime_hours`.
///
/// Every record starts back at zero; each overtime row (adjustments
/// included, in date order) is then walked over the closed records whose
/// check-in and check-out both fall on its local date, most recent first.
/// A later row on the same date overwrites the earlier one's distribution.
pub async fn recompute(
    store: &mut dyn TimelineStore,
    ctx: &EmployeeCtx,
) -> Result<(), TimeclockError> {
    let records = store.attendance_for_employee(ctx.employee.id).await?;
    let overtimes = store.overtime_for_employee(ctx.employee.id).await?;

    let mut by_day: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (idx, record) in records.iter().enumerate() {
        let Some(check_out) = record.check_out else {
            continue;
        };
        let day_in = to_local(ctx.tz, record.check_in).date();
        if day_in == to_local(ctx.tz, check_out).date() {
            by_day.entry(day_in).or_default().push(idx);
        }
    }

    let mut hours = vec![0.0_f64; records.len()];
    for overtime in &overtimes {
        let Some(indices) = by_day.get(&overtime.date) else {
            continue;
        };
        let mut remaining = overtime.duration;
        // Records arrive in (check_in, id) order; walk them newest first.
        for &idx in indices.iter().rev() {
            if remaining <= 0.0 {
                hours[idx] = 0.0;
            } else {
                let worked = records[idx].worked_hours.unwrap_or(0.0);
                if worked <= remaining {
                    hours[idx] = worked;
                    remaining -= worked;
                } else {
                    hours[idx] = remaining;
                    remaining = 0.0;
                }
            }
        }
    }

    let assignments: Vec<(u64, f64)> = records
        .iter()
        .zip(&hours)
        .filter(|&(record, &share)| record.overtime_hours != share)
        .map(|(record, &share)| (record.id, share))
        .collect();
    store.set_overtime_hours(&assignments).await?;
    Ok(())
}
