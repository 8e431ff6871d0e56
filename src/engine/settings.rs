use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveTime};
use chrono_tz::Tz;

use crate::error::TimeclockError;
use crate::model::attendance::Attendance;
use crate::model::company::{Company, OvertimeSettings};
use crate::model::time_off::TimeOff;
use crate::store::TimelineStore;

use super::day::{affected_buckets, BucketMap};
use super::{attribution, overtime, EmployeeCtx};

/// Applies new overtime settings to a company and brings every derived
/// overtime row in line, all inside the caller's transaction:
///
/// - disabling wipes the company's computed rows and its start date;
/// - enabling, or changing thresholds while enabled, rescans attendance
///   from the start date;
/// - moving the start date earlier rescans the newly covered stretch;
/// - moving it later just purges rows that fell out of range.
pub async fn update_overtime_settings(
    store: &mut dyn TimelineStore,
    company_id: u64,
    new: &OvertimeSettings,
) -> Result<Company, TimeclockError> {
    store.lock_company(company_id).await?;
    let mut company = store
        .company(company_id)
        .await?
        .ok_or(TimeclockError::NotFound { entity: "company", id: company_id })?;

    let was_enabled = company.overtime_enabled;
    let old_start = company.overtime_start_date;
    let old_thresholds = (
        company.company_threshold_minutes,
        company.employee_threshold_minutes,
    );

    company.overtime_enabled = new.overtime_enabled;
    company.overtime_start_date = new.overtime_start_date;
    company.company_threshold_minutes = new.company_threshold_minutes;
    company.employee_threshold_minutes = new.employee_threshold_minutes;

    if was_enabled && !company.overtime_enabled {
        company.overtime_start_date = None;
        store.save_overtime_settings(&company).await?;
        purge_computed(store, company_id, None).await?;
        return Ok(company);
    }

    store.save_overtime_settings(&company).await?;
    if !company.overtime_enabled {
        return Ok(company);
    }

    let start_changed = old_start != company.overtime_start_date;
    let thresholds_changed = old_thresholds
        != (
            company.company_threshold_minutes,
            company.employee_threshold_minutes,
        );

    if !was_enabled {
        rescan(store, &company, company.overtime_start_date, None).await?;
    } else if start_changed {
        match (old_start, company.overtime_start_date) {
            (Some(old), Some(new_start)) if new_start < old => {
                rescan(store, &company, Some(new_start), Some(old)).await?;
            }
            (Some(old), None) => {
                rescan(store, &company, None, Some(old)).await?;
            }
            (_, Some(new_start)) => {
                purge_computed(store, company_id, Some(new_start)).await?;
            }
            (None, None) => {}
        }
    } else if thresholds_changed {
        rescan(store, &company, company.overtime_start_date, None).await?;
    }
    Ok(company)
}

/// Inserts a time-off row and refreshes overtime for the attendance days it
/// touches (all company employees for company-wide rows).
pub async fn record_time_off(
    store: &mut dyn TimelineStore,
    mut row: TimeOff,
) -> Result<TimeOff, TimeclockError> {
    if row.date_to <= row.date_from {
        return Err(TimeclockError::validation(
            "time off must end after it starts",
        ));
    }
    match row.employee_id {
        Some(employee_id) => store.lock_employee(employee_id).await?,
        None => store.lock_company(row.company_id).await?,
    }
    let company = store
        .company(row.company_id)
        .await?
        .ok_or(TimeclockError::NotFound { entity: "company", id: row.company_id })?;
    row.id = store.insert_time_off(&row).await?;

    if !company.overtime_enabled {
        return Ok(row);
    }
    let coarse_from = row.date_from - Duration::hours(24);
    let coarse_to = row.date_to + Duration::hours(24);
    let records = match row.employee_id {
        Some(employee_id) => {
            store
                .attendance_in_windows(employee_id, &[(coarse_from, coarse_to)])
                .await?
        }
        None => {
            store
                .attendance_for_company(row.company_id, Some(coarse_from), Some(coarse_to))
                .await?
        }
    };
    let buckets = collect_buckets(store, &company, &records, None).await?;
    overtime::reconcile(store, &buckets).await?;
    Ok(row)
}

/// Reconciles every bucket derived from the company's attendance whose
/// check-in falls between the bounds (local dates, inclusive). The SQL
/// prefilter is coarse; bucket collection applies the exact local-date
/// filter.
async fn rescan(
    store: &mut dyn TimelineStore,
    company: &Company,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(), TimeclockError> {
    // 24h margins absorb any timezone offset around local midnight.
    let coarse_from = from.map(|d| d.and_time(NaiveTime::MIN) - Duration::hours(24));
    let coarse_to = to.map(|d| d.and_time(NaiveTime::MIN) + Duration::hours(48));
    let records = store
        .attendance_for_company(company.id, coarse_from, coarse_to)
        .await?;
    let buckets = collect_buckets(store, company, &records, to).await?;
    overtime::reconcile(store, &buckets).await
}

async fn collect_buckets(
    store: &mut dyn TimelineStore,
    company: &Company,
    records: &[Attendance],
    upper: Option<NaiveDate>,
) -> Result<BucketMap, TimeclockError> {
    let mut timezones: BTreeMap<u64, Tz> = BTreeMap::new();
    let mut buckets = BucketMap::new();
    for record in records {
        let tz = match timezones.get(&record.employee_id) {
            Some(tz) => *tz,
            None => {
                let employee = store.employee(record.employee_id).await?.ok_or(
                    TimeclockError::NotFound { entity: "employee", id: record.employee_id },
                )?;
                let tz = employee.tz.parse().unwrap_or(chrono_tz::UTC);
                timezones.insert(record.employee_id, tz);
                tz
            }
        };
        let mut days = affected_buckets(tz, company, record);
        if let Some(limit) = upper {
            days.retain(|bucket| bucket.day <= limit);
        }
        if !days.is_empty() {
            buckets.entry(record.employee_id).or_default().extend(days);
        }
    }
    Ok(buckets)
}

/// Deletes computed rows (optionally only those dated before `before`) for
/// every employee of the company and redistributes attendance overtime
/// where rows went away.
async fn purge_computed(
    store: &mut dyn TimelineStore,
    company_id: u64,
    before: Option<NaiveDate>,
) -> Result<(), TimeclockError> {
    for employee in store.employees_of_company(company_id).await? {
        let removed = store.delete_computed_overtime(employee.id, before).await?;
        if removed > 0 {
            let ctx = EmployeeCtx::load(store, employee.id).await?;
            attribution::recompute(store, &ctx).await?;
        }
    }
    Ok(())
}
