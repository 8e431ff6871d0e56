use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::TimeclockError;
use crate::model::attendance::{Attendance, CaptureMetadata};
use crate::store::TimelineStore;

use super::day::{affected_buckets, merge_buckets, BucketMap, DayBucket};
use super::interval::IntervalSet;
use super::overtime;
use super::EmployeeCtx;

/// Who is performing a mutation. The officer capability covers admins.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub employee_id: Option<u64>,
    pub officer: bool,
}

/// Body of a manual attendance creation.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewAttendance {
    #[schema(example = 3)]
    pub employee_id: u64,
    #[schema(example = "2025-01-06T08:00:00", value_type = String, format = "date-time")]
    pub check_in: NaiveDateTime,
    #[schema(example = "2025-01-06T16:30:00", value_type = String, format = "date-time", nullable = true)]
    pub check_out: Option<NaiveDateTime>,
    #[serde(default)]
    pub in_meta: CaptureMetadata,
    #[serde(default)]
    pub out_meta: CaptureMetadata,
}

/// Body of an attendance update. Absent fields keep their value;
/// `clear_check_out` reopens the record.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AttendanceUpdate {
    #[schema(example = 3, nullable = true)]
    pub employee_id: Option<u64>,
    #[schema(example = "2025-01-06T08:00:00", value_type = String, format = "date-time", nullable = true)]
    pub check_in: Option<NaiveDateTime>,
    #[schema(example = "2025-01-06T16:30:00", value_type = String, format = "date-time", nullable = true)]
    pub check_out: Option<NaiveDateTime>,
    #[serde(default)]
    #[schema(example = false)]
    pub clear_check_out: bool,
    pub in_meta: Option<CaptureMetadata>,
    pub out_meta: Option<CaptureMetadata>,
}

impl AttendanceUpdate {
    /// Whether the update touches the timeline fields (as opposed to
    /// capture metadata only).
    fn touches_timeline(&self) -> bool {
        self.employee_id.is_some()
            || self.check_in.is_some()
            || self.check_out.is_some()
            || self.clear_check_out
    }
}

/// The non-overlap contract, checked against the candidate state of a record
/// before it is persisted. `record.id == 0` marks a record not yet inserted;
/// persisted rows are excluded from their own checks by id.
pub async fn check_validity(
    store: &mut dyn TimelineStore,
    record: &Attendance,
) -> Result<(), TimeclockError> {
    let exclude = (record.id != 0).then_some(record.id);

    if let Some(check_out) = record.check_out {
        if check_out < record.check_in {
            return Err(TimeclockError::check_out_before_check_in(record.check_in, check_out));
        }
    }

    let prev = store
        .last_starting_at_or_before(record.employee_id, record.check_in, exclude)
        .await?;
    if let Some(prev) = &prev {
        if prev.check_out.is_some_and(|out| out > record.check_in) {
            return Err(TimeclockError::already_checked_in(record.check_in));
        }
    }

    match record.check_out {
        None => {
            if let Some(open) = store.open_attendance(record.employee_id, exclude).await? {
                return Err(TimeclockError::still_checked_in(open.check_in));
            }
        }
        Some(check_out) => {
            let next = store
                .last_starting_before(record.employee_id, check_out, exclude)
                .await?;
            if let Some(next) = next {
                if prev.as_ref().map(|p| p.id) != Some(next.id) {
                    return Err(TimeclockError::record_inside_span(next.check_in));
                }
            }
        }
    }
    Ok(())
}

/// Net presence of a closed record: the raw span minus the calendar's lunch
/// breaks. Open records have no worked hours; without a calendar the raw
/// span counts.
pub fn worked_hours(ctx: &EmployeeCtx, record: &Attendance) -> Option<f64> {
    let check_out = record.check_out?;
    let span = IntervalSet::single(record.check_in, check_out, ());
    let hours = match &ctx.calendar {
        Some(calendar) => span
            .difference(&calendar.lunch_intervals(record.check_in, check_out))
            .total_hours(),
        None => span.total_hours(),
    };
    Some(hours)
}

pub async fn create(
    store: &mut dyn TimelineStore,
    new: &NewAttendance,
) -> Result<Attendance, TimeclockError> {
    store.lock_employee(new.employee_id).await?;
    let ctx = EmployeeCtx::load(store, new.employee_id).await?;

    let mut record = Attendance::open(new.employee_id, new.check_in, &new.in_meta);
    if let Some(check_out) = new.check_out {
        record.check_out = Some(check_out);
        record.apply_out_meta(&new.out_meta);
    }
    check_validity(store, &record).await?;
    record.worked_hours = worked_hours(&ctx, &record);
    record.id = store.insert_attendance(&record).await?;

    reconcile_days(store, &ctx, affected_buckets(ctx.tz, &ctx.company, &record)).await?;
    Ok(record)
}

pub async fn update(
    store: &mut dyn TimelineStore,
    actor: &Actor,
    id: u64,
    patch: &AttendanceUpdate,
) -> Result<Attendance, TimeclockError> {
    let mut record = store
        .attendance(id)
        .await?
        .ok_or(TimeclockError::NotFound { entity: "attendance", id })?;

    if let Some(target) = patch.employee_id {
        if target != record.employee_id && Some(target) != actor.employee_id && !actor.officer {
            return Err(TimeclockError::access(
                "reassigning an attendance to another employee requires the officer role",
            ));
        }
    }

    let old_employee = record.employee_id;
    let new_employee = patch.employee_id.unwrap_or(old_employee);
    let mut employees = vec![old_employee, new_employee];
    employees.sort_unstable();
    employees.dedup();
    for employee_id in employees {
        store.lock_employee(employee_id).await?;
    }

    let timeline_changed = patch.touches_timeline();
    let old_ctx = EmployeeCtx::load(store, old_employee).await?;
    let mut buckets = BucketMap::new();
    if timeline_changed {
        let before = affected_buckets(old_ctx.tz, &old_ctx.company, &record);
        if !before.is_empty() {
            buckets.insert(old_employee, before);
        }
    }

    if let Some(employee_id) = patch.employee_id {
        record.employee_id = employee_id;
    }
    if let Some(check_in) = patch.check_in {
        record.check_in = check_in;
    }
    if patch.clear_check_out {
        record.reopen();
    } else if let Some(check_out) = patch.check_out {
        record.check_out = Some(check_out);
    }
    if let Some(meta) = &patch.in_meta {
        record.apply_in_meta(meta);
    }
    if let Some(meta) = &patch.out_meta {
        if record.check_out.is_some() {
            record.apply_out_meta(meta);
        }
    }

    let ctx = if record.employee_id == old_employee {
        old_ctx
    } else {
        EmployeeCtx::load(store, record.employee_id).await?
    };

    if timeline_changed {
        check_validity(store, &record).await?;
        record.worked_hours = worked_hours(&ctx, &record);
    }
    store.update_attendance(&record).await?;

    if timeline_changed {
        let after = affected_buckets(ctx.tz, &ctx.company, &record);
        if !after.is_empty() {
            let mut after_map = BucketMap::new();
            after_map.insert(record.employee_id, after);
            merge_buckets(&mut buckets, after_map);
        }
        overtime::reconcile(store, &buckets).await?;
    }
    Ok(record)
}

pub async fn delete(store: &mut dyn TimelineStore, id: u64) -> Result<(), TimeclockError> {
    let record = store
        .attendance(id)
        .await?
        .ok_or(TimeclockError::NotFound { entity: "attendance", id })?;
    store.lock_employee(record.employee_id).await?;
    let ctx = EmployeeCtx::load(store, record.employee_id).await?;

    let days = affected_buckets(ctx.tz, &ctx.company, &record);
    store.delete_attendance(id).await?;
    reconcile_days(store, &ctx, days).await
}

/// Attendance records are never copied.
pub fn duplicate(_id: u64) -> Result<Attendance, TimeclockError> {
    Err(TimeclockError::Duplication)
}

/// Opens a record at `now` for the employee.
pub async fn check_in(
    store: &mut dyn TimelineStore,
    employee_id: u64,
    now: NaiveDateTime,
    meta: &CaptureMetadata,
) -> Result<Attendance, TimeclockError> {
    store.lock_employee(employee_id).await?;
    let ctx = EmployeeCtx::load(store, employee_id).await?;

    let mut record = Attendance::open(employee_id, now, meta);
    check_validity(store, &record).await?;
    record.id = store.insert_attendance(&record).await?;

    // An open record zeroes any stale overtime row on its day.
    reconcile_days(store, &ctx, affected_buckets(ctx.tz, &ctx.company, &record)).await?;
    Ok(record)
}

/// Closes the employee's open record at `now`.
pub async fn check_out(
    store: &mut dyn TimelineStore,
    employee_id: u64,
    now: NaiveDateTime,
    meta: &CaptureMetadata,
) -> Result<Attendance, TimeclockError> {
    store.lock_employee(employee_id).await?;
    let ctx = EmployeeCtx::load(store, employee_id).await?;

    let mut record = store
        .open_attendance(employee_id, None)
        .await?
        .ok_or(TimeclockError::NoOpenAttendance { employee: employee_id })?;

    let mut days = affected_buckets(ctx.tz, &ctx.company, &record);
    record.check_out = Some(now);
    record.apply_out_meta(meta);
    check_validity(store, &record).await?;
    record.worked_hours = worked_hours(&ctx, &record);
    store.update_attendance(&record).await?;

    days.extend(affected_buckets(ctx.tz, &ctx.company, &record));
    reconcile_days(store, &ctx, days).await?;
    Ok(record)
}

async fn reconcile_days(
    store: &mut dyn TimelineStore,
    ctx: &EmployeeCtx,
    days: BTreeSet<DayBucket>,
) -> Result<(), TimeclockError> {
    if days.is_empty() {
        return Ok(());
    }
    let mut buckets = BucketMap::new();
    buckets.insert(ctx.employee.id, days);
    overtime::reconcile(store, &buckets).await
}
