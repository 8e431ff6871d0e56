use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::TimeclockError;
use crate::model::attendance::Attendance;
use crate::model::overtime::Overtime;
use crate::store::TimelineStore;

use super::attribution;
use super::day::{BucketMap, DayBucket};
use super::interval::{Interval, IntervalSet};
use super::rounding::is_zero2;
use super::{to_local, EmployeeCtx};

/// Outcome of computing one day's overtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayOvertime {
    pub duration: f64,
    pub duration_real: f64,
    pub has_open: bool,
}

impl DayOvertime {
    fn zero(has_open: bool) -> Self {
        DayOvertime {
            duration: 0.0,
            duration_real: 0.0,
            has_open,
        }
    }
}

fn hours_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_seconds() as f64 / 3600.0
}

/// Computes one day's overtime from its attendance records and the day's
/// expected work and lunch intervals. All instants share the naive-UTC
/// frame; thresholds are in hours.
///
/// Touching records are merged into presence spans before the threshold
/// logic runs, so an interior boundary never snaps onto the planned start
/// or end.
pub fn compute_day(
    records: &[Attendance],
    expected: &IntervalSet<u64>,
    lunch: &IntervalSet<u64>,
    company_threshold: f64,
    employee_threshold: f64,
) -> DayOvertime {
    let has_open = records.iter().any(Attendance::is_open);
    if records.is_empty() || has_open {
        return DayOvertime::zero(has_open);
    }

    let total_worked: f64 = records.iter().filter_map(|r| r.worked_hours).sum();
    let (Some(planned_start), Some(planned_end)) =
        (expected.earliest_start(), expected.latest_stop())
    else {
        // Unscheduled day: everything worked is overtime.
        return DayOvertime {
            duration: total_worked,
            duration_real: total_worked,
            has_open: false,
        };
    };
    let planned_hours = expected.total_hours();

    let spans: IntervalSet<u64> = records
        .iter()
        .filter_map(|r| r.check_out.map(|out| Interval::new(r.check_in, out, r.id)))
        .collect();

    let mut pre_work = 0.0;
    let mut work = 0.0;
    let mut post_work = 0.0;
    for span in spans.iter() {
        let mut local_in = span.start;
        let mut local_out = span.stop;

        let delta_in = hours_between(local_in, planned_start);
        if (delta_in > 0.0 && delta_in <= company_threshold)
            || (delta_in < 0.0 && -delta_in <= employee_threshold)
        {
            local_in = planned_start;
        }
        let delta_out = hours_between(planned_end, local_out);
        if (delta_out > 0.0 && delta_out <= company_threshold)
            || (delta_out < 0.0 && -delta_out <= employee_threshold)
        {
            local_out = planned_end;
        }

        if local_in < planned_start {
            pre_work += hours_between(local_in, local_out.min(planned_start));
        }
        if local_in <= planned_end && local_out >= planned_start {
            let overlap_start = local_in.max(planned_start);
            let overlap_stop = local_out.min(planned_end);
            work += IntervalSet::single(overlap_start, overlap_stop, ())
                .difference(lunch)
                .total_hours();
        }
        if local_out > planned_end {
            post_work += hours_between(local_in.max(planned_end), local_out);
        }
    }

    let mut duration = work - planned_hours;
    if pre_work > company_threshold {
        duration += pre_work;
    }
    if post_work > company_threshold {
        duration += post_work;
    }
    DayOvertime {
        duration,
        duration_real: total_worked - planned_hours,
        has_open: false,
    }
}

/// Rebuilds the overtime rows covering the given day buckets, then rewrites
/// attendance overtime attribution for every employee whose rows changed.
/// Reconciling the same buckets twice without intervening mutations changes
/// nothing the second time.
pub async fn reconcile(
    store: &mut dyn TimelineStore,
    buckets: &BucketMap,
) -> Result<(), TimeclockError> {
    for (&employee_id, days) in buckets {
        if days.is_empty() {
            continue;
        }
        let ctx = EmployeeCtx::load(store, employee_id).await?;
        reconcile_employee(store, &ctx, days).await?;
    }
    Ok(())
}

async fn reconcile_employee(
    store: &mut dyn TimelineStore,
    ctx: &EmployeeCtx,
    days: &BTreeSet<DayBucket>,
) -> Result<(), TimeclockError> {
    let (Some(first), Some(last)) = (days.iter().next(), days.iter().last()) else {
        return Ok(());
    };
    let span_start = first.start_utc;
    let span_stop = last.window().1;
    let (company_threshold, employee_threshold) = ctx.company.thresholds_hours();

    let windows: Vec<_> = days.iter().map(DayBucket::window).collect();
    let records = store
        .attendance_in_windows(ctx.employee.id, &windows)
        .await?;
    let mut records_by_day: BTreeMap<NaiveDate, Vec<Attendance>> = BTreeMap::new();
    for record in records {
        let day = to_local(ctx.tz, record.check_in).date();
        records_by_day.entry(day).or_default().push(record);
    }

    // Expected time over the whole span, grouped by the local date each
    // interval starts on. Lunches stay as one set; subtraction clips itself.
    let (expected_by_day, lunch) = match &ctx.calendar {
        Some(calendar) => {
            let leaves = store
                .time_off_overlapping(ctx.company.id, ctx.employee.id, span_start, span_stop)
                .await?;
            let mut grouped: BTreeMap<NaiveDate, Vec<Interval<u64>>> = BTreeMap::new();
            for interval in calendar
                .expected_intervals(&leaves, span_start, span_stop)
                .iter()
            {
                let day = to_local(ctx.tz, interval.start).date();
                grouped.entry(day).or_default().push(interval.clone());
            }
            let by_day = grouped
                .into_iter()
                .map(|(day, intervals)| (day, IntervalSet::from_intervals(intervals)))
                .collect::<BTreeMap<_, _>>();
            (by_day, calendar.lunch_intervals(span_start, span_stop))
        }
        None => (BTreeMap::new(), IntervalSet::new()),
    };

    let dates: Vec<NaiveDate> = days.iter().map(|b| b.day).collect();
    let mut existing_by_day: BTreeMap<NaiveDate, Overtime> = store
        .overtime_on_days(ctx.employee.id, &dates)
        .await?
        .into_iter()
        .map(|row| (row.date, row))
        .collect();

    let no_records: Vec<Attendance> = Vec::new();
    let no_expected = IntervalSet::new();
    let mut creates: Vec<Overtime> = Vec::new();
    let mut updates: Vec<(u64, f64, f64)> = Vec::new();
    let mut deletes: Vec<u64> = Vec::new();

    for bucket in days {
        let day_records = records_by_day.get(&bucket.day).unwrap_or(&no_records);
        let expected = expected_by_day.get(&bucket.day).unwrap_or(&no_expected);
        let outcome = compute_day(
            day_records,
            expected,
            &lunch,
            company_threshold,
            employee_threshold,
        );
        let existing = existing_by_day.remove(&bucket.day);

        if !is_zero2(outcome.duration) || outcome.has_open {
            // A day with an open shift never carries overtime; a stale row
            // is zeroed rather than deleted.
            let (duration, duration_real) = if outcome.has_open {
                (0.0, 0.0)
            } else {
                (outcome.duration, outcome.duration_real)
            };
            match existing {
                None => {
                    if duration != 0.0 {
                        creates.push(Overtime::computed(
                            ctx.employee.id,
                            bucket.day,
                            duration,
                            duration_real,
                        ));
                    }
                }
                Some(row) => {
                    if row.duration != duration || row.duration_real != duration_real {
                        updates.push((row.id, duration, duration_real));
                    }
                }
            }
        } else if let Some(row) = existing {
            deletes.push(row.id);
        }
    }

    let changed = !(creates.is_empty() && updates.is_empty() && deletes.is_empty());
    store.insert_overtime_batch(&creates).await?;
    for (id, duration, duration_real) in &updates {
        store
            .update_overtime_durations(*id, *duration, *duration_real)
            .await?;
    }
    store.delete_overtime_batch(&deletes).await?;

    if changed {
        attribution::recompute(store, ctx).await?;
    }
    Ok(())
}

/// Records a manual adjustment row and redistributes the employee's
/// attendance overtime. Adjustments carry only `duration`.
pub async fn create_adjustment(
    store: &mut dyn TimelineStore,
    employee_id: u64,
    date: NaiveDate,
    duration: f64,
    note: Option<String>,
) -> Result<Overtime, TimeclockError> {
    store.lock_employee(employee_id).await?;
    let ctx = EmployeeCtx::load(store, employee_id).await?;
    let mut row = Overtime {
        id: 0,
        employee_id,
        date,
        duration,
        duration_real: 0.0,
        adjustment: true,
        note,
    };
    row.id = store.insert_overtime(&row).await?;
    attribution::recompute(store, &ctx).await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::CaptureMetadata;
    use chrono::NaiveDate;

    fn dt(h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn closed(id: u64, check_in: NaiveDateTime, check_out: NaiveDateTime, worked: f64) -> Attendance {
        let mut record = Attendance::open(1, check_in, &CaptureMetadata::default());
        record.id = id;
        record.check_out = Some(check_out);
        record.worked_hours = Some(worked);
        record
    }

    fn nine_to_five() -> IntervalSet<u64> {
        IntervalSet::single(dt(9, 0), dt(17, 0), 1)
    }

    fn split_schedule() -> (IntervalSet<u64>, IntervalSet<u64>) {
        let expected = IntervalSet::from_intervals(vec![
            Interval::new(dt(9, 0), dt(12, 0), 1),
            Interval::new(dt(13, 0), dt(17, 0), 2),
        ]);
        let lunch = IntervalSet::single(dt(12, 0), dt(13, 0), 3);
        (expected, lunch)
    }

    #[test]
    fn no_records_yields_zero() {
        let outcome = compute_day(&[], &nine_to_five(), &IntervalSet::new(), 0.25, 0.0);
        assert_eq!(outcome, DayOvertime::zero(false));
    }

    #[test]
    fn open_record_flags_the_day() {
        let open = Attendance::open(1, dt(8, 0), &CaptureMetadata::default());
        let records = vec![closed(1, dt(6, 0), dt(7, 0), 1.0), open];
        let outcome = compute_day(&records, &nine_to_five(), &IntervalSet::new(), 0.25, 0.0);
        assert!(outcome.has_open);
        assert_eq!(outcome.duration, 0.0);
        assert_eq!(outcome.duration_real, 0.0);
    }

    #[test]
    fn unscheduled_day_counts_everything_worked() {
        let records = vec![closed(1, dt(8, 0), dt(12, 0), 4.0)];
        let outcome = compute_day(&records, &IntervalSet::new(), &IntervalSet::new(), 0.25, 0.0);
        assert_eq!(outcome.duration, 4.0);
        assert_eq!(outcome.duration_real, 4.0);
    }

    #[test]
    fn deltas_within_company_threshold_snap_away() {
        // 08:55 -> 17:10 against 09:00-17:00, 15 min company tolerance.
        let records = vec![closed(1, dt(8, 55), dt(17, 10), 8.25)];
        let outcome = compute_day(&records, &nine_to_five(), &IntervalSet::new(), 0.25, 0.0);
        assert!(outcome.duration.abs() < 1e-9);
        assert!((outcome.duration_real - 0.25).abs() < 1e-9);
    }

    #[test]
    fn late_arrival_beyond_employee_threshold_goes_negative() {
        let records = vec![closed(1, dt(9, 30), dt(17, 0), 7.5)];
        let outcome = compute_day(&records, &nine_to_five(), &IntervalSet::new(), 0.25, 0.0);
        assert!((outcome.duration + 0.5).abs() < 1e-9);
        assert!((outcome.duration_real + 0.5).abs() < 1e-9);
    }

    #[test]
    fn late_arrival_within_employee_threshold_is_forgiven() {
        let records = vec![closed(1, dt(9, 10), dt(17, 0), 7.0 + 50.0 / 60.0)];
        let outcome = compute_day(&records, &nine_to_five(), &IntervalSet::new(), 0.0, 0.25);
        assert!(outcome.duration.abs() < 1e-9);
    }

    #[test]
    fn overtime_past_planned_end_beyond_threshold_counts() {
        let records = vec![closed(1, dt(9, 0), dt(18, 0), 9.0)];
        let outcome = compute_day(&records, &nine_to_five(), &IntervalSet::new(), 0.25, 0.0);
        assert!((outcome.duration - 1.0).abs() < 1e-9);
        assert!((outcome.duration_real - 1.0).abs() < 1e-9);
    }

    #[test]
    fn early_arrival_beyond_threshold_counts_as_pre_work() {
        let records = vec![closed(1, dt(8, 30), dt(17, 0), 8.5)];
        let outcome = compute_day(&records, &nine_to_five(), &IntervalSet::new(), 0.25, 0.0);
        assert!((outcome.duration - 0.5).abs() < 1e-9);
    }

    #[test]
    fn lunch_does_not_count_inside_the_planned_window() {
        let (expected, lunch) = split_schedule();
        let records = vec![closed(1, dt(9, 0), dt(17, 0), 7.0)];
        let outcome = compute_day(&records, &expected, &lunch, 0.25, 0.0);
        assert!(outcome.duration.abs() < 1e-9);
        assert!(outcome.duration_real.abs() < 1e-9);
    }

    #[test]
    fn touching_records_do_not_snap_on_interior_boundaries() {
        // The 09:30 boundary sits within the employee tolerance of the 09:00
        // start; merging the spans first keeps it from snapping and
        // double-counting 09:00-09:30.
        let (expected, lunch) = split_schedule();
        let records = vec![
            closed(1, dt(8, 55), dt(9, 30), 35.0 / 60.0),
            closed(2, dt(9, 30), dt(17, 0), 6.5),
        ];
        let outcome = compute_day(&records, &expected, &lunch, 0.25, 0.75);
        assert!(outcome.duration.abs() < 1e-9);
    }

    #[test]
    fn split_day_worked_exactly_has_no_overtime() {
        let (expected, lunch) = split_schedule();
        let records = vec![
            closed(1, dt(9, 0), dt(12, 0), 3.0),
            closed(2, dt(13, 0), dt(17, 0), 4.0),
        ];
        let outcome = compute_day(&records, &expected, &lunch, 0.0, 0.0);
        assert!(outcome.duration.abs() < 1e-9);
        assert!(outcome.duration_real.abs() < 1e-9);
    }
}
