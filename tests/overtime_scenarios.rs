//! Overtime reconciliation scenarios run end to end against the in-memory
//! store: a Brussels employee on a Mon-Fri 09:00-17:00 calendar with a
//! 12:00-13:00 lunch (7 planned hours per weekday).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use timeclock::engine::calendar::WorkCalendar;
use timeclock::engine::presence::AttendanceState;
use timeclock::engine::timeline::{self, Actor, AttendanceUpdate, NewAttendance};
use timeclock::engine::{overtime, presence, settings, to_utc, EmployeeCtx};
use timeclock::error::TimeclockError;
use timeclock::model::attendance::{Attendance, CaptureMetadata};
use timeclock::model::calendar::{CalendarSlotRow, SlotKind, WorkCalendarRow};
use timeclock::model::company::{Company, OvertimeSettings};
use timeclock::model::employee::Employee;
use timeclock::model::overtime::Overtime;
use timeclock::model::time_off::TimeOff;
use timeclock::store::MemStore;

const EMPLOYEE: u64 = 2;
const OFFICER: Actor = Actor {
    employee_id: None,
    officer: true,
};

fn d(y: i32, mo: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, mo, day).unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Brussels wall clock to the naive-UTC frame the engine works in.
fn bx(y: i32, mo: u32, day: u32, h: u32, mi: u32) -> NaiveDateTime {
    to_utc(
        "Europe/Brussels".parse().unwrap(),
        d(y, mo, day).and_hms_opt(h, mi, 0).unwrap(),
    )
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn slot(id: u64, weekday: u8, start: NaiveTime, end: NaiveTime, kind: SlotKind) -> CalendarSlotRow {
    CalendarSlotRow {
        id,
        calendar_id: 1,
        weekday,
        start_time: start,
        end_time: end,
        kind,
    }
}

fn standard_week() -> WorkCalendar {
    let header = WorkCalendarRow {
        id: 1,
        name: "Standard week".into(),
        tz: "Europe/Brussels".into(),
    };
    let mut rows = Vec::new();
    for weekday in 0..5u8 {
        let base = u64::from(weekday) * 3;
        rows.push(slot(base + 1, weekday, t(9, 0), t(12, 0), SlotKind::Work));
        rows.push(slot(base + 2, weekday, t(13, 0), t(17, 0), SlotKind::Work));
        rows.push(slot(base + 3, weekday, t(12, 0), t(13, 0), SlotKind::Lunch));
    }
    WorkCalendar::from_rows(&header, &rows)
}

fn employee(id: u64, code: &str) -> Employee {
    Employee {
        id,
        company_id: 1,
        employee_code: code.into(),
        first_name: "Mina".into(),
        last_name: "Verhulst".into(),
        email: format!("{}@acme.example", code.to_lowercase()),
        avatar_url: None,
        tz: "Europe/Brussels".into(),
        calendar_id: None,
    }
}

fn setup(company_minutes: u32, employee_minutes: u32) -> MemStore {
    let mut store = MemStore::new();
    store.add_calendar(standard_week());
    store.add_company(Company {
        id: 1,
        name: "Acme Logistics".into(),
        calendar_id: Some(1),
        overtime_enabled: true,
        overtime_start_date: Some(d(2025, 1, 1)),
        company_threshold_minutes: company_minutes,
        employee_threshold_minutes: employee_minutes,
        display_overtime: true,
        display_systray: true,
        use_pin: false,
    });
    store.add_employee(employee(EMPLOYEE, "EMP-002"));
    store
}

async fn closed_record(
    store: &mut MemStore,
    check_in: NaiveDateTime,
    check_out: NaiveDateTime,
) -> Attendance {
    timeline::create(
        store,
        &NewAttendance {
            employee_id: EMPLOYEE,
            check_in,
            check_out: Some(check_out),
            in_meta: CaptureMetadata::default(),
            out_meta: CaptureMetadata::default(),
        },
    )
    .await
    .unwrap()
}

fn only_row(store: &MemStore) -> &Overtime {
    assert_eq!(store.overtime.len(), 1, "expected exactly one overtime row");
    store.overtime.values().next().unwrap()
}

#[tokio::test]
async fn thresholds_absorb_small_deviations() {
    let mut store = setup(15, 0);
    // Monday, five minutes early in and ten minutes late out: both inside
    // the company threshold, so the day nets to zero and no row appears.
    let record = closed_record(&mut store, bx(2025, 1, 6, 8, 55), bx(2025, 1, 6, 17, 10)).await;
    assert!(close(record.worked_hours.unwrap(), 7.25));
    assert!(store.overtime.is_empty());
    assert!(close(store.attendance[&record.id].overtime_hours, 0.0));
}

#[tokio::test]
async fn weekend_work_is_pure_overtime() {
    let mut store = setup(15, 0);
    // Saturday has no expected time, so the whole presence is overtime.
    let record = closed_record(&mut store, bx(2025, 1, 11, 8, 0), bx(2025, 1, 11, 12, 0)).await;
    let row = only_row(&store);
    assert_eq!(row.date, d(2025, 1, 11));
    assert!(close(row.duration, 4.0));
    assert!(close(row.duration_real, 4.0));
    assert!(!row.adjustment);
    assert!(close(store.attendance[&record.id].overtime_hours, 4.0));
}

#[tokio::test]
async fn open_record_zeroes_the_day_until_checkout() {
    let mut store = setup(15, 0);
    let morning = closed_record(&mut store, bx(2025, 1, 11, 8, 0), bx(2025, 1, 11, 12, 0)).await;

    timeline::check_in(
        &mut store,
        EMPLOYEE,
        bx(2025, 1, 11, 20, 0),
        &CaptureMetadata::default(),
    )
    .await
    .unwrap();
    let row = only_row(&store);
    assert!(close(row.duration, 0.0));
    assert!(close(row.duration_real, 0.0));
    assert!(close(store.attendance[&morning.id].overtime_hours, 0.0));

    let evening = timeline::check_out(
        &mut store,
        EMPLOYEE,
        bx(2025, 1, 11, 21, 0),
        &CaptureMetadata::default(),
    )
    .await
    .unwrap();
    let row = only_row(&store);
    assert!(close(row.duration, 5.0));
    assert!(close(row.duration_real, 5.0));
    assert!(close(store.attendance[&morning.id].overtime_hours, 4.0));
    assert!(close(store.attendance[&evening.id].overtime_hours, 1.0));
}

#[tokio::test]
async fn overtime_lands_on_the_latest_record_of_the_day() {
    let mut store = setup(0, 0);
    // Monday 09:00-12:00 plus 13:00-18:00: one hour past the planned end.
    let morning = closed_record(&mut store, bx(2025, 1, 6, 9, 0), bx(2025, 1, 6, 12, 0)).await;
    let evening = closed_record(&mut store, bx(2025, 1, 6, 13, 0), bx(2025, 1, 6, 18, 0)).await;

    let row = only_row(&store);
    assert!(close(row.duration, 1.0));
    assert!(close(row.duration_real, 1.0));
    assert!(close(store.attendance[&morning.id].overtime_hours, 0.0));
    assert!(close(store.attendance[&evening.id].overtime_hours, 1.0));
}

#[tokio::test]
async fn short_days_record_a_deficit() {
    let mut store = setup(0, 0);
    // Leaving two hours early yields a negative row that no record absorbs.
    let record = closed_record(&mut store, bx(2025, 1, 6, 9, 0), bx(2025, 1, 6, 15, 0)).await;
    let row = only_row(&store);
    assert!(close(row.duration, -2.0));
    assert!(close(row.duration_real, -2.0));
    assert!(close(store.attendance[&record.id].overtime_hours, 0.0));
}

#[tokio::test]
async fn overnight_presence_counts_toward_the_check_in_day() {
    let mut store = setup(0, 0);
    let record = closed_record(&mut store, bx(2025, 1, 6, 20, 0), bx(2025, 1, 7, 4, 0)).await;
    let row = only_row(&store);
    assert_eq!(row.date, d(2025, 1, 6));
    assert!(close(row.duration, 1.0));
    assert!(close(row.duration_real, 1.0));
    // Split across two local days, so attribution never touches it.
    assert!(close(store.attendance[&record.id].overtime_hours, 0.0));
}

#[tokio::test]
async fn raising_the_threshold_rescans_the_ledger() {
    let mut store = setup(0, 0);
    // Fifteen minutes early with no grace at all: a 0.25h row.
    let record = closed_record(&mut store, bx(2025, 1, 6, 8, 45), bx(2025, 1, 6, 17, 0)).await;
    let row = only_row(&store);
    assert!(close(row.duration, 0.25));
    assert!(close(store.attendance[&record.id].overtime_hours, 0.25));

    settings::update_overtime_settings(
        &mut store,
        1,
        &OvertimeSettings {
            overtime_enabled: true,
            overtime_start_date: Some(d(2025, 1, 1)),
            company_threshold_minutes: 30,
            employee_threshold_minutes: 0,
        },
    )
    .await
    .unwrap();

    assert!(store.overtime.is_empty());
    assert!(close(store.attendance[&record.id].overtime_hours, 0.0));
}

#[tokio::test]
async fn disabling_overtime_purges_computed_rows() {
    let mut store = setup(15, 0);
    let record = closed_record(&mut store, bx(2025, 1, 11, 8, 0), bx(2025, 1, 11, 12, 0)).await;
    overtime::create_adjustment(
        &mut store,
        EMPLOYEE,
        d(2025, 1, 13),
        2.0,
        Some("badge left at home".into()),
    )
    .await
    .unwrap();
    assert_eq!(store.overtime.len(), 2);

    let company = settings::update_overtime_settings(
        &mut store,
        1,
        &OvertimeSettings {
            overtime_enabled: false,
            overtime_start_date: Some(d(2025, 1, 1)),
            company_threshold_minutes: 15,
            employee_threshold_minutes: 0,
        },
    )
    .await
    .unwrap();

    // The start date never survives a disable; adjustments do.
    assert!(!company.overtime_enabled);
    assert_eq!(company.overtime_start_date, None);
    assert!(!store.companies[&1].overtime_enabled);
    let row = only_row(&store);
    assert!(row.adjustment);
    assert!(close(row.duration, 2.0));
    assert!(close(store.attendance[&record.id].overtime_hours, 0.0));
}

#[tokio::test]
async fn reenabling_overtime_rebuilds_the_ledger() {
    let mut store = setup(15, 0);
    let record = closed_record(&mut store, bx(2025, 1, 11, 8, 0), bx(2025, 1, 11, 12, 0)).await;
    settings::update_overtime_settings(
        &mut store,
        1,
        &OvertimeSettings {
            overtime_enabled: false,
            overtime_start_date: None,
            company_threshold_minutes: 15,
            employee_threshold_minutes: 0,
        },
    )
    .await
    .unwrap();
    assert!(store.overtime.is_empty());
    assert!(close(store.attendance[&record.id].overtime_hours, 0.0));

    settings::update_overtime_settings(
        &mut store,
        1,
        &OvertimeSettings {
            overtime_enabled: true,
            overtime_start_date: Some(d(2025, 1, 1)),
            company_threshold_minutes: 15,
            employee_threshold_minutes: 0,
        },
    )
    .await
    .unwrap();

    let row = only_row(&store);
    assert_eq!(row.date, d(2025, 1, 11));
    assert!(close(row.duration, 4.0));
    assert!(close(store.attendance[&record.id].overtime_hours, 4.0));
}

#[tokio::test]
async fn moving_the_start_date_forward_drops_rows_before_it() {
    let mut store = setup(15, 0);
    let first = closed_record(&mut store, bx(2025, 1, 11, 8, 0), bx(2025, 1, 11, 12, 0)).await;
    let second = closed_record(&mut store, bx(2025, 1, 18, 8, 0), bx(2025, 1, 18, 12, 0)).await;
    assert_eq!(store.overtime.len(), 2);

    settings::update_overtime_settings(
        &mut store,
        1,
        &OvertimeSettings {
            overtime_enabled: true,
            overtime_start_date: Some(d(2025, 1, 15)),
            company_threshold_minutes: 15,
            employee_threshold_minutes: 0,
        },
    )
    .await
    .unwrap();

    let row = only_row(&store);
    assert_eq!(row.date, d(2025, 1, 18));
    assert!(close(store.attendance[&first.id].overtime_hours, 0.0));
    assert!(close(store.attendance[&second.id].overtime_hours, 4.0));
}

#[tokio::test]
async fn records_before_the_start_date_are_ignored() {
    let mut store = setup(15, 0);
    store.companies.get_mut(&1).unwrap().overtime_start_date = Some(d(2025, 2, 1));
    closed_record(&mut store, bx(2025, 1, 11, 8, 0), bx(2025, 1, 11, 12, 0)).await;
    assert!(store.overtime.is_empty());
}

#[tokio::test]
async fn identical_values_leave_the_ledger_untouched() {
    let mut store = setup(15, 0);
    let record = closed_record(&mut store, bx(2025, 1, 11, 8, 0), bx(2025, 1, 11, 12, 0)).await;
    let before = only_row(&store).clone();

    // Rewriting the same check-in re-reconciles the day but must not
    // rewrite a row whose figures did not move.
    timeline::update(
        &mut store,
        &OFFICER,
        record.id,
        &AttendanceUpdate {
            check_in: Some(record.check_in),
            ..AttendanceUpdate::default()
        },
    )
    .await
    .unwrap();

    let row = only_row(&store);
    assert_eq!(row.id, before.id);
    assert_eq!(*row, before);
    assert!(close(store.attendance[&record.id].overtime_hours, 4.0));
}

#[tokio::test]
async fn deleting_the_last_record_clears_the_day() {
    let mut store = setup(15, 0);
    let record = closed_record(&mut store, bx(2025, 1, 11, 8, 0), bx(2025, 1, 11, 12, 0)).await;
    assert_eq!(store.overtime.len(), 1);

    timeline::delete(&mut store, record.id).await.unwrap();
    assert!(store.attendance.is_empty());
    assert!(store.overtime.is_empty());
}

#[tokio::test]
async fn a_later_adjustment_overrides_the_days_distribution() {
    let mut store = setup(15, 0);
    let record = closed_record(&mut store, bx(2025, 1, 11, 8, 0), bx(2025, 1, 11, 12, 0)).await;
    assert!(close(store.attendance[&record.id].overtime_hours, 4.0));

    let adjustment = overtime::create_adjustment(
        &mut store,
        EMPLOYEE,
        d(2025, 1, 11),
        1.5,
        Some("clocked in for a colleague".into()),
    )
    .await
    .unwrap();

    assert!(adjustment.adjustment);
    assert!(close(adjustment.duration_real, 0.0));
    assert_eq!(store.overtime.len(), 2);
    // The adjustment is the later row on that date, so its distribution wins.
    assert!(close(store.attendance[&record.id].overtime_hours, 1.5));
}

#[tokio::test]
async fn company_time_off_turns_presence_into_overtime() {
    let mut store = setup(15, 0);
    let record = closed_record(&mut store, bx(2025, 1, 6, 9, 0), bx(2025, 1, 6, 17, 0)).await;
    // A regular Monday nets to zero before the closure is recorded.
    assert!(store.overtime.is_empty());

    let holiday = settings::record_time_off(
        &mut store,
        TimeOff {
            id: 0,
            company_id: 1,
            employee_id: None,
            date_from: bx(2025, 1, 6, 0, 0),
            date_to: bx(2025, 1, 7, 0, 0),
            reason: Some("Office closed".into()),
        },
    )
    .await
    .unwrap();
    assert_ne!(holiday.id, 0);

    let row = only_row(&store);
    assert_eq!(row.date, d(2025, 1, 6));
    assert!(close(row.duration, 7.0));
    assert!(close(row.duration_real, 7.0));
    assert!(close(store.attendance[&record.id].overtime_hours, 7.0));
}

#[tokio::test]
async fn personal_time_off_only_touches_that_employee() {
    let mut store = setup(15, 0);
    store.add_employee(employee(3, "EMP-003"));
    let mine = closed_record(&mut store, bx(2025, 1, 6, 9, 0), bx(2025, 1, 6, 17, 0)).await;
    timeline::create(
        &mut store,
        &NewAttendance {
            employee_id: 3,
            check_in: bx(2025, 1, 6, 9, 0),
            check_out: Some(bx(2025, 1, 6, 17, 0)),
            in_meta: CaptureMetadata::default(),
            out_meta: CaptureMetadata::default(),
        },
    )
    .await
    .unwrap();

    settings::record_time_off(
        &mut store,
        TimeOff {
            id: 0,
            company_id: 1,
            employee_id: Some(EMPLOYEE),
            date_from: bx(2025, 1, 6, 0, 0),
            date_to: bx(2025, 1, 7, 0, 0),
            reason: Some("medical".into()),
        },
    )
    .await
    .unwrap();

    let row = only_row(&store);
    assert_eq!(row.employee_id, EMPLOYEE);
    assert!(close(row.duration, 7.0));
    assert!(close(store.attendance[&mine.id].overtime_hours, 7.0));
}

#[tokio::test]
async fn time_off_must_end_after_it_starts() {
    let mut store = setup(15, 0);
    let err = settings::record_time_off(
        &mut store,
        TimeOff {
            id: 0,
            company_id: 1,
            employee_id: Some(EMPLOYEE),
            date_from: bx(2025, 1, 6, 0, 0),
            date_to: bx(2025, 1, 6, 0, 0),
            reason: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TimeclockError::Validation { .. }));
    assert!(store.time_off.is_empty());
}

#[tokio::test]
async fn moving_a_record_rebuilds_both_days() {
    let mut store = setup(15, 0);
    let record = closed_record(&mut store, bx(2025, 1, 11, 8, 0), bx(2025, 1, 11, 12, 0)).await;
    assert_eq!(only_row(&store).date, d(2025, 1, 11));

    timeline::update(
        &mut store,
        &OFFICER,
        record.id,
        &AttendanceUpdate {
            check_in: Some(bx(2025, 1, 12, 8, 0)),
            check_out: Some(bx(2025, 1, 12, 12, 0)),
            ..AttendanceUpdate::default()
        },
    )
    .await
    .unwrap();

    let row = only_row(&store);
    assert_eq!(row.date, d(2025, 1, 12));
    assert!(close(row.duration, 4.0));
    assert!(close(store.attendance[&record.id].overtime_hours, 4.0));
}

#[tokio::test]
async fn presence_summary_splits_today_from_the_running_record() {
    let mut store = setup(15, 0);
    closed_record(&mut store, bx(2025, 1, 6, 9, 0), bx(2025, 1, 6, 12, 0)).await;
    timeline::check_in(
        &mut store,
        EMPLOYEE,
        bx(2025, 1, 6, 13, 0),
        &CaptureMetadata::default(),
    )
    .await
    .unwrap();

    let now = bx(2025, 1, 6, 15, 30);
    let ctx = EmployeeCtx::load(&mut store, EMPLOYEE).await.unwrap();
    let summary = presence::summary(&mut store, &ctx, now).await.unwrap();

    assert_eq!(summary.attendance_state, AttendanceState::CheckedIn);
    assert!(close(summary.hours_today, 5.5));
    assert!(close(summary.hours_previously_today, 3.0));
    assert!(close(summary.last_attendance_worked_hours, 2.5));
    assert!(close(summary.hours_last_month, 3.0));
    assert!(close(summary.total_overtime, 0.0));
    assert_eq!(summary.last_check_in, Some(bx(2025, 1, 6, 13, 0)));
    assert_eq!(summary.last_check_out, None);
}
