//! Validity rules of the attendance timeline, exercised through the public
//! mutation surface: at most one open record per employee and no overlap
//! between closed ones, whatever sequence of mutations is applied.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use timeclock::engine::timeline::{self, Actor, AttendanceUpdate, NewAttendance};
use timeclock::error::TimeclockError;
use timeclock::model::attendance::{Attendance, CaptureMetadata, CaptureMode};
use timeclock::model::company::Company;
use timeclock::model::employee::Employee;
use timeclock::store::MemStore;

const EMPLOYEE: u64 = 2;
const OFFICER: Actor = Actor {
    employee_id: None,
    officer: true,
};

fn dt(day: u32, h: u32, mi: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, day)
        .unwrap()
        .and_hms_opt(h, mi, 0)
        .unwrap()
}

fn employee(id: u64, code: &str) -> Employee {
    Employee {
        id,
        company_id: 1,
        employee_code: code.into(),
        first_name: "Jonas".into(),
        last_name: "Peeters".into(),
        email: format!("{}@acme.example", code.to_lowercase()),
        avatar_url: None,
        tz: "UTC".into(),
        calendar_id: None,
    }
}

fn setup() -> MemStore {
    let mut store = MemStore::new();
    store.add_company(Company {
        id: 1,
        name: "Acme Logistics".into(),
        calendar_id: None,
        overtime_enabled: true,
        overtime_start_date: None,
        company_threshold_minutes: 0,
        employee_threshold_minutes: 0,
        display_overtime: true,
        display_systray: true,
        use_pin: false,
    });
    store.add_employee(employee(EMPLOYEE, "EMP-002"));
    store.add_employee(employee(3, "EMP-003"));
    store
}

async fn closed(
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

#[tokio::test]
async fn rejects_check_out_before_check_in() {
    let mut store = setup();
    let err = timeline::create(
        &mut store,
        &NewAttendance {
            employee_id: EMPLOYEE,
            check_in: dt(3, 10, 0),
            check_out: Some(dt(3, 9, 0)),
            in_meta: CaptureMetadata::default(),
            out_meta: CaptureMetadata::default(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TimeclockError::Validation { .. }));
    assert!(store.attendance.is_empty());
}

#[tokio::test]
async fn zero_length_records_are_legal() {
    let mut store = setup();
    let record = closed(&mut store, dt(3, 10, 0), dt(3, 10, 0)).await;
    assert_eq!(record.check_out, Some(record.check_in));
    assert_eq!(record.worked_hours, Some(0.0));
    assert!(store.overtime.is_empty());
}

#[tokio::test]
async fn rejects_check_in_during_a_closed_record() {
    let mut store = setup();
    closed(&mut store, dt(3, 9, 0), dt(3, 12, 0)).await;
    let err = timeline::check_in(&mut store, EMPLOYEE, dt(3, 11, 0), &CaptureMetadata::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TimeclockError::Overlap { .. }));
    assert_eq!(store.attendance.len(), 1);
}

#[tokio::test]
async fn rejects_a_second_open_record() {
    let mut store = setup();
    timeline::check_in(&mut store, EMPLOYEE, dt(3, 9, 0), &CaptureMetadata::default())
        .await
        .unwrap();
    let err = timeline::check_in(&mut store, EMPLOYEE, dt(3, 13, 0), &CaptureMetadata::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TimeclockError::Overlap { .. }));
    assert_eq!(store.attendance.len(), 1);
}

#[tokio::test]
async fn rejects_a_record_swallowing_another() {
    let mut store = setup();
    closed(&mut store, dt(3, 11, 0), dt(3, 12, 0)).await;
    let err = timeline::create(
        &mut store,
        &NewAttendance {
            employee_id: EMPLOYEE,
            check_in: dt(3, 8, 0),
            check_out: Some(dt(3, 13, 0)),
            in_meta: CaptureMetadata::default(),
            out_meta: CaptureMetadata::default(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TimeclockError::Overlap { .. }));
    assert_eq!(store.attendance.len(), 1);
}

#[tokio::test]
async fn closing_without_an_open_record_fails() {
    let mut store = setup();
    let err = timeline::check_out(&mut store, EMPLOYEE, dt(3, 17, 0), &CaptureMetadata::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TimeclockError::NoOpenAttendance { employee } if employee == EMPLOYEE));
}

#[tokio::test]
async fn duplication_is_always_refused() {
    assert!(matches!(
        timeline::duplicate(7),
        Err(TimeclockError::Duplication)
    ));
}

#[tokio::test]
async fn reassigning_to_a_third_party_requires_officer() {
    let mut store = setup();
    let record = closed(&mut store, dt(3, 9, 0), dt(3, 12, 0)).await;

    let colleague = Actor {
        employee_id: Some(4),
        officer: false,
    };
    let patch = AttendanceUpdate {
        employee_id: Some(3),
        ..AttendanceUpdate::default()
    };
    let err = timeline::update(&mut store, &colleague, record.id, &patch)
        .await
        .unwrap_err();
    assert!(matches!(err, TimeclockError::Access { .. }));
    assert_eq!(store.attendance[&record.id].employee_id, EMPLOYEE);

    let moved = timeline::update(&mut store, &OFFICER, record.id, &patch)
        .await
        .unwrap();
    assert_eq!(moved.employee_id, 3);
}

#[tokio::test]
async fn an_employee_may_claim_a_record_for_themselves() {
    let mut store = setup();
    let record = closed(&mut store, dt(3, 9, 0), dt(3, 12, 0)).await;
    let claimant = Actor {
        employee_id: Some(3),
        officer: false,
    };
    let claimed = timeline::update(
        &mut store,
        &claimant,
        record.id,
        &AttendanceUpdate {
            employee_id: Some(3),
            ..AttendanceUpdate::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(claimed.employee_id, 3);
}

#[tokio::test]
async fn metadata_updates_leave_the_timeline_alone() {
    let mut store = setup();
    let record = closed(&mut store, dt(3, 9, 0), dt(3, 12, 0)).await;
    let patch = AttendanceUpdate {
        in_meta: Some(CaptureMetadata {
            mode: Some(CaptureMode::Kiosk),
            city: Some("Brussels".into()),
            ..CaptureMetadata::default()
        }),
        ..AttendanceUpdate::default()
    };
    let updated = timeline::update(&mut store, &OFFICER, record.id, &patch)
        .await
        .unwrap();
    assert_eq!(updated.in_mode, CaptureMode::Kiosk);
    assert_eq!(updated.in_city.as_deref(), Some("Brussels"));
    assert_eq!(updated.check_in, record.check_in);
    assert_eq!(updated.check_out, record.check_out);
    assert_eq!(updated.worked_hours, record.worked_hours);
}

fn pick(rng: &mut StdRng, store: &MemStore) -> Option<u64> {
    let ids: Vec<u64> = store.attendance.keys().copied().collect();
    if ids.is_empty() {
        None
    } else {
        Some(ids[rng.gen_range(0..ids.len())])
    }
}

fn assert_timeline_sound(store: &MemStore) {
    let mut records: Vec<&Attendance> = store.attendance.values().collect();
    records.sort_by_key(|r| (r.check_in, r.id));

    let open = records.iter().filter(|r| r.is_open()).count();
    assert!(open <= 1, "found {open} open records");

    let closed: Vec<&Attendance> = records
        .iter()
        .copied()
        .filter(|r| r.check_out.is_some())
        .collect();
    for record in &closed {
        assert!(record.check_out.unwrap() >= record.check_in);
    }
    for pair in closed.windows(2) {
        let out = pair[0].check_out.unwrap();
        assert!(
            out <= pair[1].check_in,
            "record {} runs past the start of record {}",
            pair[0].id,
            pair[1].id
        );
    }

    // The computed ledger holds at most one row per employee and day.
    let mut days = BTreeSet::new();
    for row in store.overtime.values().filter(|o| !o.adjustment) {
        assert!(
            days.insert((row.employee_id, row.date)),
            "duplicate computed overtime row on {}",
            row.date
        );
    }
}

#[tokio::test]
async fn random_mutations_never_break_the_timeline() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut store = setup();
    let base = dt(3, 0, 0);

    for _ in 0..300 {
        let at = base + Duration::minutes(rng.gen_range(0..10 * 24 * 60));
        let before = store.attendance.clone();
        let outcome: Result<(), TimeclockError> = match rng.gen_range(0..5) {
            0 => timeline::check_in(&mut store, EMPLOYEE, at, &CaptureMetadata::default())
                .await
                .map(drop),
            1 => timeline::check_out(&mut store, EMPLOYEE, at, &CaptureMetadata::default())
                .await
                .map(drop),
            2 => {
                let out = at + Duration::minutes(rng.gen_range(0..12 * 60));
                timeline::create(
                    &mut store,
                    &NewAttendance {
                        employee_id: EMPLOYEE,
                        check_in: at,
                        check_out: Some(out),
                        in_meta: CaptureMetadata::default(),
                        out_meta: CaptureMetadata::default(),
                    },
                )
                .await
                .map(drop)
            }
            3 => match pick(&mut rng, &store) {
                Some(id) => {
                    let patch = AttendanceUpdate {
                        check_in: Some(at),
                        check_out: rng
                            .gen_bool(0.8)
                            .then(|| at + Duration::minutes(rng.gen_range(0..12 * 60))),
                        clear_check_out: rng.gen_bool(0.1),
                        ..AttendanceUpdate::default()
                    };
                    timeline::update(&mut store, &OFFICER, id, &patch).await.map(drop)
                }
                None => continue,
            },
            _ => match pick(&mut rng, &store) {
                Some(id) => timeline::delete(&mut store, id).await,
                None => continue,
            },
        };

        if outcome.is_err() {
            assert_eq!(
                store.attendance, before,
                "a rejected mutation must leave the timeline untouched"
            );
        }
        assert_timeline_sound(&store);
    }
    assert!(!store.attendance.is_empty());
}
