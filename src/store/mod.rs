pub mod memory;
pub mod mysql;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::engine::calendar::WorkCalendar;
use crate::error::TimeclockError;
use crate::model::attendance::Attendance;
use crate::model::company::Company;
use crate::model::employee::Employee;
use crate::model::overtime::Overtime;
use crate::model::time_off::TimeOff;

pub use memory::MemStore;
pub use mysql::MySqlStore;

/// Everything the timeline engine needs from persistence. One instance wraps
/// one transaction; a mutation either commits all of its consequences or none.
///
/// "Latest" always means greatest `(check_in, id)` so ties at the same
/// instant resolve deterministically.
#[async_trait]
pub trait TimelineStore: Send {
    /// Serializes concurrent mutations for one employee (`SELECT .. FOR
    /// UPDATE` on MySQL, a no-op in memory).
    async fn lock_employee(&mut self, employee_id: u64) -> Result<(), TimeclockError>;

    /// Serializes company-wide mutations by locking every employee row of
    /// the company.
    async fn lock_company(&mut self, company_id: u64) -> Result<(), TimeclockError>;

    async fn employee(&mut self, employee_id: u64) -> Result<Option<Employee>, TimeclockError>;

    async fn company(&mut self, company_id: u64) -> Result<Option<Company>, TimeclockError>;

    async fn employees_of_company(
        &mut self,
        company_id: u64,
    ) -> Result<Vec<Employee>, TimeclockError>;

    async fn calendar(
        &mut self,
        calendar_id: u64,
    ) -> Result<Option<Arc<WorkCalendar>>, TimeclockError>;

    /// Writes the company's overtime settings columns back.
    async fn save_overtime_settings(&mut self, company: &Company) -> Result<(), TimeclockError>;

    async fn attendance(&mut self, id: u64) -> Result<Option<Attendance>, TimeclockError>;

    /// The employee's latest record overall.
    async fn latest_attendance(
        &mut self,
        employee_id: u64,
    ) -> Result<Option<Attendance>, TimeclockError>;

    /// Latest record with `check_in <= instant`, optionally excluding one id.
    async fn last_starting_at_or_before(
        &mut self,
        employee_id: u64,
        instant: NaiveDateTime,
        exclude: Option<u64>,
    ) -> Result<Option<Attendance>, TimeclockError>;

    /// Latest record with `check_in < instant`, optionally excluding one id.
    async fn last_starting_before(
        &mut self,
        employee_id: u64,
        instant: NaiveDateTime,
        exclude: Option<u64>,
    ) -> Result<Option<Attendance>, TimeclockError>;

    /// Any open record for the employee, optionally excluding one id.
    async fn open_attendance(
        &mut self,
        employee_id: u64,
        exclude: Option<u64>,
    ) -> Result<Option<Attendance>, TimeclockError>;

    async fn insert_attendance(&mut self, record: &Attendance) -> Result<u64, TimeclockError>;

    async fn update_attendance(&mut self, record: &Attendance) -> Result<(), TimeclockError>;

    async fn delete_attendance(&mut self, id: u64) -> Result<(), TimeclockError>;

    /// Records with `check_in` inside any of the half-open windows, ordered
    /// by `(check_in, id)`.
    async fn attendance_in_windows(
        &mut self,
        employee_id: u64,
        windows: &[(NaiveDateTime, NaiveDateTime)],
    ) -> Result<Vec<Attendance>, TimeclockError>;

    /// Every record of the company's employees, coarsely bounded by
    /// `check_in` when bounds are given, ordered by `(check_in, id)`.
    async fn attendance_for_company(
        &mut self,
        company_id: u64,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Result<Vec<Attendance>, TimeclockError>;

    /// All records of one employee, ordered by `(check_in, id)`.
    async fn attendance_for_employee(
        &mut self,
        employee_id: u64,
    ) -> Result<Vec<Attendance>, TimeclockError>;

    /// Records with `check_in <= now` that are open or end on/after
    /// `day_start`, ordered by `(check_in, id)`. Feeds the hours-today sum.
    async fn attendance_touching(
        &mut self,
        employee_id: u64,
        day_start: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<Vec<Attendance>, TimeclockError>;

    /// Closed records with `check_in >= from` and `check_out <= to`.
    async fn closed_attendance_between(
        &mut self,
        employee_id: u64,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Attendance>, TimeclockError>;

    /// Rewrites `overtime_hours` on the given record ids.
    async fn set_overtime_hours(
        &mut self,
        assignments: &[(u64, f64)],
    ) -> Result<(), TimeclockError>;

    /// Non-adjustment overtime rows of the employee on the given dates.
    async fn overtime_on_days(
        &mut self,
        employee_id: u64,
        days: &[NaiveDate],
    ) -> Result<Vec<Overtime>, TimeclockError>;

    /// Every overtime row of the employee, adjustments included, ordered by
    /// `(date, id)`.
    async fn overtime_for_employee(
        &mut self,
        employee_id: u64,
    ) -> Result<Vec<Overtime>, TimeclockError>;

    async fn insert_overtime(&mut self, record: &Overtime) -> Result<u64, TimeclockError>;

    async fn insert_overtime_batch(&mut self, rows: &[Overtime]) -> Result<(), TimeclockError>;

    async fn update_overtime_durations(
        &mut self,
        id: u64,
        duration: f64,
        duration_real: f64,
    ) -> Result<(), TimeclockError>;

    async fn delete_overtime_batch(&mut self, ids: &[u64]) -> Result<(), TimeclockError>;

    /// Deletes the employee's non-adjustment rows, optionally only those
    /// dated before `before`. Returns the number of rows removed.
    async fn delete_computed_overtime(
        &mut self,
        employee_id: u64,
        before: Option<NaiveDate>,
    ) -> Result<u64, TimeclockError>;

    /// Company-wide and employee-specific time off intersecting
    /// `[start, stop)`.
    async fn time_off_overlapping(
        &mut self,
        company_id: u64,
        employee_id: u64,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Result<Vec<TimeOff>, TimeclockError>;

    async fn insert_time_off(&mut self, row: &TimeOff) -> Result<u64, TimeclockError>;
}
