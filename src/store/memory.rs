use std::collections::BTreeMap;
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

use super::TimelineStore;

/// In-memory store for tests. Mirrors the MySQL implementation's ordering
/// and no-op semantics exactly, locking aside.
#[derive(Debug, Default)]
pub struct MemStore {
    pub companies: BTreeMap<u64, Company>,
    pub employees: BTreeMap<u64, Employee>,
    pub calendars: BTreeMap<u64, Arc<WorkCalendar>>,
    pub attendance: BTreeMap<u64, Attendance>,
    pub overtime: BTreeMap<u64, Overtime>,
    pub time_off: BTreeMap<u64, TimeOff>,
    next_id: u64,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_company(&mut self, mut company: Company) -> u64 {
        if company.id == 0 {
            company.id = self.next_id();
        }
        self.next_id = self.next_id.max(company.id);
        let id = company.id;
        self.companies.insert(id, company);
        id
    }

    pub fn add_employee(&mut self, mut employee: Employee) -> u64 {
        if employee.id == 0 {
            employee.id = self.next_id();
        }
        self.next_id = self.next_id.max(employee.id);
        let id = employee.id;
        self.employees.insert(id, employee);
        id
    }

    pub fn add_calendar(&mut self, calendar: WorkCalendar) -> u64 {
        let id = calendar.id;
        self.next_id = self.next_id.max(id);
        self.calendars.insert(id, Arc::new(calendar));
        id
    }

    fn timeline_sorted(&self, mut rows: Vec<Attendance>) -> Vec<Attendance> {
        rows.sort_by_key(|r| (r.check_in, r.id));
        rows
    }
}

#[async_trait]
impl TimelineStore for MemStore {
    async fn lock_employee(&mut self, _employee_id: u64) -> Result<(), TimeclockError> {
        Ok(())
    }

    async fn lock_company(&mut self, _company_id: u64) -> Result<(), TimeclockError> {
        Ok(())
    }

    async fn employee(&mut self, employee_id: u64) -> Result<Option<Employee>, TimeclockError> {
        Ok(self.employees.get(&employee_id).cloned())
    }

    async fn company(&mut self, company_id: u64) -> Result<Option<Company>, TimeclockError> {
        Ok(self.companies.get(&company_id).cloned())
    }

    async fn employees_of_company(
        &mut self,
        company_id: u64,
    ) -> Result<Vec<Employee>, TimeclockError> {
        Ok(self
            .employees
            .values()
            .filter(|e| e.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn calendar(
        &mut self,
        calendar_id: u64,
    ) -> Result<Option<Arc<WorkCalendar>>, TimeclockError> {
        Ok(self.calendars.get(&calendar_id).cloned())
    }

    async fn save_overtime_settings(&mut self, company: &Company) -> Result<(), TimeclockError> {
        if let Some(existing) = self.companies.get_mut(&company.id) {
            existing.overtime_enabled = company.overtime_enabled;
            existing.overtime_start_date = company.overtime_start_date;
            existing.company_threshold_minutes = company.company_threshold_minutes;
            existing.employee_threshold_minutes = company.employee_threshold_minutes;
        }
        Ok(())
    }

    async fn attendance(&mut self, id: u64) -> Result<Option<Attendance>, TimeclockError> {
        Ok(self.attendance.get(&id).cloned())
    }

    async fn latest_attendance(
        &mut self,
        employee_id: u64,
    ) -> Result<Option<Attendance>, TimeclockError> {
        Ok(self
            .attendance
            .values()
            .filter(|r| r.employee_id == employee_id)
            .max_by_key(|r| (r.check_in, r.id))
            .cloned())
    }

    async fn last_starting_at_or_before(
        &mut self,
        employee_id: u64,
        instant: NaiveDateTime,
        exclude: Option<u64>,
    ) -> Result<Option<Attendance>, TimeclockError> {
        Ok(self
            .attendance
            .values()
            .filter(|r| {
                r.employee_id == employee_id && r.check_in <= instant && Some(r.id) != exclude
            })
            .max_by_key(|r| (r.check_in, r.id))
            .cloned())
    }

    async fn last_starting_before(
        &mut self,
        employee_id: u64,
        instant: NaiveDateTime,
        exclude: Option<u64>,
    ) -> Result<Option<Attendance>, TimeclockError> {
        Ok(self
            .attendance
            .values()
            .filter(|r| {
                r.employee_id == employee_id && r.check_in < instant && Some(r.id) != exclude
            })
            .max_by_key(|r| (r.check_in, r.id))
            .cloned())
    }

    async fn open_attendance(
        &mut self,
        employee_id: u64,
        exclude: Option<u64>,
    ) -> Result<Option<Attendance>, TimeclockError> {
        Ok(self
            .attendance
            .values()
            .filter(|r| r.employee_id == employee_id && r.is_open() && Some(r.id) != exclude)
            .max_by_key(|r| (r.check_in, r.id))
            .cloned())
    }

    async fn insert_attendance(&mut self, record: &Attendance) -> Result<u64, TimeclockError> {
        let id = self.next_id();
        let mut stored = record.clone();
        stored.id = id;
        self.attendance.insert(id, stored);
        Ok(id)
    }

    async fn update_attendance(&mut self, record: &Attendance) -> Result<(), TimeclockError> {
        if let Some(existing) = self.attendance.get_mut(&record.id) {
            *existing = record.clone();
        }
        Ok(())
    }

    async fn delete_attendance(&mut self, id: u64) -> Result<(), TimeclockError> {
        self.attendance.remove(&id);
        Ok(())
    }

    async fn attendance_in_windows(
        &mut self,
        employee_id: u64,
        windows: &[(NaiveDateTime, NaiveDateTime)],
    ) -> Result<Vec<Attendance>, TimeclockError> {
        let rows = self
            .attendance
            .values()
            .filter(|r| {
                r.employee_id == employee_id
                    && windows.iter().any(|(lo, hi)| r.check_in >= *lo && r.check_in < *hi)
            })
            .cloned()
            .collect();
        Ok(self.timeline_sorted(rows))
    }

    async fn attendance_for_company(
        &mut self,
        company_id: u64,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Result<Vec<Attendance>, TimeclockError> {
        let members: Vec<u64> = self
            .employees
            .values()
            .filter(|e| e.company_id == company_id)
            .map(|e| e.id)
            .collect();
        let rows = self
            .attendance
            .values()
            .filter(|r| {
                members.contains(&r.employee_id)
                    && from.map_or(true, |lo| r.check_in >= lo)
                    && to.map_or(true, |hi| r.check_in <= hi)
            })
            .cloned()
            .collect();
        Ok(self.timeline_sorted(rows))
    }

    async fn attendance_for_employee(
        &mut self,
        employee_id: u64,
    ) -> Result<Vec<Attendance>, TimeclockError> {
        let rows = self
            .attendance
            .values()
            .filter(|r| r.employee_id == employee_id)
            .cloned()
            .collect();
        Ok(self.timeline_sorted(rows))
    }

    async fn attendance_touching(
        &mut self,
        employee_id: u64,
        day_start: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<Vec<Attendance>, TimeclockError> {
        let rows = self
            .attendance
            .values()
            .filter(|r| {
                r.employee_id == employee_id
                    && r.check_in <= now
                    && r.check_out.map_or(true, |out| out >= day_start)
            })
            .cloned()
            .collect();
        Ok(self.timeline_sorted(rows))
    }

    async fn closed_attendance_between(
        &mut self,
        employee_id: u64,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Attendance>, TimeclockError> {
        let rows = self
            .attendance
            .values()
            .filter(|r| {
                r.employee_id == employee_id
                    && r.check_in >= from
                    && r.check_out.is_some_and(|out| out <= to)
            })
            .cloned()
            .collect();
        Ok(self.timeline_sorted(rows))
    }

    async fn set_overtime_hours(
        &mut self,
        assignments: &[(u64, f64)],
    ) -> Result<(), TimeclockError> {
        for (id, hours) in assignments {
            if let Some(record) = self.attendance.get_mut(id) {
                record.overtime_hours = *hours;
            }
        }
        Ok(())
    }

    async fn overtime_on_days(
        &mut self,
        employee_id: u64,
        days: &[NaiveDate],
    ) -> Result<Vec<Overtime>, TimeclockError> {
        let mut rows: Vec<Overtime> = self
            .overtime
            .values()
            .filter(|o| o.employee_id == employee_id && !o.adjustment && days.contains(&o.date))
            .cloned()
            .collect();
        rows.sort_by_key(|o| (o.date, o.id));
        Ok(rows)
    }

    async fn overtime_for_employee(
        &mut self,
        employee_id: u64,
    ) -> Result<Vec<Overtime>, TimeclockError> {
        let mut rows: Vec<Overtime> = self
            .overtime
            .values()
            .filter(|o| o.employee_id == employee_id)
            .cloned()
            .collect();
        rows.sort_by_key(|o| (o.date, o.id));
        Ok(rows)
    }

    async fn insert_overtime(&mut self, record: &Overtime) -> Result<u64, TimeclockError> {
        let id = self.next_id();
        let mut stored = record.clone();
        stored.id = id;
        self.overtime.insert(id, stored);
        Ok(id)
    }

    async fn insert_overtime_batch(&mut self, rows: &[Overtime]) -> Result<(), TimeclockError> {
        for row in rows {
            self.insert_overtime(row).await?;
        }
        Ok(())
    }

    async fn update_overtime_durations(
        &mut self,
        id: u64,
        duration: f64,
        duration_real: f64,
    ) -> Result<(), TimeclockError> {
        if let Some(row) = self.overtime.get_mut(&id) {
            row.duration = duration;
            row.duration_real = duration_real;
        }
        Ok(())
    }

    async fn delete_overtime_batch(&mut self, ids: &[u64]) -> Result<(), TimeclockError> {
        for id in ids {
            self.overtime.remove(id);
        }
        Ok(())
    }

    async fn delete_computed_overtime(
        &mut self,
        employee_id: u64,
        before: Option<NaiveDate>,
    ) -> Result<u64, TimeclockError> {
        let doomed: Vec<u64> = self
            .overtime
            .values()
            .filter(|o| {
                o.employee_id == employee_id
                    && !o.adjustment
                    && before.map_or(true, |limit| o.date < limit)
            })
            .map(|o| o.id)
            .collect();
        for id in &doomed {
            self.overtime.remove(id);
        }
        Ok(doomed.len() as u64)
    }

    async fn time_off_overlapping(
        &mut self,
        company_id: u64,
        employee_id: u64,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Result<Vec<TimeOff>, TimeclockError> {
        let mut rows: Vec<TimeOff> = self
            .time_off
            .values()
            .filter(|t| {
                t.company_id == company_id
                    && t.employee_id.map_or(true, |e| e == employee_id)
                    && t.date_from < stop
                    && t.date_to > start
            })
            .cloned()
            .collect();
        rows.sort_by_key(|t| (t.date_from, t.id));
        Ok(rows)
    }

    async fn insert_time_off(&mut self, row: &TimeOff) -> Result<u64, TimeclockError> {
        let id = self.next_id();
        let mut stored = row.clone();
        stored.id = id;
        self.time_off.insert(id, stored);
        Ok(id)
    }
}
