use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{MySql, MySqlPool, Transaction};

use crate::engine::calendar::WorkCalendar;
use crate::error::TimeclockError;
use crate::model::attendance::Attendance;
use crate::model::calendar::{CalendarSlotRow, WorkCalendarRow};
use crate::model::company::Company;
use crate::model::employee::Employee;
use crate::model::overtime::Overtime;
use crate::model::time_off::TimeOff;
use crate::utils::calendar_cache;

use super::TimelineStore;

/// MySQL-backed store wrapping one transaction. Every statement of a
/// mutation shares it, so either all derived consequences commit or none do
/// (rollback happens on drop).
pub struct MySqlStore<'c> {
    tx: Transaction<'c, MySql>,
}

impl MySqlStore<'_> {
    pub async fn begin(pool: &MySqlPool) -> Result<MySqlStore<'static>, TimeclockError> {
        Ok(MySqlStore {
            tx: pool.begin().await?,
        })
    }

    pub async fn commit(self) -> Result<(), TimeclockError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl TimelineStore for MySqlStore<'_> {
    async fn lock_employee(&mut self, employee_id: u64) -> Result<(), TimeclockError> {
        sqlx::query("SELECT id FROM employees WHERE id = ? FOR UPDATE")
            .bind(employee_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_company(&mut self, company_id: u64) -> Result<(), TimeclockError> {
        sqlx::query("SELECT id FROM employees WHERE company_id = ? FOR UPDATE")
            .bind(company_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn employee(&mut self, employee_id: u64) -> Result<Option<Employee>, TimeclockError> {
        let row = sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ?")
            .bind(employee_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn company(&mut self, company_id: u64) -> Result<Option<Company>, TimeclockError> {
        let row = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = ?")
            .bind(company_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn employees_of_company(
        &mut self,
        company_id: u64,
    ) -> Result<Vec<Employee>, TimeclockError> {
        let rows = sqlx::query_as::<_, Employee>(
            "SELECT * FROM employees WHERE company_id = ? ORDER BY id",
        )
        .bind(company_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn calendar(
        &mut self,
        calendar_id: u64,
    ) -> Result<Option<Arc<WorkCalendar>>, TimeclockError> {
        if let Some(calendar) = calendar_cache::get(calendar_id).await {
            return Ok(Some(calendar));
        }
        let Some(header) =
            sqlx::query_as::<_, WorkCalendarRow>("SELECT * FROM work_calendars WHERE id = ?")
                .bind(calendar_id)
                .fetch_optional(&mut *self.tx)
                .await?
        else {
            return Ok(None);
        };
        let slots = sqlx::query_as::<_, CalendarSlotRow>(
            "SELECT * FROM calendar_slots WHERE calendar_id = ? ORDER BY weekday, start_time",
        )
        .bind(calendar_id)
        .fetch_all(&mut *self.tx)
        .await?;
        let calendar = Arc::new(WorkCalendar::from_rows(&header, &slots));
        calendar_cache::insert(calendar_id, calendar.clone()).await;
        Ok(Some(calendar))
    }

    async fn save_overtime_settings(&mut self, company: &Company) -> Result<(), TimeclockError> {
        sqlx::query(
            "UPDATE companies SET overtime_enabled = ?, overtime_start_date = ?, \
             company_threshold_minutes = ?, employee_threshold_minutes = ? WHERE id = ?",
        )
        .bind(company.overtime_enabled)
        .bind(company.overtime_start_date)
        .bind(company.company_threshold_minutes)
        .bind(company.employee_threshold_minutes)
        .bind(company.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn attendance(&mut self, id: u64) -> Result<Option<Attendance>, TimeclockError> {
        let row = sqlx::query_as::<_, Attendance>("SELECT * FROM attendance WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn latest_attendance(
        &mut self,
        employee_id: u64,
    ) -> Result<Option<Attendance>, TimeclockError> {
        let row = sqlx::query_as::<_, Attendance>(
            "SELECT * FROM attendance WHERE employee_id = ? \
             ORDER BY check_in DESC, id DESC LIMIT 1",
        )
        .bind(employee_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn last_starting_at_or_before(
        &mut self,
        employee_id: u64,
        instant: NaiveDateTime,
        exclude: Option<u64>,
    ) -> Result<Option<Attendance>, TimeclockError> {
        let row = sqlx::query_as::<_, Attendance>(
            "SELECT * FROM attendance WHERE employee_id = ? AND check_in <= ? AND id <> ? \
             ORDER BY check_in DESC, id DESC LIMIT 1",
        )
        .bind(employee_id)
        .bind(instant)
        .bind(exclude.unwrap_or(0))
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn last_starting_before(
        &mut self,
        employee_id: u64,
        instant: NaiveDateTime,
        exclude: Option<u64>,
    ) -> Result<Option<Attendance>, TimeclockError> {
        let row = sqlx::query_as::<_, Attendance>(
            "SELECT * FROM attendance WHERE employee_id = ? AND check_in < ? AND id <> ? \
             ORDER BY check_in DESC, id DESC LIMIT 1",
        )
        .bind(employee_id)
        .bind(instant)
        .bind(exclude.unwrap_or(0))
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn open_attendance(
        &mut self,
        employee_id: u64,
        exclude: Option<u64>,
    ) -> Result<Option<Attendance>, TimeclockError> {
        let row = sqlx::query_as::<_, Attendance>(
            "SELECT * FROM attendance WHERE employee_id = ? AND check_out IS NULL AND id <> ? \
             ORDER BY check_in DESC, id DESC LIMIT 1",
        )
        .bind(employee_id)
        .bind(exclude.unwrap_or(0))
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn insert_attendance(&mut self, record: &Attendance) -> Result<u64, TimeclockError> {
        let result = sqlx::query(
            "INSERT INTO attendance (employee_id, check_in, check_out, worked_hours, \
             overtime_hours, in_mode, in_latitude, in_longitude, in_country, in_city, \
             in_ip_address, in_browser, out_mode, out_latitude, out_longitude, out_country, \
             out_city, out_ip_address, out_browser) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.employee_id)
        .bind(record.check_in)
        .bind(record.check_out)
        .bind(record.worked_hours)
        .bind(record.overtime_hours)
        .bind(record.in_mode)
        .bind(record.in_latitude)
        .bind(record.in_longitude)
        .bind(&record.in_country)
        .bind(&record.in_city)
        .bind(&record.in_ip_address)
        .bind(&record.in_browser)
        .bind(record.out_mode)
        .bind(record.out_latitude)
        .bind(record.out_longitude)
        .bind(&record.out_country)
        .bind(&record.out_city)
        .bind(&record.out_ip_address)
        .bind(&record.out_browser)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.last_insert_id())
    }

    async fn update_attendance(&mut self, record: &Attendance) -> Result<(), TimeclockError> {
        sqlx::query(
            "UPDATE attendance SET employee_id = ?, check_in = ?, check_out = ?, \
             worked_hours = ?, overtime_hours = ?, in_mode = ?, in_latitude = ?, \
             in_longitude = ?, in_country = ?, in_city = ?, in_ip_address = ?, in_browser = ?, \
             out_mode = ?, out_latitude = ?, out_longitude = ?, out_country = ?, out_city = ?, \
             out_ip_address = ?, out_browser = ? WHERE id = ?",
        )
        .bind(record.employee_id)
        .bind(record.check_in)
        .bind(record.check_out)
        .bind(record.worked_hours)
        .bind(record.overtime_hours)
        .bind(record.in_mode)
        .bind(record.in_latitude)
        .bind(record.in_longitude)
        .bind(&record.in_country)
        .bind(&record.in_city)
        .bind(&record.in_ip_address)
        .bind(&record.in_browser)
        .bind(record.out_mode)
        .bind(record.out_latitude)
        .bind(record.out_longitude)
        .bind(&record.out_country)
        .bind(&record.out_city)
        .bind(&record.out_ip_address)
        .bind(&record.out_browser)
        .bind(record.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_attendance(&mut self, id: u64) -> Result<(), TimeclockError> {
        sqlx::query("DELETE FROM attendance WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn attendance_in_windows(
        &mut self,
        employee_id: u64,
        windows: &[(NaiveDateTime, NaiveDateTime)],
    ) -> Result<Vec<Attendance>, TimeclockError> {
        if windows.is_empty() {
            return Ok(Vec::new());
        }
        let mut sql = String::from("SELECT * FROM attendance WHERE employee_id = ? AND (");
        for i in 0..windows.len() {
            if i > 0 {
                sql.push_str(" OR ");
            }
            sql.push_str("(check_in >= ? AND check_in < ?)");
        }
        sql.push_str(") ORDER BY check_in, id");

        let mut query = sqlx::query_as::<_, Attendance>(&sql).bind(employee_id);
        for (lo, hi) in windows {
            query = query.bind(*lo).bind(*hi);
        }
        Ok(query.fetch_all(&mut *self.tx).await?)
    }

    async fn attendance_for_company(
        &mut self,
        company_id: u64,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Result<Vec<Attendance>, TimeclockError> {
        let mut sql = String::from(
            "SELECT a.* FROM attendance a \
             JOIN employees e ON e.id = a.employee_id WHERE e.company_id = ?",
        );
        if from.is_some() {
            sql.push_str(" AND a.check_in >= ?");
        }
        if to.is_some() {
            sql.push_str(" AND a.check_in <= ?");
        }
        sql.push_str(" ORDER BY a.check_in, a.id");

        let mut query = sqlx::query_as::<_, Attendance>(&sql).bind(company_id);
        if let Some(from) = from {
            query = query.bind(from);
        }
        if let Some(to) = to {
            query = query.bind(to);
        }
        Ok(query.fetch_all(&mut *self.tx).await?)
    }

    async fn attendance_for_employee(
        &mut self,
        employee_id: u64,
    ) -> Result<Vec<Attendance>, TimeclockError> {
        let rows = sqlx::query_as::<_, Attendance>(
            "SELECT * FROM attendance WHERE employee_id = ? ORDER BY check_in, id",
        )
        .bind(employee_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn attendance_touching(
        &mut self,
        employee_id: u64,
        day_start: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<Vec<Attendance>, TimeclockError> {
        let rows = sqlx::query_as::<_, Attendance>(
            "SELECT * FROM attendance WHERE employee_id = ? AND check_in <= ? \
             AND (check_out IS NULL OR check_out >= ?) ORDER BY check_in, id",
        )
        .bind(employee_id)
        .bind(now)
        .bind(day_start)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn closed_attendance_between(
        &mut self,
        employee_id: u64,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Attendance>, TimeclockError> {
        let rows = sqlx::query_as::<_, Attendance>(
            "SELECT * FROM attendance WHERE employee_id = ? AND check_in >= ? \
             AND check_out IS NOT NULL AND check_out <= ? ORDER BY check_in, id",
        )
        .bind(employee_id)
        .bind(from)
        .bind(to)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn set_overtime_hours(
        &mut self,
        assignments: &[(u64, f64)],
    ) -> Result<(), TimeclockError> {
        for (id, hours) in assignments {
            sqlx::query("UPDATE attendance SET overtime_hours = ? WHERE id = ?")
                .bind(*hours)
                .bind(*id)
                .execute(&mut *self.tx)
                .await?;
        }
        Ok(())
    }

    async fn overtime_on_days(
        &mut self,
        employee_id: u64,
        days: &[NaiveDate],
    ) -> Result<Vec<Overtime>, TimeclockError> {
        if days.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; days.len()].join(", ");
        let sql = format!(
            "SELECT * FROM overtime WHERE employee_id = ? AND adjustment = FALSE \
             AND date IN ({placeholders}) ORDER BY date, id"
        );
        let mut query = sqlx::query_as::<_, Overtime>(&sql).bind(employee_id);
        for day in days {
            query = query.bind(*day);
        }
        Ok(query.fetch_all(&mut *self.tx).await?)
    }

    async fn overtime_for_employee(
        &mut self,
        employee_id: u64,
    ) -> Result<Vec<Overtime>, TimeclockError> {
        let rows = sqlx::query_as::<_, Overtime>(
            "SELECT * FROM overtime WHERE employee_id = ? ORDER BY date, id",
        )
        .bind(employee_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn insert_overtime(&mut self, record: &Overtime) -> Result<u64, TimeclockError> {
        let result = sqlx::query(
            "INSERT INTO overtime (employee_id, date, duration, duration_real, adjustment, note) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(record.employee_id)
        .bind(record.date)
        .bind(record.duration)
        .bind(record.duration_real)
        .bind(record.adjustment)
        .bind(&record.note)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.last_insert_id())
    }

    async fn insert_overtime_batch(&mut self, rows: &[Overtime]) -> Result<(), TimeclockError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut sql = String::from(
            "INSERT INTO overtime (employee_id, date, duration, duration_real, adjustment, note) VALUES ",
        );
        for i in 0..rows.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str("(?, ?, ?, ?, ?, ?)");
        }
        let mut query = sqlx::query(&sql);
        for row in rows {
            query = query
                .bind(row.employee_id)
                .bind(row.date)
                .bind(row.duration)
                .bind(row.duration_real)
                .bind(row.adjustment)
                .bind(&row.note);
        }
        query.execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn update_overtime_durations(
        &mut self,
        id: u64,
        duration: f64,
        duration_real: f64,
    ) -> Result<(), TimeclockError> {
        sqlx::query("UPDATE overtime SET duration = ?, duration_real = ? WHERE id = ?")
            .bind(duration)
            .bind(duration_real)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_overtime_batch(&mut self, ids: &[u64]) -> Result<(), TimeclockError> {
        if ids.is_empty() {
            return Ok(());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("DELETE FROM overtime WHERE id IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        query.execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn delete_computed_overtime(
        &mut self,
        employee_id: u64,
        before: Option<NaiveDate>,
    ) -> Result<u64, TimeclockError> {
        let mut sql =
            String::from("DELETE FROM overtime WHERE employee_id = ? AND adjustment = FALSE");
        if before.is_some() {
            sql.push_str(" AND date < ?");
        }
        let mut query = sqlx::query(&sql).bind(employee_id);
        if let Some(limit) = before {
            query = query.bind(limit);
        }
        let result = query.execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn time_off_overlapping(
        &mut self,
        company_id: u64,
        employee_id: u64,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Result<Vec<TimeOff>, TimeclockError> {
        let rows = sqlx::query_as::<_, TimeOff>(
            "SELECT * FROM time_off WHERE company_id = ? \
             AND (employee_id IS NULL OR employee_id = ?) \
             AND date_from < ? AND date_to > ? ORDER BY date_from, id",
        )
        .bind(company_id)
        .bind(employee_id)
        .bind(stop)
        .bind(start)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn insert_time_off(&mut self, row: &TimeOff) -> Result<u64, TimeclockError> {
        let result = sqlx::query(
            "INSERT INTO time_off (company_id, employee_id, date_from, date_to, reason) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(row.company_id)
        .bind(row.employee_id)
        .bind(row.date_from)
        .bind(row.date_to)
        .bind(&row.reason)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.last_insert_id())
    }
}
