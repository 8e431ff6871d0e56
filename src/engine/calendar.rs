use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use chrono_tz::Tz;

use crate::model::calendar::{weekday_from_index, CalendarSlotRow, SlotKind, WorkCalendarRow};
use crate::model::time_off::TimeOff;

use super::interval::{Interval, IntervalSet};
use super::{to_local, to_utc};

/// One weekly slot with its weekday resolved and invalid rows filtered out.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarSlot {
    pub id: u64,
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub kind: SlotKind,
}

/// A work calendar ready for interval expansion: the timezone the weekly
/// wall times are expressed in, plus the slots themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkCalendar {
    pub id: u64,
    pub tz: Tz,
    pub slots: Vec<CalendarSlot>,
}

impl WorkCalendar {
    /// Builds a calendar from its stored rows. Slots with `end <= start` or
    /// an out-of-range weekday are dropped; an unknown timezone name
    /// degrades to UTC.
    pub fn from_rows(row: &WorkCalendarRow, slots: &[CalendarSlotRow]) -> Self {
        let tz = row.tz.parse().unwrap_or(chrono_tz::UTC);
        let slots = slots
            .iter()
            .filter(|slot| slot.end_time > slot.start_time)
            .filter_map(|slot| {
                weekday_from_index(slot.weekday).map(|weekday| CalendarSlot {
                    id: slot.id,
                    weekday,
                    start: slot.start_time,
                    end: slot.end_time,
                    kind: slot.kind,
                })
            })
            .collect();
        WorkCalendar { id: row.id, tz, slots }
    }

    /// Expected working time over `[start, stop)` (naive UTC), payload =
    /// slot id.
    pub fn work_intervals(&self, start: NaiveDateTime, stop: NaiveDateTime) -> IntervalSet<u64> {
        self.slot_intervals(SlotKind::Work, start, stop)
    }

    /// Lunch breaks over `[start, stop)` (naive UTC).
    pub fn lunch_intervals(&self, start: NaiveDateTime, stop: NaiveDateTime) -> IntervalSet<u64> {
        self.slot_intervals(SlotKind::Lunch, start, stop)
    }

    /// Time-off rows clipped to `[start, stop)` and normalized. Company-wide
    /// and employee-specific rows are passed together; the caller filters.
    pub fn leave_intervals(
        leaves: &[TimeOff],
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> IntervalSet<()> {
        let clipped = leaves
            .iter()
            .filter_map(|leave| {
                let lo = leave.date_from.max(start);
                let hi = leave.date_to.min(stop);
                (hi > lo).then(|| Interval::new(lo, hi, ()))
            })
            .collect();
        IntervalSet::from_intervals(clipped)
    }

    /// Work intervals minus time off.
    pub fn expected_intervals(
        &self,
        leaves: &[TimeOff],
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> IntervalSet<u64> {
        self.work_intervals(start, stop)
            .difference(&Self::leave_intervals(leaves, start, stop))
    }

    fn slot_intervals(
        &self,
        kind: SlotKind,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> IntervalSet<u64> {
        if stop <= start {
            return IntervalSet::new();
        }
        let mut expanded = Vec::new();
        let mut day = to_local(self.tz, start).date();
        let last = to_local(self.tz, stop).date();
        while day <= last {
            for slot in &self.slots {
                if slot.kind != kind || slot.weekday != day.weekday() {
                    continue;
                }
                let lo = to_utc(self.tz, day.and_time(slot.start)).max(start);
                let hi = to_utc(self.tz, day.and_time(slot.end)).min(stop);
                if hi > lo {
                    expanded.push(Interval::new(lo, hi, slot.id));
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        IntervalSet::from_intervals(expanded)
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

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
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

    /// Mon-Fri 09:00-12:00 and 13:00-17:00 work, 12:00-13:00 lunch, Brussels.
    fn weekly_calendar() -> WorkCalendar {
        let header = WorkCalendarRow {
            id: 1,
            name: "Standard week".into(),
            tz: "Europe/Brussels".into(),
        };
        let mut rows = Vec::new();
        for weekday in 0..5u8 {
            rows.push(slot(
                u64::from(weekday) * 3 + 1,
                weekday,
                t(9, 0),
                t(12, 0),
                SlotKind::Work,
            ));
            rows.push(slot(
                u64::from(weekday) * 3 + 2,
                weekday,
                t(13, 0),
                t(17, 0),
                SlotKind::Work,
            ));
            rows.push(slot(
                u64::from(weekday) * 3 + 3,
                weekday,
                t(12, 0),
                t(13, 0),
                SlotKind::Lunch,
            ));
        }
        WorkCalendar::from_rows(&header, &rows)
    }

    #[test]
    fn expands_work_slots_to_utc() {
        let cal = weekly_calendar();
        // Monday 2025-01-06, CET (UTC+1): local midnight is 2025-01-05 23:00 UTC.
        let windows = cal.work_intervals(dt(2025, 1, 5, 23, 0), dt(2025, 1, 6, 23, 0));
        let parts: Vec<_> = windows.iter().collect();
        assert_eq!(parts.len(), 2);
        assert_eq!((parts[0].start, parts[0].stop), (dt(2025, 1, 6, 8, 0), dt(2025, 1, 6, 11, 0)));
        assert_eq!((parts[1].start, parts[1].stop), (dt(2025, 1, 6, 12, 0), dt(2025, 1, 6, 16, 0)));
        assert!((windows.total_hours() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn weekend_has_no_expected_time() {
        let cal = weekly_calendar();
        // Saturday 2025-01-11.
        let windows = cal.work_intervals(dt(2025, 1, 10, 23, 0), dt(2025, 1, 11, 23, 0));
        assert!(windows.is_empty());
    }

    #[test]
    fn clips_to_requested_range() {
        let cal = weekly_calendar();
        let windows = cal.work_intervals(dt(2025, 1, 6, 9, 0), dt(2025, 1, 6, 10, 0));
        let parts: Vec<_> = windows.iter().collect();
        assert_eq!(parts.len(), 1);
        assert_eq!((parts[0].start, parts[0].stop), (dt(2025, 1, 6, 9, 0), dt(2025, 1, 6, 10, 0)));
    }

    #[test]
    fn summer_offset_shifts_utc_expansion() {
        let cal = weekly_calendar();
        // Monday 2025-03-31 is CEST (UTC+2): 09:00 local = 07:00 UTC.
        let windows = cal.work_intervals(dt(2025, 3, 30, 22, 0), dt(2025, 3, 31, 22, 0));
        assert_eq!(windows.earliest_start(), Some(dt(2025, 3, 31, 7, 0)));
        assert_eq!(windows.latest_stop(), Some(dt(2025, 3, 31, 15, 0)));
    }

    #[test]
    fn invalid_slots_are_dropped() {
        let header = WorkCalendarRow {
            id: 2,
            name: "Broken".into(),
            tz: "Europe/Brussels".into(),
        };
        let rows = vec![
            slot(1, 0, t(17, 0), t(9, 0), SlotKind::Work),
            slot(2, 9, t(9, 0), t(17, 0), SlotKind::Work),
        ];
        let cal = WorkCalendar::from_rows(&header, &rows);
        assert!(cal.slots.is_empty());
    }

    #[test]
    fn leaves_subtract_from_expected_time() {
        let cal = weekly_calendar();
        let leaves = vec![TimeOff {
            id: 1,
            company_id: 1,
            employee_id: None,
            // Monday afternoon off: 13:00-17:00 local = 12:00-16:00 UTC.
            date_from: dt(2025, 1, 6, 12, 0),
            date_to: dt(2025, 1, 6, 16, 0),
            reason: Some("company holiday".into()),
        }];
        let expected = cal.expected_intervals(&leaves, dt(2025, 1, 5, 23, 0), dt(2025, 1, 6, 23, 0));
        let parts: Vec<_> = expected.iter().collect();
        assert_eq!(parts.len(), 1);
        assert_eq!((parts[0].start, parts[0].stop), (dt(2025, 1, 6, 8, 0), dt(2025, 1, 6, 11, 0)));
    }

    #[test]
    fn unknown_tz_falls_back_to_utc() {
        let header = WorkCalendarRow {
            id: 3,
            name: "No tz".into(),
            tz: "Not/AZone".into(),
        };
        let cal = WorkCalendar::from_rows(&header, &[slot(1, 0, t(9, 0), t(17, 0), SlotKind::Work)]);
        assert_eq!(cal.tz, chrono_tz::UTC);
        let windows = cal.work_intervals(dt(2025, 1, 6, 0, 0), dt(2025, 1, 7, 0, 0));
        assert_eq!(windows.earliest_start(), Some(dt(2025, 1, 6, 9, 0)));
    }
}
