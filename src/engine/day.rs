use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;

use crate::model::attendance::Attendance;
use crate::model::company::Company;

use super::{to_local, to_utc};

/// One employee-local day: the local date an instant falls on, plus that
/// date's local midnight expressed as naive UTC. Ordering follows
/// `(day, start_utc)` so buckets iterate chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DayBucket {
    pub day: NaiveDate,
    pub start_utc: NaiveDateTime,
}

impl DayBucket {
    pub fn for_instant(tz: Tz, utc: NaiveDateTime) -> Self {
        let day = to_local(tz, utc).date();
        let start_utc = to_utc(tz, day.and_time(NaiveTime::MIN));
        DayBucket { day, start_utc }
    }

    /// The `[start, stop)` window the day's attendance is collected from.
    pub fn window(&self) -> (NaiveDateTime, NaiveDateTime) {
        (self.start_utc, self.start_utc + Duration::hours(24))
    }
}

/// Day buckets needing overtime reconciliation, keyed by employee id.
pub type BucketMap = BTreeMap<u64, BTreeSet<DayBucket>>;

pub fn merge_buckets(into: &mut BucketMap, from: BucketMap) {
    for (employee_id, buckets) in from {
        into.entry(employee_id).or_default().extend(buckets);
    }
}

/// The day buckets a record contributes to: check_in's local day plus, for
/// closed records, check_out's. Empty when the company has overtime disabled
/// or the record's check_in falls on a local date before the overtime start
/// date.
pub fn affected_buckets(tz: Tz, company: &Company, record: &Attendance) -> BTreeSet<DayBucket> {
    let mut buckets = BTreeSet::new();
    if !company.overtime_enabled {
        return buckets;
    }
    let check_in_bucket = DayBucket::for_instant(tz, record.check_in);
    if let Some(start) = company.overtime_start_date {
        if check_in_bucket.day < start {
            return buckets;
        }
    }
    buckets.insert(check_in_bucket);
    if let Some(check_out) = record.check_out {
        buckets.insert(DayBucket::for_instant(tz, check_out));
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::CaptureMetadata;
    use chrono::NaiveDate;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn d(y: i32, mo: u32, d_: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, mo, d_).unwrap()
    }

    fn company(enabled: bool, start: Option<NaiveDate>) -> Company {
        Company {
            id: 1,
            name: "Acme".into(),
            calendar_id: None,
            overtime_enabled: enabled,
            overtime_start_date: start,
            company_threshold_minutes: 15,
            employee_threshold_minutes: 15,
            display_overtime: true,
            display_systray: true,
            use_pin: false,
        }
    }

    fn record(check_in: NaiveDateTime, check_out: Option<NaiveDateTime>) -> Attendance {
        let mut rec = Attendance::open(1, check_in, &CaptureMetadata::default());
        rec.check_out = check_out;
        rec
    }

    #[test]
    fn bucket_tracks_local_date_east_of_utc() {
        let tz: Tz = "Europe/Brussels".parse().unwrap();
        // 23:30 UTC on Jan 5 is already Jan 6 00:30 in Brussels.
        let bucket = DayBucket::for_instant(tz, dt(2025, 1, 5, 23, 30));
        assert_eq!(bucket.day, d(2025, 1, 6));
        assert_eq!(bucket.start_utc, dt(2025, 1, 5, 23, 0));
        assert_eq!(bucket.window(), (dt(2025, 1, 5, 23, 0), dt(2025, 1, 6, 23, 0)));
    }

    #[test]
    fn bucket_tracks_local_date_west_of_utc() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // 03:00 UTC on Jan 6 is still Jan 5, 22:00 in New York (UTC-5).
        let bucket = DayBucket::for_instant(tz, dt(2025, 1, 6, 3, 0));
        assert_eq!(bucket.day, d(2025, 1, 5));
        assert_eq!(bucket.start_utc, dt(2025, 1, 5, 5, 0));
    }

    #[test]
    fn overnight_record_touches_two_buckets() {
        let tz: Tz = "Europe/Brussels".parse().unwrap();
        let rec = record(dt(2025, 1, 6, 20, 0), Some(dt(2025, 1, 7, 4, 0)));
        let buckets = affected_buckets(tz, &company(true, None), &rec);
        let days: Vec<_> = buckets.iter().map(|b| b.day).collect();
        assert_eq!(days, vec![d(2025, 1, 6), d(2025, 1, 7)]);
    }

    #[test]
    fn disabled_company_yields_no_buckets() {
        let tz: Tz = "Europe/Brussels".parse().unwrap();
        let rec = record(dt(2025, 1, 6, 8, 0), Some(dt(2025, 1, 6, 16, 0)));
        assert!(affected_buckets(tz, &company(false, None), &rec).is_empty());
    }

    #[test]
    fn records_before_start_date_are_skipped_entirely() {
        let tz: Tz = "Europe/Brussels".parse().unwrap();
        // check_in local date Jan 6, check_out Jan 7: a start date of Jan 7
        // drops the whole record, check_out bucket included.
        let rec = record(dt(2025, 1, 6, 20, 0), Some(dt(2025, 1, 7, 4, 0)));
        let buckets = affected_buckets(tz, &company(true, Some(d(2025, 1, 7))), &rec);
        assert!(buckets.is_empty());

        let on_start = affected_buckets(tz, &company(true, Some(d(2025, 1, 6))), &rec);
        assert_eq!(on_start.len(), 2);
    }

    #[test]
    fn merge_unions_per_employee() {
        let tz: Tz = "Europe/Brussels".parse().unwrap();
        let mut all: BucketMap = BTreeMap::new();
        let mut one = BTreeMap::new();
        one.insert(
            3u64,
            BTreeSet::from([DayBucket::for_instant(tz, dt(2025, 1, 6, 8, 0))]),
        );
        let mut two = BTreeMap::new();
        two.insert(
            3u64,
            BTreeSet::from([
                DayBucket::for_instant(tz, dt(2025, 1, 6, 15, 0)),
                DayBucket::for_instant(tz, dt(2025, 1, 7, 8, 0)),
            ]),
        );
        merge_buckets(&mut all, one);
        merge_buckets(&mut all, two);
        assert_eq!(all.len(), 1);
        assert_eq!(all[&3].len(), 2);
    }
}
