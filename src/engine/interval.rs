use chrono::NaiveDateTime;

/// A half-open span `[start, stop)` tagged with an opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval<P> {
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
    pub payload: P,
}

impl<P> Interval<P> {
    pub fn new(start: NaiveDateTime, stop: NaiveDateTime, payload: P) -> Self {
        Interval {
            start,
            stop,
            payload,
        }
    }

    pub fn hours(&self) -> f64 {
        (self.stop - self.start).num_seconds() as f64 / 3600.0
    }
}

/// A normalized sequence of half-open intervals: sorted by start, no two
/// stored intervals overlap, zero-length entries elided. Overlapping or
/// touching intervals merge on insert, keeping the earliest payload.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalSet<P> {
    items: Vec<Interval<P>>,
}

impl<P> Default for IntervalSet<P> {
    fn default() -> Self {
        IntervalSet { items: Vec::new() }
    }
}

impl<P: Clone> IntervalSet<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(start: NaiveDateTime, stop: NaiveDateTime, payload: P) -> Self {
        Self::from_intervals(vec![Interval::new(start, stop, payload)])
    }

    pub fn from_intervals(intervals: Vec<Interval<P>>) -> Self {
        let mut sorted: Vec<Interval<P>> = intervals
            .into_iter()
            .filter(|iv| iv.stop > iv.start)
            .collect();
        sorted.sort_by_key(|iv| (iv.start, iv.stop));

        let mut items: Vec<Interval<P>> = Vec::with_capacity(sorted.len());
        for iv in sorted {
            match items.last_mut() {
                Some(last) if iv.start <= last.stop => {
                    if iv.stop > last.stop {
                        last.stop = iv.stop;
                    }
                }
                _ => items.push(iv),
            }
        }
        IntervalSet { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interval<P>> {
        self.items.iter()
    }

    pub fn earliest_start(&self) -> Option<NaiveDateTime> {
        self.items.first().map(|iv| iv.start)
    }

    pub fn latest_stop(&self) -> Option<NaiveDateTime> {
        self.items.last().map(|iv| iv.stop)
    }

    /// Total covered duration in hours.
    pub fn total_hours(&self) -> f64 {
        self.items.iter().map(Interval::hours).sum()
    }

    /// Subtracts `other` from `self`. Payloads of `other` are irrelevant; the
    /// result keeps the payloads of `self`, splitting intervals as needed.
    pub fn difference<Q>(&self, other: &IntervalSet<Q>) -> IntervalSet<P> {
        let mut items = Vec::with_capacity(self.items.len());
        for iv in &self.items {
            let mut cursor = iv.start;
            for hole in &other.items {
                if hole.stop <= cursor {
                    continue;
                }
                if hole.start >= iv.stop {
                    break;
                }
                if hole.start > cursor {
                    items.push(Interval::new(cursor, hole.start, iv.payload.clone()));
                }
                cursor = cursor.max(hole.stop);
                if cursor >= iv.stop {
                    break;
                }
            }
            if cursor < iv.stop {
                items.push(Interval::new(cursor, iv.stop, iv.payload.clone()));
            }
        }
        // Subtracting from a normalized set cannot reintroduce overlaps.
        IntervalSet { items }
    }
}

impl<P: Clone> FromIterator<Interval<P>> for IntervalSet<P> {
    fn from_iter<T: IntoIterator<Item = Interval<P>>>(iter: T) -> Self {
        Self::from_intervals(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn normalization_merges_overlapping_and_touching() {
        let set = IntervalSet::from_intervals(vec![
            Interval::new(ts(13, 0), ts(17, 0), "b"),
            Interval::new(ts(9, 0), ts(12, 0), "a"),
            Interval::new(ts(12, 0), ts(13, 0), "c"),
        ]);
        assert_eq!(set.len(), 1);
        let merged = set.iter().next().unwrap();
        assert_eq!(merged.start, ts(9, 0));
        assert_eq!(merged.stop, ts(17, 0));
        assert_eq!(merged.payload, "a");
    }

    #[test]
    fn zero_length_intervals_are_dropped() {
        let set = IntervalSet::from_intervals(vec![Interval::new(ts(9, 0), ts(9, 0), ())]);
        assert!(set.is_empty());
        assert_eq!(set.total_hours(), 0.0);
    }

    #[test]
    fn difference_splits_and_keeps_payload() {
        let work = IntervalSet::single(ts(9, 0), ts(17, 0), 42u64);
        let lunch = IntervalSet::single(ts(12, 0), ts(13, 0), ());
        let net = work.difference(&lunch);
        let parts: Vec<_> = net.iter().collect();
        assert_eq!(parts.len(), 2);
        assert_eq!((parts[0].start, parts[0].stop), (ts(9, 0), ts(12, 0)));
        assert_eq!((parts[1].start, parts[1].stop), (ts(13, 0), ts(17, 0)));
        assert!(parts.iter().all(|iv| iv.payload == 42));
        assert!((net.total_hours() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn difference_with_full_cover_removes_interval() {
        let work = IntervalSet::single(ts(10, 0), ts(11, 0), ());
        let cover = IntervalSet::single(ts(9, 0), ts(12, 0), ());
        assert!(work.difference(&cover).is_empty());
    }

    #[test]
    fn difference_ignores_touching_holes() {
        // Half-open semantics: a hole ending exactly at our start removes nothing.
        let work = IntervalSet::single(ts(12, 0), ts(14, 0), ());
        let hole = IntervalSet::single(ts(10, 0), ts(12, 0), ());
        let net = work.difference(&hole);
        assert_eq!(net.len(), 1);
        assert!((net.total_hours() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn difference_over_multiple_holes() {
        let work = IntervalSet::single(ts(8, 0), ts(18, 0), "day");
        let holes = IntervalSet::from_intervals(vec![
            Interval::new(ts(10, 0), ts(10, 30), ()),
            Interval::new(ts(12, 0), ts(13, 0), ()),
            Interval::new(ts(17, 30), ts(19, 0), ()),
        ]);
        let net = work.difference(&holes);
        assert_eq!(net.len(), 3);
        assert!((net.total_hours() - 8.0).abs() < 1e-9);
        assert_eq!(net.earliest_start(), Some(ts(8, 0)));
        assert_eq!(net.latest_stop(), Some(ts(17, 30)));
    }
}
