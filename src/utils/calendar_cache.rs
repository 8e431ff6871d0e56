use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::calendar::WorkCalendar;
use crate::model::calendar::{CalendarSlotRow, WorkCalendarRow};

/// Work calendars are read by every reconciliation but change very rarely,
/// so they live in a TTL cache instead of being re-assembled per request.
pub static CALENDAR_CACHE: Lazy<Cache<u64, Arc<WorkCalendar>>> = Lazy::new(|| {
    let ttl_secs = std::env::var("CALENDAR_CACHE_TTL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3600); // calendars refresh within the hour
    Cache::builder()
        .max_capacity(10_000)
        .time_to_live(Duration::from_secs(ttl_secs))
        .build()
});

pub async fn get(calendar_id: u64) -> Option<Arc<WorkCalendar>> {
    CALENDAR_CACHE.get(&calendar_id).await
}

pub async fn insert(calendar_id: u64, calendar: Arc<WorkCalendar>) {
    CALENDAR_CACHE.insert(calendar_id, calendar).await;
}

/// Load every calendar with its slots into the in-memory cache at boot.
pub async fn warmup_calendar_cache(pool: &MySqlPool) -> Result<()> {
    let headers = sqlx::query_as::<_, WorkCalendarRow>("SELECT * FROM work_calendars")
        .fetch_all(pool)
        .await?;

    let mut slots_by_calendar: BTreeMap<u64, Vec<CalendarSlotRow>> = BTreeMap::new();
    let mut stream = sqlx::query_as::<_, CalendarSlotRow>(
        "SELECT * FROM calendar_slots ORDER BY calendar_id, weekday, start_time",
    )
    .fetch(pool);

    while let Some(row) = stream.next().await {
        let slot = row?;
        slots_by_calendar
            .entry(slot.calendar_id)
            .or_default()
            .push(slot);
    }

    let total = headers.len();
    for header in headers {
        let slots = slots_by_calendar.remove(&header.id).unwrap_or_default();
        insert(header.id, Arc::new(WorkCalendar::from_rows(&header, &slots))).await;
    }

    log::info!("Calendar cache warmup complete: {} calendars", total);

    Ok(())
}
