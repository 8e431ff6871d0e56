use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Whether a weekly slot counts as expected working time or as a lunch break
/// to be subtracted from presence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SlotKind {
    Work,
    Lunch,
}

/// Calendar header row; slots live in `calendar_slots`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct WorkCalendarRow {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Standard 38h week")]
    pub name: String,
    #[schema(example = "Europe/Brussels")]
    pub tz: String,
}

/// One weekly slot: local wall times on a weekday. `weekday` is stored as
/// 0 = Monday .. 6 = Sunday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct CalendarSlotRow {
    #[schema(example = 4)]
    pub id: u64,
    #[schema(example = 1)]
    pub calendar_id: u64,
    #[schema(example = 0, minimum = 0, maximum = 6)]
    pub weekday: u8,
    #[schema(example = "09:00:00", value_type = String, format = "time")]
    pub start_time: NaiveTime,
    #[schema(example = "12:00:00", value_type = String, format = "time")]
    pub end_time: NaiveTime,
    #[schema(example = "work")]
    pub kind: SlotKind,
}

pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}
