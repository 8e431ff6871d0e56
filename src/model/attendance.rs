use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// How a check-in/check-out was captured.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CaptureMode {
    Kiosk,
    Systray,
    Manual,
}

impl Default for CaptureMode {
    fn default() -> Self {
        CaptureMode::Manual
    }
}

/// One presence interval for one employee. `check_out = NULL` means the
/// record is open ("currently present"); `worked_hours` is only set once it
/// closes. `overtime_hours` is rewritten by the attribution pass whenever the
/// employee's overtime records change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 7,
    "employee_id": 3,
    "check_in": "2025-01-06T08:02:11",
    "check_out": "2025-01-06T16:58:40",
    "worked_hours": 7.94,
    "overtime_hours": 0.0,
    "in_mode": "systray",
    "in_ip_address": "10.1.4.27",
    "out_mode": "systray"
}))]
pub struct Attendance {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = 3)]
    pub employee_id: u64,
    #[schema(example = "2025-01-06T08:02:11", value_type = String, format = "date-time")]
    pub check_in: NaiveDateTime,
    #[schema(example = "2025-01-06T16:58:40", value_type = String, format = "date-time", nullable = true)]
    pub check_out: Option<NaiveDateTime>,
    #[schema(example = 7.94, nullable = true)]
    pub worked_hours: Option<f64>,
    #[schema(example = 0.0)]
    pub overtime_hours: f64,

    pub in_mode: CaptureMode,
    pub in_latitude: Option<f64>,
    pub in_longitude: Option<f64>,
    pub in_country: Option<String>,
    pub in_city: Option<String>,
    pub in_ip_address: Option<String>,
    pub in_browser: Option<String>,

    pub out_mode: Option<CaptureMode>,
    pub out_latitude: Option<f64>,
    pub out_longitude: Option<f64>,
    pub out_country: Option<String>,
    pub out_city: Option<String>,
    pub out_ip_address: Option<String>,
    pub out_browser: Option<String>,
}

impl Attendance {
    /// A fresh open record, as created by the check-in action.
    pub fn open(employee_id: u64, check_in: NaiveDateTime, meta: &CaptureMetadata) -> Self {
        let mut record = Attendance {
            id: 0,
            employee_id,
            check_in,
            check_out: None,
            worked_hours: None,
            overtime_hours: 0.0,
            in_mode: CaptureMode::Manual,
            in_latitude: None,
            in_longitude: None,
            in_country: None,
            in_city: None,
            in_ip_address: None,
            in_browser: None,
            out_mode: None,
            out_latitude: None,
            out_longitude: None,
            out_country: None,
            out_city: None,
            out_ip_address: None,
            out_browser: None,
        };
        record.apply_in_meta(meta);
        record
    }

    pub fn is_open(&self) -> bool {
        self.check_out.is_none()
    }

    pub fn apply_in_meta(&mut self, meta: &CaptureMetadata) {
        self.in_mode = meta.mode.unwrap_or_default();
        self.in_latitude = meta.latitude;
        self.in_longitude = meta.longitude;
        self.in_country = meta.country.clone();
        self.in_city = meta.city.clone();
        self.in_ip_address = meta.ip_address.clone();
        self.in_browser = meta.browser.clone();
    }

    /// Clears the closing side entirely, returning the record to the open
    /// state.
    pub fn reopen(&mut self) {
        self.check_out = None;
        self.worked_hours = None;
        self.out_mode = None;
        self.out_latitude = None;
        self.out_longitude = None;
        self.out_country = None;
        self.out_city = None;
        self.out_ip_address = None;
        self.out_browser = None;
    }

    pub fn apply_out_meta(&mut self, meta: &CaptureMetadata) {
        self.out_mode = Some(meta.mode.unwrap_or_default());
        self.out_latitude = meta.latitude;
        self.out_longitude = meta.longitude;
        self.out_country = meta.country.clone();
        self.out_city = meta.city.clone();
        self.out_ip_address = meta.ip_address.clone();
        self.out_browser = meta.browser.clone();
    }
}

/// Capture metadata for one side of a record. Opaque passthrough: the engine
/// persists it verbatim and never computes with it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CaptureMetadata {
    #[schema(example = "kiosk", nullable = true)]
    pub mode: Option<CaptureMode>,
    #[schema(example = 50.8467, nullable = true)]
    pub latitude: Option<f64>,
    #[schema(example = 4.3525, nullable = true)]
    pub longitude: Option<f64>,
    #[schema(example = "Belgium", nullable = true)]
    pub country: Option<String>,
    #[schema(example = "Brussels", nullable = true)]
    pub city: Option<String>,
    #[schema(example = "10.1.4.27", nullable = true)]
    pub ip_address: Option<String>,
    #[schema(example = "firefox", nullable = true)]
    pub browser: Option<String>,
}
