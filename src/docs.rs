use crate::api::attendance::{AttendanceListResponse, AttendanceQuery};
use crate::api::employee::{CreateEmployee, EmployeeInfo, EmployeeListResponse, EmployeeQuery};
use crate::api::overtime::{NewAdjustment, OvertimeListResponse, OvertimeQuery};
use crate::api::time_off::{NewTimeOff, TimeOffListResponse, TimeOffQuery};
use crate::engine::presence::AttendanceState;
use crate::engine::timeline::{AttendanceUpdate, NewAttendance};
use crate::model::attendance::{Attendance, CaptureMetadata, CaptureMode};
use crate::model::company::{Company, OvertimeSettings};
use crate::model::employee::Employee;
use crate::model::overtime::Overtime;
use crate::model::time_off::TimeOff;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Timeclock API",
        version = "1.0.0",
        description = r#"
## Attendance & Overtime Service

This API tracks **employee presence intervals** and keeps a per-day
**overtime ledger** reconciled against each employee's work calendar.

### 🔹 Key Features
- **Check-in / Check-out**
  - One open record per employee, validated against the full timeline
- **Attendance Management**
  - Manual records, corrections, and filtered history for officers
- **Overtime Ledger**
  - One computed row per employee and local day, plus manual adjustments
- **Work Calendars & Time Off**
  - Expected hours per weekday, lunch breaks, and global or personal leave

### 🔐 Security
Most endpoints are protected using **JWT Bearer authentication**.
Manual timeline edits and settings changes need the **Officer** or
**Admin** role.

### 📦 Response Format
- JSON-based RESTful responses
- Pagination supported for list endpoints

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::list_attendance,
        crate::api::attendance::create_attendance,
        crate::api::attendance::get_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance,
        crate::api::attendance::copy_attendance,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::get_employee_info,

        crate::api::overtime::list_overtime,
        crate::api::overtime::create_adjustment,
        crate::api::overtime::get_overtime_settings,
        crate::api::overtime::update_overtime_settings,

        crate::api::time_off::create_time_off,
        crate::api::time_off::list_time_off,
        crate::api::time_off::get_time_off
    ),
    components(
        schemas(
            Attendance,
            CaptureMetadata,
            CaptureMode,
            AttendanceState,
            NewAttendance,
            AttendanceUpdate,
            AttendanceQuery,
            AttendanceListResponse,
            Employee,
            CreateEmployee,
            EmployeeQuery,
            EmployeeListResponse,
            EmployeeInfo,
            Company,
            OvertimeSettings,
            Overtime,
            NewAdjustment,
            OvertimeQuery,
            OvertimeListResponse,
            TimeOff,
            NewTimeOff,
            TimeOffQuery,
            TimeOffListResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Check-in/check-out and attendance records"),
        (name = "Employee", description = "Employee directory and presence projection"),
        (name = "Overtime", description = "Overtime ledger and company settings"),
        (name = "TimeOff", description = "Global and personal time off"),
    )
)]
pub struct ApiDoc;
