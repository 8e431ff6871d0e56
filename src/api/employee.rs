use crate::{
    auth::auth::AuthUser,
    engine::{presence, presence::AttendanceState, rounding::round2, EmployeeCtx},
    error::TimeclockError,
    model::employee::Employee,
    store::{MySqlStore, TimelineStore},
    utils::db_utils::{build_update_sql, execute_update},
};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = 1)]
    pub company_id: u64,
    #[schema(example = "EMP-003", value_type = String)]
    pub employee_code: String,
    #[schema(example = "Mina", value_type = String)]
    pub first_name: String,
    #[schema(example = "Verhulst", value_type = String)]
    pub last_name: String,
    #[schema(example = "mina.verhulst@acme.example", format = "email", value_type = String)]
    pub email: String,
    #[schema(example = "https://cdn.acme.example/avatars/3.png", nullable = true)]
    pub avatar_url: Option<String>,
    /// IANA timezone name; defaults to UTC.
    #[schema(example = "Europe/Brussels", nullable = true)]
    pub tz: Option<String>,
    #[schema(example = 1, nullable = true)]
    pub calendar_id: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub company_id: Option<u64>,
    pub calendar_id: Option<u64>,
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 5)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

/// What the kiosk and the systray widget need to render one employee:
/// identity, live presence figures, and the company display flags.
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 3,
    "employee_name": "Mina Verhulst",
    "employee_avatar": null,
    "hours_today": 3.52,
    "last_check_in": "2025-01-06T08:02:11",
    "attendance_state": "checked_in",
    "use_pin": false,
    "display_systray": true,
    "display_overtime": true,
    "total_overtime": 12.25
}))]
pub struct EmployeeInfo {
    pub id: u64,
    pub employee_name: String,
    pub employee_avatar: Option<String>,
    /// Rounded to 2 decimals.
    pub hours_today: f64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_check_in: Option<NaiveDateTime>,
    pub attendance_state: AttendanceState,
    pub use_pin: bool,
    pub display_systray: bool,
    pub display_overtime: bool,
    pub total_overtime: f64,
}

/// Builds the info projection from the live presence summary. Shared with
/// the check-in/check-out handlers so their responses carry fresh figures.
pub(crate) async fn employee_info(
    store: &mut dyn TimelineStore,
    ctx: &EmployeeCtx,
    now: NaiveDateTime,
) -> Result<EmployeeInfo, TimeclockError> {
    let summary = presence::summary(store, ctx, now).await?;
    Ok(EmployeeInfo {
        id: ctx.employee.id,
        employee_name: ctx.employee.display_name(),
        employee_avatar: ctx.employee.avatar_url.clone(),
        hours_today: round2(summary.hours_today),
        last_check_in: summary.last_check_in,
        attendance_state: summary.attendance_state,
        use_pin: ctx.company.use_pin,
        display_systray: ctx.company.display_systray,
        display_overtime: ctx.company.display_overtime,
        total_overtime: summary.total_overtime,
    })
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created successfully", body = Object, example = json!({
            "message": "Employee created successfully",
            "id": 3
        })),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error", body = Object, example = json!({
            "message": "Something went wrong, Contact with system admin"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_officer()?;

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (company_id, employee_code, first_name, last_name, email, avatar_url, tz, calendar_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.company_id)
    .bind(&payload.employee_code)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&payload.email)
    .bind(&payload.avatar_url)
    .bind(payload.tz.as_deref().unwrap_or("UTC"))
    .bind(payload.calendar_id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(res) => Ok(HttpResponse::Created().json(json!({
            "message": "Employee created successfully",
            "id": res.last_insert_id()
        }))),
        Err(e) => {
            error!(error = %e, "Failed to Create Employee");
            Ok(HttpResponse::InternalServerError().json(json!({
                "message":"Something went wrong, Contact with system admin"
            })))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/employees",
    params(
        ("page", Query, description = "Page number"),
        ("per_page", Query, description = "Items per page"),
        ("company_id", Query, description = "Filter by company"),
        ("calendar_id", Query, description = "Filter by work calendar"),
        ("search", Query, description = "Search by name, code or email")
    ),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse)
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();

    if query.company_id.is_some() {
        conditions.push("company_id = ?");
    }
    if query.calendar_id.is_some() {
        conditions.push("calendar_id = ?");
    }
    let like = query.search.as_ref().map(|s| format!("%{}%", s));
    if like.is_some() {
        conditions.push("(first_name LIKE ? OR last_name LIKE ? OR employee_code LIKE ? OR email LIKE ?)");
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) as total FROM employees {}", where_clause);
    debug!(sql = %count_sql, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(company_id) = query.company_id {
        count_query = count_query.bind(company_id);
    }
    if let Some(calendar_id) = query.calendar_id {
        count_query = count_query.bind(calendar_id);
    }
    if let Some(like) = &like {
        count_query = count_query.bind(like).bind(like).bind(like).bind(like);
    }

    let total = count_query.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %count_sql, "Failed to count employees");
        ErrorInternalServerError("Database error")
    })?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT * FROM employees {} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    if let Some(company_id) = query.company_id {
        data_query = data_query.bind(company_id);
    }
    if let Some(calendar_id) = query.calendar_id {
        data_query = data_query.bind(calendar_id);
    }
    if let Some(like) = &like {
        data_query = data_query.bind(like).bind(like).bind(like).bind(like);
    }
    data_query = data_query.bind(per_page as i64).bind(offset as i64);

    let employees = data_query.fetch_all(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %data_sql, "Failed to fetch employees");
        ErrorInternalServerError("Database error")
    })?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body = Object,
    responses(
        (status = 200, description = "Employee updated successfully", body = Object, example = json!({
            "message": "Employee updated successfully"
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_officer()?;
    let employee_id = path.into_inner();

    const ALLOWED: &[&str] = &[
        "company_id",
        "employee_code",
        "first_name",
        "last_name",
        "email",
        "avatar_url",
        "tz",
        "calendar_id",
    ];
    let update = build_update_sql("employees", &body, ALLOWED, "id", employee_id)?;

    let affected = execute_update(pool.get_ref(), update)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    if affected == 0 {
        return Ok(HttpResponse::NotFound().body("Employee not found"));
    }

    Ok(HttpResponse::Ok().body("Employee updated successfully"))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error", body = Object)
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_officer()?;
    let employee_id = path.into_inner();

    let result = sqlx::query(r#"DELETE FROM employees WHERE id = ?"#)
        .bind(employee_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) => {
            if res.rows_affected() == 0 {
                return Ok(HttpResponse::NotFound().json(json!({
                    "message": "Employee not found"
                })));
            }

            Ok(HttpResponse::Ok().json(json!({
                "message": "Successfully deleted"
            })))
        }

        Err(e) => {
            error!(error = %e, employee_id, "Failed to delete employee");

            Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Internal Server Error"
            })))
        }
    }
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id: u64 = path.into_inner();

    let employee = sqlx::query_as::<_, Employee>(
        r#"
        SELECT *
        FROM employees
        WHERE id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Failed to fetch employee");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match employee {
        Some(emp) => Ok(HttpResponse::Ok().json(emp)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Employee not found"
        }))),
    }
}

/// Presence projection for one employee
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}/info",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Presence projection", body = EmployeeInfo),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee_info(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    if !auth.is_officer() && auth.employee_id != Some(employee_id) {
        return Err(actix_web::error::ErrorForbidden("Officer/Admin only"));
    }

    let mut store = MySqlStore::begin(pool.get_ref()).await?;
    let ctx = EmployeeCtx::load(&mut store, employee_id).await?;
    let now = Utc::now().naive_utc();
    let info = employee_info(&mut store, &ctx, now).await?;
    store.commit().await?;

    Ok(HttpResponse::Ok().json(info))
}
