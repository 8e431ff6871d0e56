use crate::{
    api::employee::{employee_info, EmployeeInfo},
    auth::auth::AuthUser,
    engine::{
        timeline,
        timeline::{AttendanceUpdate, NewAttendance},
        EmployeeCtx,
    },
    model::attendance::{Attendance, CaptureMetadata},
    store::MySqlStore,
};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttendanceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    /// UTC lower bound on check-in (inclusive).
    #[schema(value_type = Option<String>, format = "date-time")]
    pub from: Option<NaiveDateTime>,
    /// UTC upper bound on check-in (exclusive).
    #[schema(value_type = Option<String>, format = "date-time")]
    pub to: Option<NaiveDateTime>,
    /// Only records without a check-out.
    pub open_only: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<Attendance>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body(content = CaptureMetadata, description = "Optional capture metadata"),
    responses(
        (status = 200, description = "Checked in successfully", body = EmployeeInfo),
        (status = 400, description = "Validation failed, e.g. already checked in"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    meta: Option<web::Json<CaptureMetadata>>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let meta = meta.map(web::Json::into_inner).unwrap_or_default();
    let now = Utc::now().naive_utc();

    let mut store = MySqlStore::begin(pool.get_ref()).await?;
    timeline::check_in(&mut store, employee_id, now, &meta).await?;
    let ctx = EmployeeCtx::load(&mut store, employee_id).await?;
    let info = employee_info(&mut store, &ctx, now).await?;
    store.commit().await?;

    Ok(HttpResponse::Ok().json(info))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body(content = CaptureMetadata, description = "Optional capture metadata"),
    responses(
        (status = 200, description = "Checked out successfully", body = EmployeeInfo),
        (status = 400, description = "No open attendance record"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    meta: Option<web::Json<CaptureMetadata>>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let meta = meta.map(web::Json::into_inner).unwrap_or_default();
    let now = Utc::now().naive_utc();

    let mut store = MySqlStore::begin(pool.get_ref()).await?;
    timeline::check_out(&mut store, employee_id, now, &meta).await?;
    let ctx = EmployeeCtx::load(&mut store, employee_id).await?;
    let info = employee_info(&mut store, &ctx, now).await?;
    store.commit().await?;

    Ok(HttpResponse::Ok().json(info))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(
        ("page", Query, description = "Page number"),
        ("per_page", Query, description = "Items per page"),
        ("employee_id", Query, description = "Filter by employee (officers only; others always see their own)"),
        ("from", Query, description = "UTC check-in lower bound, inclusive"),
        ("to", Query, description = "UTC check-in upper bound, exclusive"),
        ("open_only", Query, description = "Only records without a check-out")
    ),
    responses(
        (status = 200, description = "Paginated attendance list", body = AttendanceListResponse)
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> actix_web::Result<impl Responder> {
    // Non-officers only ever see their own timeline.
    let employee_filter = if auth.is_officer() {
        query.employee_id
    } else {
        Some(auth.require_employee()?)
    };

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();

    if employee_filter.is_some() {
        conditions.push("employee_id = ?");
    }
    if query.from.is_some() {
        conditions.push("check_in >= ?");
    }
    if query.to.is_some() {
        conditions.push("check_in < ?");
    }
    if query.open_only.unwrap_or(false) {
        conditions.push("check_out IS NULL");
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) as total FROM attendance {}", where_clause);
    debug!(sql = %count_sql, "Counting attendance records");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(employee_id) = employee_filter {
        count_query = count_query.bind(employee_id);
    }
    if let Some(from) = query.from {
        count_query = count_query.bind(from);
    }
    if let Some(to) = query.to {
        count_query = count_query.bind(to);
    }

    let total = count_query.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %count_sql, "Failed to count attendance records");
        ErrorInternalServerError("Database error")
    })?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT * FROM attendance {} ORDER BY check_in DESC, id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching attendance records");

    let mut data_query = sqlx::query_as::<_, Attendance>(&data_sql);
    if let Some(employee_id) = employee_filter {
        data_query = data_query.bind(employee_id);
    }
    if let Some(from) = query.from {
        data_query = data_query.bind(from);
    }
    if let Some(to) = query.to {
        data_query = data_query.bind(to);
    }
    data_query = data_query.bind(per_page as i64).bind(offset as i64);

    let records = data_query.fetch_all(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %data_sql, "Failed to fetch attendance records");
        ErrorInternalServerError("Database error")
    })?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data: records,
        page,
        per_page,
        total,
    }))
}

/// Manual attendance creation
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = NewAttendance,
    responses(
        (status = 201, description = "Attendance created", body = Attendance),
        (status = 400, description = "Validation failed, e.g. overlapping records"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<NewAttendance>,
) -> actix_web::Result<impl Responder> {
    auth.require_officer()?;

    let mut store = MySqlStore::begin(pool.get_ref()).await?;
    let record = timeline::create(&mut store, &payload).await?;
    store.commit().await?;

    Ok(HttpResponse::Created().json(record))
}

#[utoipa::path(
    get,
    path = "/api/attendance/{id}",
    params(
        ("id", Path, description = "Attendance ID")
    ),
    responses(
        (status = 200, description = "Attendance record", body = Attendance),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance not found")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();

    let record = sqlx::query_as::<_, Attendance>("SELECT * FROM attendance WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, id, "Failed to fetch attendance");
            ErrorInternalServerError("Database error")
        })?;

    match record {
        Some(record) => {
            if !auth.is_officer() && auth.employee_id != Some(record.employee_id) {
                return Err(actix_web::error::ErrorForbidden("Officer/Admin only"));
            }
            Ok(HttpResponse::Ok().json(record))
        }
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Attendance not found"
        }))),
    }
}

/// Attendance update
///
/// Employees may correct their own records; anything touching somebody
/// else's timeline needs the officer role.
#[utoipa::path(
    put,
    path = "/api/attendance/{id}",
    params(
        ("id", Path, description = "Attendance ID")
    ),
    request_body = AttendanceUpdate,
    responses(
        (status = 200, description = "Updated record", body = Attendance),
        (status = 400, description = "Validation failed, e.g. overlapping records"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AttendanceUpdate>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();

    if !auth.is_officer() {
        let owner = sqlx::query_scalar::<_, u64>("SELECT employee_id FROM attendance WHERE id = ?")
            .bind(id)
            .fetch_optional(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, id, "Failed to fetch attendance owner");
                ErrorInternalServerError("Database error")
            })?;
        match owner {
            Some(owner) if auth.employee_id == Some(owner) => {}
            Some(_) => return Err(actix_web::error::ErrorForbidden("Officer/Admin only")),
            None => {
                return Ok(HttpResponse::NotFound().json(json!({
                    "message": "Attendance not found"
                })))
            }
        }
    }

    let actor = auth.actor();
    let mut store = MySqlStore::begin(pool.get_ref()).await?;
    let record = timeline::update(&mut store, &actor, id, &payload).await?;
    store.commit().await?;

    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(
        ("id", Path, description = "Attendance ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_officer()?;
    let id = path.into_inner();

    let mut store = MySqlStore::begin(pool.get_ref()).await?;
    timeline::delete(&mut store, id).await?;
    store.commit().await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

/// Attendance duplication is always refused
#[utoipa::path(
    post,
    path = "/api/attendance/{id}/copy",
    params(
        ("id", Path, description = "Attendance ID")
    ),
    responses(
        (status = 409, description = "Attendance records cannot be duplicated"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn copy_attendance(
    auth: AuthUser,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_officer()?;
    let record = timeline::duplicate(path.into_inner())?;
    Ok(HttpResponse::Ok().json(record))
}
