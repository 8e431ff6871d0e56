use crate::{
    auth::auth::AuthUser,
    engine::settings,
    model::time_off::TimeOff,
    store::MySqlStore,
};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error};
use utoipa::ToSchema;

/// Body of a new time-off span. Omitting `employee_id` makes the row
/// company-wide.
#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "company_id": 1,
    "employee_id": null,
    "date_from": "2025-05-01T00:00:00",
    "date_to": "2025-05-02T00:00:00",
    "reason": "Labour Day"
}))]
pub struct NewTimeOff {
    pub company_id: u64,
    pub employee_id: Option<u64>,
    #[schema(value_type = String, format = "date-time")]
    pub date_from: NaiveDateTime,
    #[schema(value_type = String, format = "date-time")]
    pub date_to: NaiveDateTime,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TimeOffQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub company_id: Option<u64>,
    pub employee_id: Option<u64>,
    /// Keep only spans ending after this instant.
    #[schema(value_type = Option<String>, format = "date-time")]
    pub from: Option<NaiveDateTime>,
    /// Keep only spans starting before this instant.
    #[schema(value_type = Option<String>, format = "date-time")]
    pub to: Option<NaiveDateTime>,
}

#[derive(Serialize, ToSchema)]
pub struct TimeOffListResponse {
    pub data: Vec<TimeOff>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 3)]
    pub total: i64,
}

/// Record a time-off span
///
/// Expected working time loses the span immediately; overtime on the
/// attendance days it touches is recomputed before the call returns.
#[utoipa::path(
    post,
    path = "/api/time-off",
    request_body = NewTimeOff,
    responses(
        (status = 201, description = "Time off recorded", body = TimeOff),
        (status = 400, description = "Validation failed, e.g. end not after start"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Company or employee not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "TimeOff",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_time_off(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<NewTimeOff>,
) -> actix_web::Result<impl Responder> {
    auth.require_officer()?;

    let row = TimeOff {
        id: 0,
        company_id: payload.company_id,
        employee_id: payload.employee_id,
        date_from: payload.date_from,
        date_to: payload.date_to,
        reason: payload.reason.clone(),
    };

    let mut store = MySqlStore::begin(pool.get_ref()).await?;
    let row = settings::record_time_off(&mut store, row).await?;
    store.commit().await?;

    Ok(HttpResponse::Created().json(row))
}

#[utoipa::path(
    get,
    path = "/api/time-off",
    params(
        ("page", Query, description = "Page number"),
        ("per_page", Query, description = "Items per page"),
        ("company_id", Query, description = "Filter by company"),
        ("employee_id", Query, description = "Filter by employee"),
        ("from", Query, description = "Keep spans ending after this instant"),
        ("to", Query, description = "Keep spans starting before this instant")
    ),
    responses(
        (status = 200, description = "Paginated time-off list", body = TimeOffListResponse)
    ),
    tag = "TimeOff",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_time_off(
    pool: web::Data<MySqlPool>,
    query: web::Query<TimeOffQuery>,
) -> actix_web::Result<impl Responder> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();

    if query.company_id.is_some() {
        conditions.push("company_id = ?");
    }
    if query.employee_id.is_some() {
        conditions.push("employee_id = ?");
    }
    if query.from.is_some() {
        conditions.push("date_to > ?");
    }
    if query.to.is_some() {
        conditions.push("date_from < ?");
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) as total FROM time_off {}", where_clause);
    debug!(sql = %count_sql, "Counting time-off rows");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(company_id) = query.company_id {
        count_query = count_query.bind(company_id);
    }
    if let Some(employee_id) = query.employee_id {
        count_query = count_query.bind(employee_id);
    }
    if let Some(from) = query.from {
        count_query = count_query.bind(from);
    }
    if let Some(to) = query.to {
        count_query = count_query.bind(to);
    }

    let total = count_query.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %count_sql, "Failed to count time-off rows");
        ErrorInternalServerError("Database error")
    })?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT * FROM time_off {} ORDER BY date_from DESC, id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching time-off rows");

    let mut data_query = sqlx::query_as::<_, TimeOff>(&data_sql);
    if let Some(company_id) = query.company_id {
        data_query = data_query.bind(company_id);
    }
    if let Some(employee_id) = query.employee_id {
        data_query = data_query.bind(employee_id);
    }
    if let Some(from) = query.from {
        data_query = data_query.bind(from);
    }
    if let Some(to) = query.to {
        data_query = data_query.bind(to);
    }
    data_query = data_query.bind(per_page as i64).bind(offset as i64);

    let rows = data_query.fetch_all(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %data_sql, "Failed to fetch time-off rows");
        ErrorInternalServerError("Database error")
    })?;

    Ok(HttpResponse::Ok().json(TimeOffListResponse {
        data: rows,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/time-off/{id}",
    params(
        ("id", Path, description = "Time-off ID")
    ),
    responses(
        (status = 200, description = "Time-off row", body = TimeOff),
        (status = 404, description = "Time off not found")
    ),
    tag = "TimeOff",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_time_off(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();

    let row = sqlx::query_as::<_, TimeOff>("SELECT * FROM time_off WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, id, "Failed to fetch time off");
            ErrorInternalServerError("Database error")
        })?;

    match row {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Time off not found"
        }))),
    }
}
