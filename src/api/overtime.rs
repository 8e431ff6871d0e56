use crate::{
    auth::auth::AuthUser,
    engine::{overtime, settings},
    model::company::{Company, OvertimeSettings},
    model::overtime::Overtime,
    store::MySqlStore,
};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct OvertimeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    /// Local date lower bound (inclusive).
    #[schema(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    /// Local date upper bound (inclusive).
    #[schema(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    /// Restrict to manual adjustments or to computed rows.
    pub adjustment: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct OvertimeListResponse {
    pub data: Vec<Overtime>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 7)]
    pub total: i64,
}

/// Body of a manual overtime adjustment.
#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "employee_id": 3,
    "date": "2025-01-11",
    "duration": -2.0,
    "note": "badge left at home, half day missed"
}))]
pub struct NewAdjustment {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    /// Signed hours added on top of the computed rows.
    pub duration: f64,
    pub note: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/overtime",
    params(
        ("page", Query, description = "Page number"),
        ("per_page", Query, description = "Items per page"),
        ("employee_id", Query, description = "Filter by employee (officers only; others always see their own)"),
        ("from", Query, description = "Local date lower bound, inclusive"),
        ("to", Query, description = "Local date upper bound, inclusive"),
        ("adjustment", Query, description = "true = only manual adjustments, false = only computed rows")
    ),
    responses(
        (status = 200, description = "Paginated overtime list", body = OvertimeListResponse)
    ),
    tag = "Overtime",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_overtime(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<OvertimeQuery>,
) -> actix_web::Result<impl Responder> {
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
        conditions.push("date >= ?");
    }
    if query.to.is_some() {
        conditions.push("date <= ?");
    }
    if query.adjustment.is_some() {
        conditions.push("adjustment = ?");
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) as total FROM overtime {}", where_clause);
    debug!(sql = %count_sql, "Counting overtime rows");

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
    if let Some(adjustment) = query.adjustment {
        count_query = count_query.bind(adjustment);
    }

    let total = count_query.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %count_sql, "Failed to count overtime rows");
        ErrorInternalServerError("Database error")
    })?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT * FROM overtime {} ORDER BY date DESC, id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching overtime rows");

    let mut data_query = sqlx::query_as::<_, Overtime>(&data_sql);
    if let Some(employee_id) = employee_filter {
        data_query = data_query.bind(employee_id);
    }
    if let Some(from) = query.from {
        data_query = data_query.bind(from);
    }
    if let Some(to) = query.to {
        data_query = data_query.bind(to);
    }
    if let Some(adjustment) = query.adjustment {
        data_query = data_query.bind(adjustment);
    }
    data_query = data_query.bind(per_page as i64).bind(offset as i64);

    let rows = data_query.fetch_all(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %data_sql, "Failed to fetch overtime rows");
        ErrorInternalServerError("Database error")
    })?;

    Ok(HttpResponse::Ok().json(OvertimeListResponse {
        data: rows,
        page,
        per_page,
        total,
    }))
}

/// Manual overtime adjustment
#[utoipa::path(
    post,
    path = "/api/overtime/adjustment",
    request_body = NewAdjustment,
    responses(
        (status = 201, description = "Adjustment recorded", body = Overtime),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Overtime",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_adjustment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<NewAdjustment>,
) -> actix_web::Result<impl Responder> {
    auth.require_officer()?;

    let mut store = MySqlStore::begin(pool.get_ref()).await?;
    let row = overtime::create_adjustment(
        &mut store,
        payload.employee_id,
        payload.date,
        payload.duration,
        payload.note.clone(),
    )
    .await?;
    store.commit().await?;

    Ok(HttpResponse::Created().json(row))
}

#[utoipa::path(
    get,
    path = "/api/company/{id}/overtime-settings",
    params(
        ("id", Path, description = "Company ID")
    ),
    responses(
        (status = 200, description = "Current settings", body = OvertimeSettings),
        (status = 404, description = "Company not found")
    ),
    tag = "Overtime",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_overtime_settings(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let company_id = path.into_inner();

    let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = ?")
        .bind(company_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, company_id, "Failed to fetch company");
            ErrorInternalServerError("Database error")
        })?;

    match company {
        Some(company) => Ok(HttpResponse::Ok().json(OvertimeSettings::from(&company))),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Company not found"
        }))),
    }
}

/// Apply overtime settings
///
/// Enabling, disabling, or moving the start date rewrites the company's
/// computed overtime rows accordingly before the call returns.
#[utoipa::path(
    put,
    path = "/api/company/{id}/overtime-settings",
    params(
        ("id", Path, description = "Company ID")
    ),
    request_body = OvertimeSettings,
    responses(
        (status = 200, description = "Settings applied", body = OvertimeSettings),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Company not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Overtime",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_overtime_settings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<OvertimeSettings>,
) -> actix_web::Result<impl Responder> {
    auth.require_officer()?;
    let company_id = path.into_inner();

    let mut store = MySqlStore::begin(pool.get_ref()).await?;
    let company = settings::update_overtime_settings(&mut store, company_id, &payload).await?;
    store.commit().await?;

    Ok(HttpResponse::Ok().json(OvertimeSettings::from(&company)))
}
