use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::Labeled;
use crate::model::leave_request::{LeaveRequest, LeaveRequestRow, LeaveStatus, LeaveType};
use crate::model::role::Capability;
use crate::services::submission::parse_choice;
use crate::utils::db_utils::{PageRequest, WhereBuilder, bind_query_as, bind_query_scalar};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const LEAVE_COLUMNS: &str =
    "id, employee_id, start_date, end_date, leave_type, status, created_at";

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub leave_type: LeaveType, // enum ensures Swagger dropdown
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaveFilter {
    /// Filter by employee ID (ignored for callers without review rights)
    pub employee_id: Option<u64>,
    /// Filter by leave status
    pub status: Option<String>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    /// Items per page, 1..=100
    pub per_page: Option<u32>,
}

#[derive(Deserialize, ToSchema)]
pub struct LeaveDecision {
    #[schema(example = "approved")]
    pub status: String,
}

fn validate_dates(start: NaiveDate, end: NaiveDate) -> AppResult<()> {
    if start > end {
        return Err(AppError::validation(
            "end_date",
            "start_date cannot be after end_date",
        ));
    }
    Ok(())
}

/// A decision must name a final state, and only pending requests can take one.
fn decide(current: LeaveStatus, raw: &str) -> AppResult<LeaveStatus> {
    let next = parse_choice::<LeaveStatus>("status", raw)?;
    if next == LeaveStatus::Pending {
        return Err(AppError::validation(
            "status",
            "The status must be approved or rejected.",
        ));
    }
    if !current.can_become(next) {
        return Err(AppError::Conflict(
            "Leave request already processed".into(),
        ));
    }
    Ok(next)
}

async fn find_leave(pool: &MySqlPool, leave_id: u64) -> AppResult<LeaveRequest> {
    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?");
    let row = sqlx::query_as::<_, LeaveRequestRow>(&sql)
        .bind(leave_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Leave request".into()))?;

    LeaveRequest::try_from(row)
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted successfully",
         body = Object,
         example = json!({
            "message": "Leave request submitted",
            "id": 1,
            "status": "pending"
         })
        ),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    auth.require(Capability::RequestLeave)?;
    let employee_id = auth.employee()?;

    validate_dates(payload.start_date, payload.end_date)?;

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, start_date, end_date, leave_type, status)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.leave_type.value())
    .bind(LeaveStatus::Pending.value())
    .execute(pool.get_ref())
    .await
    .map_err(AppError::from)?;

    info!(employee_id, leave_id = result.last_insert_id(), "Leave request submitted");

    Ok(HttpResponse::Created().json(json!({
        "message": "Leave request submitted",
        "id": result.last_insert_id(),
        "status": LeaveStatus::Pending
    })))
}

/* =========================
List leave requests
========================= */
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave requests", body = LeaveListResponse),
        (status = 400, description = "Invalid status filter"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    let query = query.into_inner();
    let page = PageRequest::new(query.page, query.per_page.unwrap_or(10).clamp(1, 100));

    let mut builder = WhereBuilder::default();

    // Without review rights a caller only ever sees their own requests.
    if auth.can(Capability::ReviewLeave) {
        if let Some(employee_id) = query.employee_id {
            builder.push("employee_id = ?", employee_id);
        }
    } else {
        builder.push("employee_id = ?", auth.employee()?);
    }

    if let Some(status) = query.status.filter(|s| !s.trim().is_empty()) {
        let status = parse_choice::<LeaveStatus>("status", &status)?;
        builder.push("status = ?", status.value());
    }

    let (where_clause, values) = builder.finish();

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{where_clause}");
    let total = bind_query_scalar(sqlx::query_scalar::<_, i64>(&count_sql), &values)
        .fetch_one(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    let data_sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests{where_clause} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    );
    let rows = bind_query_as(sqlx::query_as::<_, LeaveRequestRow>(&data_sql), &values)
        .bind(page.per_page as i64)
        .bind(page.offset() as i64)
        .fetch_all(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    let data = rows
        .into_iter()
        .map(LeaveRequest::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

/* =========================
Get one leave request
========================= */
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "Leave request ID")
    ),
    responses(
        (status = 200, description = "Leave request", body = LeaveRequest),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave = find_leave(pool.get_ref(), path.into_inner()).await?;

    if !auth.owns(leave.employee_id) {
        auth.require(Capability::ReviewLeave)?;
    }

    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Approve / reject leave
========================= */
#[utoipa::path(
    patch,
    path = "/api/leave/{leave_id}/status",
    params(
        ("leave_id" = u64, Path, description = "Leave request ID")
    ),
    request_body = LeaveDecision,
    responses(
        (status = 200, description = "Leave decided", body = LeaveRequest),
        (status = 400, description = "Status must be approved or rejected"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already processed", body = Object, example = json!({
            "message": "Leave request already processed"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn update_leave_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<LeaveDecision>,
) -> actix_web::Result<impl Responder> {
    auth.require(Capability::ReviewLeave)?;
    let leave_id = path.into_inner();

    let leave = find_leave(pool.get_ref(), leave_id).await?;
    let next = decide(leave.status, &body.status)?;

    // Guard on the stored state so two reviewers cannot both decide.
    let result = sqlx::query("UPDATE leave_requests SET status = ? WHERE id = ? AND status = ?")
        .bind(next.value())
        .bind(leave_id)
        .bind(LeaveStatus::Pending.value())
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict("Leave request already processed".into()).into());
    }

    info!(leave_id, status = %next, reviewer = auth.user_id, "Leave request decided");

    Ok(HttpResponse::Ok().json(LeaveRequest {
        status: next,
        ..leave
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_after_end_is_rejected() {
        let d = |day| NaiveDate::from_ymd_opt(2026, 1, day).unwrap();
        assert!(validate_dates(d(1), d(1)).is_ok());
        assert!(matches!(
            validate_dates(d(3), d(1)),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn decisions_only_from_pending() {
        assert_eq!(decide(LeaveStatus::Pending, "approved").unwrap(), LeaveStatus::Approved);
        assert_eq!(decide(LeaveStatus::Pending, "rejected").unwrap(), LeaveStatus::Rejected);
        assert!(matches!(
            decide(LeaveStatus::Pending, "pending"),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            decide(LeaveStatus::Pending, "cancelled"),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            decide(LeaveStatus::Approved, "rejected"),
            Err(AppError::Conflict(_))
        ));
    }
}
