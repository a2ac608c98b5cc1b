use std::str::FromStr;

use crate::auth::auth::AuthUser;
use crate::directory::{MySqlProfileDirectory, ProfileDirectory};
use crate::ledger::error::LeaveError;
use crate::ledger::store::MySqlLedgerStore;
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::model::role::Role;
use crate::workflow::approval::{self, Actor, Decision};
use crate::workflow::requests::{MySqlRequestStore, NewLeaveRequest, RequestStore};
use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-02-02", format = "date", value_type = String)]
    pub start_date: chrono::NaiveDate,
    #[schema(example = "2026-02-04", format = "date", value_type = String)]
    pub end_date: chrono::NaiveDate,
    /// Business days requested; counted by the submitting client.
    #[schema(example = 3)]
    pub days: i32,
    #[schema(example = "general")]
    pub leave_type: LeaveType, // enum ensures Swagger dropdown
    #[schema(example = "family event")]
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectLeave {
    #[schema(example = "project deadline")]
    pub reason: String,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by the requesting user's id
    #[schema(example = 1000)]
    pub user_id: Option<u64>,
    /// Filter by leave status
    #[schema(example = "pending")]
    pub status: Option<String>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u64>, // 1-based
    /// Pagination per page number
    #[schema(example = 10)]
    pub per_page: Option<u64>, // items per page
}

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Status(LeaveStatus),
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

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Leave request submitted successfully",
         body = Object,
         example = json!({
            "message": "Leave request submitted",
            "id": 1,
            "status": "pending"
         })
        ),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized")
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
    if payload.start_date > payload.end_date {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "start_date cannot be after end_date"
        })));
    }

    if payload.days < 1 {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "days must be a positive number"
        })));
    }

    let requests = MySqlRequestStore::new(pool.get_ref().clone());
    let id = requests
        .insert(NewLeaveRequest {
            user_id: auth.user_id,
            start_date: payload.start_date,
            end_date: payload.end_date,
            days: payload.days,
            leave_type: payload.leave_type,
            reason: payload.reason.clone(),
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = auth.user_id, "Failed to create leave request");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave request submitted",
        "id": id,
        "status": "pending"
    })))
}

/* =========================
Approve leave (manager/admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved and balance deducted", body = Object, example = json!({
            "message": "Leave request approved",
            "deduction": { "q1": 2, "q2": 1, "q3": 0, "q4": 0, "carried": 0 }
        })),
        (status = 400, description = "Not pending, quota exceeded or insufficient balance"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not this employee's manager or an admin"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Concurrent ledger update, retry")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let ledger = MySqlLedgerStore::new(pool.get_ref().clone());
    let requests = MySqlRequestStore::new(pool.get_ref().clone());
    let directory = MySqlProfileDirectory::new(pool.get_ref().clone());

    let decided = approval::decide(
        &ledger,
        &requests,
        &directory,
        leave_id,
        Decision::Approve,
        Actor {
            id: auth.user_id,
            role: auth.role,
        },
        None,
        Utc::now(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave request approved",
        "deduction": decided.deduction
    })))
}

/* =========================
Reject leave (manager/admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    request_body = RejectLeave,
    responses(
        (status = 200, description = "Leave rejected", body = Object, example = json!({
            "message": "Leave request rejected"
        })),
        (status = 400, description = "Not pending or missing rejection reason"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not this employee's manager or an admin"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<RejectLeave>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let ledger = MySqlLedgerStore::new(pool.get_ref().clone());
    let requests = MySqlRequestStore::new(pool.get_ref().clone());
    let directory = MySqlProfileDirectory::new(pool.get_ref().clone());

    approval::decide(
        &ledger,
        &requests,
        &directory,
        leave_id,
        Decision::Reject,
        Actor {
            id: auth.user_id,
            role: auth.role,
        },
        Some(&payload.reason),
        Utc::now(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave request rejected"
    })))
}

/// Leave application details. Owners see their own requests; managers see
/// their reports'; admins see everything.
#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
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
    let leave_id = path.into_inner();

    let requests = MySqlRequestStore::new(pool.get_ref().clone());
    let request = requests
        .get(leave_id)
        .await?
        .ok_or(LeaveError::NotFound)?;

    let mut allowed = auth.user_id == request.user_id || auth.role == Role::Admin;
    if !allowed && auth.role == Role::Manager {
        let directory = MySqlProfileDirectory::new(pool.get_ref().clone());
        allowed = directory
            .get(request.user_id)
            .await?
            .and_then(|p| p.manager_id)
            == Some(auth.user_id);
    }
    if !allowed {
        return Err(LeaveError::Unauthorized.into());
    }

    Ok(HttpResponse::Ok().json(request))
}

/// Paginated leave applications, filterable by user and status.
#[utoipa::path(
    get,
    path = "/api/v1/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
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
    auth.require_manager_or_admin()?;

    // -------------------------
    // Pagination
    // -------------------------
    let per_page = query.per_page.unwrap_or(10).min(100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    // -------------------------
    // WHERE clause
    // -------------------------
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(user_id) = query.user_id {
        where_sql.push_str(" AND user_id = ?");
        args.push(FilterValue::U64(user_id));
    }

    if let Some(status) = query.status.as_deref() {
        let Ok(status) = LeaveStatus::from_str(status) else {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": "Invalid status. Allowed: pending, approved, rejected, cancelled"
            })));
        };
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Status(status));
    }

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Status(s) => count_q.bind(*s),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to count leave requests");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        r#"
        SELECT id, user_id, start_date, end_date, days, leave_type, status,
               reason, approved_by, approved_at, rejection_reason, created_at
        FROM leave_requests
        {}
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, LeaveRequest>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Status(s) => data_q.bind(s),
        };
    }

    let leaves = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch leave list");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let response = LeaveListResponse {
        data: leaves,
        page: page as u32,
        per_page: per_page as u32,
        total,
    };

    Ok(HttpResponse::Ok().json(response))
}
