use crate::auth::auth::AuthUser;
use crate::directory::{MySqlProfileDirectory, ProfileDirectory};
use crate::ledger::store::{LedgerStore, MySqlLedgerStore};
use crate::model::ledger::LeaveLedger;
use crate::model::role::Role;
use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct YearQuery {
    /// Ledger year; defaults to the current calendar year
    #[schema(example = 2026)]
    pub year: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct BalanceResponse {
    #[schema(example = 1000)]
    pub user_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 5)]
    pub q1: i32,
    #[schema(example = 5)]
    pub q2: i32,
    #[schema(example = 0)]
    pub q3: i32,
    #[schema(example = 0)]
    pub q4: i32,
    #[schema(example = 3)]
    pub carried_from_last_year: i32,
    #[schema(example = 1)]
    pub optional_used: i32,
    /// Everything a general-leave request may still draw from
    #[schema(example = 13)]
    pub total_available: i32,
}

impl From<LeaveLedger> for BalanceResponse {
    fn from(ledger: LeaveLedger) -> Self {
        let total_available = ledger.total_available();
        Self {
            user_id: ledger.user_id,
            year: ledger.year,
            q1: ledger.q1,
            q2: ledger.q2,
            q3: ledger.q3,
            q4: ledger.q4,
            carried_from_last_year: ledger.carried_from_last_year,
            optional_used: ledger.optional_used,
            total_available,
        }
    }
}

/// Own leave balance for the dashboard.
#[utoipa::path(
    get,
    path = "/api/v1/ledger/me",
    params(YearQuery),
    responses(
        (status = 200, description = "Leave balance", body = BalanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No ledger for that year", body = Object, example = json!({
            "message": "No leave ledger for this year"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Ledger"
)]
pub async fn my_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<YearQuery>,
) -> actix_web::Result<impl Responder> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    balance_of(pool.get_ref(), auth.user_id, year).await
}

/// Any user's leave balance; admins and the user's manager only.
#[utoipa::path(
    get,
    path = "/api/v1/ledger/{user_id}",
    params(
        ("user_id" = u64, Path, description = "User whose balance to read"),
        YearQuery
    ),
    responses(
        (status = 200, description = "Leave balance", body = BalanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "No ledger for that year")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Ledger"
)]
pub async fn user_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<YearQuery>,
) -> actix_web::Result<impl Responder> {
    let user_id = path.into_inner();

    let mut allowed = auth.role == Role::Admin || auth.user_id == user_id;
    if !allowed && auth.role == Role::Manager {
        let directory = MySqlProfileDirectory::new(pool.get_ref().clone());
        allowed = directory.get(user_id).await?.and_then(|p| p.manager_id) == Some(auth.user_id);
    }
    if !allowed {
        return Err(actix_web::error::ErrorForbidden(
            "Not this employee's manager or an admin",
        ));
    }

    let year = query.year.unwrap_or_else(|| Utc::now().year());
    balance_of(pool.get_ref(), user_id, year).await
}

async fn balance_of(
    pool: &MySqlPool,
    user_id: u64,
    year: i32,
) -> actix_web::Result<HttpResponse> {
    let store = MySqlLedgerStore::new(pool.clone());
    match store.get(user_id, year).await? {
        Some(ledger) => Ok(HttpResponse::Ok().json(BalanceResponse::from(ledger))),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "No leave ledger for this year"
        }))),
    }
}
