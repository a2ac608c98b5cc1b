use crate::auth::auth::AuthUser;
use crate::directory::MySqlProfileDirectory;
use crate::ledger::store::MySqlLedgerStore;
use crate::ledger::{carry, credit};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreditJobReq {
    /// The scheduler's "as-of" date; credits only fire on the first month of
    /// a quarter (Jan, Apr, Jul, Oct)
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub as_of: NaiveDate,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CarryAction {
    /// Dec 31: halve the unused balance into the carried bucket
    CalculateCarry,
    /// Jan 1: seed new-year ledgers from the prior year's carried values
    ApplyNewYear,
}

#[derive(Deserialize, ToSchema)]
pub struct CarryJobReq {
    pub action: CarryAction,
    /// For `calculate_carry` the year being closed; for `apply_new_year`
    /// the year being opened
    #[schema(example = 2026)]
    pub year: i32,
}

/* =========================
Quarterly credit (scheduler)
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/jobs/quarterly-credit",
    request_body = CreditJobReq,
    responses(
        (status = 200, description = "Credit run tally", body = Object, example = json!({
            "message": "Quarterly credit completed for Q1",
            "credited": 42,
            "errors": 0
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Scheduler/Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Jobs"
)]
pub async fn quarterly_credit(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreditJobReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_scheduler()?;

    let store = MySqlLedgerStore::new(pool.get_ref().clone());
    let directory = MySqlProfileDirectory::new(pool.get_ref().clone());

    let run = credit::run(&store, &directory, payload.as_of).await?;
    let message = match run.quarter {
        Some(quarter) => format!("Quarterly credit completed for {quarter}"),
        None => "Not a quarter start month".to_string(),
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": message,
        "credited": run.credited,
        "errors": run.errors
    })))
}

/* =========================
Year-end carry (scheduler)
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/jobs/year-end-carry",
    request_body = CarryJobReq,
    responses(
        (status = 200, description = "Carry phase tally", body = Object, example = json!({
            "message": "Year-end carry calculated for 42 users",
            "processed": 42,
            "skipped": 0,
            "errors": 0
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Scheduler/Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Jobs"
)]
pub async fn year_end_carry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CarryJobReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_scheduler()?;

    let store = MySqlLedgerStore::new(pool.get_ref().clone());

    let (run, message) = match payload.action {
        CarryAction::CalculateCarry => {
            let run = carry::calculate_carry(&store, payload.year).await?;
            let message = format!("Year-end carry calculated for {} users", run.processed);
            (run, message)
        }
        CarryAction::ApplyNewYear => {
            let run = carry::apply_new_year(&store, payload.year).await?;
            let message = format!("New year ledgers created for {} users", run.processed);
            (run, message)
        }
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": message,
        "processed": run.processed,
        "skipped": run.skipped,
        "errors": run.errors
    })))
}
