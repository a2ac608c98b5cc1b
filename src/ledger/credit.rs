use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use crate::directory::ProfileDirectory;
use crate::ledger::error::LeaveError;
use crate::ledger::quarter::Quarter;
use crate::ledger::store::{CreateIfAbsent, LedgerDelta, LedgerStore};
use crate::model::ledger::LeaveLedger;

/// Days credited into the active quarter for every active employee.
pub const QUARTERLY_CREDIT: i32 = 5;

/// Tally of one quarterly credit run. `quarter` is `None` when `as_of` was
/// not a quarter-start month and the run was a no-op.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreditRun {
    pub quarter: Option<Quarter>,
    pub credited: u32,
    pub errors: u32,
}

/// Credit five days into the current quarter for every active user.
///
/// `as_of` is supplied by the caller (the external scheduler), never read
/// from the wall clock, so runs are reproducible under synthetic dates.
/// A per-user failure is tallied and logged, never fatal to the batch.
/// Running twice inside the same quarter-start window double-credits; the
/// job keeps no idempotency marker.
pub async fn run<S, D>(store: &S, directory: &D, as_of: NaiveDate) -> Result<CreditRun, LeaveError>
where
    S: LedgerStore,
    D: ProfileDirectory,
{
    let Some(quarter) = Quarter::credit_month(as_of.month()) else {
        tracing::info!(%as_of, "not a quarter start month, skipping credit");
        return Ok(CreditRun {
            quarter: None,
            credited: 0,
            errors: 0,
        });
    };
    let year = as_of.year();

    let mut credited = 0u32;
    let mut errors = 0u32;
    for user_id in directory.active_user_ids().await? {
        match credit_user(store, user_id, year, quarter).await {
            Ok(()) => credited += 1,
            Err(e) => {
                tracing::error!(error = %e, user_id, year, "quarterly credit failed");
                errors += 1;
            }
        }
    }

    tracing::info!(%quarter, credited, errors, "quarterly credit completed");
    Ok(CreditRun {
        quarter: Some(quarter),
        credited,
        errors,
    })
}

async fn credit_user<S: LedgerStore>(
    store: &S,
    user_id: u64,
    year: i32,
    quarter: Quarter,
) -> Result<(), LeaveError> {
    match store.create_if_absent(initial_ledger(user_id, year, quarter)).await? {
        CreateIfAbsent::Created(_) => Ok(()),
        CreateIfAbsent::Existing(_) => {
            store
                .apply_delta(user_id, year, LedgerDelta::credit(quarter, QUARTERLY_CREDIT))
                .await
        }
    }
}

fn initial_ledger(user_id: u64, year: i32, quarter: Quarter) -> LeaveLedger {
    let mut ledger = LeaveLedger::empty(user_id, year);
    match quarter {
        Quarter::Q1 => ledger.q1 = QUARTERLY_CREDIT,
        Quarter::Q2 => ledger.q2 = QUARTERLY_CREDIT,
        Quarter::Q3 => ledger.q3 = QUARTERLY_CREDIT,
        Quarter::Q4 => ledger.q4 = QUARTERLY_CREDIT,
    }
    ledger
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::{FailFor, MemoryDirectory, MemoryLedgerStore};
    use crate::model::profile::Profile;

    fn profile(user_id: u64, is_active: bool) -> Profile {
        Profile {
            user_id,
            manager_id: None,
            is_active,
        }
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[actix_web::test]
    async fn non_quarter_start_months_are_a_no_op() {
        let store = MemoryLedgerStore::default();
        let directory = MemoryDirectory::with([profile(1, true)]);

        let run = run(&store, &directory, date(2026, 2, 1)).await.unwrap();
        assert_eq!(run.quarter, None);
        assert_eq!((run.credited, run.errors), (0, 0));
        assert!(store.get(1, 2026).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn first_credit_creates_the_ledger_with_the_target_quarter() {
        let store = MemoryLedgerStore::default();
        let directory = MemoryDirectory::with([profile(1, true), profile(2, true)]);

        let outcome = run(&store, &directory, date(2026, 7, 1)).await.unwrap();
        assert_eq!(outcome.quarter, Some(Quarter::Q3));
        assert_eq!((outcome.credited, outcome.errors), (2, 0));

        let ledger = store.get(1, 2026).await.unwrap().unwrap();
        assert_eq!((ledger.q1, ledger.q2, ledger.q3, ledger.q4), (0, 0, 5, 0));
    }

    #[actix_web::test]
    async fn existing_ledgers_are_topped_up_in_place() {
        let store = MemoryLedgerStore::default();
        store.put(LeaveLedger {
            q1: 3,
            ..LeaveLedger::empty(1, 2026)
        });
        let directory = MemoryDirectory::with([profile(1, true)]);

        run(&store, &directory, date(2026, 4, 1)).await.unwrap();

        let ledger = store.get(1, 2026).await.unwrap().unwrap();
        assert_eq!((ledger.q1, ledger.q2), (3, 5));
    }

    #[actix_web::test]
    async fn inactive_users_are_not_credited() {
        let store = MemoryLedgerStore::default();
        let directory = MemoryDirectory::with([profile(1, true), profile(2, false)]);

        let outcome = run(&store, &directory, date(2026, 1, 1)).await.unwrap();
        assert_eq!(outcome.credited, 1);
        assert!(store.get(2, 2026).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn one_failing_user_does_not_abort_the_batch() {
        let store = FailFor::new(MemoryLedgerStore::default(), 2);
        let directory =
            MemoryDirectory::with([profile(1, true), profile(2, true), profile(3, true)]);

        let outcome = run(&store, &directory, date(2026, 10, 1)).await.unwrap();
        assert_eq!((outcome.credited, outcome.errors), (2, 1));
        assert_eq!(store.inner().get(3, 2026).await.unwrap().unwrap().q4, 5);
    }

    #[actix_web::test]
    async fn running_twice_in_the_same_window_double_credits() {
        let store = MemoryLedgerStore::default();
        let directory = MemoryDirectory::with([profile(1, true)]);

        run(&store, &directory, date(2026, 1, 1)).await.unwrap();
        run(&store, &directory, date(2026, 1, 1)).await.unwrap();

        assert_eq!(store.get(1, 2026).await.unwrap().unwrap().q1, 10);
    }
}
