use serde::Serialize;

use crate::ledger::CONFLICT_RETRIES;
use crate::ledger::drawdown::{Deductions, plan_drawdown};
use crate::ledger::error::LeaveError;
use crate::ledger::store::{LedgerDelta, LedgerStore};
use crate::model::ledger::LeaveLedger;
use crate::model::leave_request::LeaveType;

/// Annual allowance of optional holidays.
pub const OPTIONAL_CAP: i32 = 4;

/// What a successful deduction did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DeductionOutcome {
    /// General leave: per-bucket breakdown of the draw-down.
    General(Deductions),
    /// Optional leave: one allowance consumed; the counter after the bump.
    Optional { optional_used: i32 },
}

/// Deduct a leave request from the user's ledger for `year`.
///
/// General leave drains buckets in the fixed Q1 -> Q2 -> Q3 -> Q4 -> carried
/// order and fails whole with `InsufficientBalance` when they cannot cover
/// the request; no partial deduction is ever persisted. Optional leave
/// consumes exactly one of the four annual allowances no matter how many
/// days the request spans, failing with `QuotaExceeded` at the cap.
///
/// A missing ledger row is created with all buckets at zero before the
/// draw-down is evaluated. Write conflicts against a concurrent mutation of
/// the same (user, year) key are re-read and retried a bounded number of
/// times, then surfaced as `ConcurrencyConflict`.
pub async fn deduct<S: LedgerStore>(
    store: &S,
    user_id: u64,
    year: i32,
    days: i32,
    leave_type: LeaveType,
) -> Result<DeductionOutcome, LeaveError> {
    let mut attempts = 0;
    loop {
        let ledger = match store.get(user_id, year).await? {
            Some(ledger) => ledger,
            // first touch for this (user, year) pair
            None => store
                .create_if_absent(LeaveLedger::empty(user_id, year))
                .await?
                .into_ledger(),
        };

        let (delta, outcome) = match leave_type {
            LeaveType::Optional => {
                if ledger.optional_used + 1 > OPTIONAL_CAP {
                    return Err(LeaveError::QuotaExceeded);
                }
                (
                    LedgerDelta::optional(1),
                    DeductionOutcome::Optional {
                        optional_used: ledger.optional_used + 1,
                    },
                )
            }
            LeaveType::General => {
                let plan = plan_drawdown(&ledger, days)?;
                (LedgerDelta::deduction(&plan), DeductionOutcome::General(plan))
            }
        };

        match store.apply_delta(user_id, year, delta).await {
            Ok(()) => return Ok(outcome),
            Err(LeaveError::ConcurrencyConflict) if attempts < CONFLICT_RETRIES => {
                attempts += 1;
                tracing::debug!(user_id, year, attempts, "ledger write conflict, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Compensate a committed deduction whose surrounding approval did not go
/// through (the status flip failed or lost a race).
pub async fn reverse<S: LedgerStore>(
    store: &S,
    user_id: u64,
    year: i32,
    outcome: &DeductionOutcome,
) -> Result<(), LeaveError> {
    let delta = match outcome {
        DeductionOutcome::General(plan) => LedgerDelta::deduction(plan).reversal(),
        DeductionOutcome::Optional { .. } => LedgerDelta::optional(-1),
    };

    let mut attempts = 0;
    loop {
        match store.apply_delta(user_id, year, delta).await {
            Ok(()) => return Ok(()),
            Err(LeaveError::ConcurrencyConflict) if attempts < CONFLICT_RETRIES => attempts += 1,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::{ConflictInjector, MemoryLedgerStore};
    use crate::ledger::store::CreateIfAbsent;

    fn seed(store: &MemoryLedgerStore, ledger: LeaveLedger) {
        store.put(ledger);
    }

    fn balances(q1: i32, q2: i32, q3: i32, q4: i32, carried: i32) -> LeaveLedger {
        LeaveLedger {
            q1,
            q2,
            q3,
            q4,
            carried_from_last_year: carried,
            ..LeaveLedger::empty(1, 2026)
        }
    }

    #[actix_web::test]
    async fn general_deduction_follows_the_drawdown_order() {
        let store = MemoryLedgerStore::default();
        seed(&store, balances(2, 5, 5, 5, 0));

        let outcome = deduct(&store, 1, 2026, 4, LeaveType::General).await.unwrap();
        assert_eq!(
            outcome,
            DeductionOutcome::General(Deductions {
                q1: 2,
                q2: 2,
                q3: 0,
                q4: 0,
                carried: 0
            })
        );

        let after = store.get(1, 2026).await.unwrap().unwrap();
        assert_eq!((after.q1, after.q2, after.q3, after.q4), (0, 3, 5, 5));
        assert_eq!(after.carried_from_last_year, 0);
    }

    #[actix_web::test]
    async fn shortfall_leaves_the_ledger_unmodified() {
        let store = MemoryLedgerStore::default();
        seed(&store, balances(1, 0, 0, 0, 0));

        let err = deduct(&store, 1, 2026, 3, LeaveType::General)
            .await
            .unwrap_err();
        match err {
            LeaveError::InsufficientBalance { shortfall } => assert_eq!(shortfall, 2),
            other => panic!("unexpected error: {other:?}"),
        }

        let after = store.get(1, 2026).await.unwrap().unwrap();
        assert_eq!(after, balances(1, 0, 0, 0, 0));
    }

    #[actix_web::test]
    async fn optional_cap_is_enforced_without_mutation() {
        let store = MemoryLedgerStore::default();
        seed(
            &store,
            LeaveLedger {
                optional_used: 4,
                ..balances(5, 5, 5, 5, 0)
            },
        );

        let err = deduct(&store, 1, 2026, 1, LeaveType::Optional)
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::QuotaExceeded));
        assert_eq!(store.get(1, 2026).await.unwrap().unwrap().optional_used, 4);
    }

    #[actix_web::test]
    async fn optional_leave_consumes_one_slot_regardless_of_days() {
        let store = MemoryLedgerStore::default();
        seed(&store, balances(5, 0, 0, 0, 0));

        let outcome = deduct(&store, 1, 2026, 3, LeaveType::Optional)
            .await
            .unwrap();
        assert_eq!(outcome, DeductionOutcome::Optional { optional_used: 1 });

        let after = store.get(1, 2026).await.unwrap().unwrap();
        assert_eq!(after.optional_used, 1);
        // the quarterly buckets are untouched by optional leave
        assert_eq!(after.q1, 5);
    }

    #[actix_web::test]
    async fn missing_ledger_is_created_before_the_drawdown_is_evaluated() {
        let store = MemoryLedgerStore::default();

        let err = deduct(&store, 7, 2026, 2, LeaveType::General)
            .await
            .unwrap_err();
        match err {
            LeaveError::InsufficientBalance { shortfall } => assert_eq!(shortfall, 2),
            other => panic!("unexpected error: {other:?}"),
        }

        // the zero-initialized row now exists
        let created = store.get(7, 2026).await.unwrap().unwrap();
        assert_eq!(created, LeaveLedger::empty(7, 2026));
    }

    #[actix_web::test]
    async fn optional_leave_lazily_creates_the_ledger() {
        let store = MemoryLedgerStore::default();

        let outcome = deduct(&store, 7, 2026, 1, LeaveType::Optional)
            .await
            .unwrap();
        assert_eq!(outcome, DeductionOutcome::Optional { optional_used: 1 });
        assert_eq!(store.get(7, 2026).await.unwrap().unwrap().optional_used, 1);
    }

    #[actix_web::test]
    async fn competing_deductions_never_overdraw() {
        let store = MemoryLedgerStore::default();
        seed(&store, balances(2, 1, 1, 1, 0));

        let (first, second) = futures::join!(
            deduct(&store, 1, 2026, 3, LeaveType::General),
            deduct(&store, 1, 2026, 3, LeaveType::General),
        );

        let outcomes = [first, second];
        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one deduction may win");
        for result in &outcomes {
            if let Err(e) = result {
                assert!(matches!(
                    e,
                    LeaveError::InsufficientBalance { .. } | LeaveError::ConcurrencyConflict
                ));
            }
        }

        let after = store.get(1, 2026).await.unwrap().unwrap();
        assert_eq!(after.total_available(), 2, "only 3 of 5 days deducted");
    }

    #[actix_web::test]
    async fn write_conflicts_are_retried_with_a_fresh_snapshot() {
        let store = ConflictInjector::new(MemoryLedgerStore::default(), 2);
        store.inner().put(balances(5, 0, 0, 0, 0));

        let outcome = deduct(&store, 1, 2026, 2, LeaveType::General).await.unwrap();
        assert_eq!(
            outcome,
            DeductionOutcome::General(Deductions {
                q1: 2,
                ..Deductions::default()
            })
        );
        assert_eq!(store.inner().get(1, 2026).await.unwrap().unwrap().q1, 3);
    }

    #[actix_web::test]
    async fn exhausted_retries_surface_the_conflict() {
        let store = ConflictInjector::new(MemoryLedgerStore::default(), u32::MAX);
        store.inner().put(balances(5, 0, 0, 0, 0));

        let err = deduct(&store, 1, 2026, 2, LeaveType::General)
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::ConcurrencyConflict));
        // nothing was committed
        assert_eq!(store.inner().get(1, 2026).await.unwrap().unwrap().q1, 5);
    }

    #[actix_web::test]
    async fn reverse_restores_the_deducted_buckets() {
        let store = MemoryLedgerStore::default();
        seed(&store, balances(2, 3, 0, 0, 1));

        let outcome = deduct(&store, 1, 2026, 6, LeaveType::General).await.unwrap();
        reverse(&store, 1, 2026, &outcome).await.unwrap();

        let after = store.get(1, 2026).await.unwrap().unwrap();
        assert_eq!(after, balances(2, 3, 0, 0, 1));
    }

    #[actix_web::test]
    async fn create_if_absent_returns_the_existing_row_to_the_loser() {
        let store = MemoryLedgerStore::default();
        let first = store
            .create_if_absent(balances(5, 0, 0, 0, 0))
            .await
            .unwrap();
        assert!(matches!(first, CreateIfAbsent::Created(_)));

        let second = store
            .create_if_absent(LeaveLedger::empty(1, 2026))
            .await
            .unwrap();
        match second {
            CreateIfAbsent::Existing(ledger) => assert_eq!(ledger.q1, 5),
            other => panic!("expected the existing row, got {other:?}"),
        }
    }
}
