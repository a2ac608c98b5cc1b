use serde::Serialize;
use utoipa::ToSchema;

use crate::ledger::CONFLICT_RETRIES;
use crate::ledger::credit::QUARTERLY_CREDIT;
use crate::ledger::drawdown::carry_forward;
use crate::ledger::error::LeaveError;
use crate::ledger::store::{CreateIfAbsent, LedgerStore};
use crate::model::ledger::LeaveLedger;

/// Tally of one year-end carry phase.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct CarryRun {
    pub processed: u32,
    pub skipped: u32,
    pub errors: u32,
}

/// Dec 31 phase: fold each user's unused quarterly balance into
/// `carried_from_last_year` at 50% (rounded down) and zero the quarters.
///
/// Rows already stamped `carry_calculated` are skipped, so a re-run cannot
/// halve a balance twice. A per-user failure is tallied, never fatal.
pub async fn calculate_carry<S: LedgerStore>(store: &S, year: i32) -> Result<CarryRun, LeaveError> {
    let mut run = CarryRun::default();
    for ledger in store.list_year(year).await? {
        if ledger.carry_calculated {
            run.skipped += 1;
            continue;
        }
        let user_id = ledger.user_id;
        match finalize_user(store, ledger).await {
            Ok(()) => run.processed += 1,
            Err(e) => {
                tracing::error!(error = %e, user_id, year, "year-end carry failed");
                run.errors += 1;
            }
        }
    }

    tracing::info!(
        year,
        processed = run.processed,
        skipped = run.skipped,
        errors = run.errors,
        "year-end carry calculated"
    );
    Ok(run)
}

async fn finalize_user<S: LedgerStore>(
    store: &S,
    mut snapshot: LeaveLedger,
) -> Result<(), LeaveError> {
    let mut attempts = 0;
    loop {
        let carry = carry_forward(&snapshot);
        match store.finalize_carry(&snapshot, carry).await {
            Ok(()) => return Ok(()),
            Err(LeaveError::ConcurrencyConflict) if attempts < CONFLICT_RETRIES => {
                attempts += 1;
                snapshot = store
                    .get(snapshot.user_id, snapshot.year)
                    .await?
                    .ok_or(LeaveError::NotFound)?;
                if snapshot.carry_calculated {
                    return Ok(());
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Jan 1 phase: seed each user's new-year ledger with a fresh Q1 credit and
/// the carried balance computed on Dec 31.
///
/// Prior-year rows not yet stamped by `calculate_carry` are skipped (and
/// tallied) rather than silently carried at full value. An already-existing
/// new-year row is left alone, so the phase is re-runnable without handing
/// out a second Q1 credit.
pub async fn apply_new_year<S: LedgerStore>(store: &S, year: i32) -> Result<CarryRun, LeaveError> {
    let mut run = CarryRun::default();
    for prev in store.list_year(year - 1).await? {
        if !prev.carry_calculated {
            tracing::warn!(
                user_id = prev.user_id,
                year = year - 1,
                "carry not calculated, skipping new-year ledger"
            );
            run.skipped += 1;
            continue;
        }

        let seeded = LeaveLedger {
            q1: QUARTERLY_CREDIT,
            carried_from_last_year: prev.carried_from_last_year,
            ..LeaveLedger::empty(prev.user_id, year)
        };
        match store.create_if_absent(seeded).await {
            Ok(CreateIfAbsent::Created(_)) => run.processed += 1,
            Ok(CreateIfAbsent::Existing(_)) => run.skipped += 1,
            Err(e) => {
                tracing::error!(error = %e, user_id = prev.user_id, year, "new-year ledger creation failed");
                run.errors += 1;
            }
        }
    }

    tracing::info!(
        year,
        processed = run.processed,
        skipped = run.skipped,
        errors = run.errors,
        "new year ledgers created"
    );
    Ok(run)
}
