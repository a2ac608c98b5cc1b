use serde::Serialize;
use utoipa::ToSchema;

use crate::ledger::error::LeaveError;
use crate::model::ledger::LeaveLedger;

/// Per-bucket breakdown of a satisfied general-leave deduction, kept for the
/// audit trail returned to the approver.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Deductions {
    pub q1: i32,
    pub q2: i32,
    pub q3: i32,
    pub q4: i32,
    pub carried: i32,
}

impl Deductions {
    pub fn total(&self) -> i32 {
        self.q1 + self.q2 + self.q3 + self.q4 + self.carried
    }
}

/// Plan a general-leave draw-down against a ledger snapshot.
///
/// Buckets drain in the fixed order Q1 -> Q2 -> Q3 -> Q4 -> carried, each
/// contributing at most its current balance. The plan is provisional: nothing
/// is persisted here, and a shortfall produces `InsufficientBalance` with the
/// unmet remainder while the snapshot stays untouched.
pub fn plan_drawdown(ledger: &LeaveLedger, days: i32) -> Result<Deductions, LeaveError> {
    let mut remaining = days;
    let mut plan = Deductions::default();

    for (balance, slot) in [
        (ledger.q1, &mut plan.q1),
        (ledger.q2, &mut plan.q2),
        (ledger.q3, &mut plan.q3),
        (ledger.q4, &mut plan.q4),
        (ledger.carried_from_last_year, &mut plan.carried),
    ] {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(balance.max(0));
        *slot = take;
        remaining -= take;
    }

    if remaining > 0 {
        return Err(LeaveError::InsufficientBalance { shortfall: remaining });
    }
    Ok(plan)
}

/// Year-end carry forward: half the unused quarterly balance, rounded down.
/// The carried bucket itself does not roll over a second time.
pub fn carry_forward(ledger: &LeaveLedger) -> i32 {
    ledger.quarter_total() / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(q1: i32, q2: i32, q3: i32, q4: i32, carried: i32) -> LeaveLedger {
        LeaveLedger {
            q1,
            q2,
            q3,
            q4,
            carried_from_last_year: carried,
            ..LeaveLedger::empty(1, 2026)
        }
    }

    #[test]
    fn earlier_quarters_are_exhausted_first() {
        let plan = plan_drawdown(&ledger(2, 5, 5, 5, 0), 4).unwrap();
        assert_eq!(
            plan,
            Deductions {
                q1: 2,
                q2: 2,
                q3: 0,
                q4: 0,
                carried: 0
            }
        );
    }

    #[test]
    fn carried_bucket_is_the_last_resort() {
        let plan = plan_drawdown(&ledger(1, 1, 1, 1, 3), 6).unwrap();
        assert_eq!(
            plan,
            Deductions {
                q1: 1,
                q2: 1,
                q3: 1,
                q4: 1,
                carried: 2
            }
        );
    }

    #[test]
    fn exact_fit_drains_everything() {
        let plan = plan_drawdown(&ledger(1, 0, 2, 0, 2), 5).unwrap();
        assert_eq!(plan.total(), 5);
        assert_eq!(plan.carried, 2);
    }

    #[test]
    fn shortfall_reports_the_unmet_remainder() {
        let err = plan_drawdown(&ledger(1, 0, 0, 0, 0), 3).unwrap_err();
        match err {
            LeaveError::InsufficientBalance { shortfall } => assert_eq!(shortfall, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn carry_forward_halves_and_rounds_down() {
        assert_eq!(carry_forward(&ledger(3, 2, 1, 0, 0)), 3);
        assert_eq!(carry_forward(&ledger(1, 0, 0, 0, 0)), 0);
        assert_eq!(carry_forward(&ledger(0, 0, 0, 0, 7)), 0);
    }
}
