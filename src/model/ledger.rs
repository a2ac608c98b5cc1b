use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Per-user, per-year leave balance: four quarterly buckets, the balance
/// carried over from the previous year, and the optional-holiday counter.
///
/// Invariants upheld by the store: `q1..q4` and `carried_from_last_year`
/// never go below zero; `optional_used` stays within 0..=4.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveLedger {
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
    /// Stamped by the Dec 31 carry job; gates the Jan 1 new-year rollover.
    pub carry_calculated: bool,
}

impl LeaveLedger {
    /// Fresh all-zero row for a (user, year) pair that has never been
    /// credited or deducted.
    pub fn empty(user_id: u64, year: i32) -> Self {
        Self {
            user_id,
            year,
            q1: 0,
            q2: 0,
            q3: 0,
            q4: 0,
            carried_from_last_year: 0,
            optional_used: 0,
            carry_calculated: false,
        }
    }

    /// Unused quarterly balance, not counting the carried bucket.
    pub fn quarter_total(&self) -> i32 {
        self.q1 + self.q2 + self.q3 + self.q4
    }

    /// Everything a general-leave deduction may draw from.
    pub fn total_available(&self) -> i32 {
        self.quarter_total() + self.carried_from_last_year
    }
}
