use sqlx::MySqlPool;

use crate::ledger::drawdown::Deductions;
use crate::ledger::error::LeaveError;
use crate::ledger::quarter::Quarter;
use crate::model::ledger::LeaveLedger;

/// Additive change to a single ledger row; negative values deduct.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LedgerDelta {
    pub q1: i32,
    pub q2: i32,
    pub q3: i32,
    pub q4: i32,
    pub carried: i32,
    pub optional_used: i32,
}

impl LedgerDelta {
    /// Credit `days` into one quarter.
    pub fn credit(quarter: Quarter, days: i32) -> Self {
        let mut delta = Self::default();
        match quarter {
            Quarter::Q1 => delta.q1 = days,
            Quarter::Q2 => delta.q2 = days,
            Quarter::Q3 => delta.q3 = days,
            Quarter::Q4 => delta.q4 = days,
        }
        delta
    }

    /// Turn a draw-down plan into the negative delta that commits it.
    pub fn deduction(plan: &Deductions) -> Self {
        Self {
            q1: -plan.q1,
            q2: -plan.q2,
            q3: -plan.q3,
            q4: -plan.q4,
            carried: -plan.carried,
            optional_used: 0,
        }
    }

    /// Bump (or, negatively, release) the optional-holiday counter.
    pub fn optional(step: i32) -> Self {
        Self {
            optional_used: step,
            ..Self::default()
        }
    }

    /// The delta that exactly undoes this one.
    pub fn reversal(&self) -> Self {
        Self {
            q1: -self.q1,
            q2: -self.q2,
            q3: -self.q3,
            q4: -self.q4,
            carried: -self.carried,
            optional_used: -self.optional_used,
        }
    }
}

/// Outcome of `create_if_absent`: when two callers race on the same key,
/// exactly one insert wins and the loser observes the existing row.
#[derive(Debug)]
pub enum CreateIfAbsent {
    Created(LeaveLedger),
    Existing(LeaveLedger),
}

impl CreateIfAbsent {
    pub fn into_ledger(self) -> LeaveLedger {
        match self {
            CreateIfAbsent::Created(ledger) | CreateIfAbsent::Existing(ledger) => ledger,
        }
    }
}

/// Durable per-(user, year) ledger rows with atomic read-modify-write.
///
/// Implementations must linearize mutations per key: `apply_delta` either
/// commits the whole delta with every field still inside its invariant range
/// (quarters and carried balance >= 0, `optional_used` within 0..=4), or
/// changes nothing and reports `ConcurrencyConflict`.
#[allow(async_fn_in_trait)]
pub trait LedgerStore {
    async fn get(&self, user_id: u64, year: i32) -> Result<Option<LeaveLedger>, LeaveError>;

    async fn create_if_absent(&self, ledger: LeaveLedger) -> Result<CreateIfAbsent, LeaveError>;

    async fn apply_delta(
        &self,
        user_id: u64,
        year: i32,
        delta: LedgerDelta,
    ) -> Result<(), LeaveError>;

    async fn list_year(&self, year: i32) -> Result<Vec<LeaveLedger>, LeaveError>;

    /// Atomically set the carried balance, zero the quarters and stamp the
    /// row as carry-calculated, guarded by the snapshot's quarter values.
    /// A concurrent mutation since the snapshot was read surfaces as
    /// `ConcurrencyConflict`.
    async fn finalize_carry(&self, snapshot: &LeaveLedger, carry: i32) -> Result<(), LeaveError>;
}

#[derive(Clone)]
pub struct MySqlLedgerStore {
    pool: MySqlPool,
}

impl MySqlLedgerStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

const LEDGER_COLUMNS: &str =
    "user_id, year, q1, q2, q3, q4, carried_from_last_year, optional_used, carry_calculated";

impl LedgerStore for MySqlLedgerStore {
    async fn get(&self, user_id: u64, year: i32) -> Result<Option<LeaveLedger>, LeaveError> {
        let sql =
            format!("SELECT {LEDGER_COLUMNS} FROM leave_ledger WHERE user_id = ? AND year = ?");
        let row = sqlx::query_as::<_, LeaveLedger>(&sql)
            .bind(user_id)
            .bind(year)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn create_if_absent(&self, ledger: LeaveLedger) -> Result<CreateIfAbsent, LeaveError> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_ledger
                (user_id, year, q1, q2, q3, q4, carried_from_last_year, optional_used, carry_calculated)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ledger.user_id)
        .bind(ledger.year)
        .bind(ledger.q1)
        .bind(ledger.q2)
        .bind(ledger.q3)
        .bind(ledger.q4)
        .bind(ledger.carried_from_last_year)
        .bind(ledger.optional_used)
        .bind(ledger.carry_calculated)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(CreateIfAbsent::Created(ledger)),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
                // Lost the insert race on (user_id, year); the existing row wins.
                let existing = self
                    .get(ledger.user_id, ledger.year)
                    .await?
                    .ok_or(LeaveError::ConcurrencyConflict)?;
                Ok(CreateIfAbsent::Existing(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_delta(
        &self,
        user_id: u64,
        year: i32,
        delta: LedgerDelta,
    ) -> Result<(), LeaveError> {
        // Single guarded statement: the WHERE clause re-asserts every field
        // stays inside its invariant range, so a stale read-modify-write
        // cannot drive a bucket negative or the optional counter past four.
        let result = sqlx::query(
            r#"
            UPDATE leave_ledger
               SET q1 = q1 + ?, q2 = q2 + ?, q3 = q3 + ?, q4 = q4 + ?,
                   carried_from_last_year = carried_from_last_year + ?,
                   optional_used = optional_used + ?
             WHERE user_id = ? AND year = ?
               AND q1 + ? >= 0 AND q2 + ? >= 0 AND q3 + ? >= 0 AND q4 + ? >= 0
               AND carried_from_last_year + ? >= 0
               AND optional_used + ? BETWEEN 0 AND 4
            "#,
        )
        .bind(delta.q1)
        .bind(delta.q2)
        .bind(delta.q3)
        .bind(delta.q4)
        .bind(delta.carried)
        .bind(delta.optional_used)
        .bind(user_id)
        .bind(year)
        .bind(delta.q1)
        .bind(delta.q2)
        .bind(delta.q3)
        .bind(delta.q4)
        .bind(delta.carried)
        .bind(delta.optional_used)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get(user_id, year).await? {
                Some(_) => Err(LeaveError::ConcurrencyConflict),
                None => Err(LeaveError::NotFound),
            };
        }
        Ok(())
    }

    async fn list_year(&self, year: i32) -> Result<Vec<LeaveLedger>, LeaveError> {
        let sql = format!("SELECT {LEDGER_COLUMNS} FROM leave_ledger WHERE year = ? ORDER BY user_id");
        let rows = sqlx::query_as::<_, LeaveLedger>(&sql)
            .bind(year)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn finalize_carry(&self, snapshot: &LeaveLedger, carry: i32) -> Result<(), LeaveError> {
        let result = sqlx::query(
            r#"
            UPDATE leave_ledger
               SET carried_from_last_year = ?, q1 = 0, q2 = 0, q3 = 0, q4 = 0,
                   carry_calculated = TRUE
             WHERE user_id = ? AND year = ?
               AND q1 = ? AND q2 = ? AND q3 = ? AND q4 = ?
            "#,
        )
        .bind(carry)
        .bind(snapshot.user_id)
        .bind(snapshot.year)
        .bind(snapshot.q1)
        .bind(snapshot.q2)
        .bind(snapshot.q3)
        .bind(snapshot.q4)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get(snapshot.user_id, snapshot.year).await? {
                Some(_) => Err(LeaveError::ConcurrencyConflict),
                None => Err(LeaveError::NotFound),
            };
        }
        Ok(())
    }
}
