use chrono::{DateTime, NaiveDate, Utc};
use sqlx::MySqlPool;

use crate::ledger::error::LeaveError;
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};

/// A request as submitted by an employee, before it has an id.
#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub user_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i32,
    pub leave_type: LeaveType,
    pub reason: Option<String>,
}

/// Durable leave-request rows. Decision updates are compare-and-set on the
/// pending status so a request is decided at most once.
#[allow(async_fn_in_trait)]
pub trait RequestStore {
    /// Insert a new pending request, returning its id.
    async fn insert(&self, new: NewLeaveRequest) -> Result<u64, LeaveError>;

    async fn get(&self, id: u64) -> Result<Option<LeaveRequest>, LeaveError>;

    /// Flip a pending request into a terminal state. Returns `false` when the
    /// request was no longer pending (it lost a decision race or was already
    /// decided); nothing is written in that case.
    async fn mark_decided(
        &self,
        id: u64,
        status: LeaveStatus,
        actor_id: u64,
        at: DateTime<Utc>,
        rejection_reason: Option<&str>,
    ) -> Result<bool, LeaveError>;
}

#[derive(Clone)]
pub struct MySqlRequestStore {
    pool: MySqlPool,
}

impl MySqlRequestStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

impl RequestStore for MySqlRequestStore {
    async fn insert(&self, new: NewLeaveRequest) -> Result<u64, LeaveError> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (user_id, start_date, end_date, days, leave_type, status, reason)
            VALUES (?, ?, ?, ?, ?, 'pending', ?)
            "#,
        )
        .bind(new.user_id)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.days)
        .bind(new.leave_type)
        .bind(new.reason)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_id())
    }

    async fn get(&self, id: u64) -> Result<Option<LeaveRequest>, LeaveError> {
        let row = sqlx::query_as::<_, LeaveRequest>(
            r#"
            SELECT id, user_id, start_date, end_date, days, leave_type, status,
                   reason, approved_by, approved_at, rejection_reason, created_at
              FROM leave_requests
             WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn mark_decided(
        &self,
        id: u64,
        status: LeaveStatus,
        actor_id: u64,
        at: DateTime<Utc>,
        rejection_reason: Option<&str>,
    ) -> Result<bool, LeaveError> {
        let result = sqlx::query(
            r#"
            UPDATE leave_requests
               SET status = ?, approved_by = ?, approved_at = ?, rejection_reason = ?
             WHERE id = ?
               AND status = 'pending'
            "#,
        )
        .bind(status)
        .bind(actor_id)
        .bind(at)
        .bind(rejection_reason)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
