use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LeaveType {
    /// Drawn from the quarterly/carried balance.
    General,
    /// Drawn from the separate annual allowance of four optional holidays.
    Optional,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[sqlx(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

/// One leave application. `status` only ever moves pending -> approved,
/// pending -> rejected or pending -> cancelled; decided rows are immutable.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub user_id: u64,
    #[schema(example = "2026-02-02", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-02-04", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    /// Business days requested, as counted by the submitting client.
    #[schema(example = 3)]
    pub days: i32,
    #[schema(example = "general")]
    pub leave_type: LeaveType,
    #[schema(example = "pending")]
    pub status: LeaveStatus,
    #[schema(example = "family event", nullable = true)]
    pub reason: Option<String>,
    #[schema(example = 2000, nullable = true)]
    pub approved_by: Option<u64>,
    #[schema(example = "2026-02-01T00:00:00Z", format = "date-time", value_type = String)]
    pub approved_at: Option<DateTime<Utc>>,
    #[schema(nullable = true)]
    pub rejection_reason: Option<String>,
    #[schema(example = "2026-01-28T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: Option<DateTime<Utc>>,
}
