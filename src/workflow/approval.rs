use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use strum::Display;

use crate::directory::ProfileDirectory;
use crate::ledger::engine::{self, DeductionOutcome};
use crate::ledger::error::LeaveError;
use crate::ledger::store::LedgerStore;
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::model::role::Role;
use crate::workflow::requests::RequestStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

/// Whoever is deciding: resolved from the authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: u64,
    pub role: Role,
}

/// Result of a successfully decided request.
#[derive(Debug)]
pub struct Decided {
    pub request_id: u64,
    pub status: LeaveStatus,
    /// Present on approvals: what the deduction drew from the ledger.
    pub deduction: Option<DeductionOutcome>,
}

/// Decide a pending leave request.
///
/// Only an admin or the owner's manager may decide. Approval runs the
/// deduction first and only then flips the status; if the flip loses a race
/// the deduction is reversed. A request is therefore never approved without
/// its deduction, nor left deducted while still pending.
pub async fn decide<L, R, P>(
    ledger: &L,
    requests: &R,
    directory: &P,
    request_id: u64,
    decision: Decision,
    actor: Actor,
    rejection_reason: Option<&str>,
    decided_at: DateTime<Utc>,
) -> Result<Decided, LeaveError>
where
    L: LedgerStore,
    R: RequestStore,
    P: ProfileDirectory,
{
    let request = requests.get(request_id).await?.ok_or(LeaveError::NotFound)?;
    if request.status != LeaveStatus::Pending {
        return Err(LeaveError::InvalidState);
    }
    authorize(directory, &request, actor).await?;

    match decision {
        Decision::Reject => {
            let reason = rejection_reason
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or(LeaveError::MissingReason)?;

            if requests
                .mark_decided(request_id, LeaveStatus::Rejected, actor.id, decided_at, Some(reason))
                .await?
            {
                Ok(Decided {
                    request_id,
                    status: LeaveStatus::Rejected,
                    deduction: None,
                })
            } else {
                Err(LeaveError::InvalidState)
            }
        }
        Decision::Approve => {
            let year = request.start_date.year();
            let outcome =
                engine::deduct(ledger, request.user_id, year, request.days, request.leave_type)
                    .await?;

            match requests
                .mark_decided(request_id, LeaveStatus::Approved, actor.id, decided_at, None)
                .await
            {
                Ok(true) => Ok(Decided {
                    request_id,
                    status: LeaveStatus::Approved,
                    deduction: Some(outcome),
                }),
                Ok(false) => {
                    // lost the decision race after the deduction committed
                    compensate(ledger, &request, &outcome, year).await;
                    Err(LeaveError::InvalidState)
                }
                Err(e) => {
                    compensate(ledger, &request, &outcome, year).await;
                    Err(e)
                }
            }
        }
    }
}

async fn compensate<L: LedgerStore>(
    ledger: &L,
    request: &LeaveRequest,
    outcome: &DeductionOutcome,
    year: i32,
) {
    if let Err(e) = engine::reverse(ledger, request.user_id, year, outcome).await {
        tracing::error!(
            error = %e,
            request_id = request.id,
            user_id = request.user_id,
            "deduction reversal failed, ledger and request disagree"
        );
    }
}

async fn authorize<P: ProfileDirectory>(
    directory: &P,
    request: &LeaveRequest,
    actor: Actor,
) -> Result<(), LeaveError> {
    if actor.role == Role::Admin {
        return Ok(());
    }
    let manager_id = directory
        .get(request.user_id)
        .await?
        .and_then(|p| p.manager_id);
    if manager_id == Some(actor.id) {
        return Ok(());
    }
    Err(LeaveError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::ledger::memory::{MemoryDirectory, MemoryLedgerStore, MemoryRequestStore};
    use crate::model::ledger::LeaveLedger;
    use crate::model::leave_request::LeaveType;
    use crate::model::profile::Profile;
    use crate::workflow::requests::NewLeaveRequest;

    const OWNER: u64 = 10;
    const MANAGER: u64 = 20;
    const ADMIN: Actor = Actor {
        id: 99,
        role: Role::Admin,
    };

    fn directory() -> MemoryDirectory {
        MemoryDirectory::with([
            Profile {
                user_id: OWNER,
                manager_id: Some(MANAGER),
                is_active: true,
            },
            Profile {
                user_id: MANAGER,
                manager_id: None,
                is_active: true,
            },
        ])
    }

    fn manager() -> Actor {
        Actor {
            id: MANAGER,
            role: Role::Manager,
        }
    }

    async fn submit(requests: &MemoryRequestStore, days: i32, leave_type: LeaveType) -> u64 {
        requests
            .insert(NewLeaveRequest {
                user_id: OWNER,
                start_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2026, 3, 6).unwrap(),
                days,
                leave_type,
                reason: Some("family event".into()),
            })
            .await
            .unwrap()
    }

    fn seeded_ledger(q1: i32) -> LeaveLedger {
        LeaveLedger {
            q1,
            ..LeaveLedger::empty(OWNER, 2026)
        }
    }

    #[actix_web::test]
    async fn approval_deducts_and_flips_the_status() {
        let ledger = MemoryLedgerStore::default();
        ledger.put(seeded_ledger(5));
        let requests = MemoryRequestStore::default();
        let id = submit(&requests, 3, LeaveType::General).await;
        let now = Utc::now();

        let decided = decide(
            &ledger,
            &requests,
            &directory(),
            id,
            Decision::Approve,
            manager(),
            None,
            now,
        )
        .await
        .unwrap();

        assert_eq!(decided.status, LeaveStatus::Approved);
        assert!(decided.deduction.is_some());

        let request = requests.get(id).await.unwrap().unwrap();
        assert_eq!(request.status, LeaveStatus::Approved);
        assert_eq!(request.approved_by, Some(MANAGER));
        assert_eq!(request.approved_at, Some(now));
        assert_eq!(ledger.get(OWNER, 2026).await.unwrap().unwrap().q1, 2);
    }

    #[actix_web::test]
    async fn failed_deduction_leaves_the_request_pending() {
        let ledger = MemoryLedgerStore::default();
        ledger.put(seeded_ledger(1));
        let requests = MemoryRequestStore::default();
        let id = submit(&requests, 3, LeaveType::General).await;

        let err = decide(
            &ledger,
            &requests,
            &directory(),
            id,
            Decision::Approve,
            ADMIN,
            None,
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LeaveError::InsufficientBalance { shortfall: 2 }));

        let request = requests.get(id).await.unwrap().unwrap();
        assert_eq!(request.status, LeaveStatus::Pending);
        assert_eq!(ledger.get(OWNER, 2026).await.unwrap().unwrap().q1, 1);
    }

    #[actix_web::test]
    async fn a_request_is_decided_at_most_once() {
        let ledger = MemoryLedgerStore::default();
        ledger.put(seeded_ledger(5));
        let requests = MemoryRequestStore::default();
        let id = submit(&requests, 2, LeaveType::General).await;

        decide(
            &ledger,
            &requests,
            &directory(),
            id,
            Decision::Approve,
            ADMIN,
            None,
            Utc::now(),
        )
        .await
        .unwrap();

        let err = decide(
            &ledger,
            &requests,
            &directory(),
            id,
            Decision::Approve,
            ADMIN,
            None,
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LeaveError::InvalidState));

        // deducted exactly once
        assert_eq!(ledger.get(OWNER, 2026).await.unwrap().unwrap().q1, 3);
    }

    #[actix_web::test]
    async fn unknown_requests_are_not_found() {
        let err = decide(
            &MemoryLedgerStore::default(),
            &MemoryRequestStore::default(),
            &directory(),
            404,
            Decision::Approve,
            ADMIN,
            None,
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LeaveError::NotFound));
    }

    #[actix_web::test]
    async fn only_the_owners_manager_or_an_admin_may_decide() {
        let ledger = MemoryLedgerStore::default();
        ledger.put(seeded_ledger(5));
        let requests = MemoryRequestStore::default();
        let id = submit(&requests, 1, LeaveType::General).await;

        for actor in [
            Actor {
                id: OWNER,
                role: Role::Employee,
            },
            // a manager, but not this employee's manager
            Actor {
                id: 555,
                role: Role::Manager,
            },
        ] {
            let err = decide(
                &ledger,
                &requests,
                &directory(),
                id,
                Decision::Approve,
                actor,
                None,
                Utc::now(),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, LeaveError::Unauthorized));
        }

        let request = requests.get(id).await.unwrap().unwrap();
        assert_eq!(request.status, LeaveStatus::Pending);
    }

    #[actix_web::test]
    async fn rejection_requires_a_reason() {
        let ledger = MemoryLedgerStore::default();
        let requests = MemoryRequestStore::default();
        let id = submit(&requests, 1, LeaveType::General).await;

        for reason in [None, Some(""), Some("   ")] {
            let err = decide(
                &ledger,
                &requests,
                &directory(),
                id,
                Decision::Reject,
                ADMIN,
                reason,
                Utc::now(),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, LeaveError::MissingReason));
        }
    }

    #[actix_web::test]
    async fn rejection_records_the_reason_and_touches_no_ledger() {
        let ledger = MemoryLedgerStore::default();
        ledger.put(seeded_ledger(5));
        let requests = MemoryRequestStore::default();
        let id = submit(&requests, 3, LeaveType::General).await;

        let decided = decide(
            &ledger,
            &requests,
            &directory(),
            id,
            Decision::Reject,
            manager(),
            Some("project deadline"),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(decided.status, LeaveStatus::Rejected);
        assert!(decided.deduction.is_none());

        let request = requests.get(id).await.unwrap().unwrap();
        assert_eq!(request.status, LeaveStatus::Rejected);
        assert_eq!(request.rejection_reason.as_deref(), Some("project deadline"));
        assert_eq!(ledger.get(OWNER, 2026).await.unwrap().unwrap().q1, 5);
    }

    #[actix_web::test]
    async fn approving_an_optional_request_consumes_one_allowance() {
        let ledger = MemoryLedgerStore::default();
        ledger.put(seeded_ledger(5));
        let requests = MemoryRequestStore::default();
        let id = submit(&requests, 2, LeaveType::Optional).await;

        let decided = decide(
            &ledger,
            &requests,
            &directory(),
            id,
            Decision::Approve,
            manager(),
            None,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(
            decided.deduction,
            Some(DeductionOutcome::Optional { optional_used: 1 })
        );
        let after = ledger.get(OWNER, 2026).await.unwrap().unwrap();
        assert_eq!(after.optional_used, 1);
        assert_eq!(after.q1, 5, "general buckets untouched");
    }
}
