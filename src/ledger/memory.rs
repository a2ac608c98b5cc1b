//! In-memory store implementations for unit tests, honoring the same
//! per-key atomicity contracts as the MySQL-backed stores.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::directory::ProfileDirectory;
use crate::ledger::engine::OPTIONAL_CAP;
use crate::ledger::error::LeaveError;
use crate::ledger::store::{CreateIfAbsent, LedgerDelta, LedgerStore};
use crate::model::ledger::LeaveLedger;
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::model::profile::Profile;
use crate::workflow::requests::{NewLeaveRequest, RequestStore};

#[derive(Default)]
pub struct MemoryLedgerStore {
    rows: Mutex<HashMap<(u64, i32), LeaveLedger>>,
}

impl MemoryLedgerStore {
    pub fn put(&self, ledger: LeaveLedger) {
        self.rows
            .lock()
            .unwrap()
            .insert((ledger.user_id, ledger.year), ledger);
    }
}

impl LedgerStore for MemoryLedgerStore {
    async fn get(&self, user_id: u64, year: i32) -> Result<Option<LeaveLedger>, LeaveError> {
        Ok(self.rows.lock().unwrap().get(&(user_id, year)).cloned())
    }

    async fn create_if_absent(&self, ledger: LeaveLedger) -> Result<CreateIfAbsent, LeaveError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.entry((ledger.user_id, ledger.year)) {
            Entry::Occupied(entry) => Ok(CreateIfAbsent::Existing(entry.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(ledger.clone());
                Ok(CreateIfAbsent::Created(ledger))
            }
        }
    }

    async fn apply_delta(
        &self,
        user_id: u64,
        year: i32,
        delta: LedgerDelta,
    ) -> Result<(), LeaveError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&(user_id, year)) else {
            return Err(LeaveError::NotFound);
        };

        let next = LeaveLedger {
            q1: row.q1 + delta.q1,
            q2: row.q2 + delta.q2,
            q3: row.q3 + delta.q3,
            q4: row.q4 + delta.q4,
            carried_from_last_year: row.carried_from_last_year + delta.carried,
            optional_used: row.optional_used + delta.optional_used,
            ..row.clone()
        };
        if next.q1 < 0
            || next.q2 < 0
            || next.q3 < 0
            || next.q4 < 0
            || next.carried_from_last_year < 0
            || next.optional_used < 0
            || next.optional_used > OPTIONAL_CAP
        {
            return Err(LeaveError::ConcurrencyConflict);
        }
        *row = next;
        Ok(())
    }

    async fn list_year(&self, year: i32) -> Result<Vec<LeaveLedger>, LeaveError> {
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.year == year)
            .cloned()
            .collect();
        rows.sort_by_key(|l| l.user_id);
        Ok(rows)
    }

    async fn finalize_carry(&self, snapshot: &LeaveLedger, carry: i32) -> Result<(), LeaveError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&(snapshot.user_id, snapshot.year)) else {
            return Err(LeaveError::NotFound);
        };
        if (row.q1, row.q2, row.q3, row.q4) != (snapshot.q1, snapshot.q2, snapshot.q3, snapshot.q4)
        {
            return Err(LeaveError::ConcurrencyConflict);
        }
        row.carried_from_last_year = carry;
        row.q1 = 0;
        row.q2 = 0;
        row.q3 = 0;
        row.q4 = 0;
        row.carry_calculated = true;
        Ok(())
    }
}

/// Fails `apply_delta` with `ConcurrencyConflict` a set number of times
/// before delegating, to exercise bounded-retry paths.
pub struct ConflictInjector<S> {
    inner: S,
    remaining: AtomicU32,
}

impl<S> ConflictInjector<S> {
    pub fn new(inner: S, conflicts: u32) -> Self {
        Self {
            inner,
            remaining: AtomicU32::new(conflicts),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: LedgerStore> LedgerStore for ConflictInjector<S> {
    async fn get(&self, user_id: u64, year: i32) -> Result<Option<LeaveLedger>, LeaveError> {
        self.inner.get(user_id, year).await
    }

    async fn create_if_absent(&self, ledger: LeaveLedger) -> Result<CreateIfAbsent, LeaveError> {
        self.inner.create_if_absent(ledger).await
    }

    async fn apply_delta(
        &self,
        user_id: u64,
        year: i32,
        delta: LedgerDelta,
    ) -> Result<(), LeaveError> {
        if self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(LeaveError::ConcurrencyConflict);
        }
        self.inner.apply_delta(user_id, year, delta).await
    }

    async fn list_year(&self, year: i32) -> Result<Vec<LeaveLedger>, LeaveError> {
        self.inner.list_year(year).await
    }

    async fn finalize_carry(&self, snapshot: &LeaveLedger, carry: i32) -> Result<(), LeaveError> {
        self.inner.finalize_carry(snapshot, carry).await
    }
}

/// Fails every mutation for one user id, for failure-isolation tests.
pub struct FailFor<S> {
    inner: S,
    user_id: u64,
}

impl<S> FailFor<S> {
    pub fn new(inner: S, user_id: u64) -> Self {
        Self { inner, user_id }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn unavailable() -> LeaveError {
        LeaveError::Store(sqlx::Error::PoolClosed)
    }
}

impl<S: LedgerStore> LedgerStore for FailFor<S> {
    async fn get(&self, user_id: u64, year: i32) -> Result<Option<LeaveLedger>, LeaveError> {
        self.inner.get(user_id, year).await
    }

    async fn create_if_absent(&self, ledger: LeaveLedger) -> Result<CreateIfAbsent, LeaveError> {
        if ledger.user_id == self.user_id {
            return Err(Self::unavailable());
        }
        self.inner.create_if_absent(ledger).await
    }

    async fn apply_delta(
        &self,
        user_id: u64,
        year: i32,
        delta: LedgerDelta,
    ) -> Result<(), LeaveError> {
        if user_id == self.user_id {
            return Err(Self::unavailable());
        }
        self.inner.apply_delta(user_id, year, delta).await
    }

    async fn list_year(&self, year: i32) -> Result<Vec<LeaveLedger>, LeaveError> {
        self.inner.list_year(year).await
    }

    async fn finalize_carry(&self, snapshot: &LeaveLedger, carry: i32) -> Result<(), LeaveError> {
        if snapshot.user_id == self.user_id {
            return Err(Self::unavailable());
        }
        self.inner.finalize_carry(snapshot, carry).await
    }
}

#[derive(Default)]
pub struct MemoryRequestStore {
    rows: Mutex<HashMap<u64, LeaveRequest>>,
    next_id: AtomicU64,
}

impl RequestStore for MemoryRequestStore {
    async fn insert(&self, new: NewLeaveRequest) -> Result<u64, LeaveError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let request = LeaveRequest {
            id,
            user_id: new.user_id,
            start_date: new.start_date,
            end_date: new.end_date,
            days: new.days,
            leave_type: new.leave_type,
            status: LeaveStatus::Pending,
            reason: new.reason,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            created_at: None,
        };
        self.rows.lock().unwrap().insert(id, request);
        Ok(id)
    }

    async fn get(&self, id: u64) -> Result<Option<LeaveRequest>, LeaveError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn mark_decided(
        &self,
        id: u64,
        status: LeaveStatus,
        actor_id: u64,
        at: DateTime<Utc>,
        rejection_reason: Option<&str>,
    ) -> Result<bool, LeaveError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&id) else {
            return Ok(false);
        };
        if row.status != LeaveStatus::Pending {
            return Ok(false);
        }
        row.status = status;
        row.approved_by = Some(actor_id);
        row.approved_at = Some(at);
        row.rejection_reason = rejection_reason.map(str::to_owned);
        Ok(true)
    }
}

/// Fixed profile set standing in for the external directory.
#[derive(Default)]
pub struct MemoryDirectory {
    profiles: HashMap<u64, Profile>,
}

impl MemoryDirectory {
    pub fn with(profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.user_id, p)).collect(),
        }
    }
}

impl ProfileDirectory for MemoryDirectory {
    async fn get(&self, user_id: u64) -> Result<Option<Profile>, LeaveError> {
        Ok(self.profiles.get(&user_id).cloned())
    }

    async fn active_user_ids(&self) -> Result<Vec<u64>, LeaveError> {
        let mut ids: Vec<_> = self
            .profiles
            .values()
            .filter(|p| p.is_active)
            .map(|p| p.user_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
