pub mod cache;

use sqlx::MySqlPool;

use crate::ledger::error::LeaveError;
use crate::model::profile::Profile;

/// Read-only view of the external user directory. The leave core never
/// mutates profile data.
#[allow(async_fn_in_trait)]
pub trait ProfileDirectory {
    async fn get(&self, user_id: u64) -> Result<Option<Profile>, LeaveError>;

    /// Users eligible for the quarterly credit (`is_active = true`).
    async fn active_user_ids(&self) -> Result<Vec<u64>, LeaveError>;
}

/// MySQL-backed directory fronted by the in-memory profile cache.
#[derive(Clone)]
pub struct MySqlProfileDirectory {
    pool: MySqlPool,
}

impl MySqlProfileDirectory {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

impl ProfileDirectory for MySqlProfileDirectory {
    async fn get(&self, user_id: u64) -> Result<Option<Profile>, LeaveError> {
        if let Some(profile) = cache::lookup(user_id).await {
            return Ok(Some(profile));
        }

        let profile = sqlx::query_as::<_, Profile>(
            "SELECT user_id, manager_id, is_active FROM profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(p) = &profile {
            cache::store(p.clone()).await;
        }
        Ok(profile)
    }

    async fn active_user_ids(&self) -> Result<Vec<u64>, LeaveError> {
        // batch jobs want the authoritative set, so this skips the cache
        let ids = sqlx::query_scalar::<_, u64>(
            "SELECT user_id FROM profiles WHERE is_active = TRUE ORDER BY user_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
