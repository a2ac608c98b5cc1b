use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

use crate::model::profile::Profile;

/// Profiles change rarely; a few minutes of staleness on `manager_id` /
/// `is_active` is acceptable for approval checks.
static PROFILE_CACHE: Lazy<Cache<u64, Profile>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(300)) // 5 min TTL
        .build()
});

pub async fn lookup(user_id: u64) -> Option<Profile> {
    PROFILE_CACHE.get(&user_id).await
}

pub async fn store(profile: Profile) {
    PROFILE_CACHE.insert(profile.user_id, profile).await;
}

/// Batch insert profiles into the cache
async fn store_batch(profiles: &[Profile]) {
    let futures: Vec<_> = profiles
        .iter()
        .map(|p| PROFILE_CACHE.insert(p.user_id, p.clone()))
        .collect();

    // Await all insertions concurrently
    futures::future::join_all(futures).await;
}

/// Stream active profiles into the in-memory cache in batches at startup
pub async fn warmup_profile_cache(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, Profile>(
        r#"
        SELECT user_id, manager_id, is_active
        FROM profiles
        WHERE is_active = TRUE
        "#,
    )
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total_count = 0usize;

    while let Some(row) = stream.next().await {
        batch.push(row?);
        total_count += 1;

        if batch.len() >= batch_size {
            store_batch(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        store_batch(&batch).await;
    }

    log::info!(
        "Profile cache warmup complete: {} active profiles",
        total_count
    );

    Ok(())
}
