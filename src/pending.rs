//! Pending batch requests
//!
//! A request blocked by the membership gate is parked here under a short id
//! that travels in the re-check button. Entries expire after a TTL, so
//! abandoned requests do not accumulate.

use moka::future::Cache;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Length of the id embedded in callback data
const PENDING_ID_LEN: usize = 12;

/// A blocked request waiting for the user to join the required channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBatchRequest {
    /// Id carried in the re-check button
    pub id: String,
    /// Catalog keys to deliver once the gate passes
    pub keys: Vec<String>,
    /// Category whose channels must be joined
    pub category: String,
    /// Only this user may resume the request
    pub user_id: i64,
}

/// In-memory table of pending requests with automatic expiry
#[derive(Clone)]
pub struct PendingBatches {
    cache: Cache<String, PendingBatchRequest>,
}

impl PendingBatches {
    /// Create a table whose entries expire after `ttl`
    ///
    /// # Examples
    ///
    /// ```
    /// use filegate_bot::pending::PendingBatches;
    /// use std::time::Duration;
    ///
    /// let pending = PendingBatches::new(Duration::from_secs(3600), 10_000);
    /// ```
    #[must_use]
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Park a request and return its id
    pub async fn insert(&self, user_id: i64, keys: Vec<String>, category: String) -> String {
        let id = Uuid::new_v4().simple().to_string()[..PENDING_ID_LEN].to_string();
        debug!(user_id, id = %id, files = keys.len(), "Parking blocked request");
        self.cache
            .insert(
                id.clone(),
                PendingBatchRequest {
                    id: id.clone(),
                    keys,
                    category,
                    user_id,
                },
            )
            .await;
        id
    }

    /// Look at a request without removing it. Other users' requests are hidden.
    pub async fn peek(&self, id: &str, user_id: i64) -> Option<PendingBatchRequest> {
        self.cache
            .get(id)
            .await
            .filter(|request| request.user_id == user_id)
    }

    /// Remove and return a request owned by `user_id`.
    ///
    /// Returns `None` if it expired, belongs to someone else or was already taken.
    pub async fn take(&self, id: &str, user_id: i64) -> Option<PendingBatchRequest> {
        self.peek(id, user_id).await?;
        self.cache.remove(id).await
    }

    /// Number of stored requests
    #[must_use]
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Whether no requests are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply pending inserts, removals and expirations to the counters
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PendingBatches {
        PendingBatches::new(Duration::from_secs(60), 100)
    }

    #[tokio::test]
    async fn test_insert_then_take_once() {
        let pending = table();
        let id = pending
            .insert(7, vec!["f1".into(), "f2".into()], "default".into())
            .await;
        assert_eq!(id.len(), PENDING_ID_LEN);

        let request = pending.take(&id, 7).await.expect("request stored");
        assert_eq!(request.keys, vec!["f1".to_string(), "f2".to_string()]);
        assert!(pending.take(&id, 7).await.is_none());
    }

    #[tokio::test]
    async fn test_other_user_cannot_take() {
        let pending = table();
        let id = pending.insert(7, vec!["f1".into()], "default".into()).await;

        assert!(pending.peek(&id, 8).await.is_none());
        assert!(pending.take(&id, 8).await.is_none());
        assert!(pending.take(&id, 7).await.is_some());
    }

    #[tokio::test]
    async fn test_entry_count() {
        let pending = table();
        pending.insert(1, vec!["a".into()], "default".into()).await;
        pending.insert(2, vec!["b".into()], "default".into()).await;
        pending.sync().await;
        assert_eq!(pending.len(), 2);
    }
}
