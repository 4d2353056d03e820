//! Cached view of the active season's deadlines.
//!
//! Deadlines are administrator-mutated rows in the store; the scheduler
//! reads them through this cache and re-arms its one-time timers.
//! `invalidate()` is the explicit signal that an edit happened — it must
//! be observed before the next re-arm decision, so the cache is cleared
//! rather than refreshed in place.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use tribal_core::types::Season;
use tribal_state::{StateResult, StateStore};

#[derive(Clone)]
pub struct DeadlineView {
    store: StateStore,
    cached: Arc<RwLock<Option<Season>>>,
}

impl DeadlineView {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// The active season, served from cache when warm.
    pub async fn active_season(&self) -> StateResult<Option<Season>> {
        if let Some(season) = self.cached.read().await.clone() {
            return Ok(Some(season));
        }
        let fresh = self.store.get_active_season()?;
        if let Some(season) = &fresh {
            *self.cached.write().await = Some(season.clone());
            debug!(season = %season.id, "deadline cache refreshed");
        }
        Ok(fresh)
    }

    /// Drop the cached season so the next read sees the edited row.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
        debug!("deadline cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn season(id: &str, days_out: i64) -> Season {
        let now = Utc::now();
        Season {
            id: id.to_string(),
            number: 48,
            registration_close: now + Duration::days(days_out),
            draft_order_deadline: now + Duration::days(days_out + 3),
            draft_deadline: now + Duration::days(days_out + 7),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn serves_cached_value_until_invalidated() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_season(&season("s48", 7)).unwrap();

        let view = DeadlineView::new(store.clone());
        let first = view.active_season().await.unwrap().unwrap();

        // Administrator moves the deadline; the cache still holds the
        // old value until the explicit invalidation signal.
        store.put_season(&season("s48", 14)).unwrap();
        let stale = view.active_season().await.unwrap().unwrap();
        assert_eq!(stale.draft_deadline, first.draft_deadline);

        view.invalidate().await;
        let fresh = view.active_season().await.unwrap().unwrap();
        assert!(fresh.draft_deadline > first.draft_deadline);
    }

    #[tokio::test]
    async fn no_active_season_is_not_cached() {
        let store = StateStore::open_in_memory().unwrap();
        let view = DeadlineView::new(store.clone());
        assert!(view.active_season().await.unwrap().is_none());

        // A season appearing later is picked up without invalidation.
        store.put_season(&season("s48", 7)).unwrap();
        assert!(view.active_season().await.unwrap().is_some());
    }
}
