//! Draft service — the write surface for live drafting.
//!
//! Order administration, explicit draft start, and pick submission.
//! Every pick goes through `StateStore::submit_pick_atomic`; the service
//! only maps typed rejections to errors and fires notifications after
//! the commit.

use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;
use tracing::warn;

use tribal_core::types::*;
use tribal_state::{OrderOutcome, StateStore};

use crate::board::DraftBoard;
use crate::error::{DraftError, DraftResult};
use crate::notify::Notifier;

#[derive(Clone)]
pub struct DraftService {
    store: StateStore,
    notifier: Arc<dyn Notifier>,
}

impl DraftService {
    pub fn new(store: StateStore, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Derive the current board for a league.
    pub fn board(&self, league_id: &str) -> DraftResult<DraftBoard> {
        DraftBoard::load(&self.store, league_id)
    }

    /// Set the draft order. Rejected once drafting has started — the
    /// order is immutable from the first pick on.
    pub fn set_draft_order(&self, league_id: &str, order: Vec<UserId>) -> DraftResult<()> {
        match self.store.assign_draft_order(league_id, &order)? {
            OrderOutcome::Assigned => Ok(()),
            OrderOutcome::LeagueNotFound => Err(DraftError::LeagueNotFound(league_id.to_string())),
            OrderOutcome::DraftStarted => Err(DraftError::DraftStarted(league_id.to_string())),
            OrderOutcome::EmptyOrder => Err(DraftError::EmptyOrder(league_id.to_string())),
        }
    }

    /// Shuffle the league's members into a draft order and assign it.
    /// Used by the draft-order deadline job for leagues whose
    /// commissioner never submitted one.
    pub fn randomize_draft_order(&self, league_id: &str) -> DraftResult<Vec<UserId>> {
        let members = self.store.list_members_for_league(league_id)?;
        let mut order: Vec<UserId> = members.into_iter().map(|m| m.user_id).collect();
        if order.is_empty() {
            return Err(DraftError::EmptyOrder(league_id.to_string()));
        }
        order.shuffle(&mut rand::thread_rng());
        self.set_draft_order(league_id, order.clone())?;
        Ok(order)
    }

    /// Explicit admin transition `pending → in_progress`. The same
    /// transition also happens implicitly on the first committed pick.
    pub fn start_draft(&self, league_id: &str) -> DraftResult<()> {
        let mut league = self
            .store
            .get_league(league_id)?
            .ok_or_else(|| DraftError::LeagueNotFound(league_id.to_string()))?;
        if league.draft_status != DraftStatus::Pending {
            return Err(DraftError::DraftStarted(league_id.to_string()));
        }
        if league.draft_order.is_empty() {
            return Err(DraftError::OrderNotSet(league_id.to_string()));
        }
        league.draft_status = DraftStatus::InProgress;
        league.updated_at = Utc::now();
        self.store.put_league(&league)?;
        Ok(())
    }

    /// Submit one pick on behalf of `user_id`.
    ///
    /// The optional idempotency `token` makes a client retry after a
    /// network timeout replay the original receipt instead of drafting
    /// twice. Notifications fire after the commit and never affect it.
    pub async fn submit_pick(
        &self,
        league_id: &str,
        user_id: &str,
        castaway_id: &str,
        token: Option<&str>,
    ) -> DraftResult<PickReceipt> {
        let outcome = self.store.submit_pick_atomic(
            league_id,
            user_id,
            castaway_id,
            token,
            AcquisitionKind::Draft,
        )?;
        match outcome {
            PickOutcome::Committed(receipt) => {
                self.notify_commit(league_id, user_id, castaway_id, &receipt);
                Ok(receipt)
            }
            PickOutcome::Rejected(rejection) => {
                Err(rejection_to_error(league_id, castaway_id, rejection))
            }
        }
    }

    /// Fire pick/completion notifications off the commit path.
    fn notify_commit(&self, league_id: &str, user_id: &str, castaway_id: &str, receipt: &PickReceipt) {
        let league = match self.store.get_league(league_id) {
            Ok(Some(league)) => league,
            _ => return,
        };
        spawn_notification("pick_confirmed", self.notifier.pick_confirmed(
            &league,
            user_id,
            castaway_id,
            receipt,
        ));
        if receipt.draft_complete {
            spawn_notification("draft_completed", self.notifier.draft_completed(&league));
        }
    }
}

/// Map a committer rejection to the caller-facing error.
pub(crate) fn rejection_to_error(
    league_id: &str,
    castaway_id: &str,
    rejection: PickRejection,
) -> DraftError {
    match rejection {
        PickRejection::LeagueNotFound => DraftError::LeagueNotFound(league_id.to_string()),
        PickRejection::OrderNotSet => DraftError::OrderNotSet(league_id.to_string()),
        PickRejection::NotYourTurn { expected } => DraftError::NotYourTurn { expected },
        PickRejection::CastawayUnavailable => {
            DraftError::CastawayUnavailable(castaway_id.to_string())
        }
        PickRejection::DraftAlreadyComplete => {
            DraftError::DraftAlreadyComplete(league_id.to_string())
        }
    }
}

/// Spawn a fire-and-forget notification; failures are logged, never
/// propagated.
pub(crate) fn spawn_notification(kind: &'static str, fut: crate::notify::NotifyFuture) {
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            warn!(%kind, error = %format!("{e:#}"), "notification delivery failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Duration;

    use crate::notify::NotifyFuture;

    /// Notifier that records event names for assertions.
    #[derive(Default)]
    struct RecordingNotifier {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingNotifier {
        fn events(&self) -> Arc<Mutex<Vec<String>>> {
            self.events.clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn pick_confirmed(
            &self,
            _league: &League,
            user_id: &str,
            _castaway_id: &str,
            _receipt: &PickReceipt,
        ) -> NotifyFuture {
            let events = self.events.clone();
            let user = user_id.to_string();
            Box::pin(async move {
                events.lock().unwrap().push(format!("pick:{user}"));
                Ok(())
            })
        }

        fn draft_completed(&self, league: &League) -> NotifyFuture {
            let events = self.events.clone();
            let league_id = league.id.clone();
            Box::pin(async move {
                events.lock().unwrap().push(format!("complete:{league_id}"));
                Ok(())
            })
        }

        fn draft_digest(&self, _season_id: &str, _leagues_drafting: usize) -> NotifyFuture {
            Box::pin(async move { Ok(()) })
        }
    }

    fn seed(store: &StateStore, league_id: &str, users: &[&str], castaways: usize) {
        let now = Utc::now();
        store
            .put_league(&League {
                id: league_id.to_string(),
                season_id: "s48".to_string(),
                name: "test".to_string(),
                commissioner: users[0].to_string(),
                draft_status: DraftStatus::Pending,
                draft_order: Vec::new(),
                live: false,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        for user in users {
            store
                .put_member(&Member {
                    league_id: league_id.to_string(),
                    user_id: user.to_string(),
                    draft_position: None,
                })
                .unwrap();
        }
        for i in 0..castaways {
            store
                .put_castaway(&Castaway {
                    id: format!("c{i:02}"),
                    season_id: "s48".to_string(),
                    name: format!("Castaway {i}"),
                    status: CastawayStatus::Active,
                })
                .unwrap();
        }
        store
            .put_season(&Season {
                id: "s48".to_string(),
                number: 48,
                registration_close: now - Duration::days(1),
                draft_order_deadline: now + Duration::days(1),
                draft_deadline: now + Duration::days(7),
                is_active: true,
            })
            .unwrap();
    }

    fn service(store: &StateStore) -> (DraftService, Arc<Mutex<Vec<String>>>) {
        let notifier = RecordingNotifier::default();
        let events = notifier.events();
        (DraftService::new(store.clone(), Arc::new(notifier)), events)
    }

    #[tokio::test]
    async fn submit_maps_rejections_to_typed_errors() {
        let store = StateStore::open_in_memory().unwrap();
        seed(&store, "l1", &["alice", "bob"], 4);
        let (svc, _) = service(&store);

        svc.set_draft_order("l1", vec!["alice".into(), "bob".into()]).unwrap();

        let err = svc.submit_pick("l1", "bob", "c00", None).await.unwrap_err();
        assert!(matches!(err, DraftError::NotYourTurn { expected } if expected == "alice"));

        let err = svc.submit_pick("missing", "alice", "c00", None).await.unwrap_err();
        assert!(matches!(err, DraftError::LeagueNotFound(_)));
    }

    #[tokio::test]
    async fn completion_fires_notifications() {
        let store = StateStore::open_in_memory().unwrap();
        seed(&store, "l1", &["alice", "bob"], 4);
        let (svc, events) = service(&store);

        svc.set_draft_order("l1", vec!["alice".into(), "bob".into()]).unwrap();
        for (user, castaway) in [("alice", "c00"), ("bob", "c01"), ("bob", "c02"), ("alice", "c03")] {
            svc.submit_pick("l1", user, castaway, None).await.unwrap();
        }

        // Notifications are spawned; let them drain.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let events = events.lock().unwrap();
        assert_eq!(events.iter().filter(|e| e.starts_with("pick:")).count(), 4);
        assert!(events.contains(&"complete:l1".to_string()));
    }

    #[tokio::test]
    async fn randomize_assigns_a_permutation_of_members() {
        let store = StateStore::open_in_memory().unwrap();
        seed(&store, "l1", &["alice", "bob", "carol", "dave"], 8);
        let (svc, _) = service(&store);

        let order = svc.randomize_draft_order("l1").unwrap();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["alice", "bob", "carol", "dave"]);

        let board = svc.board("l1").unwrap();
        assert_eq!(board.total_members, 4);
        assert_eq!(board.current_picker.as_deref(), Some(order[0].as_str()));
    }

    #[tokio::test]
    async fn start_draft_requires_an_order() {
        let store = StateStore::open_in_memory().unwrap();
        seed(&store, "l1", &["alice", "bob"], 4);
        let (svc, _) = service(&store);

        let err = svc.start_draft("l1").unwrap_err();
        assert!(matches!(err, DraftError::OrderNotSet(_)));

        svc.set_draft_order("l1", vec!["alice".into(), "bob".into()]).unwrap();
        svc.start_draft("l1").unwrap();
        assert_eq!(svc.board("l1").unwrap().status, DraftStatus::InProgress);

        // Starting twice is a typed error, not a silent reset.
        assert!(matches!(svc.start_draft("l1").unwrap_err(), DraftError::DraftStarted(_)));
        // And the order is frozen now.
        let err = svc
            .set_draft_order("l1", vec!["bob".into(), "alice".into()])
            .unwrap_err();
        assert!(matches!(err, DraftError::DraftStarted(_)));
    }

    #[tokio::test]
    async fn board_reports_available_pool_in_stable_order() {
        let store = StateStore::open_in_memory().unwrap();
        seed(&store, "l1", &["alice", "bob"], 5);
        let (svc, _) = service(&store);
        svc.set_draft_order("l1", vec!["alice".into(), "bob".into()]).unwrap();

        svc.submit_pick("l1", "alice", "c02", None).await.unwrap();

        let board = svc.board("l1").unwrap();
        assert_eq!(board.available, vec!["c00", "c01", "c03", "c04"]);
        assert_eq!(board.pick_count, 1);
        assert_eq!(board.round, Some(1));
        assert_eq!(board.current_picker.as_deref(), Some("bob"));
    }
}
