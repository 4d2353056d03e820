//! The startup job table.
//!
//! Built as data at startup and handed to the scheduler: two one-time
//! jobs keyed to season deadlines, plus the recurring draft-reminder
//! digest. Every action is safe to invoke more than once — immediate
//! firing of an already-past deadline has no duplicate effect.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use tribal_draft::{AutoFinalizer, DraftError, DraftService, Notifier};
use tribal_state::StateStore;

use crate::scheduler::{DeadlineField, JobRegistration, Trigger};

pub const JOB_RANDOMIZE_ORDERS: &str = "randomize_draft_orders";
pub const JOB_FINALIZE_DRAFTS: &str = "finalize_drafts";
pub const JOB_DRAFT_REMINDER: &str = "draft_reminder";

/// Build the full job table for the daemon.
pub fn job_table(
    store: &StateStore,
    notifier: Arc<dyn Notifier>,
    reminder_expr: &str,
) -> Vec<JobRegistration> {
    let service = DraftService::new(store.clone(), notifier.clone());
    let finalizer = AutoFinalizer::new(store.clone(), notifier.clone());

    let randomize = {
        let store = store.clone();
        let service = service.clone();
        JobRegistration {
            name: JOB_RANDOMIZE_ORDERS.to_string(),
            trigger: Trigger::OneTime(DeadlineField::DraftOrderDeadline),
            action: Arc::new(move || {
                let store = store.clone();
                let service = service.clone();
                Box::pin(async move { randomize_unordered_leagues(&store, &service) })
            }),
            enabled: true,
        }
    };

    let finalize = JobRegistration {
        name: JOB_FINALIZE_DRAFTS.to_string(),
        trigger: Trigger::OneTime(DeadlineField::DraftDeadline),
        action: Arc::new(move || {
            let finalizer = finalizer.clone();
            Box::pin(async move {
                let summary = finalizer.run().await?;
                Ok(serde_json::to_value(summary)?)
            })
        }),
        enabled: true,
    };

    let reminder = {
        let store = store.clone();
        JobRegistration {
            name: JOB_DRAFT_REMINDER.to_string(),
            trigger: Trigger::Recurring(reminder_expr.to_string()),
            action: Arc::new(move || {
                let store = store.clone();
                let notifier = notifier.clone();
                Box::pin(async move { send_draft_reminder(&store, notifier).await })
            }),
            enabled: true,
        }
    };

    vec![randomize, finalize, reminder]
}

/// Give every league in the active season still lacking a draft order a
/// randomized one. Leagues with an order are untouched, so re-running is
/// harmless.
fn randomize_unordered_leagues(
    store: &StateStore,
    service: &DraftService,
) -> anyhow::Result<serde_json::Value> {
    let Some(season) = store.get_active_season()? else {
        return Ok(json!({ "randomized": 0, "skipped": 0 }));
    };

    let mut randomized = 0;
    let mut skipped = 0;
    for league in store.list_leagues_for_season(&season.id)? {
        if !league.draft_order.is_empty() {
            continue;
        }
        match service.randomize_draft_order(&league.id) {
            Ok(order) => {
                info!(league = %league.id, members = order.len(), "draft order auto-randomized");
                randomized += 1;
            }
            Err(DraftError::EmptyOrder(_)) => {
                warn!(league = %league.id, "league has no members; cannot randomize");
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(json!({ "randomized": randomized, "skipped": skipped }))
}

/// Count leagues still drafting and hand the digest to the notifier.
async fn send_draft_reminder(
    store: &StateStore,
    notifier: Arc<dyn Notifier>,
) -> anyhow::Result<serde_json::Value> {
    let Some(season) = store.get_active_season()? else {
        return Ok(json!({ "leagues_drafting": 0 }));
    };

    let drafting = store
        .list_leagues_for_season(&season.id)?
        .iter()
        .filter(|l| l.draft_status != tribal_core::types::DraftStatus::Completed)
        .count();

    notifier.draft_digest(&season.id, drafting).await?;
    Ok(json!({ "leagues_drafting": drafting }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use tribal_core::types::*;
    use tribal_draft::LogNotifier;

    use crate::deadlines::DeadlineView;
    use crate::monitor::JobMonitor;
    use crate::scheduler::DeadlineScheduler;

    fn seed_world(store: &StateStore) {
        let now = Utc::now();
        store
            .put_season(&Season {
                id: "s48".to_string(),
                number: 48,
                registration_close: now - Duration::days(21),
                draft_order_deadline: now - Duration::days(14),
                draft_deadline: now - Duration::hours(1),
                is_active: true,
            })
            .unwrap();

        for (league_id, order) in [("l1", vec!["alice", "bob"]), ("l2", vec![])] {
            store
                .put_league(&League {
                    id: league_id.to_string(),
                    season_id: "s48".to_string(),
                    name: league_id.to_string(),
                    commissioner: "commish".to_string(),
                    draft_status: DraftStatus::Pending,
                    draft_order: order.iter().map(|u| u.to_string()).collect(),
                    live: false,
                    created_at: now,
                    updated_at: now,
                })
                .unwrap();
        }
        for user in ["carol", "dave", "erin"] {
            store
                .put_member(&Member {
                    league_id: "l2".to_string(),
                    user_id: user.to_string(),
                    draft_position: None,
                })
                .unwrap();
        }
        for i in 0..12 {
            store
                .put_castaway(&Castaway {
                    id: format!("c{i:02}"),
                    season_id: "s48".to_string(),
                    name: format!("Castaway {i}"),
                    status: CastawayStatus::Active,
                })
                .unwrap();
        }
    }

    async fn scheduler_with_jobs(store: &StateStore) -> DeadlineScheduler {
        let scheduler = DeadlineScheduler::new(
            JobMonitor::new(),
            DeadlineView::new(store.clone()),
            chrono_tz::America::New_York,
        );
        for registration in job_table(store, Arc::new(LogNotifier), "0 0 9 * * Mon") {
            scheduler.register(registration).await;
        }
        scheduler
    }

    #[tokio::test]
    async fn randomize_job_orders_only_unordered_leagues() {
        let store = StateStore::open_in_memory().unwrap();
        seed_world(&store);
        let scheduler = scheduler_with_jobs(&store).await;

        let execution = scheduler.run_job(JOB_RANDOMIZE_ORDERS).await.unwrap();
        assert!(execution.success);
        assert_eq!(
            execution.result,
            Some(json!({ "randomized": 1, "skipped": 0 }))
        );

        // l1 untouched, l2 got a permutation of its three members.
        let l1 = store.get_league("l1").unwrap().unwrap();
        assert_eq!(l1.draft_order, vec!["alice", "bob"]);
        let l2 = store.get_league("l2").unwrap().unwrap();
        let mut order = l2.draft_order.clone();
        order.sort();
        assert_eq!(order, vec!["carol", "dave", "erin"]);

        // Rerun: nothing left to randomize.
        let execution = scheduler.run_job(JOB_RANDOMIZE_ORDERS).await.unwrap();
        assert_eq!(
            execution.result,
            Some(json!({ "randomized": 0, "skipped": 0 }))
        );
    }

    #[tokio::test]
    async fn randomize_then_finalize_fully_drafts_an_abandoned_league() {
        let store = StateStore::open_in_memory().unwrap();
        seed_world(&store);
        let scheduler = scheduler_with_jobs(&store).await;

        scheduler.run_job(JOB_RANDOMIZE_ORDERS).await.unwrap();
        let execution = scheduler.run_job(JOB_FINALIZE_DRAFTS).await.unwrap();
        assert!(execution.success);

        // Both leagues completed: l1 had its order, l2 got a random one.
        for league_id in ["l1", "l2"] {
            let league = store.get_league(league_id).unwrap().unwrap();
            assert_eq!(league.draft_status, DraftStatus::Completed);
            assert!(league.live);
        }
        assert_eq!(store.list_picks_for_league("l1").unwrap().len(), 4);
        assert_eq!(store.list_picks_for_league("l2").unwrap().len(), 6);

        // Second finalize run is a no-op.
        let execution = scheduler.run_job(JOB_FINALIZE_DRAFTS).await.unwrap();
        let summary: serde_json::Value = execution.result.unwrap();
        assert_eq!(summary["leagues_scanned"], 0);
        assert_eq!(summary["picks_filled"], 0);
    }

    #[tokio::test]
    async fn reminder_counts_leagues_still_drafting() {
        let store = StateStore::open_in_memory().unwrap();
        seed_world(&store);
        let scheduler = scheduler_with_jobs(&store).await;

        let execution = scheduler.run_job(JOB_DRAFT_REMINDER).await.unwrap();
        assert_eq!(execution.result, Some(json!({ "leagues_drafting": 2 })));

        scheduler.run_job(JOB_RANDOMIZE_ORDERS).await.unwrap();
        scheduler.run_job(JOB_FINALIZE_DRAFTS).await.unwrap();

        let execution = scheduler.run_job(JOB_DRAFT_REMINDER).await.unwrap();
        assert_eq!(execution.result, Some(json!({ "leagues_drafting": 0 })));
    }
}
