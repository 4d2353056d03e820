//! Outbound notification port.
//!
//! The core fires and forgets: a dead notification channel must never
//! roll back or fail a committed pick, so callers spawn these futures
//! and only log failures.

use tracing::info;

use tribal_core::types::{League, PickReceipt};

/// Boxed future returned by notifier methods.
pub type NotifyFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>>;

/// Delivery port for draft events. Real implementations hand off to the
/// platform's email/SMS dispatch; the core never awaits them on the
/// commit path.
pub trait Notifier: Send + Sync {
    /// A pick was committed.
    fn pick_confirmed(
        &self,
        league: &League,
        user_id: &str,
        castaway_id: &str,
        receipt: &PickReceipt,
    ) -> NotifyFuture;

    /// A league's draft reached completion.
    fn draft_completed(&self, league: &League) -> NotifyFuture;

    /// Recurring digest: how many leagues are still drafting.
    fn draft_digest(&self, season_id: &str, leagues_drafting: usize) -> NotifyFuture;
}

/// Notifier that only logs. The default wiring for the daemon; delivery
/// channels are external collaborators.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn pick_confirmed(
        &self,
        league: &League,
        user_id: &str,
        castaway_id: &str,
        receipt: &PickReceipt,
    ) -> NotifyFuture {
        let league_id = league.id.clone();
        let user = user_id.to_string();
        let castaway = castaway_id.to_string();
        let pick = receipt.pick_number;
        Box::pin(async move {
            info!(league = %league_id, %user, %castaway, pick, "pick confirmed");
            Ok(())
        })
    }

    fn draft_completed(&self, league: &League) -> NotifyFuture {
        let league_id = league.id.clone();
        Box::pin(async move {
            info!(league = %league_id, "draft completed");
            Ok(())
        })
    }

    fn draft_digest(&self, season_id: &str, leagues_drafting: usize) -> NotifyFuture {
        let season = season_id.to_string();
        Box::pin(async move {
            info!(%season, leagues_drafting, "draft reminder digest");
            Ok(())
        })
    }
}
