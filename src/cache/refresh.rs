//! Periodic reload loops, one per cache.

use super::{CacheKind, ReferenceData};
use crate::config::RefreshIntervals;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub fn interval_for(intervals: &RefreshIntervals, kind: CacheKind) -> Duration {
    match kind {
        CacheKind::Markets => intervals.markets,
        CacheKind::PerpetualMarkets => intervals.perpetual_markets,
        CacheKind::Assets => intervals.assets,
        CacheKind::LiquidityTiers => intervals.liquidity_tiers,
        CacheKind::Vaults => intervals.vaults,
        CacheKind::BlockHeight => intervals.block_height,
    }
}

/// Sleep, reload, repeat. A failed reload is logged and the loop carries on
/// with the previous snapshot in place.
async fn run_refresh_loop(data: Arc<ReferenceData>, kind: CacheKind, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        if let Err(e) = data.refresh(kind).await {
            error!(cache = kind.as_str(), error = %e, "Reference cache refresh failed");
        }
    }
}

impl ReferenceData {
    /// Start one independent refresh loop per cache.
    ///
    /// The loops run until the runtime shuts down; aborting a returned handle
    /// stops that loop only.
    pub fn spawn_refresh_loops(self: &Arc<Self>, intervals: &RefreshIntervals) -> Vec<JoinHandle<()>> {
        CacheKind::ALL
            .into_iter()
            .map(|kind| {
                let interval = interval_for(intervals, kind);
                info!(
                    cache = kind.as_str(),
                    interval_ms = interval.as_millis() as u64,
                    "Starting reference cache refresh loop"
                );
                tokio::spawn(run_refresh_loop(Arc::clone(self), kind, interval))
            })
            .collect()
    }
}
