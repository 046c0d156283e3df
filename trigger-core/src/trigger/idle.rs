//! Idle detection flips a running trigger into [TriggerState::Sleep] when no event has been
//! accepted or delivered for the sleep duration, and back to [TriggerState::Running] as soon as
//! there is activity again.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::trigger::state::TriggerState;

const SLEEP_WATCH_INTERVAL: Duration = Duration::from_millis(10);

/// Time of the last activity of a trigger, kept as millis since the trigger was created so it can
/// be refreshed from any worker without a lock.
#[derive(Debug)]
pub(super) struct Activity {
    origin: Instant,
    last_active_ms: AtomicU64,
}

impl Activity {
    pub(super) fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_active_ms: AtomicU64::new(0),
        }
    }

    /// Marks now as the last activity.
    pub(super) fn touch(&self) {
        let now = self.origin.elapsed().as_millis() as u64;
        self.last_active_ms.fetch_max(now, Ordering::Relaxed);
    }

    pub(super) fn idle_for(&self) -> Duration {
        let last_active = Duration::from_millis(self.last_active_ms.load(Ordering::Relaxed));
        self.origin.elapsed().saturating_sub(last_active)
    }
}

/// Ticks every [SLEEP_WATCH_INTERVAL] until cancelled and moves the trigger between running and
/// sleep. Other states are left alone.
pub(super) async fn run_sleep_watch(
    subscription_id: String,
    state: Arc<RwLock<TriggerState>>,
    activity: Arc<Activity>,
    sleep_duration: Duration,
    cln_token: CancellationToken,
) {
    let mut ticker = time::interval(SLEEP_WATCH_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cln_token.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let idle_for = activity.idle_for();
        let transition = {
            let mut state = state.write();
            let next = match *state {
                TriggerState::Running if idle_for > sleep_duration => TriggerState::Sleep,
                TriggerState::Sleep if idle_for <= sleep_duration => TriggerState::Running,
                _ => continue,
            };
            let previous = *state;
            *state = next;
            (previous, next)
        };

        info!(
            %subscription_id,
            from = %transition.0,
            to = %transition.1,
            idle_ms = idle_for.as_millis() as u64,
            "Trigger state changed by idle watcher"
        );
    }
}
