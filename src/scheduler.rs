use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::sync::SyncPass;
use crate::unpack_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Runs a [`SyncPass`] immediately and then once per interval on a single
/// worker task. Passes never overlap; cancellation is observed between passes.
pub struct Scheduler {
    token: CancellationToken,
    state: watch::Receiver<SchedulerState>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn start(pass: Arc<dyn SyncPass>, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let (state_tx, state) = watch::channel(SchedulerState::Idle);
        let handle = tokio::spawn(run(pass, interval, token.clone(), state_tx));

        Self { token, state, handle }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Cancels the loop and waits for an in-flight pass to return.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "sync worker terminated abnormally");
        }
    }
}

async fn run(
    pass: Arc<dyn SyncPass>,
    interval: Duration,
    token: CancellationToken,
    state: watch::Sender<SchedulerState>,
) {
    // The first tick completes immediately.
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::info!("sync worker shutting down");
                break;
            }
            _ = ticker.tick() => {}
        }

        state.send_replace(SchedulerState::Running);
        match pass.run_pass().await {
            Ok(stats) => tracing::info!(exported = stats.exported, skipped = stats.skipped, "sync pass complete"),
            Err(e) => tracing::error!(error = %unpack_error(&e), "failed to execute exporter"),
        }
        state.send_replace(SchedulerState::Idle);
    }
}
