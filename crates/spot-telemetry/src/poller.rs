use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// A periodic task that owns one component's state (captured by `tick`).
///
/// Each tick runs on the blocking pool (ticks read files), so a slow tick in
/// one poller never stalls the others. Ticks of one poller never overlap;
/// when a tick overruns its period the missed ticks are skipped, not queued,
/// so the most recently completed tick is always the one published. A tick
/// that panics ends the poller, and `stop` reports it.
pub struct PollerHandle {
    name: &'static str,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<u64>>,
}

pub fn spawn_poller<F>(name: &'static str, period: Duration, tick: F) -> PollerHandle
where
    F: FnMut() + Send + 'static,
{
    let period = period.max(Duration::from_millis(1));
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tick = Some(tick);
        let mut ticks = 0u64;
        loop {
            tokio::select! {
                // stop requested, or the handle was dropped
                _ = &mut stop_rx => break,
                _ = interval.tick() => {
                    let Some(mut f) = tick.take() else { break };
                    let done = tokio::task::spawn_blocking(move || {
                        f();
                        f
                    })
                    .await;
                    match done {
                        Ok(f) => {
                            tick = Some(f);
                            ticks += 1;
                        }
                        Err(e) => {
                            error!("poller {}: tick {} failed: {}", name, ticks + 1, e);
                            anyhow::bail!("poller {} died after {} ticks: {}", name, ticks, e);
                        }
                    }
                }
            }
        }
        debug!("poller {}: stopped after {} ticks", name, ticks);
        Ok(ticks)
    });

    info!("poller {}: started, period {}ms", name, period.as_millis());
    PollerHandle { name, stop_tx: Some(stop_tx), task }
}

impl PollerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True once the task has ended without being stopped, i.e. a tick died.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the poller and waits for the in-flight tick to finish.
    /// Returns the number of completed ticks, or the failure that ended it.
    pub async fn stop(mut self) -> Result<u64> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let name = self.name;
        (&mut self.task).await.with_context(|| format!("join poller {}", name))?
    }
}
