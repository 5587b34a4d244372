// ── Poller supervisor ──
//
// Each poller runs as its own task with its own `ApplianceClient`. Cycles
// within a task are strictly sequential: sleep, then cycle. Cancellation
// interrupts the sleep, never a request in flight.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GuardianConfig;
use crate::error::CoreError;
use crate::health::HealthMonitor;
use crate::incidents::IncidentTracker;
use crate::notify::SharedSink;
use crate::zones::ZoneChangeDetector;

/// How long `shutdown` waits for each task before aborting it.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A periodic job driven by [`run_poller`].
pub trait Poller: Send + 'static {
    fn name(&self) -> &'static str;

    /// Runs once before the first sleep. Not interrupted by cancellation.
    fn prepare(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// One cycle. Errors are logged and the loop carries on.
    fn poll_once(&mut self) -> impl Future<Output = Result<(), CoreError>> + Send;
}

impl Poller for HealthMonitor {
    fn name(&self) -> &'static str {
        "health"
    }

    async fn poll_once(&mut self) -> Result<(), CoreError> {
        self.cycle().await;
        Ok(())
    }
}

impl Poller for IncidentTracker {
    fn name(&self) -> &'static str {
        "attacks"
    }

    async fn poll_once(&mut self) -> Result<(), CoreError> {
        self.cycle().await
    }
}

impl Poller for ZoneChangeDetector {
    fn name(&self) -> &'static str {
        "zones"
    }

    async fn prepare(&mut self) {
        if let Err(e) = self.seed().await {
            warn!(error = %e, "initial zone population failed");
        }
    }

    async fn poll_once(&mut self) -> Result<(), CoreError> {
        self.cycle().await.map(|_| ())
    }
}

/// Drive `poller` every `period` until `cancel` fires.
pub async fn run_poller<P: Poller>(mut poller: P, period: Duration, cancel: CancellationToken) {
    let name = poller.name();
    info!(poller = name, interval_secs = period.as_secs(), "poller started");

    // Seeding issues requests, so it runs to completion like any cycle.
    poller.prepare().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(period) => {
                if let Err(e) = poller.poll_once().await {
                    warn!(poller = name, error = %e, "poll cycle failed");
                }
            }
        }
    }
    info!(poller = name, "poller stopped");
}

/// Running set of background pollers.
pub struct Guardian {
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Guardian {
    /// Spawn every poller enabled by `config.notify`. Must be called inside
    /// a tokio runtime.
    pub fn start(config: &GuardianConfig, sink: SharedSink) -> Self {
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        if config.notify.system_health {
            let monitor = HealthMonitor::new(Arc::new(config.client()), Arc::clone(&sink));
            tasks.push(spawn(monitor, config.health_interval, &cancel));
        }

        if config.notify.attack_tracking() {
            let tracker = IncidentTracker::new(Arc::new(config.client()), Arc::clone(&sink), config.notify);
            tasks.push(spawn(tracker, config.attack_interval(), &cancel));
        }

        if config.notify.zone_tracking() {
            let detector = ZoneChangeDetector::new(
                Arc::new(config.client()),
                Arc::clone(&sink),
                config.notify,
                config.service_account.clone(),
            );
            tasks.push(spawn(detector, config.zone_interval(), &cancel));
        }

        if tasks.is_empty() {
            info!("no pollers enabled");
        }
        Self { cancel, tasks }
    }

    /// Names of the spawned pollers, in start order.
    pub fn pollers(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    /// Cancel every poller and wait up to [`SHUTDOWN_GRACE`] for each.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for (name, mut handle) in self.tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(Ok(())) => debug!(poller = name, "poller joined"),
                Ok(Err(e)) if e.is_cancelled() => debug!(poller = name, "poller cancelled"),
                Ok(Err(e)) => warn!(poller = name, error = %e, "poller task failed"),
                Err(_) => {
                    handle.abort();
                    debug!(poller = name, "poller did not stop in time, aborted");
                }
            }
        }
    }
}

fn spawn<P: Poller>(
    poller: P,
    period: Duration,
    cancel: &CancellationToken,
) -> (&'static str, JoinHandle<()>) {
    let name = poller.name();
    (name, tokio::spawn(run_poller(poller, period, cancel.child_token())))
}
