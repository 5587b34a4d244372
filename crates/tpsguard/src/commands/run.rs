//! Daemon mode: run the pollers until Ctrl-C.

use tracing::{info, warn};

use tpsguard_core::Guardian;

use crate::cli::GlobalOpts;
use crate::config::{self, Runtime};
use crate::error::CliError;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let runtime = Runtime::from_config(&cfg)?;

    let guardian = Guardian::start(&runtime.guardian, runtime.notifier.sink());
    let pollers = guardian.pollers();
    if pollers.is_empty() {
        warn!("every poller is disabled by the [notify] flags, waiting for Ctrl-C anyway");
    }
    info!(
        appliance = %runtime.guardian.url,
        pollers = ?pollers,
        "guardian running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");

    guardian.shutdown().await;
    runtime.notifier.flush().await;
    Ok(())
}
