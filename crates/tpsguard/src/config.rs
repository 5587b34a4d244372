//! CLI configuration: thin wrapper around `tpsguard_config`.
//!
//! Applies `GlobalOpts` overrides (--config, --insecure) and builds the
//! runtime collaborators every command needs: the appliance client, the
//! template store and the notification sink.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tpsguard_api::ApplianceClient;
use tpsguard_core::{
    FileTemplateStore, GuardianConfig, LogSink, Reconciler, SharedSink, TemplateLibrary, WebhookSink,
};

pub use tpsguard_config::{Config, config_path, load_config_from, store_password};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Per-request timeout for webhook delivery.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a one-shot command waits for queued webhooks before exiting.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(15);

/// Config file selected by `--config`, else the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load the configuration and apply flag overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_file(global);
    debug!(path = %path.display(), "loading configuration");
    let mut cfg = load_config_from(&path)?;
    if global.insecure {
        cfg.appliance.insecure = true;
        cfg.appliance.ca_cert = None;
    }
    Ok(cfg)
}

/// Everything an appliance-bound command needs.
pub struct Runtime {
    pub guardian: GuardianConfig,
    pub template_dir: PathBuf,
    pub notifier: Notifier,
}

impl Runtime {
    /// Resolve credentials and start the notification sink.
    pub fn from_config(cfg: &Config) -> Result<Self, CliError> {
        Ok(Self {
            guardian: cfg.to_guardian_config()?,
            template_dir: cfg.template_dir(),
            notifier: Notifier::from_config(cfg)?,
        })
    }

    /// A client with its own session.
    pub fn client(&self) -> Arc<ApplianceClient> {
        Arc::new(self.guardian.client())
    }

    pub fn library(&self) -> TemplateLibrary {
        TemplateLibrary::new(
            Arc::new(FileTemplateStore::new(&self.template_dir)),
            self.notifier.sink(),
            self.guardian.notify,
        )
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.client(),
            Arc::new(FileTemplateStore::new(&self.template_dir)),
            self.notifier.sink(),
            self.guardian.notify,
        )
    }
}

/// The configured sink plus its delivery task, if any.
pub struct Notifier {
    sink: SharedSink,
    delivery: Option<JoinHandle<()>>,
}

impl Notifier {
    /// Webhook delivery when URLs are configured, structured log lines otherwise.
    pub fn from_config(cfg: &Config) -> Result<Self, CliError> {
        let urls = cfg.webhook_urls()?;
        if urls.is_empty() {
            debug!("no webhook configured, notifications go to the log");
            return Ok(Self {
                sink: Arc::new(LogSink),
                delivery: None,
            });
        }

        let http = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| CliError::Internal {
                message: format!("failed to build webhook client: {e}"),
            })?;
        debug!(count = urls.len(), "webhook delivery enabled");
        let (sink, delivery) = WebhookSink::spawn(urls, cfg.webhook.username.clone(), http);
        Ok(Self {
            sink: Arc::new(sink),
            delivery: Some(delivery),
        })
    }

    pub fn sink(&self) -> SharedSink {
        Arc::clone(&self.sink)
    }

    /// Drop this handle and wait for queued webhooks to go out.
    ///
    /// The delivery task only finishes once every clone of the sink is gone,
    /// so components holding one must be dropped first.
    pub async fn flush(self) {
        drop(self.sink);
        let Some(delivery) = self.delivery else {
            return;
        };
        if tokio::time::timeout(FLUSH_TIMEOUT, delivery).await.is_err() {
            warn!("webhook delivery still pending at exit, remaining notifications dropped");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["tpsguard"];
        argv.extend_from_slice(args);
        argv.push("system");
        Cli::try_parse_from(argv).unwrap().global
    }

    #[test]
    fn insecure_flag_overrides_ca_cert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[appliance]\ninsecure = false\nca_cert = \"/etc/tps/ca.pem\"\n",
        )
        .unwrap();

        let cfg = load(&global(&["--config", path.to_str().unwrap(), "-k"])).unwrap();
        assert!(cfg.appliance.insecure);
        assert!(cfg.appliance.ca_cert.is_none());

        let cfg = load(&global(&["--config", path.to_str().unwrap()])).unwrap();
        assert!(!cfg.appliance.insecure);
    }

    #[tokio::test]
    async fn without_webhooks_the_log_sink_is_used() {
        let notifier = Notifier::from_config(&Config::default()).unwrap();
        assert!(notifier.delivery.is_none());
        notifier.flush().await;
    }
}
