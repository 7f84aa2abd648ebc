//! CLI commands and handlers
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::{error, info, warn};

use crate::application::price_monitor::{CycleOutcome, MonitorSettings, PriceMonitor};
use crate::domain::notify::Notifier;
use crate::domain::price::{PriceSnapshot, PriceStore};
use crate::infrastructure::notifiers::{ConsoleNotifier, TelegramNotifier};
use crate::infrastructure::opensea::OpenSeaPriceSource;
use crate::infrastructure::storage::JsonFilePriceStore;
use crate::shared::config::MonitorConfig;
use crate::shared::types::PriceQuote;

#[derive(Parser, Debug)]
#[command(name = "pricewatch")]
#[command(version, about = "Watch an OpenSea collection's floor price and best offer, alert on change")]
pub struct Cli {
    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags that take priority over the config file and the environment
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Collection slug to watch
    #[arg(long, global = true)]
    pub resource: Option<String>,

    /// Seconds between checks
    #[arg(long, global = true)]
    pub interval: Option<u64>,

    /// Path of the JSON state file
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,

    /// Log alerts instead of sending them to Telegram
    #[arg(long, global = true)]
    pub dry_run: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut MonitorConfig) {
        if let Some(resource) = &self.resource {
            config.resource_id = resource.clone();
        }
        if let Some(interval) = self.interval {
            config.check_interval_secs = interval;
        }
        if let Some(state_file) = &self.state_file {
            config.state_file = state_file.clone();
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Check prices on a fixed interval until interrupted
    Run,

    /// Run a single check and exit
    Check,

    /// Show the stored prices for the collection
    State,

    /// Overwrite the stored prices with a manual baseline
    Baseline {
        /// Floor price, e.g. "0.43 ETH"
        #[arg(long)]
        floor: PriceQuote,

        /// Best offer, e.g. "0.41 WETH"
        #[arg(long)]
        offer: PriceQuote,
    },
}

pub struct CommandExecutor {
    config: MonitorConfig,
    dry_run: bool,
}

impl CommandExecutor {
    pub fn new(config: MonitorConfig, dry_run: bool) -> Self {
        Self { config, dry_run }
    }

    pub async fn execute(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Run => self.execute_run_command().await,
            Commands::Check => self.execute_check_command().await,
            Commands::State => self.execute_state_command().await,
            Commands::Baseline { floor, offer } => self.execute_baseline_command(floor, offer).await,
        }
    }

    async fn execute_run_command(&self) -> Result<()> {
        let mut monitor = self.build_monitor()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (force_tx, force_rx) = oneshot::channel();

        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for Ctrl-C: {}", e);
                // keep the sender alive so the monitor keeps running
                std::future::pending::<()>().await;
            }
            info!("🛑 Stop requested, finishing the current cycle (Ctrl-C again to abort)...");
            shutdown_tx.send(true).ok();

            if tokio::signal::ctrl_c().await.is_ok() {
                force_tx.send(()).ok();
            }
        });

        if !run_until_forced(monitor.run(shutdown_rx), force_rx).await {
            warn!("Aborted during a cycle, stored prices are from the last completed one");
        }
        Ok(())
    }

    async fn execute_check_command(&self) -> Result<()> {
        let mut monitor = self.build_monitor()?;
        match monitor.run_cycle().await {
            Ok(CycleOutcome::Baseline(snapshot)) => info!("📌 Baseline recorded: {}", snapshot),
            Ok(CycleOutcome::Unchanged) => info!("✅ No price changes"),
            Ok(CycleOutcome::Notified(diff)) => {
                info!("📣 Alert sent for {} changed field(s)", diff.changed_fields().count())
            }
            Err(e) => return Err(e).context("price check failed"),
        }
        Ok(())
    }

    async fn execute_state_command(&self) -> Result<()> {
        let store = self.build_store();
        match store.load(&self.config.resource_id).await? {
            Some(snapshot) => info!("📊 {}", snapshot),
            None => info!(
                "No stored prices for {} in {}",
                self.config.resource_id,
                store.path().display()
            ),
        }
        Ok(())
    }

    async fn execute_baseline_command(&self, floor: PriceQuote, offer: PriceQuote) -> Result<()> {
        let store = self.build_store();
        let snapshot = PriceSnapshot::new(self.config.resource_id.clone(), floor, offer);
        store
            .save(&snapshot)
            .await
            .with_context(|| format!("writing {}", store.path().display()))?;
        info!("✅ Baseline written: {}", snapshot);
        Ok(())
    }

    fn build_store(&self) -> JsonFilePriceStore {
        JsonFilePriceStore::new(self.config.state_file.clone())
    }

    fn build_notifier(&self) -> Result<(Arc<dyn Notifier>, String)> {
        if self.dry_run {
            warn!("Dry run: alerts are logged, not sent");
            let destination = self.config.destination.clone().unwrap_or_else(|| "console".to_string());
            let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);
            return Ok((notifier, destination));
        }

        let (token, destination) = self.config.telegram_credentials()?;
        let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(token, self.config.http_timeout())?);
        Ok((notifier, destination.to_string()))
    }

    fn build_monitor(&self) -> Result<PriceMonitor> {
        let source = OpenSeaPriceSource::new(self.config.opensea_api_key.clone(), self.config.http_timeout())?;
        let (notifier, destination) = self.build_notifier()?;
        let store: Arc<dyn PriceStore> = Arc::new(self.build_store());

        Ok(PriceMonitor::new(
            MonitorSettings::from_config(&self.config, destination),
            Arc::new(source),
            notifier,
            store,
        ))
    }
}

/// Drives `run` to completion unless `force` fires first. Returns `false`
/// when the run was abandoned. A dropped `force` sender never aborts.
async fn run_until_forced(run: impl Future<Output = ()>, mut force: oneshot::Receiver<()>) -> bool {
    tokio::select! {
        _ = run => true,
        Ok(()) = &mut force => false,
    }
}
