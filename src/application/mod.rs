//! Application layer - orchestration, retries and CLI commands

pub mod commands;
pub mod price_monitor;
pub mod retry;

pub use commands::{Cli, Commands, CommandExecutor};
pub use price_monitor::{CycleOutcome, MonitorSettings, PriceMonitor};
pub use retry::RetryPolicy;
