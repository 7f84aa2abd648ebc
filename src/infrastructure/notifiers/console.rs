use async_trait::async_trait;
use tracing::info;

use crate::domain::notify::Notifier;
use crate::shared::errors::NotifyError;

/// Dry-run notifier: logs the alert instead of delivering it
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        info!("[dry-run] alert for {}:\n{}", destination, message);
        Ok(())
    }
}
