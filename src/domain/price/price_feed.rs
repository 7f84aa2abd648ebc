//! Price source contract

use async_trait::async_trait;

use super::PriceSnapshot;
use crate::shared::errors::SourceError;

/// Where snapshots come from. Implementations own their connection handling;
/// callers only see a snapshot or a classified error.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Observe the current prices of `resource_id`
    async fn fetch(&self, resource_id: &str) -> Result<PriceSnapshot, SourceError>;
}
