//! Durable last-known price state

use async_trait::async_trait;

use super::PriceSnapshot;
use crate::shared::errors::StoreError;

/// Last successfully processed snapshot per resource.
///
/// `save` replaces the record atomically: after a crash the store holds
/// either the previous or the new snapshot.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn load(&self, resource_id: &str) -> Result<Option<PriceSnapshot>, StoreError>;

    async fn save(&self, snapshot: &PriceSnapshot) -> Result<(), StoreError>;
}
