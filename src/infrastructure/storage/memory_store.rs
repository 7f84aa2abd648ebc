use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::price::{PriceSnapshot, PriceStore};
use crate::shared::errors::StoreError;

/// Process-local store, lost on exit
#[derive(Debug, Default)]
pub struct MemoryPriceStore {
    snapshots: RwLock<HashMap<String, PriceSnapshot>>,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PriceStore for MemoryPriceStore {
    async fn load(&self, resource_id: &str) -> Result<Option<PriceSnapshot>, StoreError> {
        Ok(self.snapshots.read().await.get(resource_id).cloned())
    }

    async fn save(&self, snapshot: &PriceSnapshot) -> Result<(), StoreError> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.resource_id.clone(), snapshot.clone());
        Ok(())
    }
}
