//! JSON state file: `{ "<resource>": { floorPrice, floorCurrency, ... } }`
//!
//! The older single-collection layout `{ "floor_price": "0.43 ETH", "best_offer": "0.41 WETH" }`
//! is still read and is replaced by the keyed layout on the next save.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::domain::price::{PriceSnapshot, PriceStore};
use crate::shared::errors::{PriceParseError, StoreError};
use crate::shared::types::PriceQuote;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    floor_price: Decimal,
    floor_currency: String,
    best_offer: Decimal,
    offer_currency: String,
    observed_at: DateTime<Utc>,
}

impl From<&PriceSnapshot> for StoredRecord {
    fn from(snapshot: &PriceSnapshot) -> Self {
        Self {
            floor_price: snapshot.floor_price.amount,
            floor_currency: snapshot.floor_price.currency.clone(),
            best_offer: snapshot.best_offer.amount,
            offer_currency: snapshot.best_offer.currency.clone(),
            observed_at: snapshot.observed_at,
        }
    }
}

type StateMap = BTreeMap<String, StoredRecord>;

/// Prices as text, without a resource key or timestamp
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct LegacyRecord {
    floor_price: String,
    best_offer: String,
}

#[derive(Debug)]
enum StateFile {
    Keyed(StateMap),
    Legacy(LegacyRecord),
}

/// Human-editable JSON file holding the last snapshot of each resource.
/// Writes go to a temporary sibling that is renamed over the original.
#[derive(Debug, Clone)]
pub struct JsonFilePriceStore {
    path: PathBuf,
}

impl JsonFilePriceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> Result<StateFile, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StateFile::Keyed(StateMap::new())),
            Err(e) => return Err(self.io_error(e)),
        };
        if content.trim().is_empty() {
            return Ok(StateFile::Keyed(StateMap::new()));
        }

        let keyed_error = match serde_json::from_str::<StateMap>(&content) {
            Ok(map) => return Ok(StateFile::Keyed(map)),
            Err(e) => e,
        };
        if let Ok(legacy) = serde_json::from_str::<LegacyRecord>(&content) {
            return Ok(StateFile::Legacy(legacy));
        }

        Err(StoreError::Corrupt {
            path: self.path.clone(),
            reason: keyed_error.to_string(),
        })
    }

    async fn write_atomically(&self, map: &StateMap) -> Result<(), StoreError> {
        let mut body = serde_json::to_string_pretty(map)?;
        body.push('\n');

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".to_string());
        let tmp_path = self
            .path
            .with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        let result = async {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(body.as_bytes()).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp_path, &self.path).await
        }
        .await;

        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_file(&tmp_path).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!("Could not remove temporary state file {}: {}", tmp_path.display(), cleanup);
                }
            }
            return Err(self.io_error(e));
        }
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn to_snapshot(&self, resource_id: &str, record: StoredRecord) -> Result<PriceSnapshot, StoreError> {
        let corrupt = |e: PriceParseError| StoreError::Corrupt {
            path: self.path.clone(),
            reason: format!("{}: {}", resource_id, e),
        };
        let floor_price = PriceQuote::new(record.floor_price, record.floor_currency).map_err(&corrupt)?;
        let best_offer = PriceQuote::new(record.best_offer, record.offer_currency).map_err(&corrupt)?;

        Ok(PriceSnapshot::new(resource_id, floor_price, best_offer).with_observed_at(record.observed_at))
    }

    /// Zero prices were the old placeholder for "nothing seen yet"
    fn legacy_snapshot(&self, resource_id: &str, legacy: LegacyRecord) -> Result<Option<PriceSnapshot>, StoreError> {
        let corrupt = |e: PriceParseError| StoreError::Corrupt {
            path: self.path.clone(),
            reason: format!("legacy prices: {}", e),
        };
        let floor_price: PriceQuote = legacy.floor_price.parse().map_err(&corrupt)?;
        let best_offer: PriceQuote = legacy.best_offer.parse().map_err(&corrupt)?;
        if floor_price.amount.is_zero() || best_offer.amount.is_zero() {
            return Ok(None);
        }

        debug!("Using legacy prices in {} as the baseline for {}", self.path.display(), resource_id);
        Ok(Some(PriceSnapshot::new(resource_id, floor_price, best_offer)))
    }
}

#[async_trait]
impl PriceStore for JsonFilePriceStore {
    async fn load(&self, resource_id: &str) -> Result<Option<PriceSnapshot>, StoreError> {
        match self.read_file().await? {
            StateFile::Keyed(mut map) => map
                .remove(resource_id)
                .map(|record| self.to_snapshot(resource_id, record))
                .transpose(),
            StateFile::Legacy(legacy) => self.legacy_snapshot(resource_id, legacy),
        }
    }

    async fn save(&self, snapshot: &PriceSnapshot) -> Result<(), StoreError> {
        let mut map = match self.read_file().await? {
            StateFile::Keyed(map) => map,
            StateFile::Legacy(_) => {
                info!("Converting {} to the keyed state layout", self.path.display());
                StateMap::new()
            }
        };
        map.insert(snapshot.resource_id.clone(), StoredRecord::from(snapshot));
        self.write_atomically(&map).await?;
        debug!("Saved {} to {}", snapshot, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_state_path() -> PathBuf {
        std::env::temp_dir().join(format!("pricewatch-test-{}.json", uuid::Uuid::new_v4()))
    }

    fn snapshot(resource: &str, floor: &str, offer: &str) -> PriceSnapshot {
        PriceSnapshot::new(resource, floor.parse().unwrap(), offer.parse().unwrap())
    }

    #[tokio::test]
    async fn test_missing_file_means_no_state() {
        let store = JsonFilePriceStore::new(temp_state_path());
        assert_eq!(store.load("hypio").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load_and_file_layout() {
        let path = temp_state_path();
        let store = JsonFilePriceStore::new(&path);
        let saved = snapshot("hypio", "0.441 ETH", "0.407 WETH");

        store.save(&saved).await.unwrap();

        assert_eq!(store.load("hypio").await.unwrap(), Some(saved));
        assert_eq!(store.load("azuki").await.unwrap(), None);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let record = &raw["hypio"];
        assert_eq!(record["floorPrice"], "0.441");
        assert_eq!(record["floorCurrency"], "ETH");
        assert_eq!(record["bestOffer"], "0.407");
        assert_eq!(record["offerCurrency"], "WETH");
        assert!(record["observedAt"].is_string());

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_save_overwrites_and_keeps_other_resources() {
        let path = temp_state_path();
        let store = JsonFilePriceStore::new(&path);

        store.save(&snapshot("hypio", "0.430 ETH", "0.407 WETH")).await.unwrap();
        store.save(&snapshot("azuki", "5 ETH", "4.8 WETH")).await.unwrap();
        store.save(&snapshot("hypio", "0.441 ETH", "0.407 WETH")).await.unwrap();

        let hypio = store.load("hypio").await.unwrap().unwrap();
        assert_eq!(hypio.floor_price, "0.441 ETH".parse().unwrap());
        assert!(store.load("azuki").await.unwrap().is_some());

        let leftovers = std::fs::read_dir(std::env::temp_dir())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.ends_with(".tmp") && name.contains(&*path.file_name().unwrap().to_string_lossy())
            })
            .count();
        assert_eq!(leftovers, 0);

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_hand_edited_file_is_accepted() {
        let path = temp_state_path();
        std::fs::write(
            &path,
            r#"{
                "hypio": {
                    "floorPrice": "0.5",
                    "floorCurrency": "ETH",
                    "bestOffer": "0.45",
                    "offerCurrency": "WETH",
                    "observedAt": "2025-01-01T00:00:00Z"
                }
            }"#,
        )
        .unwrap();
        let store = JsonFilePriceStore::new(&path);

        let loaded = store.load("hypio").await.unwrap().unwrap();
        assert_eq!(loaded.best_offer, "0.45 WETH".parse().unwrap());

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let path = temp_state_path();
        std::fs::write(&path, "{ not json").unwrap();
        let store = JsonFilePriceStore::new(&path);

        let err = store.load("hypio").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(store.save(&snapshot("hypio", "1 ETH", "1 WETH")).await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_legacy_layout_becomes_baseline_then_converted() {
        let path = temp_state_path();
        std::fs::write(
            &path,
            "{\n    \"floor_price\": \"0.43 ETH\",\n    \"best_offer\": \"0.41 WETH\"\n}",
        )
        .unwrap();
        let store = JsonFilePriceStore::new(&path);

        let loaded = store.load("hypio").await.unwrap().unwrap();
        assert_eq!(loaded.floor_price, "0.43 ETH".parse().unwrap());
        assert_eq!(loaded.best_offer, "0.41 WETH".parse().unwrap());

        store.save(&snapshot("hypio", "0.441 ETH", "0.41 WETH")).await.unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["hypio"]["floorPrice"], "0.441");
        assert!(raw.get("floor_price").is_none());

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_legacy_zero_placeholder_means_no_state() {
        let path = temp_state_path();
        std::fs::write(&path, r#"{"floor_price": "0 ETH", "best_offer": "0 ETH"}"#).unwrap();
        let store = JsonFilePriceStore::new(&path);

        assert_eq!(store.load("hypio").await.unwrap(), None);

        std::fs::remove_file(&path).ok();
    }
}
