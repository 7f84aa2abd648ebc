//! Price domain - snapshots, change detection and the source/store contracts

mod price_feed;
mod price_analyzer;
mod price_store;

pub use price_feed::PriceSource;
pub use price_analyzer::ChangeDetector;
pub use price_store::PriceStore;

use crate::shared::types::PriceQuote;
use chrono::{DateTime, Utc};
use std::fmt;

/// One observation of the tracked prices of a resource
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    pub resource_id: String,
    pub floor_price: PriceQuote,
    pub best_offer: PriceQuote,
    pub observed_at: DateTime<Utc>,
}

impl PriceSnapshot {
    pub fn new(resource_id: impl Into<String>, floor_price: PriceQuote, best_offer: PriceQuote) -> Self {
        Self {
            resource_id: resource_id.into(),
            floor_price,
            best_offer,
            observed_at: Utc::now(),
        }
    }

    pub fn with_observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = observed_at;
        self
    }

    pub fn quote(&self, field: PriceField) -> &PriceQuote {
        match field {
            PriceField::FloorPrice => &self.floor_price,
            PriceField::BestOffer => &self.best_offer,
        }
    }
}

impl fmt::Display for PriceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: floor {}, best offer {} (at {})",
            self.resource_id,
            self.floor_price,
            self.best_offer,
            self.observed_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// Tracked price fields, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceField {
    FloorPrice,
    BestOffer,
}

impl PriceField {
    pub const ALL: [PriceField; 2] = [PriceField::FloorPrice, PriceField::BestOffer];

    pub fn label(&self) -> &'static str {
        match self {
            PriceField::FloorPrice => "Floor Price",
            PriceField::BestOffer => "Best Offer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increased,
    Decreased,
    Unchanged,
}

impl Direction {
    /// Suffix used in alerts
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            Direction::Increased => Some("+"),
            Direction::Decreased => Some("-"),
            Direction::Unchanged => None,
        }
    }
}

/// Change of a single field between two snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: PriceField,
    pub previous: PriceQuote,
    pub current: PriceQuote,
    pub direction: Direction,
}

/// Field-level changes between two snapshots of one resource. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceDiff {
    pub resource_id: String,
    pub changes: Vec<FieldChange>,
}

impl PriceDiff {
    pub fn change(&self, field: PriceField) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field == field)
    }

    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(|c| c.direction != Direction::Unchanged)
    }

    pub fn changed_fields(&self) -> impl Iterator<Item = &FieldChange> {
        self.changes.iter().filter(|c| c.direction != Direction::Unchanged)
    }
}
