//! Pricewatch - NFT collection price watcher
//! Polls floor price and best offer, alerts on change, remembers what it saw

pub mod domain;
pub mod infrastructure;
pub mod application;
pub mod shared;

// Re-export main types for convenience
pub use application::{PriceMonitor, RetryPolicy};
pub use domain::notify::Notifier;
pub use domain::price::{ChangeDetector, PriceDiff, PriceSnapshot, PriceSource, PriceStore};
