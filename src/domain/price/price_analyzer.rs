//! Change detection between consecutive snapshots

use super::{Direction, FieldChange, PriceDiff, PriceField, PriceSnapshot};
use crate::shared::types::PriceQuote;

/// Compares a fresh snapshot against the last stored one
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Returns a diff only when at least one tracked field moved.
    /// Without a previous snapshot nothing is reported: the current one
    /// becomes the baseline.
    pub fn compare(&self, previous: Option<&PriceSnapshot>, current: &PriceSnapshot) -> Option<PriceDiff> {
        let previous = previous?;

        let changes: Vec<FieldChange> = PriceField::ALL
            .iter()
            .map(|&field| {
                let before = previous.quote(field);
                let after = current.quote(field);
                FieldChange {
                    field,
                    previous: before.clone(),
                    current: after.clone(),
                    direction: Self::direction(before, after),
                }
            })
            .collect();

        let diff = PriceDiff {
            resource_id: current.resource_id.clone(),
            changes,
        };

        diff.has_changes().then_some(diff)
    }

    /// Exact decimal equality, no tolerance. A currency switch always counts
    /// as a change; its direction then falls back to the raw amounts, with
    /// "not higher" reported as a decrease.
    pub fn direction(previous: &PriceQuote, current: &PriceQuote) -> Direction {
        if previous == current {
            Direction::Unchanged
        } else if current.amount > previous.amount {
            Direction::Increased
        } else {
            Direction::Decreased
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(floor: &str, offer: &str) -> PriceSnapshot {
        PriceSnapshot::new("hypio", floor.parse().unwrap(), offer.parse().unwrap())
    }

    #[test]
    fn test_cold_start_never_yields_diff() {
        let detector = ChangeDetector::new();
        assert!(detector.compare(None, &snapshot("0.430 ETH", "0.407 WETH")).is_none());
        assert!(detector.compare(None, &snapshot("0 ETH", "0 WETH")).is_none());
    }

    #[test]
    fn test_identical_snapshots_have_no_diff() {
        let detector = ChangeDetector::new();
        let previous = snapshot("0.430 ETH", "0.407 WETH");
        let current = snapshot("0.43 ETH", "0.4070 WETH");
        assert!(detector.compare(Some(&previous), &current).is_none());
    }

    #[test]
    fn test_floor_increase_leaves_offer_unchanged() {
        let detector = ChangeDetector::new();
        let previous = snapshot("0.430 ETH", "0.407 WETH");
        let current = snapshot("0.441 ETH", "0.407 WETH");

        let diff = detector.compare(Some(&previous), &current).unwrap();
        assert_eq!(diff.resource_id, "hypio");
        assert_eq!(diff.change(PriceField::FloorPrice).unwrap().direction, Direction::Increased);
        assert_eq!(diff.change(PriceField::BestOffer).unwrap().direction, Direction::Unchanged);
        assert_eq!(diff.changed_fields().count(), 1);
    }

    #[test]
    fn test_currency_switch_counts_as_change() {
        let detector = ChangeDetector::new();
        let previous = snapshot("0.430 ETH", "0.420 WETH");
        let current = snapshot("0.430 ETH", "0.407 ETH");

        let diff = detector.compare(Some(&previous), &current).unwrap();
        let offer = diff.change(PriceField::BestOffer).unwrap();
        assert_eq!(offer.direction, Direction::Decreased);
        assert_eq!(offer.previous.currency, "WETH");
        assert_eq!(offer.current.currency, "ETH");
    }

    #[test]
    fn test_currency_switch_with_equal_amount_is_reported() {
        let detector = ChangeDetector::new();
        let previous = snapshot("0.5 ETH", "0.4 WETH");
        let current = snapshot("0.5 ETH", "0.4 ETH");

        let diff = detector.compare(Some(&previous), &current).unwrap();
        assert_ne!(diff.change(PriceField::BestOffer).unwrap().direction, Direction::Unchanged);
    }

    #[test]
    fn test_direction_is_unchanged_iff_equal() {
        let cases = [
            ("1 ETH", "1 ETH", Direction::Unchanged),
            ("1 ETH", "1.00 ETH", Direction::Unchanged),
            ("1 ETH", "1.0001 ETH", Direction::Increased),
            ("1 ETH", "0.9999 ETH", Direction::Decreased),
            ("1 ETH", "1 WETH", Direction::Decreased),
            ("1 ETH", "2 WETH", Direction::Increased),
        ];
        for (before, after, expected) in cases {
            let before: PriceQuote = before.parse().unwrap();
            let after: PriceQuote = after.parse().unwrap();
            assert_eq!(ChangeDetector::direction(&before, &after), expected, "{} -> {}", before, after);
        }
    }
}
