//! Common types used across the application

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::shared::errors::PriceParseError;
use crate::shared::utils::normalize_decimal_separator;

/// An amount in a named currency, e.g. `0.441 ETH`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub amount: Decimal,
    pub currency: String,
}

impl PriceQuote {
    /// Build a quote, rejecting negative amounts and blank symbols
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Result<Self, PriceParseError> {
        let currency = currency.into().trim().to_string();
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceParseError::NegativeAmount(amount.to_string()));
        }
        if currency.is_empty() {
            return Err(PriceParseError::EmptyCurrency);
        }
        Ok(Self { amount, currency })
    }
}

impl fmt::Display for PriceQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

impl FromStr for PriceQuote {
    type Err = PriceParseError;

    /// Parse `"0.4399 ETH"`; a comma is accepted as the decimal separator
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        let [amount, currency] = parts.as_slice() else {
            return Err(PriceParseError::Malformed(s.to_string()));
        };

        let normalized = normalize_decimal_separator(amount);
        let amount = Decimal::from_str(&normalized)
            .map_err(|_| PriceParseError::InvalidAmount(amount.to_string()))?;

        PriceQuote::new(amount, *currency)
    }
}
