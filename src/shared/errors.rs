//! Error handling for the application

use std::path::PathBuf;
use thiserror::Error;

/// Errors that may or may not be worth another attempt
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Price text that could not be turned into an amount and a currency
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceParseError {
    #[error("expected \"<amount> <currency>\", got {0:?}")]
    Malformed(String),

    #[error("invalid amount {0:?}")]
    InvalidAmount(String),

    #[error("negative amount {0}")]
    NegativeAmount(String),

    #[error("empty currency symbol")]
    EmptyCurrency,
}

/// Price source errors, classified by retry eligibility
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Network, timeout or rate limit
    #[error("transient source failure: {0}")]
    Transient(String),

    /// Unknown resource or malformed identifier
    #[error("permanent source failure: {0}")]
    Permanent(String),

    /// Page or payload fetched but the price fields were missing or unusable
    #[error("unparsable price data: {0}")]
    Parse(String),
}

impl Retryable for SourceError {
    fn is_retryable(&self) -> bool {
        !matches!(self, SourceError::Permanent(_))
    }
}

impl From<PriceParseError> for SourceError {
    fn from(err: PriceParseError) -> Self {
        SourceError::Parse(err.to_string())
    }
}

/// Notification delivery errors. A missed alert is recovered on the next
/// cycle, so every delivery failure is retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl Retryable for NotifyError {
    fn is_retryable(&self) -> bool {
        true
    }
}

/// Price store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("state file {path} I/O error: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is corrupt ({reason}); delete it to record a fresh baseline")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Outcome of a retried operation that did not succeed
#[derive(Error, Debug)]
pub enum RetryError<E: std::error::Error + 'static> {
    #[error("not retried: {0}")]
    Permanent(#[source] E),

    #[error("retry exhausted after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },
}

impl<E: std::error::Error + 'static> RetryError<E> {
    /// Number of attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Permanent(_) => 1,
            RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Permanent(err) => err,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

/// A cycle that ended without completing, tagged with the stage it failed in
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] RetryError<SourceError>),

    #[error("loading stored state failed: {0}")]
    Load(#[source] StoreError),

    #[error("notification failed: {0}")]
    Notify(#[from] RetryError<NotifyError>),

    #[error("persisting snapshot failed: {0}")]
    Persist(#[source] StoreError),
}

impl CycleError {
    pub fn stage(&self) -> &'static str {
        match self {
            CycleError::Fetch(_) => "fetching",
            CycleError::Load(_) => "detecting",
            CycleError::Notify(_) => "notifying",
            CycleError::Persist(_) => "persisting",
        }
    }

    /// Attempts spent in the failing stage
    pub fn attempts(&self) -> u32 {
        match self {
            CycleError::Fetch(err) => err.attempts(),
            CycleError::Notify(err) => err.attempts(),
            CycleError::Load(_) | CycleError::Persist(_) => 1,
        }
    }
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP client error: {0}")]
    HttpClientError(String),
}
