//! OpenSea marketplace data

pub mod client;

pub use client::OpenSeaPriceSource;
