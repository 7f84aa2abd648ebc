//! Infrastructure layer - concrete price sources, notifiers and stores

pub mod notifiers;
pub mod opensea;
pub mod storage;
