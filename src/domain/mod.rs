//! Domain layer - core entities and collaborator contracts

pub mod notify;
pub mod price;
