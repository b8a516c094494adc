//! Describes Cardano transactions: confidence-weighted heuristic classifiers
//! grouped by counterparty project, and the aggregator that picks a winner.
pub mod aggregator;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod registry;
pub mod scoring;

pub use aggregator::classify;
pub use error::{ClassifyError, CollaboratorError, Result};
