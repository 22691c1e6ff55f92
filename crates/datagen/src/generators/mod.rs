//! Entity generators for the dataset.
//!
//! This module provides one generator per table, run in dependency order:
//! - [`UserGenerator`]: base population with seasonal signup timing
//! - [`SubscriptionSimulator`]: per-user plan lifecycle until the horizon
//! - [`PaymentGenerator`]: billing derived from subscription periods
//! - [`EventGenerator`]: plan-dependent usage events per period
//! - [`SessionAggregator`]: sessions grouped from events
//! - [`MarketingGenerator`]: pre-signup attribution touches
//! - [`ReferenceGenerator`]: plan and channel lookup tables

pub mod event;
pub mod marketing;
pub mod payment;
pub mod reference;
pub mod session;
pub mod subscription;
pub mod user;

use rand::distributions::WeightedIndex;

use crate::config::ConfigError;

pub use event::EventGenerator;
pub use marketing::MarketingGenerator;
pub use payment::PaymentGenerator;
pub use reference::ReferenceGenerator;
pub use session::SessionAggregator;
pub use subscription::SubscriptionSimulator;
pub use user::UserGenerator;

/// Builds a weighted index, reporting bad weights as a configuration error.
pub(crate) fn weighted(weights: &[f64]) -> Result<WeightedIndex<f64>, ConfigError> {
    WeightedIndex::new(weights).map_err(|e| ConfigError::Distribution(e.to_string()))
}
