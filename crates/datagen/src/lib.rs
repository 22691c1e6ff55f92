//! Synthetic data generation for MetricFlow.
//!
//! This crate generates a correlated SaaS analytics dataset: users,
//! subscription lifecycles, payments, usage events, sessions and marketing
//! touches, plus the plan and channel reference tables. Every table is
//! reproducible from a single master seed.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use datagen::prelude::*;
//!
//! let result = ScenarioBuilder::new()
//!     .with_users(5_000)
//!     .with_seed(42)
//!     .with_output_dir("data/raw")
//!     .with_compression(Compression::None)
//!     .build()?;
//!
//! for (table, rows) in result.row_counts() {
//!     println!("{table}: {rows}");
//! }
//! ```

pub mod builders;
pub mod config;
pub mod generators;
pub mod output;
pub mod rng;

// Re-export schema types from the metricflow crate
pub use metricflow::models::{
    BillingInterval, ChangeType, ChannelType, PaymentMethod, PaymentStatus, PlanTier, Platform,
    TouchType,
};

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::builders::{ScenarioBuilder, ScenarioError, ScenarioMetrics, ScenarioResult};
    pub use crate::config::{Compression, ConfigError, GeneratorConfig};
    pub use crate::generators::{
        EventGenerator, MarketingGenerator, PaymentGenerator, ReferenceGenerator,
        SessionAggregator, SubscriptionSimulator, UserGenerator,
    };
    pub use crate::output::{DatasetWriter, WriteError};
    pub use crate::rng::{RngBank, Stream, StreamRng};
    pub use crate::{ChangeType, PlanTier};
}
