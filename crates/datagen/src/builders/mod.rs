//! Fluent builder APIs for generation runs.
//!
//! The [`ScenarioBuilder`] runs every generator in dependency order and
//! writes the resulting tables.

mod scenario;

pub use scenario::{ScenarioBuilder, ScenarioError, ScenarioMetrics, ScenarioResult};
