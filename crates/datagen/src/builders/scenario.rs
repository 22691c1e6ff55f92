//! Fluent builder for constructing generation runs.

use std::path::PathBuf;
use std::time::Instant;

use thiserror::Error;
use time::Date;
use tracing::info;

use metricflow::{
    ChannelDetail, Event, MarketingTouch, Payment, PlanDetail, Session, Subscription, User,
};

use crate::config::{Compression, ConfigError, GeneratorConfig};
use crate::generators::{
    EventGenerator, MarketingGenerator, PaymentGenerator, ReferenceGenerator, SessionAggregator,
    SubscriptionSimulator, UserGenerator,
};
use crate::output::{DatasetWriter, WriteError, WrittenTable};
use crate::rng::{RngBank, Stream};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Write error: {0}")]
    Write(#[from] WriteError),
}

/// Every generated table, plus what was written to disk.
#[derive(Debug)]
pub struct ScenarioResult {
    pub users: Vec<User>,
    pub subscriptions: Vec<Subscription>,
    pub payments: Vec<Payment>,
    pub events: Vec<Event>,
    pub sessions: Vec<Session>,
    pub marketing_touches: Vec<MarketingTouch>,
    pub plan_details: Vec<PlanDetail>,
    pub channel_details: Vec<ChannelDetail>,
    /// Committed files (empty if `build_data` was used).
    pub tables: Vec<WrittenTable>,
    /// Metrics from generation (populated if metrics tracking enabled).
    pub metrics: Option<ScenarioMetrics>,
}

impl ScenarioResult {
    /// Row count for each table, in write order.
    pub fn row_counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("users", self.users.len()),
            ("subscriptions", self.subscriptions.len()),
            ("payments", self.payments.len()),
            ("events", self.events.len()),
            ("sessions", self.sessions.len()),
            ("marketing_touches", self.marketing_touches.len()),
            ("plan_details", self.plan_details.len()),
            ("channel_details", self.channel_details.len()),
        ]
    }

    pub fn total_rows(&self) -> usize {
        self.row_counts().iter().map(|(_, n)| n).sum()
    }

    /// Writes every table through `writer`. Either all tables land at their
    /// final paths or none do.
    pub fn write(&self, writer: &DatasetWriter) -> Result<Vec<WrittenTable>, WriteError> {
        let mut batch = writer.begin()?;
        batch.table("users", &self.users)?;
        batch.table("subscriptions", &self.subscriptions)?;
        batch.table("payments", &self.payments)?;
        batch.table("events", &self.events)?;
        batch.table("sessions", &self.sessions)?;
        batch.table("marketing_touches", &self.marketing_touches)?;
        batch.reference("plan_details", &self.plan_details)?;
        batch.reference("channel_details", &self.channel_details)?;
        batch.commit()
    }
}

/// Performance metrics from a generation run.
#[derive(Debug, Clone)]
pub struct ScenarioMetrics {
    /// Time spent generating data (milliseconds).
    pub generation_time_ms: u64,
    /// Time spent writing files (milliseconds, 0 if build_data used).
    pub write_time_ms: u64,
    pub user_count: usize,
    pub subscription_count: usize,
    pub payment_count: usize,
    pub event_count: usize,
    pub session_count: usize,
    pub touch_count: usize,
}

/// Builder for a complete dataset run.
///
/// # Example
///
/// ```rust,ignore
/// let result = ScenarioBuilder::new()
///     .with_users(1_000)
///     .with_seed(7)
///     .with_history(date!(2023 - 01 - 01), date!(2024 - 12 - 31))
///     .with_output_dir("out/raw")
///     .build()?;
/// ```
pub struct ScenarioBuilder {
    config: GeneratorConfig,
    track_metrics: bool,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self::with_config(GeneratorConfig::default())
    }

    /// Starts from an existing configuration, e.g. one loaded from disk.
    pub fn with_config(config: GeneratorConfig) -> Self {
        Self {
            config,
            track_metrics: false,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Sets the number of users to generate.
    pub fn with_users(mut self, count: usize) -> Self {
        self.config.num_users = count;
        self
    }

    /// Sets the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Sets the history window. `end` is also the simulation horizon.
    pub fn with_history(mut self, start: Date, end: Date) -> Self {
        self.config.history_start = start;
        self.config.history_end = end;
        self
    }

    /// Sets the base monthly churn rate before tier multipliers.
    pub fn with_base_churn(mut self, rate: f64) -> Self {
        self.config.churn.base_monthly_churn_rate = rate;
        self
    }

    /// Sets the directory for entity tables.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output.dir = dir.into();
        self
    }

    /// Sets the directory for reference tables.
    pub fn with_seeds_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output.seeds_dir = dir.into();
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.config.output.compression = compression;
        self
    }

    /// Enables timing and row count metrics.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.track_metrics = enabled;
        self
    }

    /// Generates every table in memory without writing anything.
    pub fn build_data(&self) -> Result<ScenarioResult, ConfigError> {
        self.config.validate()?;
        let start_time = self.track_metrics.then(Instant::now);

        let config = &self.config;
        let bank = RngBank::new(config.seed);
        info!(
            "Generating {} users from {} to {} (seed {})",
            config.num_users,
            config.history_start,
            config.history_end,
            bank.master_seed()
        );

        let user_gen = UserGenerator::from_config(config)?;
        let users = user_gen.generate_batch(config.num_users, &mut bank.stream(Stream::Users));
        info!("Generated {} users", users.len());

        let simulator = SubscriptionSimulator::from_config(config)?;
        let subscriptions =
            simulator.generate_for_users(&users, &mut bank.stream(Stream::Subscriptions));
        info!("Generated {} subscription periods", subscriptions.len());

        let payment_gen = PaymentGenerator::new(simulator.horizon())?;
        let payments =
            payment_gen.generate_for_subscriptions(&subscriptions, &mut bank.stream(Stream::Payments));
        info!("Generated {} payments", payments.len());

        let event_gen = EventGenerator::from_config(config)?;
        let events =
            event_gen.generate_for_subscriptions(&subscriptions, &mut bank.stream(Stream::Events));
        info!("Generated {} events", events.len());

        let sessions = SessionAggregator::new()?.aggregate(&events, &mut bank.stream(Stream::Sessions));
        info!("Aggregated {} sessions", sessions.len());

        let marketing_gen = MarketingGenerator::from_config(config)?;
        let marketing_touches =
            marketing_gen.generate_for_users(&users, &mut bank.stream(Stream::Marketing));
        info!("Generated {} marketing touches", marketing_touches.len());

        let reference_gen = ReferenceGenerator::new(config);
        let plan_details = reference_gen.plan_details();
        let channel_details = reference_gen.channel_details(&mut bank.stream(Stream::Reference));

        let metrics = start_time.map(|start| ScenarioMetrics {
            generation_time_ms: start.elapsed().as_millis() as u64,
            write_time_ms: 0,
            user_count: users.len(),
            subscription_count: subscriptions.len(),
            payment_count: payments.len(),
            event_count: events.len(),
            session_count: sessions.len(),
            touch_count: marketing_touches.len(),
        });

        Ok(ScenarioResult {
            users,
            subscriptions,
            payments,
            events,
            sessions,
            marketing_touches,
            plan_details,
            channel_details,
            tables: Vec::new(),
            metrics,
        })
    }

    /// Generates every table and writes it to the configured directories.
    pub fn build(self) -> Result<ScenarioResult, ScenarioError> {
        let mut result = self.build_data()?;

        let write_start = self.track_metrics.then(Instant::now);
        let writer = DatasetWriter::from_config(&self.config.output);
        result.tables = result.write(&writer)?;

        if let (Some(start), Some(metrics)) = (write_start, result.metrics.as_mut()) {
            metrics.write_time_ms = start.elapsed().as_millis() as u64;
        }

        Ok(result)
    }
}

/// Preset runs for common needs.
impl ScenarioBuilder {
    /// A small run over half a year, fast enough for CI.
    ///
    /// - 100 users
    /// - History from 2024-01-01 to 2024-06-30
    pub fn smoke_test() -> Self {
        Self::new()
            .with_users(100)
            .with_history(
                time::macros::date!(2024 - 01 - 01),
                time::macros::date!(2024 - 06 - 30),
            )
    }

    /// A run where churn dominates, for exercising reactivation.
    ///
    /// - 500 users over two years
    /// - Base monthly churn 0.3, saturating the transition bands for the free tier
    pub fn churn_stress_test() -> Self {
        Self::new()
            .with_users(500)
            .with_history(
                time::macros::date!(2023 - 01 - 01),
                time::macros::date!(2024 - 12 - 31),
            )
            .with_base_churn(0.3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricflow::ChangeType;

    #[test]
    fn test_build_data() {
        let result = ScenarioBuilder::smoke_test().build_data().unwrap();

        assert_eq!(result.users.len(), 100);
        assert!(result.subscriptions.len() >= 100);
        assert!(!result.events.is_empty());
        assert!(!result.sessions.is_empty());
        assert!(result.marketing_touches.len() >= 100);
        assert_eq!(result.plan_details.len(), 4);
        assert_eq!(result.channel_details.len(), 8);
        assert!(result.tables.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = ScenarioBuilder::new().with_users(0).build_data().unwrap_err();
        assert!(matches!(err, ConfigError::NoUsers));
    }

    #[test]
    fn test_preset_smoke() {
        let builder = ScenarioBuilder::smoke_test();
        assert_eq!(builder.config().num_users, 100);
        assert!(builder.config().validate().is_ok());
    }

    #[test]
    fn test_preset_churn_stress_reactivates() {
        let builder = ScenarioBuilder::churn_stress_test();
        assert!(builder.config().validate().is_ok());

        let result = builder.build_data().unwrap();
        let churned = result
            .subscriptions
            .iter()
            .filter(|s| s.change_type == ChangeType::Churned)
            .count();
        // Periods are grouped by user, so a reactivation is a churned period
        // followed by another period of the same user.
        let reactivated = result
            .subscriptions
            .windows(2)
            .filter(|pair| {
                pair[0].change_type == ChangeType::Churned && pair[0].user_id == pair[1].user_id
            })
            .count();
        assert!(churned > 0);
        assert!(reactivated > 0);
    }

    #[test]
    fn test_metrics_tracking() {
        let result_no_metrics = ScenarioBuilder::smoke_test().build_data().unwrap();
        assert!(
            result_no_metrics.metrics.is_none(),
            "Metrics should be None when not tracking"
        );

        let result = ScenarioBuilder::smoke_test()
            .with_metrics(true)
            .build_data()
            .unwrap();
        let metrics = result.metrics.as_ref().expect("metrics enabled");
        assert_eq!(metrics.user_count, 100);
        assert_eq!(metrics.subscription_count, result.subscriptions.len());
        assert_eq!(metrics.event_count, result.events.len());
        assert_eq!(metrics.session_count, result.sessions.len());
        // No files written by build_data
        assert_eq!(metrics.write_time_ms, 0);
    }

    #[test]
    fn test_row_counts() {
        let result = ScenarioBuilder::smoke_test().build_data().unwrap();
        let counts = result.row_counts();
        assert_eq!(counts.len(), 8);
        assert_eq!(counts[0], ("users", 100));
        assert_eq!(
            result.total_rows(),
            counts.iter().map(|(_, n)| n).sum::<usize>()
        );
    }
}
