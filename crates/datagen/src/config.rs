//! Configuration types for dataset generation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use metricflow::PlanTier;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Date;
use time::macros::date;

time::serde::format_description!(date_format, Date, "[year]-[month]-[day]");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Population size must be positive")]
    NoUsers,
    #[error("History window is empty: {start} to {end}")]
    HistoryWindow { start: Date, end: Date },
    #[error("Plan catalog is missing the {0} tier")]
    MissingPlan(PlanTier),
    #[error("Invalid price {price} for the {tier} plan")]
    PlanPrice { tier: PlanTier, price: f64 },
    #[error("Plan selection weights must be non-negative and sum to a positive value")]
    PlanWeights,
    #[error("Acquisition channel list is empty")]
    NoChannels,
    #[error("Event type catalog needs at least one type and a positive total weight")]
    EventTypes,
    #[error("Monthly churn rate for the {tier} plan must be in (0, 1], got {rate}")]
    ChurnRate { tier: PlanTier, rate: f64 },
    #[error("Invalid distribution parameters: {0}")]
    Distribution(String),
}

/// Catalog entry for a subscription plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Monthly list price in USD.
    pub price: f64,
    /// Relative weight when assigning a new user's initial plan.
    pub weight: f64,
    /// Feature flags included in the plan.
    pub features: Vec<String>,
}

impl PlanConfig {
    fn new(price: f64, weight: f64, features: &[&str]) -> Self {
        Self {
            price,
            weight,
            features: features.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Churn parameters for the subscription simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChurnConfig {
    pub base_monthly_churn_rate: f64,
    pub multiplier_free: f64,
    pub multiplier_starter: f64,
    pub multiplier_professional: f64,
    pub multiplier_enterprise: f64,
}

impl Default for ChurnConfig {
    fn default() -> Self {
        Self {
            base_monthly_churn_rate: 0.045,
            multiplier_free: 2.5,
            multiplier_starter: 1.2,
            multiplier_professional: 0.6,
            multiplier_enterprise: 0.3,
        }
    }
}

impl ChurnConfig {
    /// Stickiness multiplier for a tier; free churns the most.
    pub fn multiplier(&self, tier: PlanTier) -> f64 {
        match tier {
            PlanTier::Free => self.multiplier_free,
            PlanTier::Starter => self.multiplier_starter,
            PlanTier::Professional => self.multiplier_professional,
            PlanTier::Enterprise => self.multiplier_enterprise,
        }
    }

    /// `base_monthly_churn_rate × multiplier(tier)`.
    pub fn monthly_churn(&self, tier: PlanTier) -> f64 {
        self.base_monthly_churn_rate * self.multiplier(tier)
    }
}

/// A product usage event type and its selection weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTypeConfig {
    pub name: String,
    pub weight: f64,
}

/// Parquet codec applied to entity tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Snappy,
    Gzip,
}

impl std::str::FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Compression::None),
            "snappy" => Ok(Compression::Snappy),
            "gzip" => Ok(Compression::Gzip),
            other => Err(format!("unknown compression codec: {other}")),
        }
    }
}

/// Where and how tables are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for entity tables.
    pub dir: PathBuf,
    /// Directory for reference (seed) tables.
    pub seeds_dir: PathBuf,
    pub compression: Compression,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/raw"),
            seeds_dir: PathBuf::from("data/seeds"),
            compression: Compression::default(),
        }
    }
}

/// Top-level generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Master seed every RNG stream derives from.
    pub seed: u64,
    /// Number of users to generate.
    pub num_users: usize,
    /// First day of the simulated history.
    #[serde(with = "date_format")]
    pub history_start: Date,
    /// Last day of the simulated history; also the simulation horizon.
    #[serde(with = "date_format")]
    pub history_end: Date,
    /// Plan catalog keyed by tier.
    pub plans: BTreeMap<PlanTier, PlanConfig>,
    pub acquisition_channels: Vec<String>,
    pub churn: ChurnConfig,
    pub event_types: Vec<EventTypeConfig>,
    pub output: OutputConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let plans = BTreeMap::from([
            (
                PlanTier::Free,
                PlanConfig::new(0.0, 0.40, &["basic_dashboard", "5_reports"]),
            ),
            (
                PlanTier::Starter,
                PlanConfig::new(29.0, 0.30, &["basic_dashboard", "25_reports", "api_access"]),
            ),
            (
                PlanTier::Professional,
                PlanConfig::new(
                    79.0,
                    0.20,
                    &[
                        "adv_dashboard",
                        "unlimited_reports",
                        "api_access",
                        "integrations",
                        "support",
                    ],
                ),
            ),
            (
                PlanTier::Enterprise,
                PlanConfig::new(
                    199.0,
                    0.10,
                    &[
                        "adv_dashboard",
                        "unlimited_reports",
                        "api_access",
                        "integrations",
                        "priority_support",
                        "sso",
                        "audit_log",
                    ],
                ),
            ),
        ]);

        let acquisition_channels = [
            "organic_search",
            "paid_search",
            "social_media",
            "referral",
            "direct",
            "email_campaign",
            "partner",
            "content_marketing",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();

        let event_types = [
            ("page_view", 20.0),
            ("feature_click", 15.0),
            ("report_created", 10.0),
            ("dashboard_viewed", 12.0),
            ("api_call", 8.0),
            ("export_data", 5.0),
            ("invite_sent", 3.0),
            ("integration_connected", 2.0),
            ("search_performed", 8.0),
            ("settings_changed", 4.0),
            ("support_ticket_opened", 2.0),
            ("file_uploaded", 3.0),
            ("comment_added", 5.0),
            ("alert_configured", 3.0),
        ]
        .iter()
        .map(|&(name, weight)| EventTypeConfig {
            name: name.to_string(),
            weight,
        })
        .collect();

        Self {
            seed: 42,
            num_users: 50_000,
            history_start: date!(2022 - 01 - 01),
            history_end: date!(2025 - 12 - 31),
            plans,
            acquisition_channels,
            churn: ChurnConfig::default(),
            event_types,
            output: OutputConfig::default(),
        }
    }
}

impl GeneratorConfig {
    /// Reads a JSON config file and validates it. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that would produce degenerate output.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_users == 0 {
            return Err(ConfigError::NoUsers);
        }
        if self.history_end <= self.history_start {
            return Err(ConfigError::HistoryWindow {
                start: self.history_start,
                end: self.history_end,
            });
        }

        let mut weight_sum = 0.0;
        for &tier in PlanTier::ALL {
            let plan = self.plans.get(&tier).ok_or(ConfigError::MissingPlan(tier))?;
            if !plan.price.is_finite() || plan.price < 0.0 {
                return Err(ConfigError::PlanPrice {
                    tier,
                    price: plan.price,
                });
            }
            if !plan.weight.is_finite() || plan.weight < 0.0 {
                return Err(ConfigError::PlanWeights);
            }
            weight_sum += plan.weight;
        }
        if !weight_sum.is_finite() || weight_sum <= 0.0 {
            return Err(ConfigError::PlanWeights);
        }

        if self.acquisition_channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }

        let event_weight_sum: f64 = self.event_types.iter().map(|e| e.weight).sum();
        if self.event_types.is_empty()
            || self
                .event_types
                .iter()
                .any(|e| !e.weight.is_finite() || e.weight < 0.0)
            || !event_weight_sum.is_finite()
            || event_weight_sum <= 0.0
        {
            return Err(ConfigError::EventTypes);
        }

        for &tier in PlanTier::ALL {
            let rate = self.churn.monthly_churn(tier);
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(ConfigError::ChurnRate { tier, rate });
            }
        }

        Ok(())
    }

    /// Catalog entry for a tier. Only valid after [`validate`](Self::validate).
    pub fn plan(&self, tier: PlanTier) -> Option<&PlanConfig> {
        self.plans.get(&tier)
    }

    /// Monthly list price for a tier, zero when the tier is absent.
    pub fn price(&self, tier: PlanTier) -> f64 {
        self.plan(tier).map(|p| p.price).unwrap_or(0.0)
    }
}
