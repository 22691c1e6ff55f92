//! User generation with seasonal signup timing.

use fake::{
    Fake,
    faker::{internet::en::FreeEmailProvider, name::en::Name},
};
use rand::Rng;
use rand::distributions::WeightedIndex;
use rand_distr::Distribution;
use time::{Date, Duration};

use metricflow::{PlanTier, User};

use super::weighted;
use crate::config::{ConfigError, GeneratorConfig};
use crate::rng::random_uuid;

const COUNTRIES: [(&str, f64); 10] = [
    ("US", 50.0),
    ("UK", 12.0),
    ("CA", 10.0),
    ("DE", 8.0),
    ("FR", 5.0),
    ("AU", 5.0),
    ("IN", 4.0),
    ("BR", 3.0),
    ("JP", 2.0),
    ("Other", 1.0),
];

const COMPANY_SIZES: [(&str, f64); 5] = [
    ("1-10", 0.35),
    ("11-50", 0.30),
    ("51-200", 0.20),
    ("201-1000", 0.10),
    ("1000+", 0.05),
];

const INDUSTRIES: [&str; 10] = [
    "Technology",
    "Finance",
    "Healthcare",
    "Education",
    "Retail",
    "Manufacturing",
    "Media",
    "Consulting",
    "Non-profit",
    "Government",
];

const VERIFIED_PROBABILITY: f64 = 0.85;

/// Signup seasonality: peaks in January and September, trough in December.
pub fn seasonal_weight(date: Date) -> f64 {
    match u8::from(date.month()) {
        1 => 1.4,
        2 => 1.1,
        3 => 1.0,
        4 => 0.9,
        5 => 0.85,
        6 => 0.8,
        7 => 0.75,
        8 => 0.9,
        9 => 1.3,
        10 => 1.1,
        11 => 1.0,
        _ => 0.7,
    }
}

/// Logarithmic growth curve: `1 + 0.8 × ln(1 + months since start)`.
pub fn growth_curve(date: Date, start: Date) -> f64 {
    let months = (date.year() - start.year()) * 12 + u8::from(date.month()) as i32
        - u8::from(start.month()) as i32;
    1.0 + 0.8 * (months.max(0) as f64).ln_1p()
}

/// Generates the base user population.
pub struct UserGenerator {
    signup_days: Vec<Date>,
    signup_index: WeightedIndex<f64>,
    channels: Vec<String>,
    plan_tiers: Vec<PlanTier>,
    plan_index: WeightedIndex<f64>,
    country_index: WeightedIndex<f64>,
    company_size_index: WeightedIndex<f64>,
}

impl UserGenerator {
    /// Builds the signup calendar and selection tables from the configuration.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, ConfigError> {
        let total_days = (config.history_end - config.history_start).whole_days();
        let signup_days: Vec<Date> = (0..=total_days)
            .map(|offset| config.history_start + Duration::days(offset))
            .collect();
        let signup_weights: Vec<f64> = signup_days
            .iter()
            .map(|&d| seasonal_weight(d) * growth_curve(d, config.history_start))
            .collect();

        let plan_tiers: Vec<PlanTier> = config.plans.keys().copied().collect();
        let plan_weights: Vec<f64> = config.plans.values().map(|p| p.weight).collect();

        if config.acquisition_channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }

        Ok(Self {
            signup_index: weighted(&signup_weights)?,
            signup_days,
            channels: config.acquisition_channels.clone(),
            plan_index: weighted(&plan_weights).map_err(|_| ConfigError::PlanWeights)?,
            plan_tiers,
            country_index: weighted(&COUNTRIES.map(|(_, w)| w))?,
            company_size_index: weighted(&COMPANY_SIZES.map(|(_, w)| w))?,
        })
    }

    /// Generates `count` users. Signup dates are drawn for the whole batch
    /// before any per-user attribute.
    pub fn generate_batch(&self, count: usize, rng: &mut impl Rng) -> Vec<User> {
        let signups: Vec<Date> = (0..count)
            .map(|_| self.signup_days[self.signup_index.sample(rng)])
            .collect();

        signups
            .into_iter()
            .map(|signup| self.generate(signup, rng))
            .collect()
    }

    /// Generates a single user who signed up on `signup_date`.
    pub fn generate(&self, signup_date: Date, rng: &mut impl Rng) -> User {
        let user_id = random_uuid(rng);
        let acquisition_channel = self.channels[rng.gen_range(0..self.channels.len())].clone();
        let initial_plan = self.plan_tiers[self.plan_index.sample(rng)];
        let country = COUNTRIES[self.country_index.sample(rng)].0.to_string();
        let company_size = COMPANY_SIZES[self.company_size_index.sample(rng)].0.to_string();

        let domain: String = FreeEmailProvider().fake_with_rng(rng);
        let email = format!("user_{}@{domain}", &user_id.simple().to_string()[..12]);
        let name: String = Name().fake_with_rng(rng);

        let signup_timestamp = signup_date.midnight()
            + Duration::hours(rng.gen_range(6..=23))
            + Duration::minutes(rng.gen_range(0..=59));

        let industry = INDUSTRIES[rng.gen_range(0..INDUSTRIES.len())].to_string();
        let is_verified = rng.r#gen::<f64>() < VERIFIED_PROBABILITY;

        User {
            user_id,
            email,
            name,
            signup_date,
            signup_timestamp,
            country,
            acquisition_channel,
            initial_plan,
            company_size,
            industry,
            is_verified,
        }
    }
}
