//! Usage event generation.
//!
//! Event volume follows the plan active during each period. Only a fraction
//! of the period's days see activity, and each active day gets a Poisson
//! number of events around the plan's baseline.

use rand::Rng;
use rand::distributions::WeightedIndex;
use rand::seq::index;
use rand_distr::{Distribution, Poisson};
use sha2::{Digest, Sha256};
use time::{Date, Duration};
use uuid::Uuid;

use metricflow::{Event, PlanTier, Platform, Subscription};

use super::weighted;
use crate::config::{ConfigError, GeneratorConfig};
use crate::rng::random_uuid;

/// Hard ceiling on events for one user on one day.
pub const MAX_EVENTS_PER_DAY: usize = 30;
/// Number of distinct session keys a user can produce in a day.
pub const SESSION_BUCKETS: u8 = 4;
const PAGE_PROBABILITY: f64 = 0.7;
const SESSION_KEY_LEN: usize = 12;

/// Relative event volume per hour of day; peaks late morning and mid afternoon.
const HOUR_WEIGHTS: [f64; 24] = [
    1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 4.0, 8.0, 12.0, 14.0, 14.0, 12.0, 10.0, 12.0, 14.0, 13.0, 11.0,
    9.0, 7.0, 5.0, 4.0, 3.0, 2.0, 1.0,
];

const PLATFORM_WEIGHTS: [(Platform, f64); 4] = [
    (Platform::Web, 0.55),
    (Platform::MobileIos, 0.20),
    (Platform::MobileAndroid, 0.15),
    (Platform::Api, 0.10),
];

const PAGES: [&str; 8] = [
    "/dashboard",
    "/reports",
    "/settings",
    "/billing",
    "/integrations",
    "/team",
    "/analytics",
    "/api-docs",
];

/// Share of a period's days on which a plan's users are active.
pub fn activity_rate(tier: PlanTier) -> f64 {
    (0.3 + tier.daily_events() as f64 * 0.03).min(0.85)
}

/// Session key for a user's bucket on a given day.
pub fn session_key(user_id: Uuid, day: Date, bucket: u8) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(day.to_string().as_bytes());
    hasher.update([bucket]);
    let mut key = hex::encode(hasher.finalize());
    key.truncate(SESSION_KEY_LEN);
    key
}

/// Generates usage events from subscription periods.
pub struct EventGenerator {
    horizon: Date,
    event_types: Vec<String>,
    event_type_index: WeightedIndex<f64>,
    hour_index: WeightedIndex<f64>,
    platform_index: WeightedIndex<f64>,
    /// Indexed by `PlanTier as usize`.
    daily_volume: Vec<Poisson<f64>>,
}

impl EventGenerator {
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, ConfigError> {
        if config.event_types.is_empty() {
            return Err(ConfigError::EventTypes);
        }
        let event_weights: Vec<f64> = config.event_types.iter().map(|e| e.weight).collect();

        let daily_volume = PlanTier::ALL
            .iter()
            .map(|tier| {
                Poisson::new(tier.daily_events() as f64)
                    .map_err(|e| ConfigError::Distribution(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            horizon: config.history_end,
            event_types: config.event_types.iter().map(|e| e.name.clone()).collect(),
            event_type_index: weighted(&event_weights).map_err(|_| ConfigError::EventTypes)?,
            hour_index: weighted(&HOUR_WEIGHTS)?,
            platform_index: weighted(&PLATFORM_WEIGHTS.map(|(_, w)| w))?,
            daily_volume,
        })
    }

    /// Generates events for every period, in period order.
    pub fn generate_for_subscriptions(
        &self,
        subscriptions: &[Subscription],
        rng: &mut impl Rng,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        for subscription in subscriptions {
            self.generate_for_period(subscription, rng, &mut events);
        }
        events
    }

    /// Appends the events for one period.
    ///
    /// Active days are sampled without replacement from the period's whole
    /// days and visited in ascending order. A zero-length period is skipped.
    pub fn generate_for_period(
        &self,
        subscription: &Subscription,
        rng: &mut impl Rng,
        out: &mut Vec<Event>,
    ) {
        let days = subscription.duration_days(self.horizon);
        if days <= 0 {
            return;
        }
        let days = days as usize;

        let tier = subscription.plan;
        let wanted = ((days as f64 * activity_rate(tier)) as usize).max(1);
        let mut active_days = index::sample(rng, days, wanted.min(days)).into_vec();
        active_days.sort_unstable();

        for offset in active_days {
            let day = subscription.started_at + Duration::days(offset as i64);
            let drawn = self.daily_volume[tier as usize].sample(rng) as usize;
            let count = drawn.max(1).min(MAX_EVENTS_PER_DAY);

            for _ in 0..count {
                out.push(self.event(subscription.user_id, day, rng));
            }
        }
    }

    fn event(&self, user_id: Uuid, day: Date, rng: &mut impl Rng) -> Event {
        let event_id = random_uuid(rng);
        let event_type = self.event_types[self.event_type_index.sample(rng)].clone();

        let hour = self.hour_index.sample(rng) as i64;
        let event_timestamp = day.midnight()
            + Duration::hours(hour)
            + Duration::minutes(rng.gen_range(0..=59))
            + Duration::seconds(rng.gen_range(0..=59));

        let bucket = rng.gen_range(0..SESSION_BUCKETS);
        let platform = PLATFORM_WEIGHTS[self.platform_index.sample(rng)].0;
        let page_url = if rng.r#gen::<f64>() < PAGE_PROBABILITY {
            Some(PAGES[rng.gen_range(0..PAGES.len())].to_string())
        } else {
            None
        };

        Event {
            event_id,
            user_id,
            event_type,
            event_timestamp,
            session_id: session_key(user_id, day, bucket),
            platform,
            page_url,
        }
    }
}
