//! Pre-signup marketing touch generation.

use rand::Rng;
use time::Duration;

use metricflow::models::{is_paid_channel, round_cents};
use metricflow::{MarketingTouch, TouchType, User};

use crate::config::{ConfigError, GeneratorConfig};
use crate::rng::random_uuid;

const CAMPAIGNS: [&str; 12] = [
    "spring_promo_2023",
    "summer_launch_2023",
    "black_friday_2023",
    "new_year_2024",
    "product_hunt_launch",
    "webinar_series_q2",
    "partner_referral_prog",
    "content_seo_push",
    "retargeting_q3",
    "enterprise_outreach",
    "free_trial_campaign",
    "upgrade_nudge",
];

/// Configuration for touch generation.
#[derive(Debug, Clone)]
pub struct MarketingGenConfig {
    /// Inclusive range of touches per user.
    pub touches_per_user: (usize, usize),
    /// Inclusive range of days before signup a touch can land on.
    pub days_before_signup: (i64, i64),
    /// Inclusive range of touch hours.
    pub touch_hours: (i64, i64),
    /// Inclusive cost range for paid-channel touches.
    pub paid_cost_range: (f64, f64),
}

impl Default for MarketingGenConfig {
    fn default() -> Self {
        Self {
            touches_per_user: (1, 5),
            days_before_signup: (1, 60),
            touch_hours: (8, 22),
            paid_cost_range: (0.5, 15.0),
        }
    }
}

/// Generates attribution touches that lead up to each signup.
pub struct MarketingGenerator {
    config: MarketingGenConfig,
    channels: Vec<String>,
}

impl MarketingGenerator {
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, ConfigError> {
        Self::with_config(config, MarketingGenConfig::default())
    }

    /// Creates a generator with custom touch parameters.
    pub fn with_config(
        config: &GeneratorConfig,
        touch_config: MarketingGenConfig,
    ) -> Result<Self, ConfigError> {
        if config.acquisition_channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        Ok(Self {
            config: touch_config,
            channels: config.acquisition_channels.clone(),
        })
    }

    /// Generates touches for every user, in user order.
    pub fn generate_for_users(&self, users: &[User], rng: &mut impl Rng) -> Vec<MarketingTouch> {
        users
            .iter()
            .flat_map(|user| self.generate_for_user(user, rng))
            .collect()
    }

    /// Generates one user's touches, earliest first.
    ///
    /// All day offsets are drawn up front and ordered farthest-first, so the
    /// final touch is the one closest to signup. That touch converts and
    /// carries the user's acquisition channel. Every touch of a user acquired
    /// through a paid channel has a cost; other users' touches cost nothing.
    pub fn generate_for_user(&self, user: &User, rng: &mut impl Rng) -> Vec<MarketingTouch> {
        let paid_acquisition = is_paid_channel(&user.acquisition_channel);
        let (min_touches, max_touches) = self.config.touches_per_user;
        let count = rng.gen_range(min_touches..=max_touches);

        let (min_days, max_days) = self.config.days_before_signup;
        let mut offsets: Vec<i64> = (0..count)
            .map(|_| rng.gen_range(min_days..=max_days))
            .collect();
        offsets.sort_unstable_by(|a, b| b.cmp(a));

        offsets
            .into_iter()
            .enumerate()
            .map(|(i, days_before)| {
                let is_converting_touch = i + 1 == count;
                let touch_id = random_uuid(rng);
                let campaign = CAMPAIGNS[rng.gen_range(0..CAMPAIGNS.len())].to_string();
                let channel = if is_converting_touch {
                    user.acquisition_channel.clone()
                } else {
                    self.channels[rng.gen_range(0..self.channels.len())].clone()
                };

                let (first_hour, last_hour) = self.config.touch_hours;
                let touch_timestamp = (user.signup_date - Duration::days(days_before)).midnight()
                    + Duration::hours(rng.gen_range(first_hour..=last_hour));
                let touch_type = TouchType::ALL[rng.gen_range(0..TouchType::ALL.len())];

                let cost = if paid_acquisition {
                    let (low, high) = self.config.paid_cost_range;
                    round_cents(rng.gen_range(low..=high))
                } else {
                    0.0
                };

                MarketingTouch {
                    touch_id,
                    user_id: user.user_id,
                    campaign,
                    channel,
                    touch_timestamp,
                    touch_type,
                    is_converting_touch,
                    cost,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    use crate::generators::UserGenerator;
    use crate::rng::StreamRng;

    #[test]
    fn test_converting_touch_is_last_and_matches_channel() {
        let config = GeneratorConfig::default();
        let user_gen = UserGenerator::from_config(&config).unwrap();
        let marketing_gen = MarketingGenerator::from_config(&config).unwrap();
        let mut rng = StreamRng::seed_from_u64(51);

        for user in user_gen.generate_batch(200, &mut rng) {
            let touches = marketing_gen.generate_for_user(&user, &mut rng);
            assert!((1..=5).contains(&touches.len()));

            let converting: Vec<_> = touches.iter().filter(|t| t.is_converting_touch).collect();
            assert_eq!(converting.len(), 1);

            let last = touches.last().unwrap();
            assert!(last.is_converting_touch);
            assert_eq!(last.channel, user.acquisition_channel);

            for pair in touches.windows(2) {
                assert!(pair[0].touch_timestamp.date() <= pair[1].touch_timestamp.date());
            }
            for touch in &touches {
                let days_before = (user.signup_date - touch.touch_timestamp.date()).whole_days();
                assert!((1..=60).contains(&days_before));
                assert!((8..=22).contains(&touch.touch_timestamp.hour()));
            }
        }
    }

    #[test]
    fn test_cost_follows_acquisition_channel() {
        let config = GeneratorConfig::default();
        let user_gen = UserGenerator::from_config(&config).unwrap();
        let marketing_gen = MarketingGenerator::from_config(&config).unwrap();
        let mut rng = StreamRng::seed_from_u64(52);

        let template = user_gen.generate_batch(1, &mut rng).remove(0);
        for (channel, paid) in [("paid_search", true), ("referral", false)] {
            let user = User {
                acquisition_channel: channel.to_string(),
                ..template.clone()
            };
            for _ in 0..200 {
                for touch in marketing_gen.generate_for_user(&user, &mut rng) {
                    if paid {
                        assert!(
                            touch.cost >= 0.5 && touch.cost <= 15.0,
                            "{} touch of a paid user cost {}",
                            touch.channel,
                            touch.cost
                        );
                    } else {
                        assert_eq!(touch.cost, 0.0, "{} touch of an organic user", touch.channel);
                    }
                }
            }
        }
    }

    #[test]
    fn test_empty_channels_rejected() {
        let config = GeneratorConfig {
            acquisition_channels: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(
            MarketingGenerator::from_config(&config),
            Err(ConfigError::NoChannels)
        ));
    }
}
