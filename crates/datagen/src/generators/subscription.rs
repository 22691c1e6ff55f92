//! Subscription lifecycle simulation.
//!
//! Each user walks a sequence of plan periods from signup to the horizon.
//! A period's length is geometric in months, and a single uniform draw picks
//! what happens at its end: upgrade, downgrade, churn, or renewal. Reaching
//! the horizon always wins and leaves the period open (`active`).

use rand::Rng;
use rand::distributions::WeightedIndex;
use rand_distr::{Distribution, Geometric};
use time::{Date, Duration};

use metricflow::{BillingInterval, ChangeType, PlanTier, Subscription, User};

use super::weighted;
use crate::config::{ConfigError, GeneratorConfig};
use crate::rng::random_uuid;

/// Days in a simulated billing month.
pub const DAYS_PER_MONTH: u64 = 30;
/// `r` below this upgrades (unless already enterprise).
pub const UPGRADE_THRESHOLD: f64 = 0.15;
/// `r` below this downgrades (unless already free).
pub const DOWNGRADE_THRESHOLD: f64 = 0.22;
/// The churn band extends `CHURN_BAND_FACTOR × monthly_churn` past the downgrade threshold.
pub const CHURN_BAND_FACTOR: f64 = 3.0;
pub const REACTIVATION_PROBABILITY: f64 = 0.15;
pub const MONTHLY_BILLING_PROBABILITY: f64 = 0.7;
const REACTIVATION_GAP_DAYS: std::ops::RangeInclusive<i64> = 30..=180;

/// Outcome at the end of a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Active,
    Renewed,
    Upgrade(PlanTier),
    Downgrade(PlanTier),
    Churned,
}

impl Transition {
    pub fn change_type(&self) -> ChangeType {
        match self {
            Transition::Active => ChangeType::Active,
            Transition::Renewed => ChangeType::Renewed,
            Transition::Upgrade(_) => ChangeType::Upgrade,
            Transition::Downgrade(_) => ChangeType::Downgrade,
            Transition::Churned => ChangeType::Churned,
        }
    }
}

/// Picks the transition for a period ending on `plan`.
///
/// The bands are cumulative thresholds on one draw: upgrade below 0.15,
/// downgrade below 0.22, churn below `0.22 + 3 × monthly_churn`. At high
/// churn the churn band passes 1.0 and `renewed` is never chosen.
pub fn select_transition(
    plan: PlanTier,
    reached_horizon: bool,
    r: f64,
    monthly_churn: f64,
) -> Transition {
    if reached_horizon {
        return Transition::Active;
    }
    if r < UPGRADE_THRESHOLD
        && let Some(next) = plan.upgrade()
    {
        return Transition::Upgrade(next);
    }
    if r < DOWNGRADE_THRESHOLD
        && let Some(next) = plan.downgrade()
    {
        return Transition::Downgrade(next);
    }
    if r < DOWNGRADE_THRESHOLD + CHURN_BAND_FACTOR * monthly_churn {
        return Transition::Churned;
    }
    Transition::Renewed
}

/// Per-tier parameters resolved from the configuration.
#[derive(Debug, Clone)]
struct TierParams {
    price: f64,
    monthly_churn: f64,
    tenure_months: Geometric,
}

/// Simulates subscription periods for each user.
pub struct SubscriptionSimulator {
    horizon: Date,
    /// Indexed by `PlanTier as usize`.
    tiers: Vec<TierParams>,
    reactivation_index: WeightedIndex<f64>,
}

impl SubscriptionSimulator {
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, ConfigError> {
        let tiers = PlanTier::ALL
            .iter()
            .map(|&tier| {
                let monthly_churn = config.churn.monthly_churn(tier);
                let tenure_months = Geometric::new(monthly_churn).map_err(|_| {
                    ConfigError::ChurnRate {
                        tier,
                        rate: monthly_churn,
                    }
                })?;
                Ok(TierParams {
                    price: config.plan(tier).ok_or(ConfigError::MissingPlan(tier))?.price,
                    monthly_churn,
                    tenure_months,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let reactivation_weights: Vec<f64> = PlanTier::ALL
            .iter()
            .map(|t| t.reactivation_weight())
            .collect();

        Ok(Self {
            horizon: config.history_end,
            tiers,
            reactivation_index: weighted(&reactivation_weights)?,
        })
    }

    /// The simulation horizon; open periods end here.
    pub fn horizon(&self) -> Date {
        self.horizon
    }

    /// Simulates every user in order.
    pub fn generate_for_users(&self, users: &[User], rng: &mut impl Rng) -> Vec<Subscription> {
        users
            .iter()
            .flat_map(|user| self.simulate_user(user, rng))
            .collect()
    }

    /// Produces one user's time-ordered periods.
    ///
    /// Every user gets at least one period. The loop ends on `active`, on a
    /// churn without reactivation, or when a reactivation would start at or
    /// past the horizon; every other step moves the start forward by at
    /// least one month, so the loop always terminates.
    pub fn simulate_user(&self, user: &User, rng: &mut impl Rng) -> Vec<Subscription> {
        let mut plan = user.initial_plan;
        let mut period_start = user.signup_date;
        let mut periods = Vec::new();

        loop {
            let params = &self.tiers[plan as usize];

            let months_on_plan = (params.tenure_months.sample(rng).saturating_add(1)).max(1);
            let remaining_days = (self.horizon - period_start).whole_days().max(0) as u64;
            let period_days = months_on_plan
                .saturating_mul(DAYS_PER_MONTH)
                .min(remaining_days);
            let period_end = period_start + Duration::days(period_days as i64);

            let r: f64 = rng.r#gen();
            let transition =
                select_transition(plan, period_end >= self.horizon, r, params.monthly_churn);

            let billing_interval = if rng.r#gen::<f64>() < MONTHLY_BILLING_PROBABILITY {
                BillingInterval::Monthly
            } else {
                BillingInterval::Annual
            };

            periods.push(Subscription {
                subscription_id: random_uuid(rng),
                user_id: user.user_id,
                plan,
                price: params.price,
                started_at: period_start,
                ended_at: (transition != Transition::Active).then_some(period_end),
                change_type: transition.change_type(),
                billing_interval,
            });

            match transition {
                Transition::Active => break,
                Transition::Churned => {
                    if rng.r#gen::<f64>() >= REACTIVATION_PROBABILITY {
                        break;
                    }
                    let gap = rng.gen_range(REACTIVATION_GAP_DAYS);
                    period_start = period_end + Duration::days(gap);
                    plan = PlanTier::ALL[self.reactivation_index.sample(rng)];
                    if period_start >= self.horizon {
                        break;
                    }
                }
                Transition::Renewed => period_start = period_end,
                Transition::Upgrade(next) | Transition::Downgrade(next) => {
                    period_start = period_end;
                    plan = next;
                }
            }
        }

        periods
    }
}
