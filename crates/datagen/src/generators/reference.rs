//! Static lookup tables for plans and acquisition channels.

use rand::Rng;

use metricflow::models::round_cents;
use metricflow::{ChannelDetail, ChannelType, PlanDetail};

use crate::config::GeneratorConfig;

const ANNUAL_PRICE_FACTOR: f64 = 0.85;
const DEFAULT_CAC_RANGE: (f64, f64) = (5.0, 80.0);

/// Builds the `plan_details` and `channel_details` reference tables.
pub struct ReferenceGenerator<'a> {
    config: &'a GeneratorConfig,
}

impl<'a> ReferenceGenerator<'a> {
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Self { config }
    }

    /// One row per configured plan, in tier order.
    pub fn plan_details(&self) -> Vec<PlanDetail> {
        self.config
            .plans
            .iter()
            .map(|(&tier, plan)| PlanDetail {
                plan_id: format!("plan_{tier}"),
                plan_name: tier,
                monthly_price: plan.price,
                annual_price: round_cents(plan.price * 12.0 * ANNUAL_PRICE_FACTOR),
                tier_order: tier.tier_order(),
                features: plan.features.join(", "),
            })
            .collect()
    }

    /// One row per configured channel, with a random default acquisition cost.
    pub fn channel_details(&self, rng: &mut impl Rng) -> Vec<ChannelDetail> {
        let (low, high) = DEFAULT_CAC_RANGE;
        self.config
            .acquisition_channels
            .iter()
            .map(|name| ChannelDetail {
                channel_name: name.clone(),
                channel_type: ChannelType::classify(name),
                default_cac: round_cents(rng.gen_range(low..=high)),
            })
            .collect()
    }
}
