//! Billing events derived from subscription periods.

use rand::Rng;
use rand::distributions::WeightedIndex;
use rand_distr::Distribution;
use time::{Date, Duration};

use metricflow::models::round_cents;
use metricflow::{BillingInterval, Payment, PaymentMethod, PaymentStatus, Subscription};

use super::weighted;
use crate::config::ConfigError;
use crate::rng::random_uuid;

const CURRENCY: &str = "USD";
const ANNUAL_DISCOUNT_PROBABILITY: f64 = 0.6;
const ANNUAL_DISCOUNT_FACTOR: f64 = 0.85;
const MONTHLY_JITTER: f64 = 0.02;
const BILLING_CYCLE_DAYS: i64 = 30;

const STATUS_WEIGHTS: [(PaymentStatus, f64); 3] = [
    (PaymentStatus::Succeeded, 0.94),
    (PaymentStatus::Failed, 0.04),
    (PaymentStatus::Refunded, 0.02),
];

/// Wire transfers are only offered for annual invoices.
const MONTHLY_METHODS: [PaymentMethod; 3] = [
    PaymentMethod::CreditCard,
    PaymentMethod::DebitCard,
    PaymentMethod::Paypal,
];

/// Generates payments for paid subscription periods.
pub struct PaymentGenerator {
    horizon: Date,
    status_index: WeightedIndex<f64>,
}

impl PaymentGenerator {
    pub fn new(horizon: Date) -> Result<Self, ConfigError> {
        Ok(Self {
            horizon,
            status_index: weighted(&STATUS_WEIGHTS.map(|(_, w)| w))?,
        })
    }

    /// Generates payments for every period, in period order.
    pub fn generate_for_subscriptions(
        &self,
        subscriptions: &[Subscription],
        rng: &mut impl Rng,
    ) -> Vec<Payment> {
        let mut payments = Vec::new();
        for subscription in subscriptions {
            self.generate_for_period(subscription, rng, &mut payments);
        }
        payments
    }

    /// Appends the payments for one period. Free periods produce none.
    ///
    /// Annual billing is one invoice on the start date; monthly billing is one
    /// invoice every 30 days from the start while the date precedes the end.
    pub fn generate_for_period(
        &self,
        subscription: &Subscription,
        rng: &mut impl Rng,
        out: &mut Vec<Payment>,
    ) {
        if subscription.price == 0.0 {
            return;
        }

        match subscription.billing_interval {
            BillingInterval::Annual => {
                let discount = if rng.r#gen::<f64>() < ANNUAL_DISCOUNT_PROBABILITY {
                    ANNUAL_DISCOUNT_FACTOR
                } else {
                    1.0
                };
                let amount = subscription.price * 12.0 * discount;
                let method = PaymentMethod::ALL[rng.gen_range(0..PaymentMethod::ALL.len())];
                out.push(self.payment(subscription, subscription.started_at, amount, method, rng));
            }
            BillingInterval::Monthly => {
                let end = subscription.effective_end(self.horizon);
                let mut current = subscription.started_at;
                while current < end {
                    let jitter = rng.gen_range(-MONTHLY_JITTER..=MONTHLY_JITTER);
                    let amount = subscription.price * (1.0 + jitter);
                    let method = MONTHLY_METHODS[rng.gen_range(0..MONTHLY_METHODS.len())];
                    out.push(self.payment(subscription, current, amount, method, rng));
                    current += Duration::days(BILLING_CYCLE_DAYS);
                }
            }
        }
    }

    fn payment(
        &self,
        subscription: &Subscription,
        payment_date: Date,
        amount: f64,
        payment_method: PaymentMethod,
        rng: &mut impl Rng,
    ) -> Payment {
        let status = STATUS_WEIGHTS[self.status_index.sample(rng)].0;
        Payment {
            payment_id: random_uuid(rng),
            subscription_id: subscription.subscription_id,
            user_id: subscription.user_id,
            amount: round_cents(amount),
            currency: CURRENCY.to_string(),
            payment_date,
            payment_method,
            status,
            billing_interval: subscription.billing_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricflow::{ChangeType, PlanTier};
    use rand::SeedableRng;
    use time::macros::date;
    use uuid::Uuid;

    use crate::rng::StreamRng;

    const HORIZON: Date = date!(2025 - 12 - 31);

    fn period(
        price: f64,
        interval: BillingInterval,
        start: Date,
        end: Option<Date>,
    ) -> Subscription {
        Subscription {
            subscription_id: Uuid::from_u128(1),
            user_id: Uuid::from_u128(2),
            plan: PlanTier::Starter,
            price,
            started_at: start,
            ended_at: end,
            change_type: if end.is_some() {
                ChangeType::Renewed
            } else {
                ChangeType::Active
            },
            billing_interval: interval,
        }
    }

    #[test]
    fn test_free_period_has_no_payments() {
        let payment_gen = PaymentGenerator::new(HORIZON).unwrap();
        let mut rng = StreamRng::seed_from_u64(1);
        let sub = period(
            0.0,
            BillingInterval::Monthly,
            date!(2024 - 01 - 01),
            Some(date!(2024 - 12 - 01)),
        );
        assert!(payment_gen.generate_for_subscriptions(&[sub], &mut rng).is_empty());
    }

    #[test]
    fn test_annual_period_has_one_payment() {
        let payment_gen = PaymentGenerator::new(HORIZON).unwrap();
        let mut rng = StreamRng::seed_from_u64(2);

        for _ in 0..50 {
            let sub = period(
                79.0,
                BillingInterval::Annual,
                date!(2023 - 02 - 01),
                Some(date!(2024 - 06 - 01)),
            );
            let payments = payment_gen.generate_for_subscriptions(&[sub.clone()], &mut rng);
            assert_eq!(payments.len(), 1);
            let payment = &payments[0];
            assert_eq!(payment.payment_date, sub.started_at);
            assert!(payment.amount == 948.0 || payment.amount == round_cents(948.0 * 0.85));
            assert_eq!(payment.billing_interval, BillingInterval::Annual);
        }
    }

    #[test]
    fn test_monthly_cadence() {
        let payment_gen = PaymentGenerator::new(HORIZON).unwrap();
        let mut rng = StreamRng::seed_from_u64(3);

        // 95 days: invoices on day 0, 30, 60, 90.
        let sub = period(
            29.0,
            BillingInterval::Monthly,
            date!(2024 - 01 - 01),
            Some(date!(2024 - 01 - 01) + Duration::days(95)),
        );
        let payments = payment_gen.generate_for_subscriptions(&[sub.clone()], &mut rng);
        assert_eq!(payments.len(), 4);

        for (i, payment) in payments.iter().enumerate() {
            assert_eq!(
                payment.payment_date,
                sub.started_at + Duration::days(30 * i as i64)
            );
            assert!(payment.amount >= 28.42 && payment.amount <= 29.58);
            assert_ne!(payment.payment_method, PaymentMethod::WireTransfer);
            assert_eq!(payment.subscription_id, sub.subscription_id);
            assert_eq!(payment.currency, "USD");
        }
    }

    #[test]
    fn test_open_period_bills_until_horizon() {
        let payment_gen = PaymentGenerator::new(HORIZON).unwrap();
        let mut rng = StreamRng::seed_from_u64(4);
        let sub = period(
            199.0,
            BillingInterval::Monthly,
            HORIZON - Duration::days(60),
            None,
        );
        let payments = payment_gen.generate_for_subscriptions(&[sub], &mut rng);
        assert_eq!(payments.len(), 2);
        assert!(payments.iter().all(|p| p.payment_date < HORIZON));
    }

    #[test]
    fn test_status_mix() {
        let payment_gen = PaymentGenerator::new(HORIZON).unwrap();
        let mut rng = StreamRng::seed_from_u64(5);
        let sub = period(
            29.0,
            BillingInterval::Monthly,
            date!(2000 - 01 - 01),
            Some(date!(2025 - 01 - 01)),
        );
        let payments = payment_gen.generate_for_subscriptions(&[sub], &mut rng);
        let succeeded = payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Succeeded)
            .count() as f64;
        let share = succeeded / payments.len() as f64;
        assert!(share > 0.88, "succeeded share {share}");
    }
}
