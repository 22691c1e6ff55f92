//! Row types for every table in the MetricFlow dataset.
//!
//! Field names are the column names downstream consumers read, so renaming a
//! field is a schema change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, PrimitiveDateTime};
use uuid::Uuid;

use crate::errors::ModelError;

time::serde::format_description!(date_format, Date, "[year]-[month]-[day]");
time::serde::format_description!(
    timestamp_format,
    PrimitiveDateTime,
    "[year]-[month]-[day] [hour]:[minute]:[second]"
);

/// Declares a categorical column: serde names, `as_str`, `Display`, and `FromStr`.
macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal) {
            $($variant:ident => $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the column string representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    other => Err(ModelError::UnknownValue {
                        kind: $label,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

categorical! {
    /// Subscription plan tier. Declaration order is tier order.
    PlanTier("plan") {
        Free => "free",
        Starter => "starter",
        Professional => "professional",
        Enterprise => "enterprise",
    }
}

impl PlanTier {
    /// 1-based position in the tier ordering.
    pub fn tier_order(&self) -> u8 {
        match self {
            PlanTier::Free => 1,
            PlanTier::Starter => 2,
            PlanTier::Professional => 3,
            PlanTier::Enterprise => 4,
        }
    }

    /// The next tier up, or `None` for enterprise.
    pub fn upgrade(&self) -> Option<PlanTier> {
        match self {
            PlanTier::Free => Some(PlanTier::Starter),
            PlanTier::Starter => Some(PlanTier::Professional),
            PlanTier::Professional => Some(PlanTier::Enterprise),
            PlanTier::Enterprise => None,
        }
    }

    /// The next tier down, or `None` for free.
    pub fn downgrade(&self) -> Option<PlanTier> {
        match self {
            PlanTier::Free => None,
            PlanTier::Starter => Some(PlanTier::Free),
            PlanTier::Professional => Some(PlanTier::Starter),
            PlanTier::Enterprise => Some(PlanTier::Professional),
        }
    }

    /// Baseline usage events per active day.
    pub fn daily_events(&self) -> u32 {
        match self {
            PlanTier::Free => 2,
            PlanTier::Starter => 5,
            PlanTier::Professional => 12,
            PlanTier::Enterprise => 20,
        }
    }

    /// Selection weight when a churned user comes back.
    pub fn reactivation_weight(&self) -> f64 {
        match self {
            PlanTier::Free => 0.2,
            PlanTier::Starter => 0.4,
            PlanTier::Professional => 0.3,
            PlanTier::Enterprise => 0.1,
        }
    }
}

categorical! {
    /// How a subscription period ended.
    ChangeType("change type") {
        Active => "active",
        Renewed => "renewed",
        Upgrade => "upgrade",
        Downgrade => "downgrade",
        Churned => "churned",
    }
}

categorical! {
    BillingInterval("billing interval") {
        Monthly => "monthly",
        Annual => "annual",
    }
}

categorical! {
    PaymentStatus("payment status") {
        Succeeded => "succeeded",
        Failed => "failed",
        Refunded => "refunded",
    }
}

categorical! {
    PaymentMethod("payment method") {
        CreditCard => "credit_card",
        DebitCard => "debit_card",
        Paypal => "paypal",
        WireTransfer => "wire_transfer",
    }
}

categorical! {
    /// Client platform an event was recorded on.
    Platform("platform") {
        Web => "web",
        MobileIos => "mobile_ios",
        MobileAndroid => "mobile_android",
        Api => "api",
    }
}

categorical! {
    TouchType("touch type") {
        Impression => "impression",
        Click => "click",
        EmailOpen => "email_open",
        WebinarAttend => "webinar_attend",
    }
}

categorical! {
    ChannelType("channel type") {
        Paid => "paid",
        Organic => "organic",
    }
}

impl ChannelType {
    /// Paid channels are the ones whose name mentions "paid".
    pub fn classify(channel: &str) -> Self {
        if is_paid_channel(channel) {
            ChannelType::Paid
        } else {
            ChannelType::Organic
        }
    }
}

/// Whether acquisition spend is attributed to this channel.
pub fn is_paid_channel(channel: &str) -> bool {
    channel.contains("paid")
}

/// Rounds a monetary amount to cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(with = "date_format")]
    pub signup_date: Date,
    #[serde(with = "timestamp_format")]
    pub signup_timestamp: PrimitiveDateTime,
    pub country: String,
    pub acquisition_channel: String,
    pub initial_plan: PlanTier,
    pub company_size: String,
    pub industry: String,
    pub is_verified: bool,
}

/// One contiguous plan tenure for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub plan: PlanTier,
    pub price: f64,
    #[serde(with = "date_format")]
    pub started_at: Date,
    /// `None` while the period is still in effect at the horizon.
    #[serde(with = "date_format::option")]
    pub ended_at: Option<Date>,
    pub change_type: ChangeType,
    pub billing_interval: BillingInterval,
}

impl Subscription {
    /// The last day covered by this period, using `horizon` for open periods.
    pub fn effective_end(&self, horizon: Date) -> Date {
        self.ended_at.unwrap_or(horizon)
    }

    /// Whole days between start and effective end.
    pub fn duration_days(&self, horizon: Date) -> i64 {
        (self.effective_end(horizon) - self.started_at).whole_days()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: Uuid,
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub currency: String,
    #[serde(with = "date_format")]
    pub payment_date: Date,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub billing_interval: BillingInterval,
}

/// A single product usage event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub event_type: String,
    #[serde(with = "timestamp_format")]
    pub event_timestamp: PrimitiveDateTime,
    /// Session key shared by events grouped into the same session.
    pub session_id: String,
    pub platform: Platform,
    pub page_url: Option<String>,
}

/// Aggregate of the events sharing a `(user_id, session_id)` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub session_id: String,
    #[serde(with = "timestamp_format")]
    pub session_start: PrimitiveDateTime,
    #[serde(with = "timestamp_format")]
    pub session_end: PrimitiveDateTime,
    pub event_count: u32,
    pub platform: Platform,
    pub duration_seconds: i64,
    pub session_id_unique: Uuid,
}

impl Session {
    /// Seconds between the first and last event, excluding reading time.
    pub fn observed_span_seconds(&self) -> i64 {
        (self.session_end - self.session_start).whole_seconds()
    }
}

/// Pre-signup attribution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketingTouch {
    pub touch_id: Uuid,
    pub user_id: Uuid,
    pub campaign: String,
    pub channel: String,
    #[serde(with = "timestamp_format")]
    pub touch_timestamp: PrimitiveDateTime,
    pub touch_type: TouchType,
    pub is_converting_touch: bool,
    pub cost: f64,
}

/// Reference row describing a plan tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDetail {
    pub plan_id: String,
    pub plan_name: PlanTier,
    pub monthly_price: f64,
    pub annual_price: f64,
    pub tier_order: u8,
    pub features: String,
}

/// Reference row describing an acquisition channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDetail {
    pub channel_name: String,
    pub channel_type: ChannelType,
    pub default_cac: f64,
}
