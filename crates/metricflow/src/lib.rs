//! Schema types for the MetricFlow SaaS analytics dataset.
//!
//! Every table the generator writes has a row type in [`models`]; the
//! warehouse loader and model pipelines read those columns verbatim.

pub mod errors;
pub mod models;

pub use errors::ModelError;
pub use models::{
    BillingInterval, ChangeType, ChannelDetail, ChannelType, Event, MarketingTouch, Payment,
    PaymentMethod, PaymentStatus, PlanDetail, PlanTier, Platform, Session, Subscription,
    TouchType, User,
};
