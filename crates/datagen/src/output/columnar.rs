//! Arrow record batches for the entity tables.
//!
//! Dates are `Date32` (days since the Unix epoch), timestamps are
//! `Timestamp(Second)` without a zone, identifiers and categorical columns
//! are UTF-8.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
    TimestampSecondArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use time::macros::date;
use time::{Date, PrimitiveDateTime};
use uuid::Uuid;

use metricflow::{Event, MarketingTouch, Payment, Session, Subscription, User};

const EPOCH: Date = date!(1970 - 01 - 01);

/// A row type that can be laid out as one Arrow record batch.
pub trait ArrowRecord: Sized {
    fn schema() -> SchemaRef;

    fn columns(rows: &[Self]) -> Vec<ArrayRef>;

    /// Builds a batch holding every row.
    fn record_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(Self::schema(), Self::columns(rows))
    }
}

fn field(name: &str, data_type: DataType) -> Field {
    Field::new(name, data_type, false)
}

fn nullable(name: &str, data_type: DataType) -> Field {
    Field::new(name, data_type, true)
}

fn timestamp() -> DataType {
    DataType::Timestamp(TimeUnit::Second, None)
}

fn days_since_epoch(date: Date) -> i32 {
    (date - EPOCH).whole_days() as i32
}

fn unix_seconds(ts: PrimitiveDateTime) -> i64 {
    ts.assume_utc().unix_timestamp()
}

fn uuids<T>(rows: &[T], get: impl Fn(&T) -> Uuid) -> ArrayRef {
    Arc::new(StringArray::from_iter_values(
        rows.iter().map(|r| get(r).hyphenated().to_string()),
    ))
}

fn strings<'a, T: 'a>(rows: &'a [T], get: impl Fn(&'a T) -> &'a str) -> ArrayRef {
    Arc::new(StringArray::from_iter_values(rows.iter().map(get)))
}

fn floats<T>(rows: &[T], get: impl Fn(&T) -> f64) -> ArrayRef {
    Arc::new(Float64Array::from_iter_values(rows.iter().map(get)))
}

fn dates<T>(rows: &[T], get: impl Fn(&T) -> Date) -> ArrayRef {
    Arc::new(Date32Array::from_iter_values(
        rows.iter().map(|r| days_since_epoch(get(r))),
    ))
}

fn timestamps<T>(rows: &[T], get: impl Fn(&T) -> PrimitiveDateTime) -> ArrayRef {
    Arc::new(TimestampSecondArray::from_iter_values(
        rows.iter().map(|r| unix_seconds(get(r))),
    ))
}

fn booleans<T>(rows: &[T], get: impl Fn(&T) -> bool) -> ArrayRef {
    Arc::new(rows.iter().map(|r| Some(get(r))).collect::<BooleanArray>())
}

impl ArrowRecord for User {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            field("user_id", DataType::Utf8),
            field("email", DataType::Utf8),
            field("name", DataType::Utf8),
            field("signup_date", DataType::Date32),
            field("signup_timestamp", timestamp()),
            field("country", DataType::Utf8),
            field("acquisition_channel", DataType::Utf8),
            field("initial_plan", DataType::Utf8),
            field("company_size", DataType::Utf8),
            field("industry", DataType::Utf8),
            field("is_verified", DataType::Boolean),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            uuids(rows, |r| r.user_id),
            strings(rows, |r| &r.email),
            strings(rows, |r| &r.name),
            dates(rows, |r| r.signup_date),
            timestamps(rows, |r| r.signup_timestamp),
            strings(rows, |r| &r.country),
            strings(rows, |r| &r.acquisition_channel),
            strings(rows, |r| r.initial_plan.as_str()),
            strings(rows, |r| &r.company_size),
            strings(rows, |r| &r.industry),
            booleans(rows, |r| r.is_verified),
        ]
    }
}

impl ArrowRecord for Subscription {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            field("subscription_id", DataType::Utf8),
            field("user_id", DataType::Utf8),
            field("plan", DataType::Utf8),
            field("price", DataType::Float64),
            field("started_at", DataType::Date32),
            nullable("ended_at", DataType::Date32),
            field("change_type", DataType::Utf8),
            field("billing_interval", DataType::Utf8),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        let ended_at: Date32Array = rows
            .iter()
            .map(|r| r.ended_at.map(days_since_epoch))
            .collect();
        vec![
            uuids(rows, |r| r.subscription_id),
            uuids(rows, |r| r.user_id),
            strings(rows, |r| r.plan.as_str()),
            floats(rows, |r| r.price),
            dates(rows, |r| r.started_at),
            Arc::new(ended_at),
            strings(rows, |r| r.change_type.as_str()),
            strings(rows, |r| r.billing_interval.as_str()),
        ]
    }
}

impl ArrowRecord for Payment {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            field("payment_id", DataType::Utf8),
            field("subscription_id", DataType::Utf8),
            field("user_id", DataType::Utf8),
            field("amount", DataType::Float64),
            field("currency", DataType::Utf8),
            field("payment_date", DataType::Date32),
            field("payment_method", DataType::Utf8),
            field("status", DataType::Utf8),
            field("billing_interval", DataType::Utf8),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            uuids(rows, |r| r.payment_id),
            uuids(rows, |r| r.subscription_id),
            uuids(rows, |r| r.user_id),
            floats(rows, |r| r.amount),
            strings(rows, |r| &r.currency),
            dates(rows, |r| r.payment_date),
            strings(rows, |r| r.payment_method.as_str()),
            strings(rows, |r| r.status.as_str()),
            strings(rows, |r| r.billing_interval.as_str()),
        ]
    }
}

impl ArrowRecord for Event {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            field("event_id", DataType::Utf8),
            field("user_id", DataType::Utf8),
            field("event_type", DataType::Utf8),
            field("event_timestamp", timestamp()),
            field("session_id", DataType::Utf8),
            field("platform", DataType::Utf8),
            nullable("page_url", DataType::Utf8),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        let page_url: StringArray = rows.iter().map(|r| r.page_url.as_deref()).collect();
        vec![
            uuids(rows, |r| r.event_id),
            uuids(rows, |r| r.user_id),
            strings(rows, |r| &r.event_type),
            timestamps(rows, |r| r.event_timestamp),
            strings(rows, |r| &r.session_id),
            strings(rows, |r| r.platform.as_str()),
            Arc::new(page_url),
        ]
    }
}

impl ArrowRecord for Session {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            field("user_id", DataType::Utf8),
            field("session_id", DataType::Utf8),
            field("session_start", timestamp()),
            field("session_end", timestamp()),
            field("event_count", DataType::UInt32),
            field("platform", DataType::Utf8),
            field("duration_seconds", DataType::Int64),
            field("session_id_unique", DataType::Utf8),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            uuids(rows, |r| r.user_id),
            strings(rows, |r| &r.session_id),
            timestamps(rows, |r| r.session_start),
            timestamps(rows, |r| r.session_end),
            Arc::new(UInt32Array::from_iter_values(
                rows.iter().map(|r| r.event_count),
            )),
            strings(rows, |r| r.platform.as_str()),
            Arc::new(Int64Array::from_iter_values(
                rows.iter().map(|r| r.duration_seconds),
            )),
            uuids(rows, |r| r.session_id_unique),
        ]
    }
}

impl ArrowRecord for MarketingTouch {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            field("touch_id", DataType::Utf8),
            field("user_id", DataType::Utf8),
            field("campaign", DataType::Utf8),
            field("channel", DataType::Utf8),
            field("touch_timestamp", timestamp()),
            field("touch_type", DataType::Utf8),
            field("is_converting_touch", DataType::Boolean),
            field("cost", DataType::Float64),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            uuids(rows, |r| r.touch_id),
            uuids(rows, |r| r.user_id),
            strings(rows, |r| &r.campaign),
            strings(rows, |r| &r.channel),
            timestamps(rows, |r| r.touch_timestamp),
            strings(rows, |r| r.touch_type.as_str()),
            booleans(rows, |r| r.is_converting_touch),
            floats(rows, |r| r.cost),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use metricflow::{BillingInterval, ChangeType, PlanTier, Platform};
    use time::macros::datetime;

    #[test]
    fn test_epoch_conversions() {
        assert_eq!(days_since_epoch(date!(1970 - 01 - 01)), 0);
        assert_eq!(days_since_epoch(date!(2024 - 01 - 01)), 19_723);
        assert_eq!(unix_seconds(datetime!(1970-01-02 00:00:01)), 86_401);
    }

    #[test]
    fn test_subscription_batch_keeps_open_periods_null() {
        let rows = vec![
            Subscription {
                subscription_id: Uuid::from_u128(1),
                user_id: Uuid::from_u128(2),
                plan: PlanTier::Starter,
                price: 29.0,
                started_at: date!(2024 - 01 - 01),
                ended_at: Some(date!(2024 - 03 - 01)),
                change_type: ChangeType::Upgrade,
                billing_interval: BillingInterval::Monthly,
            },
            Subscription {
                subscription_id: Uuid::from_u128(3),
                user_id: Uuid::from_u128(2),
                plan: PlanTier::Professional,
                price: 79.0,
                started_at: date!(2024 - 03 - 01),
                ended_at: None,
                change_type: ChangeType::Active,
                billing_interval: BillingInterval::Annual,
            },
        ];

        let batch = Subscription::record_batch(&rows).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 8);

        let ended_at = batch.column_by_name("ended_at").unwrap();
        assert_eq!(ended_at.null_count(), 1);
        assert!(ended_at.is_null(1));

        let plan = batch
            .column_by_name("plan")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(plan.value(1), "professional");
    }

    #[test]
    fn test_event_batch_optional_page() {
        let rows = vec![Event {
            event_id: Uuid::from_u128(9),
            user_id: Uuid::from_u128(2),
            event_type: "api_call".into(),
            event_timestamp: datetime!(2024-05-01 12:30:00),
            session_id: "abc123def456".into(),
            platform: Platform::Api,
            page_url: None,
        }];

        let batch = Event::record_batch(&rows).unwrap();
        assert!(batch.column_by_name("page_url").unwrap().is_null(0));
        let user_id = batch
            .column_by_name("user_id")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(user_id.value(0), Uuid::from_u128(2).hyphenated().to_string());
    }

    #[test]
    fn test_empty_batch() {
        let batch = Session::record_batch(&[]).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.schema(), Session::schema());
    }
}
