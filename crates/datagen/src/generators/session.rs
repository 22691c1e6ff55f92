//! Session aggregation over generated events.

use std::collections::BTreeMap;

use rand::Rng;
use rand_distr::{Distribution, Exp};
use time::PrimitiveDateTime;
use uuid::Uuid;

use metricflow::{Event, Platform, Session};

use crate::config::ConfigError;
use crate::rng::random_uuid;

/// Mean synthetic reading time added on top of the observed event span.
pub const MEAN_READING_SECONDS: f64 = 120.0;

#[derive(Debug)]
struct SessionAccumulator {
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
    count: u32,
    platform: Platform,
}

/// Groups events into sessions by `(user_id, session_id)`.
pub struct SessionAggregator {
    reading_time: Exp<f64>,
}

impl SessionAggregator {
    pub fn new() -> Result<Self, ConfigError> {
        let reading_time = Exp::new(1.0 / MEAN_READING_SECONDS)
            .map_err(|e| ConfigError::Distribution(e.to_string()))?;
        Ok(Self { reading_time })
    }

    /// Aggregates events into sessions sorted by key.
    ///
    /// The session platform is the platform of the group's first event in
    /// input order. Duration is the observed span plus exponential reading
    /// time, truncated to whole seconds.
    pub fn aggregate(&self, events: &[Event], rng: &mut impl Rng) -> Vec<Session> {
        let mut groups: BTreeMap<(Uuid, &str), SessionAccumulator> = BTreeMap::new();

        for event in events {
            groups
                .entry((event.user_id, event.session_id.as_str()))
                .and_modify(|acc| {
                    acc.start = acc.start.min(event.event_timestamp);
                    acc.end = acc.end.max(event.event_timestamp);
                    acc.count += 1;
                })
                .or_insert(SessionAccumulator {
                    start: event.event_timestamp,
                    end: event.event_timestamp,
                    count: 1,
                    platform: event.platform,
                });
        }

        groups
            .into_iter()
            .map(|((user_id, session_id), acc)| {
                let span = (acc.end - acc.start).as_seconds_f64();
                let reading = self.reading_time.sample(rng);
                Session {
                    user_id,
                    session_id: session_id.to_string(),
                    session_start: acc.start,
                    session_end: acc.end,
                    event_count: acc.count,
                    platform: acc.platform,
                    duration_seconds: (span + reading) as i64,
                    session_id_unique: random_uuid(rng),
                }
            })
            .collect()
    }
}
