//! Seeded random streams.
//!
//! Every generator draws from its own stream, derived from the master seed
//! and a stable slot. Changing how many values one generator draws never
//! shifts the values another generator sees.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use uuid::Uuid;

/// RNG type used by every generator.
pub type StreamRng = Pcg64Mcg;

/// Stable stream slot assignments.
/// Append only: reordering changes every stream's seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum Stream {
    Users = 0,
    Subscriptions = 1,
    Payments = 2,
    Events = 3,
    Sessions = 4,
    Marketing = 5,
    Reference = 6,
}

impl Stream {
    pub fn name(&self) -> &'static str {
        match self {
            Stream::Users => "users",
            Stream::Subscriptions => "subscriptions",
            Stream::Payments => "payments",
            Stream::Events => "events",
            Stream::Sessions => "sessions",
            Stream::Marketing => "marketing",
            Stream::Reference => "reference",
        }
    }
}

/// Hands out one deterministic RNG per stream for a single run.
#[derive(Debug, Clone, Copy)]
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Fresh RNG for a stream. Calling twice yields two identical streams.
    pub fn stream(&self, stream: Stream) -> StreamRng {
        let derived = self.master_seed ^ (stream as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        tracing::debug!(stream = stream.name(), derived_seed = derived, "Derived RNG stream");
        Pcg64Mcg::seed_from_u64(derived)
    }
}

/// Random v4 UUID drawn from `rng` instead of the OS.
pub fn random_uuid(rng: &mut impl Rng) -> Uuid {
    uuid::Builder::from_random_bytes(rng.r#gen()).into_uuid()
}
