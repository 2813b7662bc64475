//! Utilities shared by the lock engines and policies.

pub mod backoff;
pub mod rng;
pub mod thread;

pub use backoff::{delay, random_delay, yield_now};
pub use rng::{BackoffRng, random_interval};
