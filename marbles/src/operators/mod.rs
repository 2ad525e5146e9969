//! Operators run through the harness.
//!
//! An operator takes an upstream observable and returns a new one. On
//! subscribe it attaches to upstream with a child of the downstream
//! subscription, so unsubscribing downstream tears down upstream in the
//! same call.

mod take;
mod time_interval;

pub use take::take;
pub use time_interval::{TimeInterval, time_interval};
