//! End-to-end scenarios driving the complete harness.
//!
//! Each file covers one area, using fixed diagrams or seeded generators so
//! every run is reproducible.

#![cfg(test)]

mod helpers;

mod test_assertions;
mod test_determinism;
mod test_hot_cold;
mod test_properties;
mod test_time_interval;
mod test_unsubscribe;
