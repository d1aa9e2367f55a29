//! # Stress Tests
//!
//! Many publishers and listeners hammering one registry. These validate the
//! sequencing and capacity guarantees under contention rather than timing.

pub mod concurrent_publish;
