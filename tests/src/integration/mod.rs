//! # Integration Flows
//!
//! Registry behaviour observed only through its public API.

pub mod telemetry;
