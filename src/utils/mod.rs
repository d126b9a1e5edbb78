//! # Utility Modules
//!
//! Supporting utilities for logging and observability.
//!
//! ## Components
//! - **Logging**: subscriber set-up and the `debugf!` verbosity gate
//! - **Metrics**: per-family relaxed atomic counters and timing

pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
