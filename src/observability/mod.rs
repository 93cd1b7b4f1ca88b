//! Observability subsystem
//!
//! - Structured logging through `tracing`, every line tagged with an [`Event`]
//! - Deterministic counters in a [`MetricsRegistry`]
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. No background threads
//!
//! # Usage
//!
//! ```ignore
//! use aeroqp::observability::{Event, MetricsRegistry};
//!
//! tracing::debug!(event = Event::CursorOpened.as_str(), "index scan opened");
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_cursors_opened();
//! ```

mod events;
mod metrics;

pub use events::Event;
pub use metrics::{MetricsRegistry, MetricsSnapshot};
