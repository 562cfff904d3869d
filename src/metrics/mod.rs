//! Metrics and observability infrastructure for tailstat.
//!
//! - `events`: internal event types and the `InternalEvent` trait
//! - `server`: Prometheus HTTP endpoint and initialization

pub mod events;
pub mod server;

pub use server::{MetricsError, init};

/// Emit an internal event as a Prometheus metric.
///
/// ```ignore
/// use tailstat::metrics::events::RecordsParsed;
///
/// emit!(RecordsParsed { count: 1 });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
