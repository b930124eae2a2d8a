//! Metrics for chunkload runs.
//!
//! - `events`: Internal event types and the `InternalEvent` trait
//! - `exporter`: Prometheus textfile export

pub mod events;
pub mod exporter;

pub use exporter::TextfileExporter;

/// Emit an internal event.
///
/// This macro calls the `InternalEvent::emit()` method on the given event,
/// which records the corresponding metric.
///
/// # Example
///
/// ```ignore
/// use chunkload::metrics::events::RowsSplit;
///
/// emit!(RowsSplit { count: 100 });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
