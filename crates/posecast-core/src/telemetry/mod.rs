//! Pose telemetry
//!
//! The throttle decides once per tick whether a sample is due and tracks the
//! drag gesture; the reporter turns samples into report bodies and hands
//! them to the transport guard.

pub mod gesture;
pub mod payload;
pub mod reporter;
pub mod throttle;

pub use gesture::{GestureState, GestureTracker};
pub use payload::ReportPayload;
pub use reporter::{PoseReporter, ReportOutcome, TelemetryCounts, TelemetryStats};
pub use throttle::{DEFAULT_SEND_INTERVAL_MS, TelemetrySample, TelemetryThrottle};
