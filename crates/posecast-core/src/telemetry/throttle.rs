//! Telemetry rate limiting
//!
//! At most one sample is emitted per interval. The first tick only seeds the
//! clock, so a session's first sample follows one full interval after it starts.

use std::time::Duration;

use tracing::debug;

use super::gesture::{GestureState, GestureTracker};
use crate::pose::Pose;
use crate::xr::{InputSource, InputSourceId};

/// Minimum spacing between two telemetry samples, in milliseconds
pub const DEFAULT_SEND_INTERVAL_MS: f64 = 100.0;

/// Everything the reporter needs for one outbound report
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    pub timestamp: f64,
    pub pose: Pose,
    /// Live axes of the drag device, if any
    pub gamepad_axes: Option<Vec<f64>>,
    pub drag_start_pose: Option<Pose>,
    pub drag_start_axes: Option<Vec<f64>>,
}

impl TelemetrySample {
    pub fn with_gamepad_axes(mut self, axes: Option<Vec<f64>>) -> Self {
        self.gamepad_axes = axes;
        self
    }
}

#[derive(Debug)]
pub struct TelemetryThrottle {
    interval_ms: f64,
    last_sent: Option<f64>,
    gesture: GestureTracker,
}

impl Default for TelemetryThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_INTERVAL_MS)
    }
}

impl TelemetryThrottle {
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms,
            last_sent: None,
            gesture: GestureTracker::new(),
        }
    }

    pub fn from_interval(interval: Duration) -> Self {
        Self::new(interval.as_secs_f64() * 1000.0)
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn last_sent(&self) -> Option<f64> {
        self.last_sent
    }

    pub fn gesture(&self) -> GestureState {
        self.gesture.state()
    }

    pub fn drag_source(&self) -> Option<InputSourceId> {
        self.gesture.drag_source()
    }

    pub fn on_gesture_start(&mut self, input: &InputSource) {
        debug!(source = input.id.0, "Drag started");
        self.gesture.on_gesture_start(input);
    }

    pub fn on_gesture_end(&mut self) {
        debug!("Drag ended");
        self.gesture.on_gesture_end();
    }

    /// Advance one tick.
    ///
    /// Resolves a pending drag with this tick's pose, then returns a sample
    /// if more than one interval has passed since the last one. Nothing is
    /// emitted, and the clock is not advanced, on ticks without a pose.
    pub fn on_frame_tick(&mut self, timestamp: f64, pose: Option<Pose>) -> Option<TelemetrySample> {
        if self.gesture.resolve(pose.as_ref()) {
            debug!(timestamp, "Drag start pose resolved");
        }

        let Some(last_sent) = self.last_sent else {
            self.last_sent = Some(timestamp);
            return None;
        };

        let pose = pose?;
        if timestamp - last_sent <= self.interval_ms {
            return None;
        }

        self.last_sent = Some(timestamp);
        Some(TelemetrySample {
            timestamp,
            pose,
            gamepad_axes: None,
            drag_start_pose: self.gesture.start_pose().copied(),
            drag_start_axes: self.gesture.start_axes().map(<[f64]>::to_vec),
        })
    }
}
