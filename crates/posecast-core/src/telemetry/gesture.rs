//! Drag gesture tracking
//!
//! A drag starts on press and ends on release. The start pose cannot be
//! sampled inside the event callback, so a start leaves the gesture
//! `Pending` until the next tick that has a viewer pose.

use crate::pose::Pose;
use crate::xr::{InputSource, InputSourceId};

/// State of the single active drag
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Absent,
    /// Started, waiting for the first tick with a pose
    Pending,
    /// Started at this pose
    Resolved(Pose),
}

impl GestureState {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

#[derive(Debug, Default)]
pub struct GestureTracker {
    state: GestureState,
    start_axes: Option<Vec<f64>>,
    /// Device of the most recent drag. Kept after release so its live axes
    /// keep being reported.
    source: Option<InputSourceId>,
}

impl GestureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Begin a drag, replacing any drag already in progress.
    ///
    /// The gamepad axes carried by `input` are the snapshot taken when the
    /// press happened.
    pub fn on_gesture_start(&mut self, input: &InputSource) {
        self.state = GestureState::Pending;
        self.start_axes = Some(input.gamepad_axes.clone().unwrap_or_default());
        self.source = Some(input.id);
    }

    pub fn on_gesture_end(&mut self) {
        self.state = GestureState::Absent;
        self.start_axes = None;
    }

    /// Resolve a pending start with this tick's pose. Returns true if it resolved.
    pub fn resolve(&mut self, pose: Option<&Pose>) -> bool {
        match (self.state, pose) {
            (GestureState::Pending, Some(pose)) => {
                self.state = GestureState::Resolved(*pose);
                true
            }
            _ => false,
        }
    }

    pub fn start_pose(&self) -> Option<&Pose> {
        match &self.state {
            GestureState::Resolved(pose) => Some(pose),
            _ => None,
        }
    }

    pub fn start_axes(&self) -> Option<&[f64]> {
        self.start_axes.as_deref()
    }

    pub fn drag_source(&self) -> Option<InputSourceId> {
        self.source
    }
}
