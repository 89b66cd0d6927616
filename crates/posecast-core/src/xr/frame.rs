//! Per-tick frame view and the handles it hands out

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::pose::Pose;

/// Opaque handle to an anchor maintained by the tracking subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnchorId(pub u64);

impl std::fmt::Display for AnchorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "anchor-{}", self.0)
    }
}

/// Kind of coordinate frame requested from the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSpaceKind {
    /// Fixed to the position where tracking started; used by immersive sessions
    Local,
    /// Fixed to the viewer; used by inline sessions
    Viewer,
}

/// Handle to a negotiated reference space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSpace {
    pub id: u64,
    pub kind: ReferenceSpaceKind,
}

impl ReferenceSpace {
    pub fn new(id: u64, kind: ReferenceSpaceKind) -> Self {
        Self { id, kind }
    }
}

/// Identity of an input device within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputSourceId(pub u32);

/// How an input source points at things
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetRayMode {
    Gaze,
    TrackedPointer,
    /// A 2D screen tap; it has no meaningful spatial ray
    Screen,
    TransientPointer,
}

impl TargetRayMode {
    /// Whether the ray comes from a device tracked in space
    pub fn is_spatial(&self) -> bool {
        !matches!(self, Self::Screen)
    }
}

/// Input device as seen by an event callback
///
/// `gamepad_axes` is the snapshot taken when the event fired; live values are
/// only available through [`XrFrame::gamepad_axes`].
#[derive(Debug, Clone, PartialEq)]
pub struct InputSource {
    pub id: InputSourceId,
    pub target_ray_mode: TargetRayMode,
    pub gamepad_axes: Option<Vec<f64>>,
}

impl InputSource {
    pub fn new(id: u32, target_ray_mode: TargetRayMode) -> Self {
        Self {
            id: InputSourceId(id),
            target_ray_mode,
            gamepad_axes: None,
        }
    }

    pub fn with_axes(mut self, axes: Vec<f64>) -> Self {
        self.gamepad_axes = Some(axes);
        self
    }
}

/// One tick of the host runtime
///
/// Queries are only valid for the duration of the tick that produced the frame.
pub trait XrFrame {
    /// Monotonic timestamp in milliseconds
    fn timestamp(&self) -> f64;

    /// Pose of the viewer, or `None` when tracking is lost
    fn viewer_pose(&self, space: &ReferenceSpace) -> Option<Pose>;

    /// Anchors tracked this tick. `None` means the runtime reported nothing at
    /// all, which is treated as every previously tracked anchor being lost.
    fn tracked_anchors(&self) -> Option<BTreeSet<AnchorId>>;

    /// Pose of an anchor, or `None` when it is occluded or not localized
    fn anchor_pose(&self, anchor: AnchorId, space: &ReferenceSpace) -> Option<Pose>;

    /// Pose of an input source's target ray
    fn input_pose(&self, source: InputSourceId, space: &ReferenceSpace) -> Option<Pose>;

    /// Live gamepad axes of an input source
    fn gamepad_axes(&self, source: InputSourceId) -> Option<Vec<f64>>;
}
