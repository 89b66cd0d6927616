//! Boundaries to the host XR runtime
//!
//! The core never renders or tracks anything itself. It talks to four
//! collaborators supplied by the host:
//! - [`XrFrame`]: per-tick queries (viewer pose, tracked anchors, anchor poses)
//! - [`TrackingSubsystem`]: session-level async calls (reference spaces, anchor creation)
//! - [`SceneGraph`]: add/remove/show/hide/move scene objects and draw
//! - [`DeviceCapabilities`]: which immersive modes the device supports

mod capability;
mod frame;
mod scene;
mod tracking;

pub use capability::{DeviceCapabilities, select_immersive_mode};
pub use frame::{AnchorId, InputSource, InputSourceId, ReferenceSpace, ReferenceSpaceKind, TargetRayMode, XrFrame};
pub use scene::{NodeId, SceneGraph};
pub use tracking::TrackingSubsystem;
