//! Tracking subsystem boundary

use async_trait::async_trait;

use super::frame::{AnchorId, ReferenceSpace, ReferenceSpaceKind};
use crate::error::Result;
use crate::pose::Pose;

/// Session-level tracking calls that resolve asynchronously
#[async_trait]
pub trait TrackingSubsystem: Send + Sync {
    /// Negotiate a reference space of the given kind
    async fn request_reference_space(&self, kind: ReferenceSpaceKind) -> Result<ReferenceSpace>;

    /// Ask the runtime to start tracking a new anchor at `pose` in `space`
    async fn create_anchor(&self, pose: Pose, space: ReferenceSpace) -> Result<AnchorId>;

    /// Stop tracking an anchor and release its handle
    fn release_anchor(&self, anchor: AnchorId);
}
