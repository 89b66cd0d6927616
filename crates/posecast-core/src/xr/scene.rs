//! Scene graph boundary

use serde::{Deserialize, Serialize};

use crate::pose::Pose;
use crate::session::Session;

/// Handle to a node owned by the scene graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Commands the core issues to the renderer
///
/// Nodes bound to anchors are only ever added or removed by the anchor
/// lifecycle manager.
pub trait SceneGraph {
    /// Instantiate the object shown at an anchor. The node is not yet part of the scene.
    fn create_anchored_object(&mut self) -> NodeId;

    fn add_node(&mut self, node: NodeId);

    fn remove_node(&mut self, node: NodeId);

    fn set_visible(&mut self, node: NodeId, visible: bool);

    fn set_transform(&mut self, node: NodeId, pose: &Pose);

    /// Show or hide the opaque background (skybox)
    fn set_background_visible(&mut self, visible: bool);

    /// Load controller meshes for the session's input sources
    fn use_profile_controller_meshes(&mut self, session: &Session);

    /// Render one frame from the viewer's pose
    fn draw_frame(&mut self, timestamp: f64, viewer_pose: Option<&Pose>);
}
