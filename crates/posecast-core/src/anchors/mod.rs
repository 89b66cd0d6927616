//! Spatial anchors and the scene objects bound to them

pub mod manager;
pub mod pool;

pub use manager::{AnchorLifecycleManager, ReconcileReport, SCREEN_PLACEMENT_DISTANCE_M};
pub use pool::{AnchorPool, AnchorRecord, MAX_ANCHORED_OBJECTS};
