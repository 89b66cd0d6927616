//! Posecast Core Library
//!
//! This crate provides the per-frame tracking and telemetry pipeline of an
//! immersive session, including:
//! - Anchor lifecycle (bounded pool, reconciliation against tracked anchors)
//! - Telemetry throttling and drag gesture tracking
//! - Pose reporting over a single in-flight, HMAC-signed transport
//! - The frame driver tying them together
//! - The receiving collector (signature checks, drag composition)
//! - Configuration

pub mod pose;
pub mod session;
pub mod xr;
pub mod anchors;
pub mod telemetry;
pub mod transport;
pub mod driver;
pub mod collector;
pub mod config;
pub mod error;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::anchors::{AnchorLifecycleManager, AnchorPool, MAX_ANCHORED_OBJECTS};
    pub use crate::config::Config;
    pub use crate::driver::{DriverSettings, EventSender, FrameDriver, FrameRequest, FrameSource};
    pub use crate::error::{Error, Result};
    pub use crate::pose::{Orientation, Pose, Position};
    pub use crate::session::{Session, SessionMode, SessionState};
    pub use crate::telemetry::{PoseReporter, ReportOutcome, TelemetryThrottle};
    pub use crate::transport::{HttpTransport, RequestSigner, SendOutcome, Transport, TransportGuard};
    pub use crate::xr::{
        AnchorId, DeviceCapabilities, InputSource, ReferenceSpace, SceneGraph, TrackingSubsystem, XrFrame,
    };
}
