//! Device capability probing

use async_trait::async_trait;
use tracing::{debug, info};

use crate::session::SessionMode;

#[async_trait]
pub trait DeviceCapabilities: Send + Sync {
    async fn is_session_supported(&self, mode: SessionMode) -> bool;
}

/// Pick the immersive mode to offer the user.
///
/// With `prefer_ar`, AR wins whenever it is available; otherwise VR is tried
/// first. Returns `None` when neither is supported.
pub async fn select_immersive_mode(
    capabilities: &dyn DeviceCapabilities,
    prefer_ar: bool,
) -> Option<SessionMode> {
    let order = if prefer_ar {
        [SessionMode::ImmersiveAr, SessionMode::ImmersiveVr]
    } else {
        [SessionMode::ImmersiveVr, SessionMode::ImmersiveAr]
    };

    for mode in order {
        if capabilities.is_session_supported(mode).await {
            info!(mode = %mode, "Selected immersive mode");
            return Some(mode);
        }
        debug!(mode = %mode, "Immersive mode not supported");
    }

    None
}
