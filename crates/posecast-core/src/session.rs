//! Session entity
//!
//! A session is one immersive or inline interaction context. Its mode is an
//! explicit tag on the owned entity, so every component can ask whether it
//! is immersive without consulting the host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::xr::ReferenceSpace;

/// Presentation mode of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Passthrough AR; the real world shows behind the scene
    ImmersiveAr,
    /// Fully rendered VR
    ImmersiveVr,
    /// Rendered into a page/window, viewer-relative
    Inline,
}

impl SessionMode {
    pub fn is_immersive(&self) -> bool {
        !matches!(self, Self::Inline)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImmersiveAr => "immersive-ar",
            Self::ImmersiveVr => "immersive-vr",
            Self::Inline => "inline",
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Starting,
    Active,
    Ended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Ended => "ended",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One interaction context, owned by the frame driver for its duration
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub mode: SessionMode,
    state: SessionState,
    reference_space: Option<ReferenceSpace>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(mode: SessionMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            state: SessionState::Starting,
            reference_space: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_immersive(&self) -> bool {
        self.mode.is_immersive()
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn has_ended(&self) -> bool {
        self.state == SessionState::Ended
    }

    pub fn reference_space(&self) -> Option<&ReferenceSpace> {
        self.reference_space.as_ref()
    }

    /// Move to `Active` once the reference space is known.
    ///
    /// Returns false if the session already ended; a late negotiation result
    /// must not revive it.
    pub fn activate(&mut self, space: ReferenceSpace) -> bool {
        if self.state != SessionState::Starting {
            return false;
        }
        self.reference_space = Some(space);
        self.state = SessionState::Active;
        true
    }

    /// Move to `Ended`. Returns false if it had already ended.
    pub fn end(&mut self) -> bool {
        if self.state == SessionState::Ended {
            return false;
        }
        self.state = SessionState::Ended;
        self.ended_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xr::ReferenceSpaceKind;

    #[test]
    fn test_lifecycle_is_one_way() {
        let mut session = Session::new(SessionMode::ImmersiveAr);
        assert_eq!(session.state(), SessionState::Starting);

        assert!(session.activate(ReferenceSpace::new(1, ReferenceSpaceKind::Local)));
        assert!(session.is_active());
        assert!(!session.activate(ReferenceSpace::new(2, ReferenceSpaceKind::Local)));
        assert_eq!(session.reference_space().unwrap().id, 1);

        assert!(session.end());
        assert!(session.has_ended());
        assert!(session.ended_at.is_some());
        assert!(!session.end());
    }

    #[test]
    fn test_ended_session_cannot_be_activated() {
        let mut session = Session::new(SessionMode::Inline);
        session.end();
        assert!(!session.activate(ReferenceSpace::new(1, ReferenceSpaceKind::Viewer)));
        assert!(session.reference_space().is_none());
    }

    #[test]
    fn test_mode_tags() {
        assert!(SessionMode::ImmersiveAr.is_immersive());
        assert!(SessionMode::ImmersiveVr.is_immersive());
        assert!(!SessionMode::Inline.is_immersive());
        assert_eq!(SessionMode::ImmersiveVr.to_string(), "immersive-vr");
        assert_eq!(
            serde_json::to_string(&SessionMode::ImmersiveAr).unwrap(),
            "\"immersive-ar\""
        );
    }
}
