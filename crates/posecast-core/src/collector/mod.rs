//! Receiving side of the telemetry endpoint
//!
//! Authenticates incoming report bodies, decodes them and feeds them into
//! a [`DragComposer`]. Transport-agnostic; the CLI mounts it behind HTTP.

pub mod auth;
pub mod drag;

pub use auth::{AuthRejection, ReportAuthenticator};
pub use drag::{ComposedPose, DragComposer, DragUpdate};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pose::Pose;
use crate::telemetry::ReportPayload;

/// Why the collector refused a report
#[derive(Debug, Error, PartialEq)]
pub enum Rejection {
    #[error("{0}")]
    Auth(AuthRejection),

    #[error("malformed report: {0}")]
    Malformed(String),
}

impl Rejection {
    pub fn status_code(&self) -> u16 {
        match self {
            Rejection::Auth(auth) => auth.status_code(),
            Rejection::Malformed(_) => 400,
        }
    }

    /// Status string returned to the client
    pub fn status(&self) -> String {
        match self {
            Rejection::Auth(auth) => auth.as_str().to_string(),
            Rejection::Malformed(_) => "malformed report".to_string(),
        }
    }
}

/// An accepted report
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    /// Count of accepted reports, starting at 1
    pub sequence: u64,
    pub pose: Pose,
    pub update: DragUpdate,
}

#[derive(Debug, Default)]
pub struct ReportCollector {
    auth: ReportAuthenticator,
    composer: DragComposer,
    accepted: u64,
    rejected: u64,
}

impl ReportCollector {
    pub fn new(auth: ReportAuthenticator) -> Self {
        Self {
            auth,
            ..Default::default()
        }
    }

    pub fn authenticator(&self) -> &ReportAuthenticator {
        &self.auth
    }

    pub fn composer(&self) -> &DragComposer {
        &self.composer
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Authenticate, decode and apply one report body
    pub fn receive(&mut self, authorization: Option<&str>, body: &[u8]) -> Result<Receipt, Rejection> {
        if let Err(rejection) = self.auth.check(authorization, body) {
            self.rejected += 1;
            warn!(reason = rejection.as_str(), "Rejected report");
            return Err(Rejection::Auth(rejection));
        }

        let report: ReportPayload = match serde_json::from_slice(body) {
            Ok(report) => report,
            Err(e) => {
                self.rejected += 1;
                warn!(error = %e, "Rejected undecodable report");
                return Err(Rejection::Malformed(e.to_string()));
            }
        };

        self.accepted += 1;
        let pose = report.pose();
        let update = self.composer.apply(&report);
        match &update {
            DragUpdate::Dragging(handle) => debug!(
                sequence = self.accepted,
                x = handle.pose.position.x,
                y = handle.pose.position.y,
                z = handle.pose.position.z,
                "Drag update"
            ),
            DragUpdate::Ended(handle) => info!(
                sequence = self.accepted,
                x = handle.pose.position.x,
                y = handle.pose.position.y,
                z = handle.pose.position.z,
                "Drag ended"
            ),
            DragUpdate::Idle => debug!(sequence = self.accepted, "Pose received"),
        }

        Ok(Receipt {
            sequence: self.accepted,
            pose,
            update,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RequestSigner;

    const BODY: &str = r#"{"position":{"x":0.5,"y":1.6,"z":-0.2},"orientation":{"x":0.0,"y":0.0,"z":0.0,"w":1.0}}"#;

    #[test]
    fn test_open_collector_accepts_report() {
        let mut collector = ReportCollector::default();
        let receipt = collector.receive(None, BODY.as_bytes()).unwrap();
        assert_eq!(receipt.sequence, 1);
        assert_eq!(receipt.pose.position.x, 0.5);
        assert_eq!(receipt.update, DragUpdate::Idle);
    }

    #[test]
    fn test_signed_collector_checks_header() {
        let signer = RequestSigner::new("abc").unwrap();
        let mut collector = ReportCollector::new(ReportAuthenticator::new(Some(signer.clone())));

        let err = collector.receive(None, BODY.as_bytes()).unwrap_err();
        assert_eq!(err, Rejection::Auth(AuthRejection::MissingHmac));
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.status(), "missing hmac");

        let header = signer.authorization(BODY.as_bytes()).unwrap();
        assert!(collector.receive(Some(&header), BODY.as_bytes()).is_ok());
        assert_eq!(collector.accepted(), 1);
        assert_eq!(collector.rejected(), 1);
    }

    #[test]
    fn test_malformed_body() {
        let mut collector = ReportCollector::default();
        let err = collector.receive(None, b"{\"position\":").unwrap_err();
        assert!(matches!(err, Rejection::Malformed(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_drag_reports_flow_into_composer() {
        let mut collector = ReportCollector::default();
        let drag = r#"{"position":{"x":1.0,"y":0.0,"z":0.0},"orientation":{"x":0.0,"y":0.0,"z":0.0,"w":1.0},
            "dragStartPosition":{"x":0.0,"y":0.0,"z":0.0},"dragStartOrientation":{"x":0.0,"y":0.0,"z":0.0,"w":1.0},
            "gamepadAxes":[0.5,0.0],"dragStartGamepadAxes":[0.0,0.0]}"#;

        let receipt = collector.receive(None, drag.as_bytes()).unwrap();
        let DragUpdate::Dragging(handle) = receipt.update else {
            panic!("expected drag");
        };
        assert_eq!(handle.gamepad_axes, vec![0.5, 0.0]);
        assert!(collector.composer().is_dragging());

        let receipt = collector.receive(None, BODY.as_bytes()).unwrap();
        assert!(matches!(receipt.update, DragUpdate::Ended(_)));
    }
}
