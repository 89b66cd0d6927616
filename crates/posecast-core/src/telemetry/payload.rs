//! Report body sent to `POST /api/report`

use serde::{Deserialize, Serialize};

use super::throttle::TelemetrySample;
use crate::error::{Error, Result};
use crate::pose::{Orientation, Pose, Position};

/// JSON report body. Absent optional fields are omitted, not sent as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub position: Position,
    pub orientation: Orientation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamepad_axes: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drag_start_position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drag_start_orientation: Option<Orientation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drag_start_gamepad_axes: Option<Vec<f64>>,
}

impl From<&TelemetrySample> for ReportPayload {
    fn from(sample: &TelemetrySample) -> Self {
        Self {
            position: sample.pose.position,
            orientation: sample.pose.orientation,
            gamepad_axes: sample.gamepad_axes.clone(),
            drag_start_position: sample.drag_start_pose.map(|p| p.position),
            drag_start_orientation: sample.drag_start_pose.map(|p| p.orientation),
            drag_start_gamepad_axes: sample.drag_start_axes.clone(),
        }
    }
}

impl ReportPayload {
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.orientation)
    }

    /// Start pose of the drag this report belongs to, if one is in progress
    pub fn drag_start_pose(&self) -> Option<Pose> {
        match (self.drag_start_position, self.drag_start_orientation) {
            (Some(position), Some(orientation)) => Some(Pose::new(position, orientation)),
            _ => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_start_pose().is_some()
    }

    /// Serialize to the exact bytes that get signed and sent.
    ///
    /// Non-finite numbers have no JSON form and are rejected.
    pub fn to_body(&self) -> Result<String> {
        if let Some(field) = self.first_non_finite() {
            return Err(Error::MalformedRequest(format!("{} is not a finite number", field)));
        }
        serde_json::to_string(self).map_err(|e| Error::MalformedRequest(e.to_string()))
    }

    fn first_non_finite(&self) -> Option<&'static str> {
        let position_ok = |p: &Position| [p.x, p.y, p.z].iter().all(|v| v.is_finite());
        let orientation_ok = |q: &Orientation| [q.x, q.y, q.z, q.w].iter().all(|v| v.is_finite());
        let axes_ok = |a: &Option<Vec<f64>>| a.iter().flatten().all(|v| v.is_finite());

        if !position_ok(&self.position) {
            Some("position")
        } else if !orientation_ok(&self.orientation) {
            Some("orientation")
        } else if !axes_ok(&self.gamepad_axes) {
            Some("gamepadAxes")
        } else if !self.drag_start_position.as_ref().is_none_or(position_ok) {
            Some("dragStartPosition")
        } else if !self.drag_start_orientation.as_ref().is_none_or(orientation_ok) {
            Some("dragStartOrientation")
        } else if !axes_ok(&self.drag_start_gamepad_axes) {
            Some("dragStartGamepadAxes")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(drag: bool) -> TelemetrySample {
        TelemetrySample {
            timestamp: 1.0,
            pose: Pose::new(Position::new(1.0, 2.0, 3.0), Orientation::identity()),
            gamepad_axes: Some(vec![0.0, 1.0]),
            drag_start_pose: drag.then(|| Pose::forward(1.0)),
            drag_start_axes: drag.then(|| vec![0.5, 0.5]),
        }
    }

    #[test]
    fn test_field_names_and_order() {
        let body = ReportPayload::from(&sample(false)).to_body().unwrap();
        assert_eq!(
            body,
            r#"{"position":{"x":1.0,"y":2.0,"z":3.0},"orientation":{"x":0.0,"y":0.0,"z":0.0,"w":1.0},"gamepadAxes":[0.0,1.0]}"#
        );
    }

    #[test]
    fn test_drag_fields_present_while_dragging() {
        let payload = ReportPayload::from(&sample(true));
        let json: serde_json::Value = serde_json::from_str(&payload.to_body().unwrap()).unwrap();

        assert_eq!(json["dragStartPosition"]["z"], -1.0);
        assert_eq!(json["dragStartOrientation"]["w"], 1.0);
        assert_eq!(json["dragStartGamepadAxes"], serde_json::json!([0.5, 0.5]));
        assert!(payload.is_dragging());
    }

    #[test]
    fn test_parses_minimal_report() {
        let payload: ReportPayload = serde_json::from_str(
            r#"{"position":{"x":0,"y":0,"z":0},"orientation":{"x":0,"y":0,"z":0,"w":1}}"#,
        )
        .unwrap();
        assert!(!payload.is_dragging());
        assert_eq!(payload.gamepad_axes, None);
        assert_eq!(payload.pose(), Pose::identity());
    }

    #[test]
    fn test_half_drag_is_not_dragging() {
        let mut payload = ReportPayload::from(&sample(true));
        payload.drag_start_orientation = None;
        assert!(!payload.is_dragging());
    }

    #[test]
    fn test_non_finite_values_are_malformed() {
        let mut payload = ReportPayload::from(&sample(true));
        payload.drag_start_gamepad_axes = Some(vec![f64::NAN]);
        let err = payload.to_body().unwrap_err();
        assert!(matches!(err, Error::MalformedRequest(ref m) if m.contains("dragStartGamepadAxes")));

        payload.drag_start_gamepad_axes = None;
        payload.position.x = f64::INFINITY;
        assert!(payload.to_body().unwrap_err().is_invariant_violation());
    }
}
