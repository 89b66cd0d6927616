//! Drag accumulation on the receiving side
//!
//! Each drag moves a virtual handle relative to where the previous drag
//! left it: the offset between a drag's start pose and the current pose is
//! applied on top of the previous drag's end pose. A report without drag
//! start fields ends the drag in progress and commits its last pose.
//!
//! Composition happens in the table frame (z+ up, y+ away from the viewer),
//! not in the y-up frame reports arrive in. The handle starts at rest at the
//! origin, carrying the same quarter turn about x that maps report axes onto
//! the table.

use std::f64::consts::FRAC_PI_2;

use nalgebra::{UnitQuaternion, Vector3};
use tracing::debug;

use crate::pose::{Orientation, Pose};
use crate::telemetry::ReportPayload;

/// A pose together with the controller axes that accompany it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComposedPose {
    pub pose: Pose,
    pub gamepad_axes: Vec<f64>,
}

/// Effect of one report on the composer
#[derive(Debug, Clone, PartialEq)]
pub enum DragUpdate {
    /// A drag is in progress; carries the composed handle pose
    Dragging(ComposedPose),
    /// The drag in progress ended; carries the committed handle pose
    Ended(ComposedPose),
    /// No drag before or after this report
    Idle,
}

impl ComposedPose {
    /// Handle pose before any drag has happened
    pub fn at_rest() -> Self {
        Self {
            pose: Pose::new(Default::default(), Orientation::from(table_tilt())),
            gamepad_axes: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct DragComposer {
    dragging: bool,
    previous_end: ComposedPose,
    current: ComposedPose,
}

impl Default for DragComposer {
    fn default() -> Self {
        Self {
            dragging: false,
            previous_end: ComposedPose::at_rest(),
            current: ComposedPose::at_rest(),
        }
    }
}

impl DragComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Handle pose as of the last report
    pub fn current(&self) -> &ComposedPose {
        &self.current
    }

    /// Handle pose committed by the last finished drag
    pub fn previous_end(&self) -> &ComposedPose {
        &self.previous_end
    }

    pub fn apply(&mut self, report: &ReportPayload) -> DragUpdate {
        let Some(start) = report.drag_start_pose() else {
            if !self.dragging {
                return DragUpdate::Idle;
            }
            self.dragging = false;
            self.previous_end = self.current.clone();
            debug!(position = ?self.previous_end.pose.position, "Drag committed");
            return DragUpdate::Ended(self.previous_end.clone());
        };

        let (live_position, live_rotation) = table_from_webxr(&report.pose());
        let (start_position, start_rotation) = table_from_webxr(&start);
        let base = &self.previous_end.pose;
        let position = base.position.to_vector() - start_position + live_position;
        let rotation = live_rotation * start_rotation.inverse() * base.orientation.to_unit_quaternion();

        self.dragging = true;
        self.current = ComposedPose {
            pose: Pose::new(position.into(), rotation.into()),
            gamepad_axes: combine_axes(
                &self.previous_end.gamepad_axes,
                report.drag_start_gamepad_axes.as_deref().unwrap_or_default(),
                report.gamepad_axes.as_deref().unwrap_or_default(),
            ),
        };
        DragUpdate::Dragging(self.current.clone())
    }
}

/// Quarter turn about x taking the y-up report frame onto the z-up table frame
fn table_tilt() -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2)
}

/// Report pose in table axes: `(x, -z, y)`, rotation tilted onto the table
fn table_from_webxr(pose: &Pose) -> (Vector3<f64>, UnitQuaternion<f64>) {
    let p = pose.position;
    (
        Vector3::new(p.x, -p.z, p.y),
        table_tilt() * pose.orientation.to_unit_quaternion(),
    )
}

/// `base - start + live`, element-wise; missing entries count as zero
fn combine_axes(base: &[f64], start: &[f64], live: &[f64]) -> Vec<f64> {
    let len = base.len().max(start.len()).max(live.len());
    let at = |axes: &[f64], i: usize| axes.get(i).copied().unwrap_or(0.0);
    (0..len)
        .map(|i| at(base, i) - at(start, i) + at(live, i))
        .collect()
}
