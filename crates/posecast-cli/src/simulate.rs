//! Simulated immersive session
//!
//! Stands in for a headset: frames arrive on a timer, the viewer's head
//! wanders, a controller places anchors and drags, and tracking drops out
//! now and then. Everything is driven through the real frame driver and
//! reporter, so reports reach whatever collector is configured.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use posecast_core::Result;
use posecast_core::driver::{DriverSettings, EventSender, FrameDriver, FrameSource};
use posecast_core::pose::{Orientation, Pose, Position};
use posecast_core::session::{Session, SessionMode};
use posecast_core::telemetry::{PoseReporter, TelemetryCounts};
use posecast_core::xr::{
    AnchorId, DeviceCapabilities, InputSource, InputSourceId, NodeId, ReferenceSpace, ReferenceSpaceKind,
    SceneGraph, TargetRayMode, TrackingSubsystem, XrFrame,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

const CONTROLLER: u32 = 0;

/// Knobs for one simulated run
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub frames: u64,
    pub fps: u32,
    pub place_every: u64,
    pub drag_every: u64,
    pub drag_frames: u64,
    pub loss_every: u64,
    pub loss_frames: u64,
    pub anchor_failure_rate: f64,
    pub seed: u64,
}

/// What the run did
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub mode: SessionMode,
    pub ticks: u64,
    pub frames_drawn: u64,
    pub background_restored: bool,
    pub anchors_created: u64,
    pub anchors_released: usize,
    pub nodes_in_scene: usize,
    pub reports_sent: u64,
    pub reports_skipped: u64,
    pub reports_failed: u64,
}

/// Device that supports whichever immersive modes it was built with
pub struct SimDevice {
    pub ar: bool,
    pub vr: bool,
}

#[async_trait]
impl DeviceCapabilities for SimDevice {
    async fn is_session_supported(&self, mode: SessionMode) -> bool {
        match mode {
            SessionMode::ImmersiveAr => self.ar,
            SessionMode::ImmersiveVr => self.vr,
            SessionMode::Inline => true,
        }
    }
}

/// Scene that only keeps track of what it was told
#[derive(Debug, Default)]
pub struct SimScene {
    next: u64,
    attached: HashSet<NodeId>,
    background_visible: bool,
    frames_drawn: u64,
}

impl SimScene {
    pub fn new() -> Self {
        Self {
            background_visible: true,
            ..Default::default()
        }
    }
}

impl SceneGraph for SimScene {
    fn create_anchored_object(&mut self) -> NodeId {
        self.next += 1;
        NodeId(self.next)
    }

    fn add_node(&mut self, node: NodeId) {
        self.attached.insert(node);
    }

    fn remove_node(&mut self, node: NodeId) {
        self.attached.remove(&node);
    }

    fn set_visible(&mut self, _node: NodeId, _visible: bool) {}

    fn set_transform(&mut self, _node: NodeId, _pose: &Pose) {}

    fn set_background_visible(&mut self, visible: bool) {
        self.background_visible = visible;
    }

    fn use_profile_controller_meshes(&mut self, session: &Session) {
        debug!(mode = session.mode.as_str(), "Controller meshes loaded");
    }

    fn draw_frame(&mut self, _timestamp: f64, _viewer_pose: Option<&Pose>) {
        self.frames_drawn += 1;
    }
}

/// Tracking runtime keeping every live anchor at the pose it was created at
pub struct SimTracking {
    next: Mutex<u64>,
    live: Mutex<BTreeMap<AnchorId, Pose>>,
    released: Mutex<usize>,
    rng: Mutex<StdRng>,
    failure_rate: f64,
}

impl SimTracking {
    pub fn new(seed: u64, failure_rate: f64) -> Self {
        Self {
            next: Mutex::new(0),
            live: Mutex::new(BTreeMap::new()),
            released: Mutex::new(0),
            rng: Mutex::new(StdRng::seed_from_u64(seed.wrapping_add(1))),
            failure_rate: if failure_rate.is_nan() { 0.0 } else { failure_rate.clamp(0.0, 1.0) },
        }
    }

    fn snapshot(&self) -> BTreeMap<AnchorId, Pose> {
        self.live.lock().map(|live| live.clone()).unwrap_or_default()
    }

    fn created(&self) -> u64 {
        self.next.lock().map(|n| *n).unwrap_or_default()
    }

    fn released(&self) -> usize {
        self.released.lock().map(|n| *n).unwrap_or_default()
    }
}

#[async_trait]
impl TrackingSubsystem for SimTracking {
    async fn request_reference_space(&self, kind: ReferenceSpaceKind) -> Result<ReferenceSpace> {
        Ok(ReferenceSpace::new(1, kind))
    }

    async fn create_anchor(&self, pose: Pose, _space: ReferenceSpace) -> Result<AnchorId> {
        let (latency_ms, fails) = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| posecast_core::Error::TrackingUnavailable("tracker poisoned".to_string()))?;
            (rng.gen_range(5..40), rng.gen_bool(self.failure_rate))
        };
        tokio::time::sleep(Duration::from_millis(latency_ms)).await;

        if fails {
            return Err(posecast_core::Error::AnchorCreationFailed(
                "no surface found at placement pose".to_string(),
            ));
        }

        let anchor = {
            let mut next = self
                .next
                .lock()
                .map_err(|_| posecast_core::Error::TrackingUnavailable("tracker poisoned".to_string()))?;
            *next += 1;
            AnchorId(*next)
        };
        if let Ok(mut live) = self.live.lock() {
            live.insert(anchor, pose);
        }
        Ok(anchor)
    }

    fn release_anchor(&self, anchor: AnchorId) {
        if let Ok(mut live) = self.live.lock() {
            live.remove(&anchor);
        }
        if let Ok(mut released) = self.released.lock() {
            *released += 1;
        }
    }
}

/// One simulated tick
#[derive(Debug, Clone)]
pub struct SimFrame {
    timestamp: f64,
    viewer: Option<Pose>,
    anchors: Option<BTreeMap<AnchorId, Pose>>,
    controller: Pose,
    axes: Vec<f64>,
}

impl XrFrame for SimFrame {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn viewer_pose(&self, _space: &ReferenceSpace) -> Option<Pose> {
        self.viewer
    }

    fn tracked_anchors(&self) -> Option<BTreeSet<AnchorId>> {
        self.anchors.as_ref().map(|anchors| anchors.keys().copied().collect())
    }

    fn anchor_pose(&self, anchor: AnchorId, _space: &ReferenceSpace) -> Option<Pose> {
        self.anchors.as_ref()?.get(&anchor).copied()
    }

    fn input_pose(&self, source: InputSourceId, _space: &ReferenceSpace) -> Option<Pose> {
        (source.0 == CONTROLLER).then_some(self.controller)
    }

    fn gamepad_axes(&self, source: InputSourceId) -> Option<Vec<f64>> {
        (source.0 == CONTROLLER).then(|| self.axes.clone())
    }
}

/// Timer-driven frame source that also plays the user's part
pub struct SimFrames {
    plan: SimulationPlan,
    interval: Interval,
    frame: u64,
    rng: StdRng,
    events: EventSender,
    tracking: Arc<SimTracking>,
    drag_started: Option<u64>,
}

impl SimFrames {
    pub fn new(plan: SimulationPlan, events: EventSender, tracking: Arc<SimTracking>) -> Self {
        let period = Duration::from_secs_f64(1.0 / f64::from(plan.fps.max(1)));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let rng = StdRng::seed_from_u64(plan.seed);
        Self {
            plan,
            interval,
            frame: 0,
            rng,
            events,
            tracking,
            drag_started: None,
        }
    }

    fn every(&self, period: u64) -> bool {
        period > 0 && self.frame > 0 && self.frame % period == 0
    }

    fn in_loss(&self) -> bool {
        self.plan.loss_every > 0
            && self.frame >= self.plan.loss_every
            && self.frame % self.plan.loss_every < self.plan.loss_frames
    }

    fn jitter(&mut self, amount: f64) -> f64 {
        self.rng.gen_range(-amount..=amount)
    }

    fn controller(&self) -> InputSource {
        InputSource::new(CONTROLLER, TargetRayMode::TrackedPointer).with_axes(vec![0.0, 0.0])
    }

    /// Post the input events a user would produce before this tick
    fn play_user(&mut self) {
        match self.drag_started {
            None if self.every(self.plan.drag_every) => {
                self.drag_started = Some(self.frame);
                self.events.gesture_start(self.controller());
            }
            Some(start) if self.frame - start >= self.plan.drag_frames => {
                self.drag_started = None;
                self.events.gesture_end();
            }
            _ => {}
        }

        if self.every(self.plan.place_every) {
            self.events.select(self.controller());
        }
    }

    fn build_frame(&mut self) -> SimFrame {
        let t = self.frame as f64 / f64::from(self.plan.fps.max(1));
        let timestamp = t * 1000.0;

        let head = Pose::new(
            Position::new(0.2 * (t * 0.5).sin() + self.jitter(0.005), 1.6 + self.jitter(0.005), self.jitter(0.005)),
            Orientation::from_yaw(0.3 * (t * 0.25).sin()),
        );
        let controller = Pose::new(
            Position::new(0.25 + 0.1 * t.sin(), 1.3, -0.4 - 0.1 * t.cos()),
            Orientation::from_yaw(self.jitter(0.1)),
        );
        let axes = if self.drag_started.is_some() {
            vec![t.sin(), t.cos()]
        } else {
            vec![0.0, 0.0]
        };

        let lost = self.in_loss();
        SimFrame {
            timestamp,
            viewer: (!lost).then_some(head),
            anchors: (!lost).then(|| self.tracking.snapshot()),
            controller,
            axes,
        }
    }
}

#[async_trait]
impl FrameSource for SimFrames {
    type Frame = SimFrame;

    async fn next_frame(&mut self) -> Option<SimFrame> {
        if self.frame >= self.plan.frames {
            return None;
        }
        self.interval.tick().await;

        self.play_user();
        let frame = self.build_frame();
        if frame.anchors.is_none() {
            debug!(frame = self.frame, "Tracking lost");
        }
        self.frame += 1;
        Some(frame)
    }
}

/// Run a whole simulated session and summarize it
pub async fn run<X>(
    mode: SessionMode,
    plan: SimulationPlan,
    reporter: PoseReporter<X>,
    settings: DriverSettings,
) -> Result<SimulationSummary>
where
    X: posecast_core::transport::Transport,
{
    let tracking = Arc::new(SimTracking::new(plan.seed, plan.anchor_failure_rate));
    let mut driver =
        FrameDriver::start(mode, SimScene::new(), Arc::clone(&tracking), reporter, settings).await?;
    let mut frames = SimFrames::new(plan, driver.events(), Arc::clone(&tracking));

    let ticks = driver.run(&mut frames).await;
    driver.settle().await;

    let TelemetryCounts {
        sent,
        skipped,
        failed,
    } = driver.telemetry_counts();
    let summary = SimulationSummary {
        mode,
        ticks,
        frames_drawn: driver.scene().frames_drawn,
        background_restored: driver.scene().background_visible,
        anchors_created: tracking.created(),
        anchors_released: tracking.released(),
        nodes_in_scene: driver.scene().attached.len(),
        reports_sent: sent,
        reports_skipped: skipped,
        reports_failed: failed,
    };
    info!(ticks, sent, skipped, failed, "Simulation finished");
    Ok(summary)
}
