//! Per-tick orchestration
//!
//! Each tick runs in a fixed order: drain queued events, start any pending
//! placements, reconcile anchors, maybe report telemetry, render. Nothing in
//! a tick waits on anchor creation or the network; both run as background
//! tasks whose results come back through the event queue or the reporter's
//! counters.
//!
//! Background tasks are spawned on the runtime the session was started on, so
//! ticks may come from a render thread outside that runtime. Dropping the
//! driver detaches them: they still run to completion, and an anchor created
//! for a driver that is gone is released by the task itself.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::events::{self, DriverEvent, EventSender};
use crate::anchors::{AnchorLifecycleManager, MAX_ANCHORED_OBJECTS, ReconcileReport};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::pose::Pose;
use crate::session::{Session, SessionMode};
use crate::telemetry::{DEFAULT_SEND_INTERVAL_MS, PoseReporter, TelemetryCounts, TelemetryThrottle};
use crate::transport::Transport;
use crate::xr::{InputSource, ReferenceSpace, ReferenceSpaceKind, SceneGraph, TrackingSubsystem, XrFrame};

/// Whether the host should deliver another tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameRequest {
    Continue,
    #[default]
    Stop,
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub request: FrameRequest,
    /// Events drained from the queue
    pub events: usize,
    /// Anchor creation requests started
    pub placements: usize,
    pub anchors: ReconcileReport,
    /// A telemetry report was handed to the reporter
    pub telemetry_dispatched: bool,
}

/// Tunables for one driver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverSettings {
    pub send_interval: Duration,
    pub max_anchored_objects: usize,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_millis(DEFAULT_SEND_INTERVAL_MS as u64),
            max_anchored_objects: MAX_ANCHORED_OBJECTS,
        }
    }
}

impl From<&Config> for DriverSettings {
    fn from(config: &Config) -> Self {
        Self {
            send_interval: config.telemetry.interval(),
            max_anchored_objects: config.anchors.max_anchored_objects,
        }
    }
}

/// Source of frame ticks, such as a display refresh callback
#[async_trait]
pub trait FrameSource: Send {
    type Frame: XrFrame + Send;

    /// Wait for the next tick. `None` means the host stopped delivering frames.
    async fn next_frame(&mut self) -> Option<Self::Frame>;
}

/// Owns one session and everything mutated on its behalf
pub struct FrameDriver<S, T, X>
where
    S: SceneGraph,
    T: TrackingSubsystem + 'static,
    X: Transport,
{
    session: Session,
    scene: S,
    tracking: Arc<T>,
    anchors: AnchorLifecycleManager,
    throttle: TelemetryThrottle,
    reporter: PoseReporter<X>,
    events: EventSender,
    events_rx: UnboundedReceiver<DriverEvent>,
    pending_selects: Vec<InputSource>,
    background: JoinSet<()>,
    runtime: Handle,
    ticks: u64,
}

impl<S, T, X> FrameDriver<S, T, X>
where
    S: SceneGraph,
    T: TrackingSubsystem + 'static,
    X: Transport,
{
    /// Start a session in `mode`.
    ///
    /// Immersive sessions track against a `local` reference space, inline
    /// ones against `viewer`. AR sessions hide the opaque background.
    pub async fn start(
        mode: SessionMode,
        mut scene: S,
        tracking: Arc<T>,
        reporter: PoseReporter<X>,
        settings: DriverSettings,
    ) -> Result<Self> {
        let mut session = Session::new(mode);

        if mode == SessionMode::ImmersiveAr {
            scene.set_background_visible(false);
        }
        scene.use_profile_controller_meshes(&session);

        let kind = if mode.is_immersive() {
            ReferenceSpaceKind::Local
        } else {
            ReferenceSpaceKind::Viewer
        };
        let space = match tracking.request_reference_space(kind).await {
            Ok(space) => space,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Reference space unavailable");
                if mode == SessionMode::ImmersiveAr {
                    scene.set_background_visible(true);
                }
                return Err(match e {
                    Error::ReferenceSpace(_) => e,
                    other => Error::ReferenceSpace(other.to_string()),
                });
            }
        };
        session.activate(space);

        info!(
            session_id = %session.id,
            mode = mode.as_str(),
            space = ?space.kind,
            signed = reporter.guard().is_signed(),
            "Session started"
        );

        let (events, events_rx) = events::channel();
        Ok(Self {
            session,
            scene,
            tracking,
            anchors: AnchorLifecycleManager::with_capacity(settings.max_anchored_objects),
            throttle: TelemetryThrottle::from_interval(settings.send_interval),
            reporter,
            events,
            events_rx,
            pending_selects: Vec::new(),
            background: JoinSet::new(),
            runtime: Handle::current(),
            ticks: 0,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn anchors(&self) -> &AnchorLifecycleManager {
        &self.anchors
    }

    pub fn throttle(&self) -> &TelemetryThrottle {
        &self.throttle
    }

    pub fn reporter(&self) -> &PoseReporter<X> {
        &self.reporter
    }

    /// Handle for posting input and lifecycle events
    pub fn events(&self) -> EventSender {
        self.events.clone()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn telemetry_counts(&self) -> TelemetryCounts {
        self.reporter.stats().snapshot()
    }

    /// Background anchor creations and reports still running
    pub fn outstanding(&self) -> usize {
        self.background.len()
    }

    /// Run one tick
    pub fn on_frame<F>(&mut self, frame: &F) -> TickSummary
    where
        F: XrFrame + ?Sized,
    {
        let mut summary = TickSummary::default();
        self.reap_background();
        summary.events = self.drain_events();

        if self.session.has_ended() {
            return summary;
        }
        let Some(space) = self.session.reference_space().copied() else {
            warn!(session_id = %self.session.id, "Tick without a reference space");
            return summary;
        };

        let timestamp = frame.timestamp();
        summary.placements = self.start_placements(frame, &space);
        summary.anchors = self.anchors.reconcile(frame, &space, &mut self.scene);

        let viewer_pose = frame.viewer_pose(&space);
        if self.session.is_immersive() {
            summary.telemetry_dispatched = self.report_if_due(frame, timestamp, viewer_pose);
        }

        summary.request = FrameRequest::Continue;
        self.scene.draw_frame(timestamp, viewer_pose.as_ref());
        self.ticks += 1;

        summary
    }

    /// Drive ticks from `source` until the session ends or frames stop
    pub async fn run<Src>(&mut self, source: &mut Src) -> u64
    where
        Src: FrameSource,
    {
        while !self.session.has_ended() {
            let Some(frame) = source.next_frame().await else {
                debug!(session_id = %self.session.id, "Frame source exhausted");
                self.end();
                break;
            };
            if self.on_frame(&frame).request == FrameRequest::Stop {
                break;
            }
        }
        self.ticks
    }

    /// End the session: tear down anchors and restore the background.
    ///
    /// Outstanding anchor creations and reports keep running; their
    /// completions are applied against the torn-down state.
    pub fn end(&mut self) -> bool {
        if !self.session.end() {
            return false;
        }

        self.pending_selects.clear();
        self.throttle.on_gesture_end();
        self.anchors.teardown(self.tracking.as_ref(), &mut self.scene);
        if self.session.is_immersive() {
            self.scene.set_background_visible(true);
        }

        let counts = self.telemetry_counts();
        info!(
            session_id = %self.session.id,
            ticks = self.ticks,
            sent = counts.sent,
            skipped = counts.skipped,
            failed = counts.failed,
            outstanding = self.background.len(),
            "Session ended"
        );
        true
    }

    /// Wait for every background task, then apply whatever they queued.
    ///
    /// Returns the number of events applied.
    pub async fn settle(&mut self) -> usize {
        while let Some(joined) = self.background.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Background task did not complete");
            }
        }
        self.drain_events()
    }

    fn reap_background(&mut self) {
        while let Some(joined) = self.background.try_join_next() {
            if let Err(e) = joined {
                warn!(error = %e, "Background task did not complete");
            }
        }
    }

    fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, event: DriverEvent) {
        debug!(event = event.as_str(), "Applying driver event");
        match event {
            DriverEvent::AnchorCreated(result) => {
                if let Err(e) = self
                    .anchors
                    .on_anchor_created(result, self.tracking.as_ref(), &mut self.scene)
                {
                    debug!(code = e.code(), "Anchor creation completed without placement");
                }
            }
            event if self.session.has_ended() => {
                debug!(event = event.as_str(), "Ignoring event after session end");
            }
            DriverEvent::GestureStart(input) => self.throttle.on_gesture_start(&input),
            DriverEvent::GestureEnd => self.throttle.on_gesture_end(),
            DriverEvent::Select(input) => self.pending_selects.push(input),
            DriverEvent::EndSession => {
                self.end();
            }
        }
    }

    fn start_placements<F>(&mut self, frame: &F, space: &ReferenceSpace) -> usize
    where
        F: XrFrame + ?Sized,
    {
        let mut started = 0;
        for input in std::mem::take(&mut self.pending_selects) {
            let Some(pose) = AnchorLifecycleManager::placement_pose(&input, frame, space) else {
                debug!(source = input.id.0, "No input pose for placement");
                continue;
            };

            let tracking = Arc::clone(&self.tracking);
            let events = self.events.clone();
            let space = *space;
            self.background.spawn_on(
                async move {
                    let result = tracking.create_anchor(pose, space).await;
                    if let Some(anchor) = events.anchor_created(result) {
                        debug!(anchor = %anchor, "Driver gone before anchor creation completed, releasing");
                        tracking.release_anchor(anchor);
                    }
                },
                &self.runtime,
            );
            started += 1;
        }
        started
    }

    fn report_if_due<F>(&mut self, frame: &F, timestamp: f64, viewer_pose: Option<Pose>) -> bool
    where
        F: XrFrame + ?Sized,
    {
        let Some(sample) = self.throttle.on_frame_tick(timestamp, viewer_pose) else {
            return false;
        };

        let axes = self
            .throttle
            .drag_source()
            .and_then(|source| frame.gamepad_axes(source));
        let report = self.reporter.report(&sample.with_gamepad_axes(axes));
        self.background.spawn_on(
            async move {
                report.await;
            },
            &self.runtime,
        );
        true
    }
}

impl<S, T, X> Drop for FrameDriver<S, T, X>
where
    S: SceneGraph,
    T: TrackingSubsystem + 'static,
    X: Transport,
{
    /// Ends the session if still running, then lets background work finish on
    /// its own. Completions already queued are applied first.
    fn drop(&mut self) {
        self.end();
        self.events_rx.close();
        self.drain_events();
        let detached = self.background.len();
        self.background.detach_all();
        if detached > 0 {
            debug!(session_id = %self.session.id, detached, "Detached background tasks");
        }
    }
}
