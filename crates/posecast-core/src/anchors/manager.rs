//! Anchor lifecycle manager
//!
//! Owns the mapping from anchor identity to its scene object and reconciles
//! it against the runtime's tracked-anchor set once per tick. Anchors that
//! drop out of tracking lose their scene presence but keep their pool slot;
//! if the same identity is tracked again, its existing node is re-attached
//! rather than a new record being created.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use super::pool::{AnchorPool, AnchorRecord};
use crate::error::{Error, Result};
use crate::pose::Pose;
use crate::xr::{AnchorId, InputSource, ReferenceSpace, SceneGraph, TrackingSubsystem, XrFrame};

/// Distance in front of the origin used for placements from non-spatial input
pub const SCREEN_PLACEMENT_DISTANCE_M: f64 = 1.0;

/// What one reconciliation pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Anchors tracked this tick
    pub tracked: usize,
    /// Scene objects removed because their anchor stopped being tracked
    pub lost: usize,
    /// Scene objects re-added because their anchor is tracked again
    pub reacquired: usize,
    /// Tracked anchors without a pose this tick
    pub hidden: usize,
    /// Tracked anchors this manager holds no record for
    pub unknown: usize,
}

impl ReconcileReport {
    fn is_quiet(&self) -> bool {
        self.lost == 0 && self.reacquired == 0 && self.unknown == 0
    }
}

#[derive(Debug)]
pub struct AnchorLifecycleManager {
    pool: AnchorPool,
    previous: BTreeSet<AnchorId>,
    torn_down: bool,
}

impl Default for AnchorLifecycleManager {
    fn default() -> Self {
        Self::new(AnchorPool::default())
    }
}

impl AnchorLifecycleManager {
    pub fn new(pool: AnchorPool) -> Self {
        Self {
            pool,
            previous: BTreeSet::new(),
            torn_down: false,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(AnchorPool::new(capacity))
    }

    pub fn pool(&self) -> &AnchorPool {
        &self.pool
    }

    /// Anchors tracked on the last reconciled tick
    pub fn previous_tracked(&self) -> &BTreeSet<AnchorId> {
        &self.previous
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Pose at which a placement from `input` should create its anchor.
    ///
    /// Screen taps have no spatial ray, so they always place at a fixed
    /// offset straight ahead with identity orientation.
    pub fn placement_pose<F>(input: &InputSource, frame: &F, space: &ReferenceSpace) -> Option<Pose>
    where
        F: XrFrame + ?Sized,
    {
        if !input.target_ray_mode.is_spatial() {
            return Some(Pose::forward(SCREEN_PLACEMENT_DISTANCE_M));
        }
        frame.input_pose(input.id, space)
    }

    /// Create an anchor at `pose` and bind a new scene object to it.
    pub async fn on_placement_requested<T, S>(
        &mut self,
        pose: Pose,
        space: ReferenceSpace,
        tracking: &T,
        scene: &mut S,
    ) -> Result<AnchorId>
    where
        T: TrackingSubsystem + ?Sized,
        S: SceneGraph + ?Sized,
    {
        let result = tracking.create_anchor(pose, space).await;
        self.on_anchor_created(result, tracking, scene)
    }

    /// Apply the completion of an anchor creation request.
    ///
    /// Failures leave all state untouched. Completions arriving after
    /// [`teardown`](Self::teardown) release the new handle and change nothing.
    pub fn on_anchor_created<T, S>(
        &mut self,
        result: Result<AnchorId>,
        tracking: &T,
        scene: &mut S,
    ) -> Result<AnchorId>
    where
        T: TrackingSubsystem + ?Sized,
        S: SceneGraph + ?Sized,
    {
        let anchor = match result {
            Ok(anchor) => anchor,
            Err(e) => {
                warn!(error = %e, "Could not create anchor");
                return Err(match e {
                    Error::AnchorCreationFailed(_) => e,
                    other => Error::AnchorCreationFailed(other.to_string()),
                });
            }
        };

        if self.torn_down {
            debug!(anchor = %anchor, "Anchor created after teardown, releasing");
            tracking.release_anchor(anchor);
            return Err(Error::AnchorCreationFailed(
                "session ended before anchor creation completed".to_string(),
            ));
        }

        if self.pool.contains(anchor) {
            debug!(anchor = %anchor, "Anchor already registered");
            return Ok(anchor);
        }

        let node = scene.create_anchored_object();
        scene.add_node(node);

        if let Some(evicted) = self.pool.admit(anchor, node) {
            self.evict(evicted, tracking, scene);
        }

        info!(
            anchor = %anchor,
            resident = self.pool.len(),
            capacity = self.pool.capacity(),
            "Anchored object placed"
        );

        Ok(anchor)
    }

    /// Reconcile scene objects with the anchors tracked in `frame`.
    pub fn reconcile<F, S>(&mut self, frame: &F, space: &ReferenceSpace, scene: &mut S) -> ReconcileReport
    where
        F: XrFrame + ?Sized,
        S: SceneGraph + ?Sized,
    {
        let mut report = ReconcileReport::default();

        let Some(current) = frame.tracked_anchors() else {
            for anchor in std::mem::take(&mut self.previous) {
                if self.detach(anchor, scene) {
                    report.lost += 1;
                }
            }
            if report.lost > 0 {
                debug!(lost = report.lost, "Tracking reported no anchors");
            }
            return report;
        };

        for anchor in self.previous.difference(&current) {
            if let Some(record) = self.pool.get_mut(*anchor)
                && record.attached
            {
                scene.remove_node(record.node);
                record.attached = false;
                record.visible = false;
                report.lost += 1;
            }
        }

        report.tracked = current.len();
        for anchor in &current {
            let Some(record) = self.pool.get_mut(*anchor) else {
                report.unknown += 1;
                continue;
            };

            if !record.attached {
                scene.add_node(record.node);
                record.attached = true;
                report.reacquired += 1;
            }

            match frame.anchor_pose(*anchor, space) {
                Some(pose) => {
                    scene.set_transform(record.node, &pose);
                    scene.set_visible(record.node, true);
                    record.visible = true;
                }
                None => {
                    scene.set_visible(record.node, false);
                    record.visible = false;
                    report.hidden += 1;
                }
            }
        }

        self.previous = current;

        if !report.is_quiet() {
            debug!(
                tracked = report.tracked,
                lost = report.lost,
                reacquired = report.reacquired,
                unknown = report.unknown,
                "Anchors reconciled"
            );
        }

        report
    }

    /// Remove every scene object and release every anchor. Later completions become no-ops.
    pub fn teardown<T, S>(&mut self, tracking: &T, scene: &mut S)
    where
        T: TrackingSubsystem + ?Sized,
        S: SceneGraph + ?Sized,
    {
        let records = self.pool.drain();
        let count = records.len();
        for record in records {
            if record.attached {
                scene.remove_node(record.node);
            }
            tracking.release_anchor(record.anchor);
        }
        self.previous.clear();
        self.torn_down = true;
        info!(released = count, "Anchor manager torn down");
    }

    fn detach<S>(&mut self, anchor: AnchorId, scene: &mut S) -> bool
    where
        S: SceneGraph + ?Sized,
    {
        match self.pool.get_mut(anchor) {
            Some(record) if record.attached => {
                scene.remove_node(record.node);
                record.attached = false;
                record.visible = false;
                true
            }
            _ => false,
        }
    }

    fn evict<T, S>(&mut self, record: AnchorRecord, tracking: &T, scene: &mut S)
    where
        T: TrackingSubsystem + ?Sized,
        S: SceneGraph + ?Sized,
    {
        if record.attached {
            scene.remove_node(record.node);
        }
        self.previous.remove(&record.anchor);
        tracking.release_anchor(record.anchor);
        debug!(anchor = %record.anchor, seq = record.created_seq, "Evicted oldest anchored object");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::xr::{InputSourceId, NodeId, ReferenceSpaceKind, TargetRayMode};
    use async_trait::async_trait;
    use std::collections::{BTreeSet, HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct RecordingScene {
        next: u64,
        attached: HashSet<NodeId>,
        visible: HashMap<NodeId, bool>,
        transforms: HashMap<NodeId, Pose>,
        removals: Vec<NodeId>,
    }

    impl SceneGraph for RecordingScene {
        fn create_anchored_object(&mut self) -> NodeId {
            self.next += 1;
            NodeId(self.next)
        }
        fn add_node(&mut self, node: NodeId) {
            self.attached.insert(node);
        }
        fn remove_node(&mut self, node: NodeId) {
            self.attached.remove(&node);
            self.removals.push(node);
        }
        fn set_visible(&mut self, node: NodeId, visible: bool) {
            self.visible.insert(node, visible);
        }
        fn set_transform(&mut self, node: NodeId, pose: &Pose) {
            self.transforms.insert(node, *pose);
        }
        fn set_background_visible(&mut self, _visible: bool) {}
        fn use_profile_controller_meshes(&mut self, _session: &Session) {}
        fn draw_frame(&mut self, _timestamp: f64, _viewer_pose: Option<&Pose>) {}
    }

    #[derive(Default)]
    struct Tracker {
        next: AtomicU64,
        fail: bool,
        released: Mutex<Vec<AnchorId>>,
    }

    #[async_trait]
    impl TrackingSubsystem for Tracker {
        async fn request_reference_space(&self, kind: ReferenceSpaceKind) -> Result<ReferenceSpace> {
            Ok(ReferenceSpace::new(1, kind))
        }
        async fn create_anchor(&self, _pose: Pose, _space: ReferenceSpace) -> Result<AnchorId> {
            if self.fail {
                return Err(Error::TrackingUnavailable("no surface".to_string()));
            }
            Ok(AnchorId(self.next.fetch_add(1, Ordering::SeqCst)))
        }
        fn release_anchor(&self, anchor: AnchorId) {
            self.released.lock().unwrap().push(anchor);
        }
    }

    struct Frame {
        anchors: Option<BTreeSet<AnchorId>>,
        poses: HashMap<AnchorId, Pose>,
    }

    impl Frame {
        fn tracking(ids: &[u64]) -> Self {
            let anchors: BTreeSet<_> = ids.iter().map(|i| AnchorId(*i)).collect();
            let poses = anchors.iter().map(|a| (*a, Pose::forward(a.0 as f64))).collect();
            Self {
                anchors: Some(anchors),
                poses,
            }
        }

        fn nothing() -> Self {
            Self {
                anchors: None,
                poses: HashMap::new(),
            }
        }
    }

    impl XrFrame for Frame {
        fn timestamp(&self) -> f64 {
            0.0
        }
        fn viewer_pose(&self, _space: &ReferenceSpace) -> Option<Pose> {
            Some(Pose::identity())
        }
        fn tracked_anchors(&self) -> Option<BTreeSet<AnchorId>> {
            self.anchors.clone()
        }
        fn anchor_pose(&self, anchor: AnchorId, _space: &ReferenceSpace) -> Option<Pose> {
            self.poses.get(&anchor).copied()
        }
        fn input_pose(&self, _source: InputSourceId, _space: &ReferenceSpace) -> Option<Pose> {
            Some(Pose::forward(5.0))
        }
        fn gamepad_axes(&self, _source: InputSourceId) -> Option<Vec<f64>> {
            None
        }
    }

    fn space() -> ReferenceSpace {
        ReferenceSpace::new(1, ReferenceSpaceKind::Local)
    }

    async fn place(manager: &mut AnchorLifecycleManager, tracker: &Tracker, scene: &mut RecordingScene) -> AnchorId {
        manager
            .on_placement_requested(Pose::identity(), space(), tracker, scene)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_placement_adds_node() {
        let mut manager = AnchorLifecycleManager::default();
        let tracker = Tracker::default();
        let mut scene = RecordingScene::default();

        let anchor = place(&mut manager, &tracker, &mut scene).await;

        let record = manager.pool().get(anchor).unwrap();
        assert!(scene.attached.contains(&record.node));
        assert_eq!(manager.pool().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_creation_changes_nothing() {
        let mut manager = AnchorLifecycleManager::default();
        let tracker = Tracker {
            fail: true,
            ..Default::default()
        };
        let mut scene = RecordingScene::default();

        let err = manager
            .on_placement_requested(Pose::identity(), space(), &tracker, &mut scene)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AnchorCreationFailed(_)));
        assert!(manager.pool().is_empty());
        assert!(scene.attached.is_empty());
        assert_eq!(scene.next, 0);
    }

    #[tokio::test]
    async fn test_overflow_evicts_and_releases_oldest() {
        let mut manager = AnchorLifecycleManager::with_capacity(30);
        let tracker = Tracker::default();
        let mut scene = RecordingScene::default();

        for _ in 0..31 {
            place(&mut manager, &tracker, &mut scene).await;
        }

        assert_eq!(manager.pool().len(), 30);
        assert!(!manager.pool().contains(AnchorId(0)));
        assert_eq!(*tracker.released.lock().unwrap(), vec![AnchorId(0)]);
        assert_eq!(scene.removals, vec![NodeId(1)]);
        assert_eq!(scene.attached.len(), 30);
    }

    #[tokio::test]
    async fn test_reconcile_positions_tracked_and_hides_unposed() {
        let mut manager = AnchorLifecycleManager::default();
        let tracker = Tracker::default();
        let mut scene = RecordingScene::default();
        let a = place(&mut manager, &tracker, &mut scene).await;
        let b = place(&mut manager, &tracker, &mut scene).await;

        let mut frame = Frame::tracking(&[a.0, b.0]);
        frame.poses.remove(&b);
        let report = manager.reconcile(&frame, &space(), &mut scene);

        let node_a = manager.pool().get(a).unwrap().node;
        let node_b = manager.pool().get(b).unwrap().node;
        assert_eq!(scene.transforms[&node_a], Pose::forward(a.0 as f64));
        assert_eq!(scene.visible[&node_a], true);
        assert_eq!(scene.visible[&node_b], false);
        assert!(scene.attached.contains(&node_b));
        assert_eq!(report.tracked, 2);
        assert_eq!(report.hidden, 1);
    }

    #[tokio::test]
    async fn test_lost_anchor_removed_once() {
        let mut manager = AnchorLifecycleManager::default();
        let tracker = Tracker::default();
        let mut scene = RecordingScene::default();
        let a = place(&mut manager, &tracker, &mut scene).await;
        let b = place(&mut manager, &tracker, &mut scene).await;

        manager.reconcile(&Frame::tracking(&[a.0, b.0]), &space(), &mut scene);
        let report = manager.reconcile(&Frame::tracking(&[b.0]), &space(), &mut scene);
        assert_eq!(report.lost, 1);
        let report = manager.reconcile(&Frame::tracking(&[b.0]), &space(), &mut scene);
        assert_eq!(report.lost, 0);

        let node_a = manager.pool().get(a).unwrap().node;
        assert_eq!(scene.removals, vec![node_a]);
        // Residency is kept for lost anchors.
        assert!(manager.pool().contains(a));
    }

    #[tokio::test]
    async fn test_no_anchor_report_clears_all_objects_once() {
        let mut manager = AnchorLifecycleManager::default();
        let tracker = Tracker::default();
        let mut scene = RecordingScene::default();
        let a = place(&mut manager, &tracker, &mut scene).await;
        let b = place(&mut manager, &tracker, &mut scene).await;

        manager.reconcile(&Frame::tracking(&[a.0, b.0]), &space(), &mut scene);
        let report = manager.reconcile(&Frame::nothing(), &space(), &mut scene);
        assert_eq!(report.lost, 2);
        assert!(manager.previous_tracked().is_empty());

        let report = manager.reconcile(&Frame::nothing(), &space(), &mut scene);
        assert_eq!(report.lost, 0);
        assert_eq!(scene.removals.len(), 2);
        assert_eq!(manager.pool().visible_count(), 0);
        assert_eq!(manager.pool().len(), 2);
    }

    #[tokio::test]
    async fn test_reappearing_anchor_reuses_its_slot() {
        let mut manager = AnchorLifecycleManager::default();
        let tracker = Tracker::default();
        let mut scene = RecordingScene::default();
        let a = place(&mut manager, &tracker, &mut scene).await;
        let node = manager.pool().get(a).unwrap().node;

        manager.reconcile(&Frame::tracking(&[a.0]), &space(), &mut scene);
        manager.reconcile(&Frame::tracking(&[]), &space(), &mut scene);
        assert!(!scene.attached.contains(&node));

        let report = manager.reconcile(&Frame::tracking(&[a.0]), &space(), &mut scene);
        assert_eq!(report.reacquired, 1);
        assert!(scene.attached.contains(&node));
        assert_eq!(manager.pool().len(), 1);
        assert_eq!(manager.pool().get(a).unwrap().created_seq, 0);
    }

    #[tokio::test]
    async fn test_unknown_tracked_anchor_is_ignored() {
        let mut manager = AnchorLifecycleManager::default();
        let mut scene = RecordingScene::default();

        let report = manager.reconcile(&Frame::tracking(&[42]), &space(), &mut scene);
        assert_eq!(report.unknown, 1);
        assert!(scene.attached.is_empty());
    }

    #[tokio::test]
    async fn test_completion_after_teardown_is_noop() {
        let mut manager = AnchorLifecycleManager::default();
        let tracker = Tracker::default();
        let mut scene = RecordingScene::default();
        let a = place(&mut manager, &tracker, &mut scene).await;

        manager.teardown(&tracker, &mut scene);
        assert!(scene.attached.is_empty());
        assert_eq!(*tracker.released.lock().unwrap(), vec![a]);

        let late = manager.on_anchor_created(Ok(AnchorId(99)), &tracker, &mut scene);
        assert!(late.is_err());
        assert!(manager.pool().is_empty());
        assert!(scene.attached.is_empty());
        assert_eq!(*tracker.released.lock().unwrap(), vec![a, AnchorId(99)]);
    }

    #[test]
    fn test_screen_tap_places_one_metre_ahead() {
        let frame = Frame::nothing();
        let tap = InputSource::new(1, TargetRayMode::Screen);
        let pose = AnchorLifecycleManager::placement_pose(&tap, &frame, &space()).unwrap();
        assert_eq!(pose, Pose::forward(1.0));

        let controller = InputSource::new(2, TargetRayMode::TrackedPointer);
        let pose = AnchorLifecycleManager::placement_pose(&controller, &frame, &space()).unwrap();
        assert_eq!(pose, Pose::forward(5.0));
    }
}
