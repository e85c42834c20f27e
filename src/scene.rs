//! `SceneReconciler`: keeps one Visual Object per crane in the render
//! engine and rebuilds the warning overlay every tick.
//!
//! ## Visual Object layout
//!
//! ```text
//! root (group, at crane base)
//!   ├── mast (mesh)
//!   ├── label (mesh)
//!   ├── radius ring (mesh, scaled to the working radius)
//!   └── boom pivot (group, at mast top, yaw = slew, pitch = luffing)
//!         ├── boom (mesh, along -Z)
//!         └── tip marker (mesh, at boom end)
//! ```
//!
//! The reconciler is the only writer of the live map. The render loop only
//! reads whatever the engine holds after the last `reconcile`.

use std::collections::{HashMap, HashSet};

use crate::protocol::{AlertLevel, CollisionRecord, CraneState, Snapshot};
use crate::transform;
use crate::types::{Euler, Rgb, Vec3};

// ---------------------------------------------------------------------------
// Render engine capability
// ---------------------------------------------------------------------------

/// Geometry primitives the reconciler asks the engine for.
///
/// Meshes are built around their own origin; the reconciler positions them.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshSpec {
    Mast { height: f64 },
    Boom { length: f64 },
    TipMarker { radius: f64 },
    /// Unit-radius ring on the ground plane; scaled per tick.
    RadiusRing,
    Label { text: String },
}

/// The rendering engine, consumed as a capability.
///
/// Handles are opaque. Removing a handle removes its whole subtree.
pub trait RenderEngine {
    type Handle: Clone;

    fn create_group(&mut self, parent: Option<&Self::Handle>) -> Self::Handle;
    fn add_mesh(&mut self, parent: &Self::Handle, mesh: MeshSpec) -> Self::Handle;
    fn set_position(&mut self, node: &Self::Handle, position: Vec3);
    /// Euler angles in radians, `YXZ` order.
    fn set_rotation(&mut self, node: &Self::Handle, rotation: Euler);
    fn set_scale(&mut self, node: &Self::Handle, scale: Vec3);
    fn set_color(&mut self, node: &Self::Handle, color: Rgb);
    fn add_dashed_line(&mut self, from: Vec3, to: Vec3, color: Rgb) -> Self::Handle;
    fn remove(&mut self, node: Self::Handle);
}

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

/// Neutral appearance for cranes with no elevated alert.
pub const SAFE_COLOR: Rgb = Rgb(0x4CAF50);
pub const MAST_COLOR: Rgb = Rgb(0x9E9E9E);

/// Colour for a level. Shared by crane colouring and overlay lines.
pub fn level_color(level: AlertLevel) -> Rgb {
    match level {
        AlertLevel::Normal => SAFE_COLOR,
        AlertLevel::Caution => Rgb(0xFFC107),
        AlertLevel::Warning => Rgb(0xFF9800),
        AlertLevel::Danger => Rgb(0xF44336),
    }
}

const TIP_MARKER_RADIUS: f64 = 1.0;
const LABEL_CLEARANCE: f64 = 5.0;
const RING_LIFT: f64 = 0.1;

// ---------------------------------------------------------------------------
// Visual Object
// ---------------------------------------------------------------------------

/// Persistent rendered representation of one crane.
#[derive(Debug, Clone)]
pub struct VisualObject<H> {
    pub crane_id: String,
    pub root: H,
    pub boom_pivot: H,
    pub boom: H,
    pub tip_marker: H,
    pub radius_ring: H,
    /// Last applied pivot rotation.
    pub pose: Euler,
    /// Last applied alert colour.
    pub color: Rgb,
    pub level: AlertLevel,
    pub working_radius: f64,
}

impl<H: Clone> VisualObject<H> {
    fn build<E: RenderEngine<Handle = H>>(engine: &mut E, crane: &CraneState) -> Self {
        let root = engine.create_group(None);
        engine.set_position(&root, transform::crane_origin(crane));

        let mast = engine.add_mesh(
            &root,
            MeshSpec::Mast {
                height: crane.mast_height,
            },
        );
        engine.set_position(&mast, Vec3::new(0.0, crane.mast_height / 2.0, 0.0));
        engine.set_color(&mast, MAST_COLOR);

        let label = engine.add_mesh(
            &root,
            MeshSpec::Label {
                text: crane.display_name().to_owned(),
            },
        );
        engine.set_position(
            &label,
            Vec3::new(0.0, crane.mast_height + LABEL_CLEARANCE, 0.0),
        );

        let radius_ring = engine.add_mesh(&root, MeshSpec::RadiusRing);
        engine.set_position(&radius_ring, Vec3::new(0.0, RING_LIFT, 0.0));

        let boom_pivot = engine.create_group(Some(&root));
        engine.set_position(&boom_pivot, Vec3::new(0.0, crane.mast_height, 0.0));

        let boom = engine.add_mesh(
            &boom_pivot,
            MeshSpec::Boom {
                length: crane.boom_length,
            },
        );
        engine.set_position(&boom, Vec3::new(0.0, 0.0, -crane.boom_length / 2.0));

        let tip_marker = engine.add_mesh(
            &boom_pivot,
            MeshSpec::TipMarker {
                radius: TIP_MARKER_RADIUS,
            },
        );
        engine.set_position(&tip_marker, Vec3::new(0.0, 0.0, -crane.boom_length));

        Self {
            crane_id: crane.id.clone(),
            root,
            boom_pivot,
            boom,
            tip_marker,
            radius_ring,
            pose: Euler::default(),
            color: SAFE_COLOR,
            level: AlertLevel::Normal,
            working_radius: 0.0,
        }
    }

    /// Direct assignment of pose, ring size and colour. Idempotent.
    fn apply<E: RenderEngine<Handle = H>>(
        &mut self,
        engine: &mut E,
        crane: &CraneState,
        level: AlertLevel,
    ) {
        let pose = Euler::yaw_pitch(
            transform::slew_to_yaw(crane.slew_angle),
            transform::luffing_to_pitch(crane.luffing_angle),
        );
        engine.set_rotation(&self.boom_pivot, pose);

        let radius = crane.working_radius().max(0.0);
        engine.set_scale(&self.radius_ring, Vec3::new(radius, 1.0, radius));

        let color = level_color(level);
        engine.set_color(&self.boom, color);
        engine.set_color(&self.tip_marker, color);
        engine.set_color(&self.radius_ring, color);

        self.pose = pose;
        self.color = color;
        self.level = level;
        self.working_radius = radius;
    }

    fn destroy<E: RenderEngine<Handle = H>>(self, engine: &mut E) {
        engine.remove(self.root);
    }
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

/// One dashed warning indicator between two boom tips. Lives for one tick.
#[derive(Debug, Clone)]
pub struct OverlayLine<H> {
    pub crane_a_id: String,
    pub crane_b_id: String,
    pub from: Vec3,
    pub to: Vec3,
    pub level: AlertLevel,
    pub handle: H,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// What one `reconcile` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub overlay_lines: usize,
}

pub struct SceneReconciler<E: RenderEngine> {
    engine: E,
    live: HashMap<String, VisualObject<E::Handle>>,
    overlay: Vec<OverlayLine<E::Handle>>,
}

impl<E: RenderEngine> SceneReconciler<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            live: HashMap::new(),
            overlay: Vec::new(),
        }
    }

    /// Align the scene with `snapshot`: create, update, destroy, then
    /// rebuild the overlay.
    pub fn reconcile(&mut self, snapshot: &Snapshot) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        let mut present: HashSet<&str> = HashSet::with_capacity(snapshot.cranes.len());
        let mut tips: HashMap<&str, Vec3> = HashMap::with_capacity(snapshot.cranes.len());

        for crane in &snapshot.cranes {
            if crane.id.is_empty() {
                log::warn!("[scene] Skipping crane without id ({:?})", crane.name);
                continue;
            }
            if !present.insert(crane.id.as_str()) {
                log::warn!("[scene] Duplicate crane id {} in snapshot: ignored", crane.id);
                continue;
            }
            tips.insert(crane.id.as_str(), transform::boom_tip(crane));

            let level = snapshot.alert_level_of(&crane.id);
            match self.live.get_mut(&crane.id) {
                Some(obj) => {
                    obj.apply(&mut self.engine, crane, level);
                    stats.updated += 1;
                }
                None => {
                    let mut obj = VisualObject::build(&mut self.engine, crane);
                    obj.apply(&mut self.engine, crane, level);
                    log::debug!("[scene] Created visual object {}", crane.id);
                    self.live.insert(crane.id.clone(), obj);
                    stats.created += 1;
                }
            }
        }

        let stale: Vec<String> = self
            .live
            .keys()
            .filter(|id| !present.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            if let Some(obj) = self.live.remove(&id) {
                obj.destroy(&mut self.engine);
                log::debug!("[scene] Removed visual object {}", id);
                stats.removed += 1;
            }
        }

        for line in self.overlay.drain(..) {
            self.engine.remove(line.handle);
        }
        // One line per unordered pair, at the highest level reported for it.
        let mut pairs: Vec<&CollisionRecord> = Vec::new();
        let mut seen: HashMap<(&str, &str), usize> = HashMap::new();
        for collision in &snapshot.collisions {
            if !collision.alert_level.is_elevated()
                || collision.crane_a_id == collision.crane_b_id
            {
                continue;
            }
            match seen.get(&collision.pair_key()).copied() {
                Some(i) if collision.alert_level > pairs[i].alert_level => pairs[i] = collision,
                Some(_) => {}
                None => {
                    seen.insert(collision.pair_key(), pairs.len());
                    pairs.push(collision);
                }
            }
        }
        for collision in pairs {
            let (Some(&from), Some(&to)) = (
                tips.get(collision.crane_a_id.as_str()),
                tips.get(collision.crane_b_id.as_str()),
            ) else {
                continue;
            };
            let handle =
                self.engine
                    .add_dashed_line(from, to, level_color(collision.alert_level));
            self.overlay.push(OverlayLine {
                crane_a_id: collision.crane_a_id.clone(),
                crane_b_id: collision.crane_b_id.clone(),
                from,
                to,
                level: collision.alert_level,
                handle,
            });
        }
        stats.overlay_lines = self.overlay.len();

        stats
    }

    /// Remove every Visual Object and overlay line.
    pub fn clear(&mut self) {
        for line in self.overlay.drain(..) {
            self.engine.remove(line.handle);
        }
        for (_, obj) in self.live.drain() {
            obj.destroy(&mut self.engine);
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn contains(&self, crane_id: &str) -> bool {
        self.live.contains_key(crane_id)
    }

    pub fn visual(&self, crane_id: &str) -> Option<&VisualObject<E::Handle>> {
        self.live.get(crane_id)
    }

    /// Live ids, sorted.
    pub fn live_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.live.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn overlay(&self) -> &[OverlayLine<E::Handle>] {
        &self.overlay
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
