//! `SnapshotDispatcher`: fans each snapshot out to the scene and the
//! panels, in a fixed order, and remembers the last one.

use crate::panels::PanelRenderer;
use crate::protocol::{ConnectionStatus, Snapshot};
use crate::scene::{ReconcileStats, RenderEngine, SceneReconciler};

pub struct SnapshotDispatcher<E: RenderEngine> {
    scene: SceneReconciler<E>,
    panels: Vec<Box<dyn PanelRenderer>>,
    latest: Option<Snapshot>,
    dispatched: u64,
}

impl<E: RenderEngine> SnapshotDispatcher<E> {
    pub fn new(engine: E) -> Self {
        Self {
            scene: SceneReconciler::new(engine),
            panels: Vec::new(),
            latest: None,
            dispatched: 0,
        }
    }

    /// Panels render in registration order, after the scene.
    pub fn register(&mut self, panel: Box<dyn PanelRenderer>) {
        self.panels.push(panel);
    }

    pub fn with_panel(mut self, panel: impl PanelRenderer + 'static) -> Self {
        self.register(Box::new(panel));
        self
    }

    pub fn dispatch(&mut self, snapshot: Snapshot) -> ReconcileStats {
        let stats = self.scene.reconcile(&snapshot);
        for panel in &mut self.panels {
            panel.render(&snapshot);
        }
        self.dispatched += 1;
        log::trace!(
            "[dispatch] #{} created={} updated={} removed={} overlay={}",
            self.dispatched,
            stats.created,
            stats.updated,
            stats.removed,
            stats.overlay_lines
        );
        self.latest = Some(snapshot);
        stats
    }

    pub fn status_changed(&mut self, status: ConnectionStatus) {
        for panel in &mut self.panels {
            panel.connection_changed(status);
        }
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn scene(&self) -> &SceneReconciler<E> {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneReconciler<E> {
        &mut self.scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessScene;
    use crate::protocol::CraneState;
    use crate::scene::MeshSpec;
    use crate::types::{Euler, Rgb, Vec3};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Journal = Rc<RefCell<Vec<String>>>;

    /// Records the snapshot size it rendered, tagged with its name.
    struct Tap {
        name: &'static str,
        journal: Journal,
    }

    impl PanelRenderer for Tap {
        fn render(&mut self, snapshot: &Snapshot) {
            self.journal
                .borrow_mut()
                .push(format!("{}:{}", self.name, snapshot.cranes.len()));
        }

        fn connection_changed(&mut self, status: ConnectionStatus) {
            self.journal
                .borrow_mut()
                .push(format!("{}:{}", self.name, status.as_str()));
        }
    }

    /// Engine that writes structural calls into the same journal as the
    /// panels.
    struct Recorder {
        journal: Journal,
        next: u32,
    }

    impl Recorder {
        fn note(&mut self, what: &str) -> u32 {
            self.journal.borrow_mut().push(format!("scene:{what}"));
            self.next += 1;
            self.next
        }
    }

    impl RenderEngine for Recorder {
        type Handle = u32;

        fn create_group(&mut self, _parent: Option<&u32>) -> u32 {
            self.note("group")
        }
        fn add_mesh(&mut self, _parent: &u32, _mesh: MeshSpec) -> u32 {
            self.note("mesh")
        }
        fn set_position(&mut self, _node: &u32, _position: Vec3) {}
        fn set_rotation(&mut self, _node: &u32, _rotation: Euler) {}
        fn set_scale(&mut self, _node: &u32, _scale: Vec3) {}
        fn set_color(&mut self, _node: &u32, _color: Rgb) {}
        fn add_dashed_line(&mut self, _from: Vec3, _to: Vec3, _color: Rgb) -> u32 {
            self.note("line")
        }
        fn remove(&mut self, _node: u32) {
            self.note("remove");
        }
    }

    fn one_crane() -> Snapshot {
        Snapshot {
            cranes: vec![CraneState {
                id: "TC-1".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn panels_render_in_registration_order() {
        let journal: Journal = Rc::default();
        let mut d = SnapshotDispatcher::new(HeadlessScene::new())
            .with_panel(Tap {
                name: "a",
                journal: journal.clone(),
            })
            .with_panel(Tap {
                name: "b",
                journal: journal.clone(),
            });

        let stats = d.dispatch(one_crane());
        assert_eq!(stats.created, 1);
        assert_eq!(journal.borrow().as_slice(), &["a:1", "b:1"]);
        assert_eq!(d.dispatched(), 1);
        assert!(d.scene().contains("TC-1"));
    }

    #[test]
    fn scene_is_reconciled_before_panels_render() {
        let journal: Journal = Rc::default();
        let engine = Recorder {
            journal: journal.clone(),
            next: 0,
        };
        let mut d = SnapshotDispatcher::new(engine)
            .with_panel(Tap {
                name: "a",
                journal: journal.clone(),
            })
            .with_panel(Tap {
                name: "b",
                journal: journal.clone(),
            });

        d.dispatch(one_crane());
        {
            let entries = journal.borrow();
            assert_eq!(entries.first().map(String::as_str), Some("scene:group"));
            assert_eq!(&entries[entries.len() - 2..], &["a:1", "b:1"]);
            assert!(entries[..entries.len() - 2]
                .iter()
                .all(|e| e.starts_with("scene:")));
        }

        journal.borrow_mut().clear();
        d.dispatch(Snapshot::default());
        assert_eq!(journal.borrow().as_slice(), &["scene:remove", "a:0", "b:0"]);
    }

    #[test]
    fn latest_is_the_last_dispatched() {
        let mut d = SnapshotDispatcher::new(HeadlessScene::new());
        assert!(d.latest().is_none());
        d.dispatch(one_crane());
        d.dispatch(Snapshot::default());
        assert!(d.latest().is_some_and(|s| s.cranes.is_empty()));
        assert!(d.scene().is_empty());
    }

    #[test]
    fn status_reaches_every_panel() {
        let journal: Journal = Rc::default();
        let mut d = SnapshotDispatcher::new(HeadlessScene::new()).with_panel(Tap {
            name: "a",
            journal: journal.clone(),
        });
        d.status_changed(ConnectionStatus::Connected);
        assert_eq!(journal.borrow().as_slice(), &["a:connected"]);
        assert!(d.latest().is_none());
    }
}
