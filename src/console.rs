//! `Console`: one channel plus one dispatcher, and nothing global.
//!
//! Hosts translate their link events into calls on this type. Every call
//! runs to completion before the next one starts.

use crate::channel::{Channel, ConnectionState, Connector, ReconnectTimer};
use crate::dispatch::SnapshotDispatcher;
use crate::protocol::{Command, ConnectionStatus};
use crate::scene::{ReconcileStats, RenderEngine};

/// What a host observed on its link, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Opened,
    Frame(String),
    Closed(String),
    Error(String),
}

pub struct Console<C: Connector, T: ReconnectTimer, E: RenderEngine> {
    channel: Channel<C, T>,
    dispatcher: SnapshotDispatcher<E>,
}

impl<C, T, E> Console<C, T, E>
where
    C: Connector,
    T: ReconnectTimer,
    E: RenderEngine,
{
    pub fn new(channel: Channel<C, T>, dispatcher: SnapshotDispatcher<E>) -> Self {
        Self {
            channel,
            dispatcher,
        }
    }

    pub fn connect(&mut self) {
        let status = self.channel.connect();
        self.report(status);
    }

    pub fn handle_open(&mut self) {
        let status = self.channel.handle_open();
        self.report(status);
    }

    pub fn handle_close(&mut self, reason: &str) {
        let status = self.channel.handle_close(reason);
        self.report(status);
    }

    pub fn handle_error(&mut self, message: &str) {
        let status = self.channel.handle_error(message);
        self.report(status);
    }

    pub fn reconnect_due(&mut self) {
        let status = self.channel.reconnect_due();
        self.report(status);
    }

    /// Classify and, for snapshots, dispatch one inbound frame.
    pub fn handle_frame(&mut self, text: &str) -> Option<ReconcileStats> {
        let snapshot = self.channel.handle_frame(text)?;
        Some(self.dispatcher.dispatch(snapshot))
    }

    /// Route one link event. Returns reconcile stats for snapshot frames.
    pub fn apply(&mut self, event: LinkEvent) -> Option<ReconcileStats> {
        match event {
            LinkEvent::Opened => self.handle_open(),
            LinkEvent::Frame(text) => return self.handle_frame(&text),
            LinkEvent::Closed(reason) => self.handle_close(&reason),
            LinkEvent::Error(message) => self.handle_error(&message),
        }
        None
    }

    pub fn send(&mut self, command: &Command) -> bool {
        self.channel.send(command)
    }

    pub fn disconnect(&mut self) {
        let status = self.channel.disconnect();
        self.report(status);
    }

    /// Disconnect and tear down every visual.
    pub fn shutdown(&mut self) {
        self.disconnect();
        self.dispatcher.scene_mut().clear();
    }

    fn report(&mut self, status: Option<ConnectionStatus>) {
        if let Some(status) = status {
            self.dispatcher.status_changed(status);
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.channel.status()
    }

    pub fn channel(&self) -> &Channel<C, T> {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut Channel<C, T> {
        &mut self.channel
    }

    pub fn dispatcher(&self) -> &SnapshotDispatcher<E> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut SnapshotDispatcher<E> {
        &mut self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::tests::{channel, FakeConnector, FakeTimer};
    use crate::headless::HeadlessScene;
    use crate::panels::{PanelRenderer, StatusIndicator};
    use crate::protocol::{ControlValues, Snapshot};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Status indicator whose state the test can still see once boxed.
    #[derive(Clone, Default)]
    struct SharedIndicator(Rc<RefCell<StatusIndicator>>);

    impl PanelRenderer for SharedIndicator {
        fn render(&mut self, snapshot: &Snapshot) {
            self.0.borrow_mut().render(snapshot);
        }

        fn connection_changed(&mut self, status: ConnectionStatus) {
            self.0.borrow_mut().connection_changed(status);
        }
    }

    type TestConsole = Console<FakeConnector, FakeTimer, HeadlessScene>;

    fn console() -> (TestConsole, SharedIndicator) {
        let indicator = SharedIndicator::default();
        let dispatcher = SnapshotDispatcher::new(HeadlessScene::new()).with_panel(indicator.clone());
        (Console::new(channel(), dispatcher), indicator)
    }

    const THREE: &str = r#"{"cranes": [{"id": "A"}, {"id": "B"}, {"id": "C"}]}"#;

    #[test]
    fn indicator_follows_link_events() {
        let (mut c, indicator) = console();
        c.connect();
        assert!(!indicator.0.borrow().is_connected());
        c.handle_open();
        assert!(indicator.0.borrow().is_connected());
        c.handle_error("reset");
        assert!(!indicator.0.borrow().is_connected());
        assert_eq!(indicator.0.borrow().transitions(), 2);
    }

    #[test]
    fn frames_reach_the_scene() {
        let (mut c, _) = console();
        c.connect();
        c.handle_open();
        let stats = c.handle_frame(THREE).expect("snapshot");
        assert_eq!(stats.created, 3);
        assert_eq!(c.dispatcher().scene().len(), 3);
    }

    #[test]
    fn malformed_frame_changes_nothing() {
        let (mut c, _) = console();
        c.connect();
        c.handle_open();
        c.handle_frame(THREE);
        assert!(c.handle_frame("not json").is_none());
        assert_eq!(c.state(), ConnectionState::Open);
        assert_eq!(c.dispatcher().scene().len(), 3);
        assert_eq!(c.dispatcher().dispatched(), 1);
    }

    #[test]
    fn mistyped_field_still_updates_other_cranes() {
        let (mut c, _) = console();
        c.connect();
        c.handle_open();
        let frame = r#"{"cranes": [{"id": "A", "working_radius": "n/a"}, {"id": "B"}],
                        "status": {"crane_alerts": {"A": 3}}}"#;
        let stats = c.handle_frame(frame).expect("snapshot");
        assert_eq!(stats.created, 2);
        assert!(c.dispatcher().scene().contains("A"));
        assert!(c.dispatcher().scene().contains("B"));
    }

    #[test]
    fn link_events_route_like_direct_calls() {
        let (mut c, indicator) = console();
        c.connect();
        assert!(c.apply(LinkEvent::Opened).is_none());
        assert!(indicator.0.borrow().is_connected());
        let stats = c.apply(LinkEvent::Frame(THREE.into())).expect("snapshot");
        assert_eq!(stats.created, 3);
        c.apply(LinkEvent::Closed("going away".into()));
        c.apply(LinkEvent::Error("reset".into()));
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert!(c.channel().reconnect_pending());
        assert_eq!(c.channel().timer().armed, 1);
    }

    #[test]
    fn send_depends_on_connection() {
        let (mut c, _) = console();
        let cmd = Command::control("A", ControlValues::default().slew_speed(0.5)).unwrap();
        assert!(!c.send(&cmd));
        c.connect();
        c.handle_open();
        assert!(c.send(&cmd));
    }

    #[test]
    fn shutdown_clears_scene_and_stops_retrying() {
        let (mut c, indicator) = console();
        c.connect();
        c.handle_open();
        c.handle_frame(THREE);
        c.shutdown();
        assert!(c.dispatcher().scene().is_empty());
        assert!(!c.channel().reconnect_pending());
        assert!(!indicator.0.borrow().is_connected());
    }
}
