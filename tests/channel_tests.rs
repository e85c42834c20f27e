//! Channel tests: a host-implemented fake link, and the tokio runtime
//! against a loopback WebSocket server

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use crane_console::{
        channel::{Channel, ConnectionState, Connector, ReconnectTimer, Socket},
        console::{Console, LinkEvent},
        dispatch::SnapshotDispatcher,
        error::ChannelError,
        headless::HeadlessScene,
        protocol::{Command, ControlValues},
        runtime::Runtime,
        types::{ConsoleConfig, ReconnectPolicy},
    };
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio::sync::{mpsc, oneshot};
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message;

    const FRAME: &str = r#"{
        "status": {"crane_alerts": {"TC-1": "DANGER", "TC-2": "DANGER"}},
        "cranes": [
            {"id": "TC-1", "base_x": 0, "base_y": 0, "mast_height": 40, "boom_length": 50},
            {"id": "TC-2", "base_x": 60, "base_y": 0, "mast_height": 40, "boom_length": 50,
             "slew_angle": 270}
        ],
        "collisions": [
            {"crane_a_id": "TC-1", "crane_b_id": "TC-2", "alert_level": "DANGER",
             "current_distance": 1.5, "time_to_collision": 0}
        ]
    }"#;

    // -----------------------------------------------------------------------
    // Host-side fakes through the public traits
    // -----------------------------------------------------------------------

    #[derive(Clone, Default)]
    struct Wire(Rc<RefCell<Vec<String>>>);

    impl Socket for Wire {
        fn send_text(&mut self, text: &str) -> Result<(), ChannelError> {
            self.0.borrow_mut().push(text.to_owned());
            Ok(())
        }

        fn close(&mut self) {}
    }

    struct WireConnector(Wire);

    impl Connector for WireConnector {
        type Socket = Wire;

        fn open(&mut self, _url: &str) -> Result<Wire, ChannelError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct CountingTimer {
        pending: u32,
    }

    impl ReconnectTimer for CountingTimer {
        fn schedule(&mut self, _delay: Duration) {
            self.pending += 1;
        }

        fn cancel(&mut self) {
            self.pending = 0;
        }
    }

    fn fake_console(wire: Wire) -> Console<WireConnector, CountingTimer, HeadlessScene> {
        let channel = Channel::new(
            "ws://fake/ws",
            ReconnectPolicy::default(),
            WireConnector(wire),
            CountingTimer::default(),
        );
        Console::new(channel, SnapshotDispatcher::new(HeadlessScene::new()))
    }

    #[test]
    fn control_true_when_open_false_when_down() {
        let wire = Wire::default();
        let mut console = fake_console(wire.clone());
        let cmd = Command::control("TC-1", ControlValues::default().slew_angle(90.0)).unwrap();

        assert!(!console.send(&cmd));
        console.connect();
        console.apply(LinkEvent::Opened);
        assert!(console.send(&cmd));
        console.apply(LinkEvent::Closed(String::new()));
        assert!(!console.send(&cmd));

        assert_eq!(wire.0.borrow().len(), 1);
    }

    #[test]
    fn repeated_closes_leave_one_timer() {
        let mut console = fake_console(Wire::default());
        console.connect();
        console.apply(LinkEvent::Opened);
        for _ in 0..3 {
            console.apply(LinkEvent::Closed("1006".into()));
        }
        assert_eq!(console.channel().timer().pending, 1);
    }

    #[test]
    fn malformed_frame_keeps_scene_and_link() {
        let mut console = fake_console(Wire::default());
        console.connect();
        console.apply(LinkEvent::Opened);
        console.apply(LinkEvent::Frame(FRAME.into()));
        let before = console.dispatcher().scene().live_ids();

        assert!(console.apply(LinkEvent::Frame("<html>".into())).is_none());
        assert_eq!(console.state(), ConnectionState::Open);
        assert_eq!(console.dispatcher().scene().live_ids(), before);
        assert_eq!(console.dispatcher().scene().overlay().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Loopback WebSocket server
    // -----------------------------------------------------------------------

    async fn bind() -> Option<TcpListener> {
        match TcpListener::bind("127.0.0.1:0").await {
            Ok(listener) => Some(listener),
            Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
                eprintln!("skipping websocket test: local socket bind not permitted ({err})");
                None
            }
            Err(err) => panic!("listener should bind: {err}"),
        }
    }

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        let poll = async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        timeout(Duration::from_secs(5), poll)
            .await
            .expect("condition should hold within 5s");
    }

    #[tokio::test]
    async fn runtime_renders_snapshot_and_sends_command() {
        let Some(listener) = bind().await else {
            return;
        };
        let addr = listener.local_addr().expect("listener should expose address");
        let (got_tx, mut got_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("handshake");
            ws.send(Message::text(FRAME.to_owned())).await.expect("send snapshot");
            ws.send(Message::text(r#"{"ack": true, "type": "control"}"#.to_owned()))
                .await
                .expect("send ack");
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    let _ = got_tx.send(text.as_str().to_owned());
                }
            }
        });

        let config = ConsoleConfig {
            endpoint: format!("ws://{addr}/ws"),
            ..Default::default()
        };
        let runtime = Runtime::new(&config, SnapshotDispatcher::new(HeadlessScene::new()));
        let stats = runtime.stats();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let driver = async {
            wait_for(|| stats.lock().snapshots >= 1).await;
            tokio_test::assert_ok!(cmd_tx.send(Command::stop_all()));
            let got = timeout(Duration::from_secs(5), got_rx.recv())
                .await
                .expect("server should receive a command");
            let _ = stop_tx.send(());
            got
        };
        let shutdown = async {
            let _ = stop_rx.await;
        };

        let (console, got) = tokio::join!(runtime.run(cmd_rx, shutdown), driver);

        assert_eq!(got.as_deref(), Some(r#"{"type":"stop_all"}"#));
        let s = stats.lock().clone();
        assert_eq!(s.live_cranes, 0, "shutdown clears the scene");
        assert_eq!(s.commands_sent, 1);
        assert_eq!(s.snapshots, 1);
        assert_eq!(console.dispatcher().dispatched(), 1);
        assert!(console.dispatcher().scene().is_empty());
        assert_eq!(console.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn runtime_reconnects_after_server_drop() {
        let Some(listener) = bind().await else {
            return;
        };
        let addr = listener.local_addr().expect("listener should expose address");

        tokio::spawn(async move {
            // First connection is closed straight away.
            let (stream, _) = listener.accept().await.expect("accept #1");
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("handshake #1");
            let _ = ws.close(None).await;
            drop(ws);

            let (stream, _) = listener.accept().await.expect("accept #2");
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("handshake #2");
            ws.send(Message::text(FRAME.to_owned())).await.expect("send snapshot");
            while let Some(Ok(_)) = ws.next().await {}
        });

        let config = ConsoleConfig {
            endpoint: format!("ws://{addr}/ws"),
            reconnect: ReconnectPolicy {
                delay_ms: 50,
                multiplier: 1.0,
                max_delay_ms: 50,
            },
            ..Default::default()
        };
        let runtime = Runtime::new(&config, SnapshotDispatcher::new(HeadlessScene::new()));
        let stats = runtime.stats();
        let (_cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let driver = async {
            wait_for(|| {
                let s = stats.lock();
                s.snapshots >= 1 && s.live_cranes == 2 && s.overlay_lines == 1
            })
            .await;
            let _ = stop_tx.send(());
        };
        let shutdown = async {
            let _ = stop_rx.await;
        };
        let (console, ()) = tokio::join!(runtime.run(cmd_rx, shutdown), driver);

        assert!(console.channel().connector().generation() >= 2);
        assert_eq!(console.dispatcher().dispatched(), 1);
    }
}
