use super::*;
use std::net::SocketAddr;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::frame::FrameBytes;
use crate::services::calibration::{CalibrationPoint, Phase};
use crate::state::GoneReason;

fn small_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.table.pixels_per_meter = 100.0;
    config
}

fn node() -> (Node, NodeHandle) {
    Node::new(&small_config(), Arc::new(SceneRenderer::new(95, None)))
}

fn peer() -> SocketAddr {
    "127.0.0.1:40002".parse().unwrap()
}

fn connect(node: &mut Node, depth: usize) -> (Uuid, mpsc::Receiver<FrameBytes>) {
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(depth);
    node.handle(Event::ClientConnected { id, peer: peer(), tx });
    (id, rx)
}

#[tokio::test]
async fn ten_ticks_without_clients_write_nothing() {
    let (mut node, _handle) = node();
    for _ in 0..10 {
        assert_eq!(node.handle(Event::Tick), Flow::Continue);
    }
    assert!(!node.broadcaster().in_flight());
    assert!(node.events_rx.try_recv().is_err());
    assert_eq!(node.broadcaster().frames_sent(), 0);
}

#[tokio::test]
async fn connected_client_gets_one_frame_per_tick() {
    let (mut node, _handle) = node();
    let (_id, mut frames) = connect(&mut node, 8);

    for _ in 0..3 {
        node.handle(Event::Tick);
        // Process the FrameReady posted by the render worker.
        assert_eq!(node.step().await, Some(Flow::Continue));
    }

    for _ in 0..3 {
        let frame = frames.try_recv().unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);
    }
    assert!(frames.try_recv().is_err());
    assert_eq!(node.broadcaster().frames_sent(), 3);
}

#[tokio::test]
async fn client_gone_is_removed_once() {
    let (mut node, _handle) = node();
    let (id, _frames) = connect(&mut node, 4);
    assert_eq!(node.clients().len(), 1);

    node.handle(Event::ClientGone { id, reason: GoneReason::Closed });
    node.handle(Event::ClientGone { id, reason: GoneReason::WriteFailed("reset".into()) });
    assert!(node.clients().is_empty());
}

#[tokio::test]
async fn calibration_request_then_two_touches_restores_scene() {
    let (mut node, handle) = node();
    node.add_demo_content();

    let points = vec![CalibrationPoint { x: 0.1, y: 0.1 }, CalibrationPoint { x: 0.5, y: 0.5 }];
    let request = tokio::spawn(async move { handle.request_calibration(points).await });

    // CalibrationRequested, then the follow-up ShowNextCalibrationPoint.
    node.step().await;
    assert!(request.await.unwrap().unwrap());
    assert_eq!(node.calibration().phase(), Phase::CollectingPoints);
    assert_eq!(node.scene().visible_items().count(), 0);

    node.step().await;
    assert_eq!(node.calibration().phase(), Phase::AwaitingTouches);
    assert_eq!(node.scene().visible_items().count(), 1);

    node.handle(Event::TouchDetected);
    assert_eq!(node.calibration().pending(), 0);
    assert!(node.calibration().marker().is_some());

    node.handle(Event::TouchDetected);
    assert_eq!(node.calibration().phase(), Phase::Idle);
    assert_eq!(node.calibration().completed_runs(), 1);
    assert_eq!(node.scene().len(), 1);
    assert_eq!(node.scene().visible_items().count(), 1);
}

#[tokio::test]
async fn touch_outside_calibration_is_ignored() {
    let (mut node, _handle) = node();
    node.add_demo_content();
    node.handle(Event::TouchDetected);
    assert_eq!(node.scene().len(), 1);
    assert_eq!(node.calibration().completed_runs(), 0);
}

#[tokio::test]
async fn demo_greeting_is_sized_in_points() {
    let (mut node, _handle) = node();
    node.add_demo_content();
    let item = node.scene().items().next().unwrap();
    let ItemKind::Text { text, size_px } = &item.kind else {
        panic!("expected a text item");
    };
    assert_eq!(text, GREETING);
    // 148 pt at 96 DPI.
    assert!((size_px - 148.0 * 96.0 / 72.0).abs() < 1e-9);
}

#[tokio::test]
async fn projector_completion_publishes_status() {
    let (mut node, handle) = node();
    node.projectors.mark_pending("proj-a");
    node.handle(Event::ProjectorCalibrated { id: "proj-a".into(), result: Ok(true) });
    assert_eq!(handle.status.current(), Some(true));
}

#[tokio::test]
async fn scene_request_returns_current_scene() {
    let (mut node, _handle) = node();
    node.add_demo_content();
    let (reply, rx) = oneshot::channel();
    node.handle(Event::SceneRequested { reply });
    let scene = rx.await.unwrap();
    assert_eq!(scene.len(), 1);
    assert_eq!(scene.width_px(), 100);
}

#[tokio::test]
async fn run_stops_on_shutdown() {
    let (node, handle) = node();
    let running = tokio::spawn(node.run());
    handle.shutdown().await;
    tokio::time::timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
}

#[tokio::test]
async fn running_node_streams_to_connected_client() {
    let (mut node, handle) = node();
    let (_id, mut frames) = connect(&mut node, 8);
    let running = tokio::spawn(node.run());

    let frame = tokio::time::timeout(Duration::from_secs(5), frames.recv()).await.unwrap().unwrap();
    assert_eq!(&frame[4..6], &[0xFF, 0xD8]);

    handle.shutdown().await;
    running.await.unwrap();
}
