use super::*;
use std::sync::Arc;
use std::time::Duration;

use crate::frame::{FrameLayout, encode_frame};

const WAIT: Duration = Duration::from_secs(5);

async fn start() -> (SocketAddr, mpsc::Receiver<Event>, JoinHandle<()>) {
    let listener = bind(0).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::channel(16);
    let handle = spawn_acceptor(listener, tx, 4);
    (SocketAddr::from(([127, 0, 0, 1], port)), rx, handle)
}

async fn next_event(rx: &mut mpsc::Receiver<Event>) -> Event {
    tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap()
}

#[tokio::test]
async fn accepted_client_receives_queued_frames_in_order() {
    let (addr, mut events, _acceptor) = start().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    let Event::ClientConnected { tx, .. } = next_event(&mut events).await else {
        panic!("expected ClientConnected");
    };
    let first = encode_frame(b"first", FrameLayout::Plain).unwrap();
    let second = encode_frame(b"second", FrameLayout::Plain).unwrap();
    tx.send(Arc::clone(&first)).await.unwrap();
    tx.send(Arc::clone(&second)).await.unwrap();

    let mut buf = vec![0_u8; first.len() + second.len()];
    tokio::time::timeout(WAIT, client.read_exact(&mut buf)).await.unwrap().unwrap();
    assert_eq!(&buf[..first.len()], &*first);
    assert_eq!(&buf[first.len()..], &*second);
}

#[tokio::test]
async fn peer_close_reports_client_gone() {
    let (addr, mut events, _acceptor) = start().await;
    let client = TcpStream::connect(addr).await.unwrap();

    let Event::ClientConnected { id, tx: _tx, .. } = next_event(&mut events).await else {
        panic!("expected ClientConnected");
    };
    drop(client);

    let Event::ClientGone { id: gone, reason } = next_event(&mut events).await else {
        panic!("expected ClientGone");
    };
    assert_eq!(gone, id);
    assert_eq!(reason, GoneReason::Closed);
}

#[tokio::test]
async fn dropping_queue_ends_connection_silently() {
    let (addr, mut events, _acceptor) = start().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    let Event::ClientConnected { tx, .. } = next_event(&mut events).await else {
        panic!("expected ClientConnected");
    };
    drop(tx);

    // Server side closes the socket, so the client sees EOF.
    let mut buf = [0_u8; 8];
    let n = tokio::time::timeout(WAIT, client.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(n, 0);
    assert!(tokio::time::timeout(Duration::from_millis(100), events.recv()).await.is_err());
}

#[tokio::test]
async fn each_connection_gets_its_own_id() {
    let (addr, mut events, _acceptor) = start().await;
    let _a = TcpStream::connect(addr).await.unwrap();
    let _b = TcpStream::connect(addr).await.unwrap();

    let Event::ClientConnected { id: first, .. } = next_event(&mut events).await else {
        panic!("expected ClientConnected");
    };
    let Event::ClientConnected { id: second, .. } = next_event(&mut events).await else {
        panic!("expected ClientConnected");
    };
    assert_ne!(first, second);
}

#[test]
fn per_connection_accept_errors_retry_immediately() {
    for kind in [io::ErrorKind::ConnectionAborted, io::ErrorKind::ConnectionReset, io::ErrorKind::ConnectionRefused] {
        assert_eq!(accept_backoff(&io::Error::from(kind)), None);
    }
}

#[test]
fn listener_level_accept_errors_back_off() {
    // EMFILE: every further accept fails until a descriptor is freed.
    let emfile = io::Error::from_raw_os_error(24);
    assert_eq!(accept_backoff(&emfile), Some(ACCEPT_ERROR_BACKOFF));
    assert_eq!(accept_backoff(&io::Error::other("out of memory")), Some(ACCEPT_ERROR_BACKOFF));
    assert!(ACCEPT_ERROR_BACKOFF >= Duration::from_millis(100));
}
