use std::time::{Duration, Instant};

use super::*;
use crate::foundation::clock::ManualClock;
use crate::pipeline::frame::{EncodedFrame, FrameMetadata};

fn wait_for_updates(transport: &mut LocalTransport, n: usize) -> Vec<FrameUpdate> {
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut got = Vec::new();
    while got.len() < n && Instant::now() < deadline {
        got.extend(transport.drain_updates());
        std::thread::sleep(Duration::from_millis(1));
    }
    got
}

fn frame(layer: &str, id: u64) -> EncodedFrame {
    EncodedFrame::new(vec![0xAB; 3], FrameMetadata::new(LayerId::new(layer), id, 0.0))
}

#[test]
fn in_memory_transport_records_requests_and_drains_in_order() {
    let mut t = InMemoryTransport::new();
    t.send_request(FrameRequest {
        layer_id: LayerId::new("a"),
    })
    .unwrap();
    t.deliver(FrameUpdate::from_frame(&frame("a", 1), 0.0));
    t.deliver(FrameUpdate::from_frame(&frame("a", 2), 0.0));

    assert_eq!(t.request_count(&LayerId::new("a")), 1);
    let ids: Vec<_> = t.drain_updates().iter().map(|u| u.metadata.frame_id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(t.drain_updates().is_empty());
    assert_eq!(t.take_requests().len(), 1);
    assert!(t.requests().is_empty());
}

#[test]
fn local_transport_answers_buffered_and_parked_requests() {
    let clock = Arc::new(ManualClock::new(500.0));
    let mut transport = LocalTransport::spawn(clock).unwrap();
    let server = transport.server();
    let buffer = Arc::new(FrameBuffer::new(LayerId::new("cam"), 2).unwrap());
    server.register(Arc::clone(&buffer)).unwrap();

    buffer.push(frame("cam", 0));
    transport
        .send_request(FrameRequest {
            layer_id: LayerId::new("cam"),
        })
        .unwrap();
    let first = wait_for_updates(&mut transport, 1);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].metadata.frame_id, 0);
    assert_eq!(first[0].metadata.send_time, Some(500.0));

    // Empty buffer: the request parks until the notifier fires.
    transport
        .send_request(FrameRequest {
            layer_id: LayerId::new("cam"),
        })
        .unwrap();
    buffer.push(frame("cam", 1));
    (server.notifier())(&LayerId::new("cam"));
    let second = wait_for_updates(&mut transport, 1);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].metadata.frame_id, 1);

    let stats = transport.shutdown().unwrap();
    assert_eq!(stats.requests, 2);
    assert_eq!(stats.updates, 2);
}

#[test]
fn unregistered_layer_gets_no_updates() {
    let mut transport = LocalTransport::spawn(Arc::new(ManualClock::default())).unwrap();
    let server = transport.server();
    let buffer = Arc::new(FrameBuffer::new(LayerId::new("cam"), 1).unwrap());
    server.register(Arc::clone(&buffer)).unwrap();
    server.unregister(LayerId::new("cam")).unwrap();
    buffer.push(frame("cam", 0));
    transport
        .send_request(FrameRequest {
            layer_id: LayerId::new("cam"),
        })
        .unwrap();
    let stats = transport.shutdown().unwrap();
    assert_eq!(stats.unknown_layer, 1);
    assert_eq!(stats.updates, 0);
}

#[test]
fn handle_reports_stopped_server() {
    let transport = LocalTransport::spawn(Arc::new(ManualClock::default())).unwrap();
    let server = transport.server();
    transport.shutdown().unwrap();
    let err = server.unregister(LayerId::new("x")).unwrap_err();
    assert!(matches!(err, StreamViewError::Transport(_)));
}
