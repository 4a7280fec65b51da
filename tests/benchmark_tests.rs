//! Performance benchmarks for the routing hot paths

use serde_json::json;
use server::router::Router;
use shared::Inbound;
use std::time::Instant;
use tokio::sync::mpsc;

/// Benchmarks frame decoding for the four inbound types
#[test]
fn benchmark_frame_decoding() {
    let frames = [
        json!({"type": "register", "role": "client", "value": {"playerName": "Alice"}}).to_string(),
        json!({"type": "message", "message": "hello"}).to_string(),
        json!({"type": "ready", "value": {"playerName": "Alice"}}).to_string(),
        json!({"type": "controls", "value": {"left": true, "x": 0.5, "y": -0.25}}).to_string(),
    ];

    let iterations = 25_000;
    let start = Instant::now();

    for _ in 0..iterations {
        for frame in &frames {
            assert!(Inbound::decode(frame).is_ok());
        }
    }

    let duration = start.elapsed();
    let total = iterations * frames.len();
    println!(
        "Frame decoding: {} frames in {:?} ({:.2} μs/frame)",
        total,
        duration,
        duration.as_micros() as f64 / total as f64
    );

    assert!(duration.as_secs() < 5);
}

/// Benchmarks host notifications for many registered players
#[test]
fn benchmark_host_notifications() {
    let mut router = Router::new();

    let (host_tx, mut host_rx) = mpsc::unbounded_channel();
    let host = router.connect(host_tx);
    router.handle_frame(host, r#"{"type":"register","role":"host"}"#);

    let players = 1_000;
    let mut receivers = Vec::with_capacity(players);
    let mut ids = Vec::with_capacity(players);
    for _ in 0..players {
        let (tx, rx) = mpsc::unbounded_channel();
        ids.push(router.connect(tx));
        receivers.push(rx);
    }

    let controls = json!({"type": "controls", "value": {"left": true, "x": 0.5}}).to_string();
    let start = Instant::now();

    for (i, id) in ids.iter().enumerate() {
        let name = format!("player-{}", i);
        let register =
            json!({"type": "register", "role": "client", "value": {"playerName": name}});
        let ready = json!({"type": "ready", "value": {"playerName": name}});
        router.handle_frame(*id, &register.to_string());
        router.handle_frame(*id, &ready.to_string());
        for _ in 0..10 {
            router.handle_frame(*id, &controls);
        }
    }

    let duration = start.elapsed();

    let mut delivered = 0;
    while host_rx.try_recv().is_ok() {
        delivered += 1;
    }

    println!(
        "Host notifications: {} players, {} envelopes in {:?} ({:.2} μs/envelope)",
        players,
        delivered,
        duration,
        duration.as_micros() as f64 / delivered as f64
    );

    assert_eq!(delivered, players * 12);
    assert_eq!(router.registry().client_count(), players);
    // Should complete in under 5 seconds
    assert!(duration.as_secs() < 5);
}

/// Benchmarks message fan-out to a full lobby
#[test]
fn benchmark_message_broadcast() {
    let mut router = Router::new();

    let peers = 500;
    let mut receivers = Vec::with_capacity(peers);
    let mut ids = Vec::with_capacity(peers);
    for _ in 0..peers {
        let (tx, rx) = mpsc::unbounded_channel();
        ids.push(router.connect(tx));
        receivers.push(rx);
    }

    let messages = 100;
    let frame = json!({"type": "message", "message": "tick"}).to_string();
    let start = Instant::now();

    for _ in 0..messages {
        router.handle_frame(ids[0], &frame);
    }

    let duration = start.elapsed();

    let sender_received = std::iter::from_fn(|| receivers[0].try_recv().ok()).count();
    let mut delivered = 0;
    for rx in receivers.iter_mut().skip(1) {
        while let Ok(message) = rx.try_recv() {
            assert_eq!(message.to_text().unwrap(), "tick");
            delivered += 1;
        }
    }

    println!(
        "Broadcast: {} messages × {} peers in {:?} ({:.2} μs/message)",
        messages,
        peers - 1,
        duration,
        duration.as_micros() as f64 / messages as f64
    );

    assert_eq!(sender_received, 0);
    assert_eq!(delivered, messages * (peers - 1));
    assert!(duration.as_secs() < 5);
}

/// Benchmarks connect/disconnect churn through the registry
#[test]
fn benchmark_connection_churn() {
    let mut router = Router::new();
    let (host_tx, mut host_rx) = mpsc::unbounded_channel();
    let host = router.connect(host_tx);
    router.handle_frame(host, r#"{"type":"register","role":"host"}"#);

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = router.connect(tx);
        router.handle_frame(id, r#"{"type":"register","role":"client"}"#);
        router.disconnect(id);
    }

    let duration = start.elapsed();
    let notifications = std::iter::from_fn(|| host_rx.try_recv().ok()).count();

    println!(
        "Connection churn: {} connect/register/disconnect cycles in {:?}",
        iterations, duration
    );

    // new_client + client_disconnected per cycle
    assert_eq!(notifications, iterations * 2);
    assert_eq!(router.registry().connection_count(), 1);
    assert_eq!(router.registry().client_count(), 0);
    assert!(duration.as_secs() < 5);
}
