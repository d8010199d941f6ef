//! End-to-end flows through the public engine API: samples in over the
//! feed, ordered decode events out over the broadcast channels.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use keytone_core::{
    DecodeEvent, DecodeEventKind, EngineConfig, EngineStatus, GapConfig, KeytoneEngine, Symbol,
};

async fn recv_event(rx: &mut broadcast::Receiver<DecodeEvent>) -> DecodeEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for decode event")
        .expect("decode channel closed unexpectedly")
}

fn letter(text: &str, is_shortcut: bool, was_forced: bool) -> DecodeEventKind {
    DecodeEventKind::Letter {
        text: text.into(),
        is_shortcut,
        was_forced,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn decodes_letters_words_and_flushes_on_stop() {
    let engine = KeytoneEngine::new(EngineConfig::default()).expect("engine");
    let mut rx = engine.subscribe_decode();
    let mut feed = engine.start().expect("start");

    let base = Instant::now();
    feed.push_at(80.0, base).expect("push");
    feed.push_at(0.0, base + Duration::from_millis(100)).expect("push");
    feed.push_at(80.0, base + Duration::from_millis(800)).expect("push");
    feed.push_at(0.0, base + Duration::from_millis(1050)).expect("push");

    assert_eq!(
        recv_event(&mut rx).await.kind,
        DecodeEventKind::Symbol {
            symbol: Symbol::Dot,
            duration_ms: 100
        }
    );
    assert_eq!(
        recv_event(&mut rx).await.kind,
        DecodeEventKind::Gap { duration_ms: 700 }
    );
    assert_eq!(recv_event(&mut rx).await.kind, letter("E", false, false));
    assert_eq!(
        recv_event(&mut rx).await.kind,
        DecodeEventKind::Symbol {
            symbol: Symbol::Dash,
            duration_ms: 250
        }
    );

    // Explicit flush commits the pending dash and marks the word.
    engine.end_of_input().expect("end of input");
    assert_eq!(recv_event(&mut rx).await.kind, letter("T", false, false));
    assert_eq!(recv_event(&mut rx).await.kind, DecodeEventKind::WordBoundary);

    // Stop flushes again: nothing is pending, so only a word boundary.
    engine.stop().expect("stop");
    let last = recv_event(&mut rx).await;
    assert_eq!(last.kind, DecodeEventKind::WordBoundary);
    assert_eq!(last.seq, 6);

    let snap = engine.diagnostics_snapshot();
    assert_eq!(snap.samples_in, 4);
    assert_eq!(snap.symbols_emitted, 2);
    assert_eq!(snap.letters_committed, 2);
    assert_eq!(snap.word_boundaries, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn replaced_shortcut_table_wins_over_the_alphabet() {
    let engine = KeytoneEngine::new(EngineConfig::default()).expect("engine");
    let mut shortcuts = HashMap::new();
    shortcuts.insert("·".to_string(), "yes".to_string());
    engine.set_shortcut_table(shortcuts).expect("valid keys");

    let mut rx = engine.subscribe_decode();
    let mut feed = engine.start().expect("start");

    let base = Instant::now();
    feed.push_at(80.0, base).expect("push");
    feed.push_at(0.0, base + Duration::from_millis(100)).expect("push");
    engine.end_of_input().expect("end of input");

    assert!(matches!(
        recv_event(&mut rx).await.kind,
        DecodeEventKind::Symbol { .. }
    ));
    assert_eq!(recv_event(&mut rx).await.kind, letter("yes", true, false));

    engine.stop().expect("stop");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inactivity_forces_a_commit_in_real_time() {
    let config = EngineConfig {
        gaps: GapConfig {
            auto_commit_ms: 50,
            ..GapConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = KeytoneEngine::new(config).expect("engine");
    let mut rx = engine.subscribe_decode();
    let mut feed = engine.start().expect("start");

    let base = Instant::now();
    feed.push_at(80.0, base).expect("push");
    feed.push_at(0.0, base + Duration::from_millis(100)).expect("push");

    assert!(matches!(
        recv_event(&mut rx).await.kind,
        DecodeEventKind::Symbol { .. }
    ));
    // No gap ever arrives; the deadline alone must commit the letter.
    assert_eq!(recv_event(&mut rx).await.kind, letter("E", false, true));

    engine.stop().expect("stop");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_follows_the_lifecycle() {
    let engine = KeytoneEngine::new(EngineConfig::default()).expect("engine");
    let mut status_rx = engine.subscribe_status();
    assert_eq!(engine.status(), EngineStatus::Idle);

    let _feed = engine.start().expect("start");
    assert_eq!(engine.status(), EngineStatus::Listening);
    assert!(engine.start().is_err(), "second start must be rejected");

    engine.stop().expect("stop");
    assert_eq!(engine.status(), EngineStatus::Stopped);

    let first = status_rx.recv().await.expect("status event");
    let second = status_rx.recv().await.expect("status event");
    assert_eq!(first.status, EngineStatus::Listening);
    assert_eq!(second.status, EngineStatus::Stopped);
}
