//! Integration tests: matches, the registry, and fan-out to real sessions.

use std::sync::Arc;

use encore_match::{MatchError, MatchRegistry, broadcast, send_to_occupants};
use encore_protocol::{MatchSettings, Rank, ServerPacket, UserId};
use encore_session::{
    ClientFingerprint, Location, OutboundReceiver, Presence, Session, SessionDirectory,
    UserAccount, generate_token,
};

// =========================================================================
// Helpers
// =========================================================================

fn online(directory: &SessionDirectory, id: i32) -> (Arc<Session>, OutboundReceiver) {
    let (session, rx) = Session::new(
        UserAccount {
            id: UserId(id),
            username: format!("player{id}"),
            rank: Rank::Player,
            country: 0,
            restricted: false,
        },
        generate_token(),
        Presence::new(Location::default(), ClientFingerprint::default()),
    );
    let session = Arc::new(session);
    directory.register(session.clone());
    (session, rx)
}

fn drain(rx: &mut OutboundReceiver) -> Vec<ServerPacket> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

fn settings() -> MatchSettings {
    MatchSettings {
        name: "integration".into(),
        ..MatchSettings::default()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[test]
fn broadcast_reaches_every_occupant() {
    let directory = SessionDirectory::new();
    let registry = MatchRegistry::default();
    let (_host, mut host_rx) = online(&directory, 1);
    let (_guest, mut guest_rx) = online(&directory, 2);
    let (_outsider, mut outsider_rx) = online(&directory, 3);

    let handle = registry.create(UserId(1), settings(), None);
    handle.lock().join(UserId(2), None).unwrap();

    assert_eq!(broadcast(&handle, &directory), 2);

    assert!(matches!(drain(&mut host_rx).as_slice(), [ServerPacket::MatchUpdate(_)]));
    assert!(matches!(drain(&mut guest_rx).as_slice(), [ServerPacket::MatchUpdate(_)]));
    assert!(drain(&mut outsider_rx).is_empty());
}

#[test]
fn broadcast_twice_without_change_is_dropped_as_stale() {
    let directory = SessionDirectory::new();
    let registry = MatchRegistry::default();
    let (_host, mut rx) = online(&directory, 1);
    let handle = registry.create(UserId(1), settings(), None);

    assert_eq!(broadcast(&handle, &directory), 1);
    assert_eq!(broadcast(&handle, &directory), 0);

    handle.lock().set_ready(UserId(1), true).unwrap();
    assert_eq!(broadcast(&handle, &directory), 1);

    assert_eq!(drain(&mut rx).len(), 2);
}

#[test]
fn older_snapshot_delivered_late_is_dropped() {
    let directory = SessionDirectory::new();
    let registry = MatchRegistry::default();
    let (host, mut rx) = online(&directory, 1);
    let handle = registry.create(UserId(1), settings(), None);

    let old = handle.snapshot();
    handle.lock().set_ready(UserId(1), true).unwrap();
    let new = handle.snapshot();

    assert!(host.enqueue_match_update(new.clone()));
    assert!(!host.enqueue_match_update(old));

    let delivered = drain(&mut rx);
    assert_eq!(delivered, vec![ServerPacket::MatchUpdate(new)]);
}

#[test]
fn host_leaving_passes_host_and_empty_match_is_removed() {
    let directory = SessionDirectory::new();
    let registry = MatchRegistry::default();
    let (_a, _rx_a) = online(&directory, 1);
    let (_b, _rx_b) = online(&directory, 2);
    let handle = registry.create(UserId(1), settings(), None);
    handle.lock().join(UserId(2), None).unwrap();

    let outcome = handle.lock().leave(UserId(1)).unwrap();
    assert_eq!(outcome.new_host, Some(UserId(2)));

    let outcome = handle.lock().leave(UserId(2)).unwrap();
    assert!(outcome.empty);
    registry.remove(handle.match_id());

    assert!(registry.get(handle.match_id()).is_none());
}

#[test]
fn wrong_password_leaves_match_untouched() {
    let registry = MatchRegistry::default();
    let handle = registry.create(UserId(1), settings(), Some("Secret".into()));
    let before = handle.snapshot();

    let result = handle.lock().join(UserId(2), Some("SECRET"));

    assert!(matches!(result, Err(MatchError::WrongPassword(_))));
    assert_eq!(handle.snapshot(), before);
}

#[test]
fn send_to_occupants_skips_offline_users() {
    let directory = SessionDirectory::new();
    let registry = MatchRegistry::default();
    let (_host, mut rx) = online(&directory, 1);
    let handle = registry.create(UserId(1), settings(), None);
    // User 2 sits in the match but has no session.
    handle.lock().join(UserId(2), None).unwrap();

    let sent = send_to_occupants(&handle, &directory, &ServerPacket::MatchAbort);

    assert_eq!(sent, 1);
    assert_eq!(drain(&mut rx), vec![ServerPacket::MatchAbort]);
}

#[tokio::test]
async fn concurrent_joins_fill_each_slot_once() {
    let registry = Arc::new(MatchRegistry::default());
    let handle = registry.create(UserId(1), settings(), None);

    let mut tasks = Vec::new();
    for id in 2..=20 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move { handle.lock().join(UserId(id), None) }));
    }

    let mut joined = 0;
    let mut full = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => joined += 1,
            Err(MatchError::Full(_)) => full += 1,
            Err(other) => panic!("unexpected error {other}"),
        }
    }

    assert_eq!(joined, 7);
    assert_eq!(full, 12);
    assert_eq!(handle.lock().player_count(), 8);
}
