//! Host and clients driven end-to-end through the loopback hub.

use snake_arena::{
    client::interpolation::InterpolationConfig,
    core::grid::Direction,
    game::{
        state::{MatchPhase, PlayerId},
        tick::{replay_match, MatchConfig},
    },
    network::{
        protocol::ErrorCode,
        session::{Role, Session, SessionConfig},
        transport::{LoopbackHub, PeerLink},
    },
};

const HOST: PlayerId = PlayerId::new([1; 16]);
const ALICE: PlayerId = PlayerId::new([2; 16]);
const BOB: PlayerId = PlayerId::new([3; 16]);

struct Peer {
    session: Session,
    link: PeerLink,
}

fn session_config() -> SessionConfig {
    SessionConfig { countdown_secs: 1, seed: Some(42), ..Default::default() }
}

fn match_config() -> MatchConfig {
    MatchConfig { match_duration_ms: 3_000, ..Default::default() }
}

async fn connect(hub: &LoopbackHub, role: Role, id: PlayerId, name: &str, config: SessionConfig) -> Peer {
    Peer {
        session: Session::new(role, id, name, config, match_config(), InterpolationConfig::default()),
        link: hub.connect(id).await,
    }
}

/// Deliver, advance every session by `dt_ms`, flush.
async fn frame(peers: &mut [Peer], dt_ms: u64) {
    for peer in peers.iter_mut() {
        while let Some(event) = peer.link.try_recv() {
            peer.session.handle_event(event);
        }
        peer.session.advance(dt_ms);
        peer.link.send_all(peer.session.drain_outgoing()).await.unwrap();
    }
}

/// Deliver until nothing is in flight.
async fn settle(peers: &mut [Peer]) {
    for _ in 0..4 {
        frame(peers, 0).await;
    }
}

async fn lobby(hub: &LoopbackHub, config: SessionConfig) -> Vec<Peer> {
    let mut peers = vec![
        connect(hub, Role::Host, HOST, "host", config.clone()).await,
        connect(hub, Role::Client, ALICE, "alice", config).await,
    ];
    peers[0].session.open_lobby().unwrap();
    peers[1].session.join(HOST).unwrap();
    settle(&mut peers).await;
    peers
}

#[tokio::test]
async fn test_full_match_through_loopback() {
    let hub = LoopbackHub::new();
    let mut peers = lobby(&hub, session_config()).await;
    assert_eq!(peers[1].session.phase(), MatchPhase::Lobby);

    for peer in peers.iter_mut() {
        peer.session.set_ready(true).unwrap();
    }
    settle(&mut peers).await;
    assert_eq!(peers[1].session.phase(), MatchPhase::Countdown);

    let mut frames = 0;
    while peers[0].session.phase() != MatchPhase::Ended {
        if peers[1].session.phase() == MatchPhase::Running && frames % 7 == 0 {
            let turn = if frames % 14 == 0 { Direction::Up } else { Direction::Left };
            peers[1].session.local_input(turn);
        }
        frame(&mut peers, 100).await;
        frames += 1;
        assert!(frames < 200, "match never ended");
    }
    settle(&mut peers).await;

    let host = &peers[0].session;
    let client = &peers[1].session;
    assert_eq!(client.phase(), MatchPhase::Ended);

    // client ends on the host's final snapshot
    let host_final = host.latest_snapshot().unwrap();
    let client_final = client.latest_snapshot().unwrap();
    assert_eq!(client_final.tick, host_final.tick);
    assert_eq!(client_final.state_hash, host_final.state_hash);

    // result scores match the individually tracked ones
    let end = client.last_result().unwrap();
    assert_eq!(end, host.last_result().unwrap());
    let tracked: u32 = host.match_state().unwrap().players.values().map(|p| p.score).sum();
    assert_eq!(end.scores.iter().map(|s| s.score).sum::<u32>(), tracked);

    // the host's input log reproduces the match
    let start = host.match_info().unwrap();
    let state = host.match_state().unwrap();
    let roster: Vec<(PlayerId, String, u8)> =
        start.players.iter().map(|p| (p.id, p.name.clone(), p.slot)).collect();
    let (replayed, _) = replay_match(
        &match_config(),
        start.seed,
        start.start_tick,
        &roster,
        host.input_log(),
        state.tick - start.start_tick,
    );
    assert_eq!(replayed.compute_hash(), state.compute_hash());
}

#[tokio::test]
async fn test_late_joiner_rejected() {
    let hub = LoopbackHub::new();
    let mut peers = lobby(&hub, SessionConfig { countdown_secs: 0, ..session_config() }).await;
    for peer in peers.iter_mut() {
        peer.session.set_ready(true).unwrap();
    }
    settle(&mut peers).await;
    assert_eq!(peers[0].session.phase(), MatchPhase::Running);

    peers.push(connect(&hub, Role::Client, BOB, "bob", session_config()).await);
    peers[2].session.join(HOST).unwrap();
    settle(&mut peers).await;

    let bob = &peers[2].session;
    assert_eq!(bob.phase(), MatchPhase::Idle);
    assert_eq!(bob.last_error().unwrap().code, ErrorCode::MatchInProgress);
    assert_eq!(peers[0].session.roster().len(), 2);
}

#[tokio::test]
async fn test_malformed_frames_are_ignored() {
    let hub = LoopbackHub::new();
    let mut peers = lobby(&hub, session_config()).await;

    assert!(hub.inject_raw(HOST, ALICE, "{ not json").await);
    assert!(hub.inject_raw(HOST, ALICE, r#"{"type":"teleport"}"#).await);
    assert!(hub.inject_raw(ALICE, HOST, r#"{"type":"state"}"#).await);
    settle(&mut peers).await;

    assert_eq!(peers[0].session.phase(), MatchPhase::Lobby);
    assert_eq!(peers[1].session.phase(), MatchPhase::Lobby);
    assert_eq!(peers[0].session.roster().len(), 2);
}

#[tokio::test]
async fn test_client_disconnect_and_hub_shutdown() {
    let hub = LoopbackHub::new();
    let mut peers = lobby(&hub, session_config()).await;

    peers[1].link.disconnect().await;
    settle(&mut peers).await;
    assert_eq!(peers[0].session.roster().len(), 1);

    hub.shutdown().await;
    settle(&mut peers).await;
    assert_eq!(peers[0].session.phase(), MatchPhase::Idle);
}
