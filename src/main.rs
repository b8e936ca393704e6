//! Snake Arena Demo
//!
//! Runs a host and two bot clients through the in-process loopback hub until
//! one match ends, then replays the host's input log to check determinism.
//!
//! Usage: `snake-arena [config.json]`

use std::time::Duration;

use anyhow::Context;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use snake_arena::{
    AppConfig, VERSION,
    core::{
        clock::SystemClock,
        grid::{Direction, OccupancyIndex},
    },
    game::{
        events::{GameEvent, GameEventData},
        state::{MatchPhase, PlayerId},
        tick::{replay_match, MatchConfig},
    },
    network::{
        scheduler::FrameClock,
        session::{Role, Session},
        snapshot::Snapshot,
        transport::{LoopbackHub, PeerLink},
    },
};

/// Frame interval of the demo loop.
const FRAME_MS: u64 = 16;

/// One simulated peer: its session and its end of the hub.
struct Peer {
    session: Session,
    link: PeerLink,
    ready_sent: bool,
    steered_tick: Option<u32>,
}

impl Peer {
    async fn connect(hub: &LoopbackHub, role: Role, name: &str, config: &AppConfig) -> Self {
        let id = PlayerId::random();
        let session = Session::new(
            role,
            id,
            name,
            config.session.clone(),
            config.game.clone(),
            config.interpolation.clone(),
        );
        Self { session, link: hub.connect(id).await, ready_sent: false, steered_tick: None }
    }

    /// Deliver queued events, act, advance and flush.
    async fn frame(&mut self, dt_ms: u64, game: &MatchConfig) -> anyhow::Result<()> {
        while let Some(event) = self.link.try_recv() {
            self.session.handle_event(event);
        }

        match self.session.phase() {
            MatchPhase::Lobby if !self.ready_sent => {
                self.session.set_ready(true)?;
                self.ready_sent = true;
            }
            MatchPhase::Running => self.steer(game),
            _ => {}
        }

        self.session.advance(dt_ms);
        for event in self.session.drain_events() {
            log_event(&event);
        }
        self.link.send_all(self.session.drain_outgoing()).await?;
        Ok(())
    }

    /// One decision per new snapshot.
    fn steer(&mut self, game: &MatchConfig) {
        let id = self.session.local_id();
        let Some(snapshot) = self.session.latest_snapshot() else {
            return;
        };
        if self.steered_tick == Some(snapshot.tick) {
            return;
        }
        self.steered_tick = Some(snapshot.tick);
        if let Some(direction) = choose_direction(snapshot, &id, game) {
            self.session.local_input(direction);
        }
    }
}

/// Greedy bot: head for the nearest food without reversing or hitting
/// anything visible.
fn choose_direction(snapshot: &Snapshot, id: &PlayerId, game: &MatchConfig) -> Option<Direction> {
    let me = snapshot.player(id).filter(|p| p.alive)?;
    let head = *me.segments.first()?;
    let heading = me
        .segments
        .get(1)
        .and_then(|neck| Direction::from_delta(head.x - neck.x, head.y - neck.y));

    let mut blocked = OccupancyIndex::new();
    for player in snapshot.players.iter().filter(|p| p.alive) {
        blocked.extend(&player.segments);
    }
    let target = snapshot
        .foods
        .iter()
        .min_by_key(|f| (f.x - head.x).abs() + (f.y - head.y).abs())
        .copied();

    Direction::ALL
        .into_iter()
        .filter(|d| heading != Some(d.opposite()))
        .filter(|d| blocked.is_free(head.offset(*d), game.cols, game.rows))
        .min_by_key(|d| {
            let next = head.offset(*d);
            target.map_or(0, |f| (f.x - next.x).abs() + (f.y - next.y).abs())
        })
}

fn log_event(event: &GameEvent) {
    match &event.data {
        GameEventData::PlayerDied { victim_id, cause, .. } => {
            info!(tick = event.tick, player = %victim_id.short(), ?cause, "Player died");
        }
        GameEventData::PowerUpCollected { player_id, kind, .. } => {
            info!(tick = event.tick, player = %player_id.short(), ?kind, "Power-up collected");
        }
        GameEventData::PlayerRespawned { player_id, head, forced } => {
            debug!(tick = event.tick, player = %player_id.short(), x = head.x, y = head.y, forced, "Player respawned");
        }
        _ => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(&path).with_context(|| format!("loading config from {path}"))?,
        None => AppConfig::default(),
    };

    info!("Snake Arena v{}", VERSION);
    info!(
        cols = config.game.cols,
        rows = config.game.rows,
        tick_ms = config.game.tick_ms,
        match_secs = config.game.match_duration_ms / 1000,
        "Board"
    );

    let hub = LoopbackHub::new();
    let mut peers = vec![Peer::connect(&hub, Role::Host, "host", &config).await];
    for name in ["bot-1", "bot-2"] {
        peers.push(Peer::connect(&hub, Role::Client, name, &config).await);
    }

    let host_id = peers[0].session.local_id();
    peers[0].session.open_lobby()?;
    for peer in peers.iter_mut().skip(1) {
        peer.session.join(host_id)?;
    }

    let mut frames = FrameClock::new(SystemClock::new());
    let mut interval = tokio::time::interval(Duration::from_millis(FRAME_MS));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        let dt_ms = frames.delta_ms();
        for peer in peers.iter_mut() {
            peer.frame(dt_ms, &config.game).await?;
        }
        if peers[0].session.phase() == MatchPhase::Ended {
            break;
        }
    }

    // Let the clients see the result
    for peer in peers.iter_mut().skip(1) {
        peer.frame(0, &config.game).await?;
    }

    report(&peers[0].session, &config.game);
    for peer in peers.iter().skip(1) {
        let seen = peer.session.last_result().map(|r| r.winner_name.clone()).unwrap_or_default();
        info!(client = %peer.session.local_id().short(), winner = %seen, "Client saw result");
    }

    for peer in peers.iter_mut() {
        peer.session.leave();
        peer.link.send_all(peer.session.drain_outgoing()).await?;
        peer.link.disconnect().await;
    }
    hub.shutdown().await;
    Ok(())
}

/// Final standings plus a replay of the host's input log.
fn report(host: &Session, game: &MatchConfig) {
    info!("=== Match Results ===");
    if let Some(result) = host.last_result() {
        for (place, line) in result.scores.iter().enumerate() {
            info!("#{}: {} - Score: {}{}", place + 1, line.name, line.score, if line.alive { "" } else { " (dead)" });
        }
    }

    let (Some(state), Some(start)) = (host.match_state(), host.match_info()) else {
        return;
    };
    let hash = state.compute_hash();
    info!("Final State Hash: {}", hex::encode(hash));

    info!("=== Verifying Determinism ===");
    let roster: Vec<(PlayerId, String, u8)> =
        start.players.iter().map(|p| (p.id, p.name.clone(), p.slot)).collect();
    let (replayed, _) = replay_match(
        game,
        start.seed,
        start.start_tick,
        &roster,
        host.input_log(),
        state.tick - start.start_tick,
    );
    let replay_hash = replayed.compute_hash();
    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if hash == replay_hash {
        info!("DETERMINISM VERIFIED: Hashes match!");
    } else {
        warn!("DETERMINISM FAILURE: Hashes differ!");
    }
}
