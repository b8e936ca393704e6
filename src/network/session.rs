//! Session State Machine
//!
//! Drives one peer through idle → lobby → countdown → running → ended.
//!
//! The host owns the roster and the match engine; clients mirror what the
//! host broadcasts and send only their own intents. A session never touches
//! a socket: it consumes [`TransportEvent`]s, queues [`Outgoing`] messages
//! for the caller to flush, and is driven by `advance(dt)`.

use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::client::interpolation::{InterpolationConfig, Interpolator};
use crate::client::render::RenderState;
use crate::core::grid::Direction;
use crate::core::rng::seed_from_wall_clock;
use crate::game::events::GameEvent;
use crate::game::input::{InputLog, TickInputs};
use crate::game::state::{MatchPhase, MatchResult, MatchState, PlayerId};
use crate::game::tick::{start_match, tick, MatchConfig};
use crate::network::protocol::{
    CountdownPayload, EndPayload, ErrorCode, ErrorPayload, HelloPayload, InputPayload,
    Message, ReadyPayload, RosterPayload, StartPayload,
};
use crate::network::roster::Roster;
use crate::network::scheduler::{Advance, FixedStepScheduler, SendThrottle};
use crate::network::snapshot::{Snapshot, SnapshotDecoder};
use crate::network::transport::{Outgoing, TransportEvent};

/// Which side of the session this peer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Runs the authoritative simulation.
    Host,
    /// Renders the host's snapshots.
    Client,
}

/// Configuration for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum players in a lobby.
    pub max_players: usize,
    /// Minimum players to start.
    pub min_players: usize,
    /// Countdown length (seconds).
    pub countdown_secs: u32,
    /// Minimum gap between snapshot broadcasts (ms).
    pub snapshot_interval_ms: u32,
    /// Ticks run per `advance` at most; the rest is dropped.
    pub max_catch_up_ticks: u32,
    /// Fixed match seed; mixed from the wall clock when unset.
    pub seed: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_players: 4,
            min_players: 2,
            countdown_secs: 3,
            snapshot_interval_ms: 100,
            max_catch_up_ticks: 5,
            seed: None,
        }
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Lobby is full.
    #[error("Session is full")]
    SessionFull,

    /// Joins are closed once the lobby is left.
    #[error("Match in progress")]
    MatchInProgress,

    /// Host-only operation.
    #[error("Only the host may do this")]
    NotHost,

    /// Operation not valid in the current phase.
    #[error("Invalid session state: {0:?}")]
    InvalidState(MatchPhase),

    /// Player not found.
    #[error("Player not found")]
    PlayerNotFound,
}

impl SessionError {
    /// Wire code reported to a rejected peer.
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::SessionFull => ErrorCode::LobbyFull,
            SessionError::NotHost => ErrorCode::NotHost,
            _ => ErrorCode::MatchInProgress,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CountdownTimer {
    start_tick: u32,
    deadline: u32,
    last_seconds: u32,
}

/// One peer's view of a session.
pub struct Session {
    role: Role,
    local_id: PlayerId,
    local_name: String,
    phase: MatchPhase,
    config: SessionConfig,
    match_config: MatchConfig,
    roster: Roster,
    /// Client: the host we joined
    host_id: Option<PlayerId>,
    outbox: Vec<Outgoing>,

    scheduler: FixedStepScheduler,
    now_ms: u64,
    clock_tick: u32,

    // Host side
    engine: Option<MatchState>,
    pending_inputs: TickInputs,
    input_log: InputLog,
    events: Vec<GameEvent>,
    countdown: Option<CountdownTimer>,
    throttle: SendThrottle,
    latest_snapshot: Option<Snapshot>,
    last_sent_tick: Option<u32>,
    matches_started: u32,

    // Client side
    decoder: SnapshotDecoder,

    // Both
    countdown_view: Option<CountdownPayload>,
    match_info: Option<StartPayload>,
    interpolator: Interpolator,
    last_result: Option<EndPayload>,
    last_error: Option<ErrorPayload>,
}

impl Session {
    /// Create an idle session.
    pub fn new(
        role: Role,
        local_id: PlayerId,
        local_name: impl Into<String>,
        config: SessionConfig,
        match_config: MatchConfig,
        interpolation: InterpolationConfig,
    ) -> Self {
        Self {
            role,
            local_id,
            local_name: local_name.into(),
            phase: MatchPhase::Idle,
            scheduler: FixedStepScheduler::new(match_config.tick_ms, config.max_catch_up_ticks),
            throttle: SendThrottle::new(config.snapshot_interval_ms),
            config,
            match_config,
            roster: Roster::new(),
            host_id: None,
            outbox: Vec::new(),
            now_ms: 0,
            clock_tick: 0,
            engine: None,
            pending_inputs: TickInputs::new(),
            input_log: InputLog::new(),
            events: Vec::new(),
            countdown: None,
            latest_snapshot: None,
            last_sent_tick: None,
            matches_started: 0,
            decoder: SnapshotDecoder::new(),
            countdown_view: None,
            match_info: None,
            interpolator: Interpolator::new(interpolation, Some(local_id)),
            last_result: None,
            last_error: None,
        }
    }

    // =========================================================================
    // LOCAL OPERATIONS
    // =========================================================================

    /// Host: open a lobby with ourselves in it.
    pub fn open_lobby(&mut self) -> Result<(), SessionError> {
        if self.role != Role::Host {
            return Err(SessionError::NotHost);
        }
        if self.phase != MatchPhase::Idle {
            return Err(SessionError::InvalidState(self.phase));
        }

        self.roster.clear();
        self.roster.join(self.local_id, self.local_name.clone(), true);
        self.set_phase(MatchPhase::Lobby);
        self.broadcast_roster();
        Ok(())
    }

    /// Client: ask `host_id` to let us in. We enter the lobby once the host's
    /// roster lists us.
    pub fn join(&mut self, host_id: PlayerId) -> Result<(), SessionError> {
        if self.role != Role::Client {
            return Err(SessionError::InvalidState(self.phase));
        }
        if self.phase != MatchPhase::Idle {
            return Err(SessionError::InvalidState(self.phase));
        }

        self.host_id = Some(host_id);
        self.last_error = None;
        self.send_to(host_id, Message::Hello(HelloPayload { name: self.local_name.clone() }));
        info!(host = %host_id.short(), "Joining session");
        Ok(())
    }

    /// Toggle our ready flag.
    pub fn set_ready(&mut self, ready: bool) -> Result<(), SessionError> {
        if !matches!(self.phase, MatchPhase::Lobby | MatchPhase::Countdown) {
            return Err(SessionError::InvalidState(self.phase));
        }
        match self.role {
            Role::Host => self.host_set_ready(self.local_id, ready),
            Role::Client => {
                let host = self.host_id.ok_or(SessionError::PlayerNotFound)?;
                self.send_to(host, Message::Ready(ReadyPayload { ready }));
            }
        }
        Ok(())
    }

    /// Steer our own snake. Dropped outside a running match.
    pub fn local_input(&mut self, direction: Direction) {
        if self.phase != MatchPhase::Running {
            return;
        }
        match self.role {
            Role::Host => {
                self.pending_inputs.insert(self.local_id, direction);
            }
            Role::Client => {
                if let Some(host) = self.host_id {
                    let tick = self.decoder.last_tick().unwrap_or(0);
                    self.send_to(host, Message::Input(InputPayload::from_direction(direction, tick)));
                }
            }
        }
    }

    /// Return an ended match to the lobby.
    pub fn request_rematch(&mut self) -> Result<(), SessionError> {
        if self.phase != MatchPhase::Ended {
            return Err(SessionError::InvalidState(self.phase));
        }
        match self.role {
            Role::Host => self.host_rematch(),
            Role::Client => {
                let host = self.host_id.ok_or(SessionError::PlayerNotFound)?;
                self.send_to(host, Message::Rematch);
            }
        }
        Ok(())
    }

    /// Leave the session from any phase. Safe to call repeatedly; only the
    /// first call announces the departure.
    pub fn leave(&mut self) {
        match self.role {
            Role::Host if self.phase != MatchPhase::Idle => self.broadcast(Message::Leave),
            Role::Client => {
                if let Some(host) = self.host_id {
                    self.send_to(host, Message::Leave);
                }
            }
            Role::Host => {}
        }
        if self.phase != MatchPhase::Idle || self.host_id.is_some() {
            info!(phase = ?self.phase, "Leaving session");
        }
        self.reset_to_idle();
    }

    // =========================================================================
    // DRIVING
    // =========================================================================

    /// Advance local time by `dt_ms`. On the host this runs every tick due
    /// (countdown or match) and then a throttled snapshot broadcast.
    pub fn advance(&mut self, dt_ms: u64) -> Advance {
        self.now_ms += dt_ms;
        if self.phase == MatchPhase::Idle {
            return Advance { steps: 0, alpha: 0.0 };
        }

        let advance = self.scheduler.advance(dt_ms);
        if self.role == Role::Host {
            for _ in 0..advance.steps {
                self.clock_tick += 1;
                self.host_step();
            }
            self.flush_snapshot();
        }
        advance
    }

    /// Route one transport event.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::PeerJoined(id) => {
                debug!(peer = %id.short(), "Peer connected");
            }
            TransportEvent::PeerLeft(id) => match self.role {
                Role::Host => self.host_remove_peer(id),
                Role::Client if self.host_id == Some(id) => {
                    info!(host = %id.short(), "Host disconnected");
                    self.reset_to_idle();
                }
                Role::Client => {}
            },
            TransportEvent::Message { from, message } => {
                if from == self.local_id {
                    return;
                }
                match self.role {
                    Role::Host => self.host_handle(from, message),
                    Role::Client => self.client_handle(from, message),
                }
            }
            TransportEvent::Closed => {
                info!(phase = ?self.phase, "Transport closed");
                self.reset_to_idle();
                self.outbox.clear();
            }
        }
    }

    /// Take the queued outgoing messages.
    pub fn drain_outgoing(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    /// Take the host's game events since the last call.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Interpolated state for the current local time.
    pub fn render_state(&self) -> RenderState {
        self.interpolator.render(self.now_ms)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Lifecycle phase.
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Host or client.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Our player id.
    pub fn local_id(&self) -> PlayerId {
        self.local_id
    }

    /// Current roster.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Host: the running (or just ended) engine.
    pub fn match_state(&self) -> Option<&MatchState> {
        self.engine.as_ref()
    }

    /// Host: inputs applied per tick in the current match.
    pub fn input_log(&self) -> &InputLog {
        &self.input_log
    }

    /// Start message of the current match.
    pub fn match_info(&self) -> Option<&StartPayload> {
        self.match_info.as_ref()
    }

    /// Countdown progress while counting down.
    pub fn countdown(&self) -> Option<CountdownPayload> {
        self.countdown_view
    }

    /// Result of the last finished match.
    pub fn last_result(&self) -> Option<&EndPayload> {
        self.last_result.as_ref()
    }

    /// Last rejection reported by the host.
    pub fn last_error(&self) -> Option<&ErrorPayload> {
        self.last_error.as_ref()
    }

    /// Newest snapshot produced (host) or accepted (client).
    pub fn latest_snapshot(&self) -> Option<&Snapshot> {
        match self.role {
            Role::Host => self.latest_snapshot.as_ref(),
            Role::Client => self.interpolator.latest(),
        }
    }

    /// Ticks counted by the host's fixed-step clock.
    pub fn clock_tick(&self) -> u32 {
        self.clock_tick
    }

    // =========================================================================
    // HOST
    // =========================================================================

    fn host_step(&mut self) {
        match self.phase {
            MatchPhase::Countdown => self.countdown_step(),
            MatchPhase::Running => self.run_match_tick(),
            _ => {}
        }
    }

    fn host_handle(&mut self, from: PlayerId, message: Message) {
        if self.phase == MatchPhase::Idle {
            return;
        }
        if !message.allowed_from_client() {
            warn!(from = %from.short(), kind = message.kind(), "Dropping host-only message from client");
            return;
        }

        match message {
            Message::Hello(hello) => match self.host_accept_join(from, hello.name) {
                Ok(true) => self.broadcast_roster(),
                Ok(false) => {}
                Err(e) => {
                    warn!(from = %from.short(), error = %e, "Join rejected");
                    self.send_to(from, Message::Error(ErrorPayload { code: e.code(), message: e.to_string() }));
                }
            },
            Message::Ready(ready) => self.host_set_ready(from, ready.ready),
            Message::Input(input) => self.host_queue_input(from, &input),
            Message::Rematch => {
                if self.roster.contains(&from) {
                    self.host_rematch();
                }
            }
            Message::Leave => self.host_remove_peer(from),
            other => debug!(kind = other.kind(), "Unhandled client message"),
        }
    }

    /// Returns whether the roster changed.
    fn host_accept_join(&mut self, from: PlayerId, name: String) -> Result<bool, SessionError> {
        if self.roster.contains(&from) {
            if self.phase == MatchPhase::Lobby {
                self.roster.join(from, name, false);
                return Ok(true);
            }
            return Ok(false);
        }
        if self.phase != MatchPhase::Lobby {
            return Err(SessionError::MatchInProgress);
        }
        if self.roster.len() >= self.config.max_players {
            return Err(SessionError::SessionFull);
        }

        info!(player = %from.short(), name = %name, "Player joined");
        self.roster.join(from, name, false);
        Ok(true)
    }

    fn host_set_ready(&mut self, id: PlayerId, ready: bool) {
        if !matches!(self.phase, MatchPhase::Lobby | MatchPhase::Countdown) {
            debug!(player = %id.short(), phase = ?self.phase, "Ready outside lobby dropped");
            return;
        }
        if !self.roster.set_ready(&id, ready) {
            debug!(player = %id.short(), "Ready from unknown player dropped");
            return;
        }

        debug!(player = %id.short(), ready, "Ready changed");
        if !ready {
            self.cancel_countdown();
        }
        self.broadcast_roster();
        self.maybe_start_countdown();
    }

    fn host_queue_input(&mut self, from: PlayerId, input: &InputPayload) {
        if self.phase != MatchPhase::Running {
            return;
        }
        let known = self.engine.as_ref().is_some_and(|e| e.players.contains_key(&from));
        if !known {
            debug!(from = %from.short(), "Input from unknown player dropped");
            return;
        }
        match input.direction() {
            Some(direction) => {
                self.pending_inputs.insert(from, direction);
            }
            None => debug!(from = %from.short(), key = ?input.key, "Unmapped input dropped"),
        }
    }

    fn host_remove_peer(&mut self, id: PlayerId) {
        if self.roster.leave(&id).is_none() {
            return;
        }
        info!(player = %id.short(), phase = ?self.phase, "Player left");

        if self.phase == MatchPhase::Running {
            if let Some(engine) = self.engine.as_mut() {
                engine.remove_player(&id);
            }
        }
        self.pending_inputs.remove(&id);
        self.cancel_countdown();
        self.broadcast_roster();
    }

    fn host_rematch(&mut self) {
        if self.phase != MatchPhase::Ended {
            return;
        }
        self.roster.clear_ready();
        self.engine = None;
        self.latest_snapshot = None;
        self.last_sent_tick = None;
        self.interpolator.reset();
        self.set_phase(MatchPhase::Lobby);
        self.broadcast(Message::Rematch);
        self.broadcast_roster();
    }

    fn maybe_start_countdown(&mut self) {
        if self.phase != MatchPhase::Lobby
            || self.roster.len() < self.config.min_players
            || !self.roster.all_ready()
        {
            return;
        }

        let seconds = self.config.countdown_secs;
        let ticks = (seconds * 1000).div_ceil(self.match_config.tick_ms.max(1));
        self.countdown = Some(CountdownTimer {
            start_tick: self.clock_tick,
            deadline: self.clock_tick + ticks,
            last_seconds: seconds,
        });
        self.set_phase(MatchPhase::Countdown);

        if seconds == 0 {
            self.begin_match();
            return;
        }
        let payload = CountdownPayload { start_tick: self.clock_tick, seconds };
        self.countdown_view = Some(payload);
        self.broadcast(Message::Countdown(payload));
    }

    fn cancel_countdown(&mut self) {
        if self.phase != MatchPhase::Countdown {
            return;
        }
        let start_tick = self.countdown.take().map_or(self.clock_tick, |c| c.start_tick);
        self.countdown_view = None;
        self.set_phase(MatchPhase::Lobby);
        self.broadcast(Message::Countdown(CountdownPayload { start_tick, seconds: 0 }));
    }

    fn countdown_step(&mut self) {
        let tick_ms = self.match_config.tick_ms.max(1);
        let Some(timer) = self.countdown.as_mut() else {
            return;
        };

        let remaining = timer.deadline.saturating_sub(self.clock_tick);
        if remaining == 0 {
            self.begin_match();
            return;
        }

        let seconds = (remaining * tick_ms).div_ceil(1000);
        if seconds != timer.last_seconds {
            timer.last_seconds = seconds;
            let payload = CountdownPayload { start_tick: timer.start_tick, seconds };
            self.countdown_view = Some(payload);
            self.broadcast(Message::Countdown(payload));
        }
    }

    fn begin_match(&mut self) {
        let seed = self.config.seed.unwrap_or_else(|| seed_from_wall_clock(self.matches_started));
        self.matches_started = self.matches_started.wrapping_add(1);

        let mut engine = MatchState::new(seed);
        for entry in self.roster.in_join_order() {
            engine.add_player(entry.id, entry.name.clone(), entry.slot);
        }
        start_match(&mut engine, &self.match_config, seed, self.clock_tick);

        self.roster.reset_scores();
        self.pending_inputs.clear();
        self.input_log = InputLog::new();
        self.events.clear();
        self.interpolator.reset();
        self.countdown = None;
        self.countdown_view = None;
        self.last_result = None;

        let start = StartPayload {
            start_tick: engine.start_tick,
            end_tick: engine.end_tick,
            seed,
            players: self.roster.to_payload(),
        };
        self.match_info = Some(start.clone());
        self.set_phase(MatchPhase::Running);
        self.broadcast(Message::Start(start));

        let snapshot = Snapshot::encode(&engine, self.match_config.tick_ms);
        self.interpolator.push(snapshot.clone(), self.now_ms);
        self.throttle.mark(self.now_ms);
        self.last_sent_tick = Some(snapshot.tick);
        self.broadcast(Message::State(snapshot.clone()));
        self.latest_snapshot = Some(snapshot);
        self.engine = Some(engine);
    }

    fn run_match_tick(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        let inputs = std::mem::take(&mut self.pending_inputs);
        self.input_log.record_tick(engine.tick + 1, &inputs);
        let mut result = tick(engine, &inputs, &self.match_config);

        for player in engine.players.values() {
            self.roster.set_score(&player.id, player.score);
        }
        let snapshot = Snapshot::encode(engine, self.match_config.tick_ms);
        self.interpolator.push(snapshot.clone(), self.now_ms);
        self.latest_snapshot = Some(snapshot);
        self.events.append(&mut result.events);

        if let Some(outcome) = result.result {
            self.finish_match(&outcome);
        }
    }

    fn finish_match(&mut self, outcome: &MatchResult) {
        // the deciding tick goes out unthrottled
        if let Some(snapshot) = self.latest_snapshot.clone() {
            self.throttle.mark(self.now_ms);
            self.last_sent_tick = Some(snapshot.tick);
            self.broadcast(Message::State(snapshot));
        }

        let end = EndPayload::from(outcome);
        info!(
            winner = %end.winner_name,
            reason = ?outcome.reason,
            end_tick = outcome.end_tick,
            "Match over"
        );
        self.broadcast(Message::End(end.clone()));
        self.last_result = Some(end);
        self.set_phase(MatchPhase::Ended);
    }

    fn flush_snapshot(&mut self) {
        if self.phase != MatchPhase::Running {
            return;
        }
        let Some(snapshot) = self.latest_snapshot.as_ref() else {
            return;
        };
        if self.last_sent_tick == Some(snapshot.tick) || !self.throttle.ready(self.now_ms) {
            return;
        }
        self.last_sent_tick = Some(snapshot.tick);
        self.outbox.push(Outgoing::Broadcast(Message::State(snapshot.clone())));
    }

    // =========================================================================
    // CLIENT
    // =========================================================================

    fn client_handle(&mut self, from: PlayerId, message: Message) {
        if self.host_id != Some(from) {
            debug!(from = %from.short(), kind = message.kind(), "Dropping message from non-host peer");
            return;
        }

        match message {
            Message::Roster(roster) => self.client_apply_roster(&roster),
            Message::Countdown(countdown) => {
                if countdown.seconds == 0 {
                    if self.phase == MatchPhase::Countdown {
                        self.countdown_view = None;
                        self.set_phase(MatchPhase::Lobby);
                    }
                } else if matches!(self.phase, MatchPhase::Lobby | MatchPhase::Countdown) {
                    self.countdown_view = Some(countdown);
                    self.set_phase(MatchPhase::Countdown);
                }
            }
            Message::Start(start) => {
                if !matches!(self.phase, MatchPhase::Lobby | MatchPhase::Countdown) {
                    debug!(phase = ?self.phase, "Start outside lobby dropped");
                    return;
                }
                self.roster.replace_from(&start.players);
                self.decoder.reset();
                self.interpolator.reset();
                self.countdown_view = None;
                self.last_result = None;
                info!(seed = start.seed, start_tick = start.start_tick, end_tick = start.end_tick, "Match starting");
                self.match_info = Some(start);
                self.set_phase(MatchPhase::Running);
            }
            Message::State(snapshot) => {
                if self.phase != MatchPhase::Running {
                    return;
                }
                match self.decoder.accept(snapshot) {
                    Ok(snapshot) => {
                        for player in &snapshot.players {
                            self.roster.set_score(&player.id, player.score);
                        }
                        self.interpolator.push(snapshot, self.now_ms);
                    }
                    Err(e) => debug!(error = %e, "Snapshot rejected"),
                }
            }
            Message::End(end) => {
                if self.phase == MatchPhase::Running {
                    info!(winner = %end.winner_name, "Match over");
                    self.last_result = Some(end);
                    self.set_phase(MatchPhase::Ended);
                }
            }
            Message::Rematch => {
                if self.phase == MatchPhase::Ended {
                    self.set_phase(MatchPhase::Lobby);
                }
            }
            Message::Error(error) => {
                warn!(code = ?error.code, message = %error.message, "Host rejected request");
                if self.phase == MatchPhase::Idle {
                    self.host_id = None;
                }
                self.last_error = Some(error);
            }
            Message::Leave => {
                info!("Host closed the session");
                self.reset_to_idle();
            }
            other => debug!(kind = other.kind(), "Unexpected message from host"),
        }
    }

    fn client_apply_roster(&mut self, roster: &RosterPayload) {
        self.roster.replace_from(&roster.players);
        if self.phase == MatchPhase::Idle && self.roster.contains(&self.local_id) {
            self.set_phase(MatchPhase::Lobby);
        }
    }

    // =========================================================================
    // SHARED
    // =========================================================================

    fn set_phase(&mut self, phase: MatchPhase) {
        if self.phase != phase {
            info!(role = ?self.role, from = ?self.phase, to = ?phase, "Session phase changed");
            self.phase = phase;
        }
    }

    fn reset_to_idle(&mut self) {
        self.set_phase(MatchPhase::Idle);
        self.roster.clear();
        self.host_id = None;
        self.engine = None;
        self.pending_inputs.clear();
        self.events.clear();
        self.countdown = None;
        self.countdown_view = None;
        self.match_info = None;
        self.scheduler.reset();
        self.throttle.reset();
        self.latest_snapshot = None;
        self.last_sent_tick = None;
        self.decoder.reset();
        self.interpolator.reset();
    }

    fn broadcast(&mut self, message: Message) {
        self.outbox.push(Outgoing::Broadcast(message));
    }

    fn send_to(&mut self, to: PlayerId, message: Message) {
        self.outbox.push(Outgoing::To(to, message));
    }

    fn broadcast_roster(&mut self) {
        let players = self.roster.to_payload();
        self.broadcast(Message::Roster(RosterPayload { players }));
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: PlayerId = PlayerId::new([1; 16]);
    const ALICE: PlayerId = PlayerId::new([2; 16]);
    const BOB: PlayerId = PlayerId::new([3; 16]);

    fn session_config() -> SessionConfig {
        SessionConfig { countdown_secs: 1, seed: Some(42), ..Default::default() }
    }

    fn match_config() -> MatchConfig {
        MatchConfig { match_duration_ms: 1_000, ..Default::default() }
    }

    fn peer(role: Role, id: PlayerId, name: &str, config: SessionConfig) -> Session {
        Session::new(role, id, name, config, match_config(), InterpolationConfig::default())
    }

    /// Delivers queued messages between sessions through the JSON codec.
    struct Net {
        peers: Vec<Session>,
    }

    impl Net {
        fn new(config: SessionConfig) -> Self {
            let mut host = peer(Role::Host, HOST, "host", config.clone());
            host.open_lobby().unwrap();
            Self {
                peers: vec![
                    host,
                    peer(Role::Client, ALICE, "alice", config.clone()),
                    peer(Role::Client, BOB, "bob", config),
                ],
            }
        }

        fn get(&mut self, id: PlayerId) -> &mut Session {
            self.peers.iter_mut().find(|p| p.local_id() == id).unwrap()
        }

        fn pump(&mut self) {
            loop {
                let mut batch = Vec::new();
                for p in &mut self.peers {
                    let from = p.local_id();
                    batch.extend(p.drain_outgoing().into_iter().map(|out| (from, out)));
                }
                if batch.is_empty() {
                    return;
                }
                for (from, out) in batch {
                    let (targets, message): (Vec<PlayerId>, Message) = match out {
                        Outgoing::To(id, m) => (vec![id], m),
                        Outgoing::Broadcast(m) => (
                            self.peers.iter().map(|p| p.local_id()).filter(|id| *id != from).collect(),
                            m,
                        ),
                    };
                    let wire = Message::from_json(&message.to_json().unwrap()).unwrap();
                    for target in targets {
                        self.get(target).handle_event(TransportEvent::Message { from, message: wire.clone() });
                    }
                }
            }
        }

        fn advance(&mut self, dt_ms: u64) {
            for p in &mut self.peers {
                p.advance(dt_ms);
            }
            self.pump();
        }

        fn join(&mut self, id: PlayerId) {
            self.get(id).join(HOST).unwrap();
            self.pump();
        }

        fn ready_all(&mut self, ids: &[PlayerId]) {
            for id in ids {
                self.get(*id).set_ready(true).unwrap();
                self.pump();
            }
        }

        /// Host + alice in a running match.
        fn running(config: SessionConfig) -> Self {
            let mut net = Self::new(config);
            net.join(ALICE);
            net.ready_all(&[HOST, ALICE]);
            for _ in 0..10 {
                net.advance(100);
            }
            assert_eq!(net.get(HOST).phase(), MatchPhase::Running);
            net
        }
    }

    #[test]
    fn test_open_lobby() {
        let mut host = peer(Role::Host, HOST, "host", session_config());
        assert_eq!(host.phase(), MatchPhase::Idle);
        host.open_lobby().unwrap();
        assert_eq!(host.phase(), MatchPhase::Lobby);
        assert!(host.roster().get(&HOST).unwrap().is_host);
        assert_eq!(host.open_lobby(), Err(SessionError::InvalidState(MatchPhase::Lobby)));

        let mut client = peer(Role::Client, ALICE, "alice", session_config());
        assert_eq!(client.open_lobby(), Err(SessionError::NotHost));
    }

    #[test]
    fn test_join_syncs_roster() {
        let mut net = Net::new(session_config());
        net.join(ALICE);

        assert_eq!(net.get(ALICE).phase(), MatchPhase::Lobby);
        let host_view = net.get(HOST).roster().to_payload();
        let client_view = net.get(ALICE).roster().to_payload();
        assert_eq!(host_view, client_view);
        assert_eq!(host_view.len(), 2);
        assert_eq!(net.get(ALICE).roster().get(&ALICE).unwrap().slot, 1);
    }

    #[test]
    fn test_countdown_starts_and_cancels() {
        let mut net = Net::new(session_config());
        net.join(ALICE);

        net.ready_all(&[HOST]);
        assert_eq!(net.get(HOST).phase(), MatchPhase::Lobby);

        net.ready_all(&[ALICE]);
        assert_eq!(net.get(HOST).phase(), MatchPhase::Countdown);
        assert_eq!(net.get(ALICE).phase(), MatchPhase::Countdown);
        assert_eq!(net.get(ALICE).countdown().unwrap().seconds, 1);

        net.get(ALICE).set_ready(false).unwrap();
        net.pump();
        assert_eq!(net.get(HOST).phase(), MatchPhase::Lobby);
        assert_eq!(net.get(ALICE).phase(), MatchPhase::Lobby);
        assert!(net.get(ALICE).countdown().is_none());
    }

    #[test]
    fn test_single_player_cannot_start() {
        let mut net = Net::new(session_config());
        net.ready_all(&[HOST]);
        net.advance(5_000);
        assert_eq!(net.get(HOST).phase(), MatchPhase::Lobby);
    }

    #[test]
    fn test_countdown_elapses_into_running() {
        let mut net = Net::running(session_config());

        let alice = net.get(ALICE);
        assert_eq!(alice.phase(), MatchPhase::Running);
        assert_eq!(alice.match_info().unwrap().seed, 42);
        assert_eq!(alice.latest_snapshot().unwrap().players.len(), 2);
        assert_eq!(alice.render_state().snakes.len(), 2);

        let host = net.get(HOST);
        assert_eq!(host.match_state().unwrap().players.len(), 2);
        assert!(host.roster().iter().all(|e| e.score == 0));
    }

    #[test]
    fn test_match_ends_and_rematch() {
        let mut net = Net::running(session_config());
        for _ in 0..12 {
            net.advance(100);
        }

        assert_eq!(net.get(HOST).phase(), MatchPhase::Ended);
        assert_eq!(net.get(ALICE).phase(), MatchPhase::Ended);

        let end = net.get(ALICE).last_result().unwrap().clone();
        assert_eq!(end.scores.len(), 2);
        assert!(!end.winner_name.is_empty());
        let tracked: u32 = net.get(HOST).roster().iter().map(|e| e.score).sum();
        assert_eq!(end.scores.iter().map(|s| s.score).sum::<u32>(), tracked);

        // host and client agree on the final tick
        let host_tick = net.get(HOST).latest_snapshot().unwrap().tick;
        assert_eq!(net.get(ALICE).latest_snapshot().unwrap().tick, host_tick);

        net.get(ALICE).request_rematch().unwrap();
        net.pump();
        assert_eq!(net.get(HOST).phase(), MatchPhase::Lobby);
        assert_eq!(net.get(ALICE).phase(), MatchPhase::Lobby);
        assert!(net.get(ALICE).roster().iter().all(|e| !e.ready));
        assert_eq!(net.get(ALICE).roster().len(), 2);
    }

    #[test]
    fn test_join_rejected_while_running() {
        let mut net = Net::running(session_config());
        net.join(BOB);

        let bob = net.get(BOB);
        assert_eq!(bob.phase(), MatchPhase::Idle);
        assert_eq!(bob.last_error().unwrap().code, ErrorCode::MatchInProgress);
        assert!(!net.get(HOST).roster().contains(&BOB));
    }

    #[test]
    fn test_lobby_full() {
        let mut net = Net::new(SessionConfig { max_players: 2, ..session_config() });
        net.join(ALICE);
        net.join(BOB);

        assert_eq!(net.get(BOB).last_error().unwrap().code, ErrorCode::LobbyFull);
        assert_eq!(net.get(HOST).roster().len(), 2);
    }

    #[test]
    fn test_client_cannot_mutate_host_state() {
        let mut net = Net::running(session_config());
        let host = net.get(HOST);
        let before = host.latest_snapshot().unwrap().clone();

        let mut forged = before.clone();
        forged.tick += 50;
        host.handle_event(TransportEvent::Message { from: ALICE, message: Message::State(forged) });
        host.handle_event(TransportEvent::Message {
            from: ALICE,
            message: Message::Roster(RosterPayload { players: vec![] }),
        });

        assert_eq!(host.latest_snapshot(), Some(&before));
        assert_eq!(host.roster().len(), 2);
        assert!(host.drain_outgoing().is_empty());
    }

    #[test]
    fn test_client_input_reaches_host() {
        let mut net = Net::running(session_config());
        net.get(ALICE).local_input(Direction::Up);
        net.pump();
        net.advance(100);

        let host = net.get(HOST);
        let log = host.input_log().player(&ALICE).unwrap();
        assert_eq!(log.delta_count(), 1);
        let tick = host.match_state().unwrap().tick;
        assert_eq!(log.get_input_at(tick), Some(Direction::Up));
    }

    #[test]
    fn test_input_outside_match_dropped() {
        let mut net = Net::new(session_config());
        net.join(ALICE);
        net.get(ALICE).local_input(Direction::Up);
        assert!(net.get(ALICE).drain_outgoing().is_empty());
    }

    #[test]
    fn test_snapshot_broadcast_throttled() {
        let config = SessionConfig { snapshot_interval_ms: 300, ..session_config() };
        let mut net = Net::running(config);
        let host = net.get(HOST);

        let mut sent = 0;
        for _ in 0..6 {
            host.advance(100);
            sent += host
                .drain_outgoing()
                .iter()
                .filter(|o| matches!(o.message(), Message::State(_)))
                .count();
        }
        assert_eq!(sent, 2);
    }

    #[test]
    fn test_leave_is_idempotent() {
        let mut net = Net::new(session_config());
        net.join(ALICE);

        let alice = net.get(ALICE);
        alice.leave();
        alice.leave();
        assert_eq!(alice.phase(), MatchPhase::Idle);
        let out = alice.drain_outgoing();
        assert_eq!(out, vec![Outgoing::To(HOST, Message::Leave)]);

        net.get(ALICE).outbox = out;
        net.pump();
        assert_eq!(net.get(HOST).roster().len(), 1);
    }

    #[test]
    fn test_leave_during_countdown_cancels() {
        let mut net = Net::new(session_config());
        net.join(ALICE);
        net.ready_all(&[HOST, ALICE]);
        assert_eq!(net.get(HOST).phase(), MatchPhase::Countdown);

        net.get(HOST).handle_event(TransportEvent::PeerLeft(ALICE));
        assert_eq!(net.get(HOST).phase(), MatchPhase::Lobby);
    }

    #[test]
    fn test_closed_returns_to_idle() {
        let mut net = Net::running(session_config());
        let alice = net.get(ALICE);
        alice.local_input(Direction::Up);
        alice.handle_event(TransportEvent::Closed);

        assert_eq!(alice.phase(), MatchPhase::Idle);
        assert!(alice.drain_outgoing().is_empty());
        assert!(alice.render_state().is_empty());
        assert!(alice.roster().is_empty());
    }

    #[test]
    fn test_host_leaving_idles_clients() {
        let mut net = Net::running(session_config());
        net.get(HOST).leave();
        net.pump();
        assert_eq!(net.get(HOST).phase(), MatchPhase::Idle);
        assert_eq!(net.get(ALICE).phase(), MatchPhase::Idle);
    }
}
