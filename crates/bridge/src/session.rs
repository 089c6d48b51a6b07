//! Session controller - owns all bridge state for one agent session
//!
//! The controller is driven one event at a time: a transport event, the
//! pacing timer, or a host command. Each event is handled to completion by a
//! synchronous handler that only mutates state and queues outbound messages;
//! the queued messages are flushed before the next event is awaited. Nothing
//! here is shared across threads.
//!
//! ```text
//!   Disconnected ─connect─> Connecting ─open─> Negotiating ─ready─> Ready <──┐
//!        ^                      │                  │                  │      │ suggestion
//!        │                      └──── failure ─────┴─> Errored     suggest   │
//!        └──────────── peer closed ──────────────────────────         └─> AwaitingSuggestion
//! ```

use std::io::Write;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::applier::{Decision, MoveApplier, TerminalReason};
use crate::config::{BridgeConfig, Endpoint};
use crate::connection::{ConnectionManager, LinkEvent};
use crate::engine::Engine;
use crate::error::BridgeError;
use crate::handshake::{HandshakeNegotiator, HandshakeStep};
use crate::protocol::{decode, encode, AgentInfo, Message, PieceCode, Placement};
use crate::scheduler::{SuggestionScheduler, TimerToken};
use crate::snapshot::SnapshotBuilder;
use crate::status::{Status, StatusKind, StatusSignal};
use crate::types::{LockOutcome, PieceKind};
use crate::wire_log::{Direction, WireLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Negotiating,
    Ready,
    AwaitingSuggestion,
    Stopped,
    Errored,
}

impl ConnectionState {
    pub fn status_kind(self) -> StatusKind {
        match self {
            ConnectionState::Disconnected | ConnectionState::Stopped => StatusKind::Disconnected,
            ConnectionState::Connecting | ConnectionState::Negotiating => StatusKind::Connecting,
            ConnectionState::Ready | ConnectionState::AwaitingSuggestion => StatusKind::Ready,
            ConnectionState::Errored => StatusKind::Error,
        }
    }

    /// Handshake done and transport open.
    pub fn is_ready(self) -> bool {
        matches!(
            self,
            ConnectionState::Ready | ConnectionState::AwaitingSuggestion
        )
    }

    fn is_open(self) -> bool {
        matches!(self, ConnectionState::Negotiating) || self.is_ready()
    }
}

/// Per-game bridge flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// The agent's game is over; nothing more is requested or sent for it.
    pub ended: bool,
    /// A `suggest` is outstanding.
    pub in_flight: bool,
    /// A game exists but the agent was not ready when it was created.
    pub pending_start: bool,
    /// Queue view the agent last saw, for diffing.
    pub last_queue: Vec<PieceKind>,
}

/// Lifecycle requests from the surrounding application.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// Connect to the given endpoint, or the configured one.
    Connect(Option<Endpoint>),
    /// Replace the game with a fresh one from `seed` and resync the agent.
    Restart { seed: u32 },
    SetPps(f32),
    Shutdown,
}

/// Notable result of one handled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Idle,
    /// An agent placement locked.
    Applied(LockOutcome),
    /// The agent's game just ended.
    GameOver(TerminalReason),
    /// The transport went away.
    Disconnected,
    Shutdown,
}

enum Event {
    Link(LinkEvent),
    Timer,
    Command(Option<HostCommand>),
}

pub struct SessionController {
    config: BridgeConfig,
    state: ConnectionState,
    session: SessionState,
    conn: ConnectionManager,
    handshake: HandshakeNegotiator,
    snapshots: SnapshotBuilder,
    scheduler: SuggestionScheduler,
    applier: MoveApplier,
    status: StatusSignal,
    wire_log: WireLog,
    outbox: Vec<Message>,
    commands: Option<mpsc::UnboundedReceiver<HostCommand>>,
    /// The host has created a game for the agent's slot.
    game_created: bool,
    /// The agent holds a game started by our last `start` frame.
    game_live: bool,
    /// Replies still owed for requests made before a restart.
    ///
    /// Counts on the agent answering every `suggest`, including one that
    /// arrived before a `stop`. An agent that drops it leaves the count high
    /// and loses its next answer. Transport loss resets it.
    stale_replies: u32,
    close_requested: bool,
}

impl SessionController {
    pub fn new(config: BridgeConfig, commands: mpsc::UnboundedReceiver<HostCommand>) -> Self {
        let wire_log = match config.log_path.as_deref() {
            Some(path) => WireLog::with_mirror(path),
            None => WireLog::new(),
        };
        Self {
            state: ConnectionState::Disconnected,
            session: SessionState::default(),
            conn: ConnectionManager::new(),
            handshake: HandshakeNegotiator::new(),
            snapshots: SnapshotBuilder::new(config.slot, config.preview),
            scheduler: SuggestionScheduler::new(config.pps),
            applier: MoveApplier::new(config.sync_mode),
            status: StatusSignal::new(),
            wire_log,
            outbox: Vec::new(),
            commands: Some(commands),
            game_created: false,
            game_live: false,
            stale_replies: 0,
            close_requested: false,
            config,
        }
    }

    // ============== Queries ==============

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn session_state(&self) -> &SessionState {
        &self.session
    }

    pub fn agent(&self) -> Option<&AgentInfo> {
        self.handshake.agent()
    }

    pub fn pps(&self) -> f32 {
        self.scheduler.pps()
    }

    pub fn timer_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    pub fn status(&self) -> Status {
        self.status.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    pub fn wire_log(&self) -> &WireLog {
        &self.wire_log
    }

    pub fn export_log<W: Write>(&self, writer: W) -> std::io::Result<()> {
        self.wire_log.export(writer)
    }

    // ============== Lifecycle ==============

    pub fn connect(&mut self) {
        self.connect_to(self.config.endpoint.clone());
    }

    /// Begin connecting. Only valid while disconnected, errored or stopped;
    /// there is no automatic reconnect.
    pub fn connect_to(&mut self, endpoint: Endpoint) {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Errored | ConnectionState::Stopped => {}
            state => {
                warn!("connect ignored while {:?}", state);
                return;
            }
        }
        self.handshake.reset();
        self.outbox.clear();
        self.close_requested = false;
        self.session.pending_start = self.game_created && !self.session.ended;
        let text = format!("connecting to {endpoint}");
        self.conn.begin_connect(endpoint);
        self.set_state(ConnectionState::Connecting, Some(text));
    }

    /// A game was created for the agent's slot.
    ///
    /// Sends the snapshot and arms the scheduler when the agent is ready;
    /// otherwise the snapshot goes out as soon as it is.
    pub fn start<E: Engine + ?Sized>(&mut self, engine: &E) {
        if self.game_live || self.session.in_flight {
            self.restart(engine);
            return;
        }
        self.scheduler.cancel();
        self.session.ended = false;
        self.game_created = true;
        match self.state {
            ConnectionState::Ready => {
                self.send_start(engine);
                self.arm();
            }
            ConnectionState::Connecting | ConnectionState::Negotiating => {
                self.session.pending_start = true;
            }
            _ => debug!("no agent session; start waits for connect"),
        }
    }

    /// The game was replaced (e.g. settings changed). Ordering matters: the
    /// timer is cancelled before any flag is cleared, so nothing armed for the
    /// old game can fire into the new one.
    pub fn restart<E: Engine + ?Sized>(&mut self, engine: &E) {
        self.scheduler.cancel();

        let had_live_game = self.game_live && !self.session.ended;
        if self.session.in_flight {
            self.stale_replies += 1;
        }
        self.session.in_flight = false;
        self.session.ended = false;
        self.session.pending_start = false;
        self.game_live = false;
        self.game_created = true;
        if self.state == ConnectionState::AwaitingSuggestion {
            self.state = ConnectionState::Ready;
        }

        match self.state {
            ConnectionState::Ready => {
                if had_live_game {
                    self.outbox.push(Message::Stop);
                }
                self.send_start(engine);
                self.arm();
            }
            ConnectionState::Connecting | ConnectionState::Negotiating => {
                self.session.pending_start = true;
            }
            _ => {}
        }
        info!("session restarted");
    }

    /// Stop the agent's game, say goodbye, and close the transport.
    pub async fn shutdown(&mut self) {
        self.begin_shutdown();
        self.flush().await;
    }

    pub fn set_pps(&mut self, pps: f32) {
        self.scheduler.set_pps(pps);
        info!("pps set to {}", self.scheduler.pps());
    }

    /// Check the engine's terminal signal for the agent's slot.
    ///
    /// Returns true when this call ended the game.
    pub fn observe<E: Engine + ?Sized>(&mut self, engine: &E) -> bool {
        if !self.session.ended && engine.topped_out(self.snapshots.slot()) {
            return self.end_game("topped out");
        }
        false
    }

    // ============== Event loop ==============

    /// Wait for one event, handle it, and flush what it produced.
    ///
    /// Pends indefinitely when there is no transport, no timer and no command
    /// channel.
    pub async fn step<E: Engine + ?Sized>(&mut self, engine: &mut E) -> StepOutcome {
        self.flush().await;

        let deadline = self.scheduler.deadline();
        let event = tokio::select! {
            event = self.conn.next_event() => Event::Link(event),
            _ = sleep_until(deadline) => Event::Timer,
            command = recv_command(&mut self.commands) => Event::Command(command),
        };

        let outcome = match event {
            Event::Link(LinkEvent::Opened) => {
                self.handle_open();
                StepOutcome::Idle
            }
            Event::Link(LinkEvent::Frame(frame)) => self.handle_frame(&frame, engine),
            Event::Link(LinkEvent::Closed) => self.handle_link_lost(None),
            Event::Link(LinkEvent::Failed(e)) => self.handle_link_lost(Some(e)),
            Event::Timer => self.fire_due_timer(Instant::now()),
            Event::Command(Some(command)) => self.handle_command(command, engine),
            Event::Command(None) => {
                debug!("host command channel closed");
                self.commands = None;
                StepOutcome::Idle
            }
        };

        self.flush().await;
        outcome
    }

    /// Run until a shutdown command.
    pub async fn run<E: Engine + ?Sized>(&mut self, engine: &mut E) {
        loop {
            if self.step(engine).await == StepOutcome::Shutdown {
                return;
            }
        }
    }

    /// Send everything queued, in order.
    pub async fn flush(&mut self) {
        let pending = std::mem::take(&mut self.outbox);
        for msg in pending {
            if !self.conn.is_open() {
                debug!("not connected; dropping {}", msg.tag());
                continue;
            }
            let frame = match encode(&msg) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("cannot encode {}: {}", msg.tag(), e);
                    continue;
                }
            };
            debug!("-> {}", frame);
            self.wire_log.record(Direction::Tx, &frame);
            if let Err(e) = self.conn.send(&frame).await {
                self.handle_link_lost(Some(e));
                break;
            }
        }

        if self.close_requested {
            self.close_requested = false;
            self.conn.close().await;
        }
    }

    // ============== Handlers ==============

    fn set_state(&mut self, state: ConnectionState, text: Option<String>) {
        if self.state != state {
            debug!("connection {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.status.set(state.status_kind(), text);
    }

    fn arm(&mut self) -> TimerToken {
        self.scheduler.arm(Instant::now())
    }

    fn send_start<E: Engine + ?Sized>(&mut self, engine: &E) {
        if self.session.ended {
            return;
        }
        let snapshot = self.snapshots.build(engine);
        self.session.last_queue = self.snapshots.queue_view(engine);
        self.outbox.push(Message::Start(snapshot));
        self.game_live = true;
    }

    /// End the agent's game once: cancel pacing and tell the agent to stop.
    fn end_game(&mut self, reason: &str) -> bool {
        if self.session.ended {
            return false;
        }
        self.session.ended = true;
        self.scheduler.cancel();
        if self.game_live && self.state.is_ready() {
            self.outbox.push(Message::Stop);
        }
        self.game_live = false;
        info!("agent game over: {}", reason);
        true
    }

    fn begin_shutdown(&mut self) {
        if self.state == ConnectionState::Stopped {
            return;
        }
        self.scheduler.cancel();
        if self.state.is_open() {
            if self.game_live && !self.session.ended {
                self.outbox.push(Message::Stop);
            }
            self.outbox.push(Message::Quit);
        }
        self.session.in_flight = false;
        self.session.pending_start = false;
        self.game_live = false;
        self.close_requested = true;
        self.set_state(ConnectionState::Stopped, Some("stopped".into()));
        info!("bridge shut down");
    }

    pub(crate) fn handle_open(&mut self) {
        let rules = self.handshake.begin();
        self.outbox.push(rules);
        self.set_state(ConnectionState::Negotiating, Some("negotiating".into()));
    }

    pub(crate) fn handle_link_lost(&mut self, err: Option<BridgeError>) -> StepOutcome {
        self.scheduler.cancel();
        self.session.in_flight = false;
        self.session.pending_start = false;
        self.stale_replies = 0;
        self.game_live = false;
        self.outbox.clear();
        self.handshake.reset();
        self.conn.abort();

        if self.state == ConnectionState::Stopped {
            return StepOutcome::Idle;
        }
        match err {
            Some(e) => {
                warn!("agent connection failed: {}", e);
                self.set_state(ConnectionState::Errored, Some(e.to_string()));
            }
            None => {
                info!("agent closed the connection");
                self.set_state(
                    ConnectionState::Disconnected,
                    Some("agent closed the connection".into()),
                );
            }
        }
        StepOutcome::Disconnected
    }

    pub(crate) fn handle_frame<E: Engine + ?Sized>(
        &mut self,
        frame: &str,
        engine: &mut E,
    ) -> StepOutcome {
        self.wire_log.record(Direction::Rx, frame);
        debug!("<- {}", frame);
        match decode(frame) {
            Ok(msg) => self.handle_message(msg, engine),
            Err(e) => {
                warn!("dropping frame: {}", e);
                StepOutcome::Idle
            }
        }
    }

    fn handle_message<E: Engine + ?Sized>(&mut self, msg: Message, engine: &mut E) -> StepOutcome {
        match msg {
            Message::Info(agent) => {
                let text = format!("agent {} {}", agent.name, agent.version);
                self.handshake.on_info(agent);
                if self.state == ConnectionState::Negotiating {
                    self.set_state(self.state, Some(text));
                }
                StepOutcome::Idle
            }
            Message::Ready => {
                if self.handshake.on_ready() == HandshakeStep::Ready {
                    let text = self
                        .handshake
                        .agent()
                        .map(|a| format!("{} {}", a.name, a.version))
                        .unwrap_or_else(|| "agent ready".into());
                    info!("agent ready: {}", text);
                    self.set_state(ConnectionState::Ready, Some(text));
                    if self.session.pending_start {
                        self.session.pending_start = false;
                        self.send_start(engine);
                        self.arm();
                    }
                }
                StepOutcome::Idle
            }
            Message::Error { reason } => {
                match self.handshake.on_error(&reason) {
                    HandshakeStep::Rejected(reason) => {
                        warn!("agent refused to negotiate: {}", reason);
                        self.scheduler.cancel();
                        self.session.in_flight = false;
                        self.session.pending_start = false;
                        self.game_live = false;
                        self.close_requested = true;
                        self.set_state(ConnectionState::Errored, Some(reason));
                    }
                    _ => warn!("agent error: {}", reason),
                }
                StepOutcome::Idle
            }
            Message::Suggestion { moves } => self.handle_suggestion(&moves, engine),
            Message::Other { kind } => {
                debug!("ignoring unrecognized message {:?}", kind);
                StepOutcome::Idle
            }
            other => {
                warn!("unexpected {} from agent", other.tag());
                StepOutcome::Idle
            }
        }
    }

    fn handle_suggestion<E: Engine + ?Sized>(
        &mut self,
        moves: &[Placement],
        engine: &mut E,
    ) -> StepOutcome {
        if self.stale_replies > 0 {
            self.stale_replies -= 1;
            debug!("discarding suggestion meant for the previous game");
            return StepOutcome::Idle;
        }
        if !self.session.in_flight {
            warn!("unsolicited suggestion dropped");
            return StepOutcome::Idle;
        }
        self.session.in_flight = false;
        if self.state == ConnectionState::AwaitingSuggestion {
            self.state = ConnectionState::Ready;
        }
        if self.session.ended {
            return StepOutcome::Idle;
        }

        let decision = self
            .applier
            .apply(engine, &self.snapshots, moves, &self.session.last_queue);
        match decision {
            Decision::Skip => {
                debug!("empty suggestion");
                self.arm();
                StepOutcome::Idle
            }
            Decision::Terminal(reason) => {
                let text = match reason {
                    TerminalReason::Rejected(e) => e.code(),
                    TerminalReason::ToppedOut => "topped out",
                };
                self.end_game(text);
                StepOutcome::GameOver(reason)
            }
            Decision::Delta {
                played,
                piece,
                queue,
                outcome,
            } => {
                self.outbox.push(Message::Play { mv: played });
                self.outbox.push(Message::NewPiece {
                    piece: PieceCode(piece),
                });
                self.session.last_queue = queue;
                self.arm();
                StepOutcome::Applied(outcome)
            }
            Decision::Resync { outcome } => {
                self.send_start(engine);
                self.arm();
                StepOutcome::Applied(outcome)
            }
        }
    }

    /// Fire the pacing timer if it is due. A cancelled timer is never due.
    pub(crate) fn fire_due_timer(&mut self, now: Instant) -> StepOutcome {
        match self.scheduler.due(now) {
            Some(token) => self.handle_timer(token),
            None => StepOutcome::Idle,
        }
    }

    fn handle_timer(&mut self, token: TimerToken) -> StepOutcome {
        if !self.scheduler.claim(token) {
            return StepOutcome::Idle;
        }
        if self.session.ended
            || self.session.in_flight
            || !self.game_live
            || self.state != ConnectionState::Ready
        {
            debug!("pacing timer fired with nothing to request");
            return StepOutcome::Idle;
        }
        self.outbox.push(Message::Suggest);
        self.session.in_flight = true;
        self.state = ConnectionState::AwaitingSuggestion;
        StepOutcome::Idle
    }

    fn handle_command<E: Engine + ?Sized>(
        &mut self,
        command: HostCommand,
        engine: &mut E,
    ) -> StepOutcome {
        match command {
            HostCommand::Connect(endpoint) => {
                let endpoint = endpoint.unwrap_or_else(|| self.config.endpoint.clone());
                self.connect_to(endpoint);
                StepOutcome::Idle
            }
            HostCommand::Restart { seed } => {
                engine.reset(seed);
                self.restart(engine);
                StepOutcome::Idle
            }
            HostCommand::SetPps(pps) => {
                self.set_pps(pps);
                StepOutcome::Idle
            }
            HostCommand::Shutdown => {
                self.begin_shutdown();
                StepOutcome::Shutdown
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.scheduler.cancel();
        self.conn.abort();
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("session", &self.session)
            .field("timer_pending", &self.scheduler.is_pending())
            .field("conn", &self.conn)
            .finish()
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn recv_command(
    commands: &mut Option<mpsc::UnboundedReceiver<HostCommand>>,
) -> Option<HostCommand> {
    match commands {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::SyncMode;
    use crate::core::{Board, Versus};
    use crate::protocol::PlacementForm;
    use crate::types::{PlayerSlot, BOARD_WIDTH};

    fn controller(sync_mode: SyncMode) -> SessionController {
        let (_tx, rx) = mpsc::unbounded_channel();
        let config = BridgeConfig {
            endpoint: "tcp://127.0.0.1:9".parse().unwrap(),
            sync_mode,
            ..BridgeConfig::default()
        };
        SessionController::new(config, rx)
    }

    fn drain(c: &mut SessionController) -> Vec<Message> {
        std::mem::take(&mut c.outbox)
    }

    fn tags(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(Message::tag).collect()
    }

    fn later() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    /// Connect, open and complete the handshake.
    fn ready(c: &mut SessionController, game: &mut Versus) -> Vec<Message> {
        c.connect();
        c.handle_open();
        c.handle_frame(r#"{"type":"info","name":"mock","version":"1"}"#, game);
        c.handle_frame(r#"{"type":"ready"}"#, game);
        drain(c)
    }

    fn suggestion_for(game: &Versus, column: i8) -> String {
        let kind = game.player(PlayerSlot::BOT).unwrap().active().kind;
        format!(
            r#"{{"type":"suggestion","moves":[{{"piece":"{}","column":{},"orientation":"north"}}]}}"#,
            kind, column
        )
    }

    #[test]
    fn handshake_sends_rules_and_waits_for_ready() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        c.connect();
        assert_eq!(c.connection_state(), ConnectionState::Connecting);
        assert_eq!(c.status().kind, StatusKind::Connecting);

        c.handle_open();
        assert_eq!(tags(&drain(&mut c)), ["rules"]);
        assert_eq!(c.connection_state(), ConnectionState::Negotiating);

        c.handle_frame(r#"{"type":"info","name":"mock","version":"1"}"#, &mut game);
        assert_eq!(c.connection_state(), ConnectionState::Negotiating);

        c.handle_frame(r#"{"type":"ready"}"#, &mut game);
        assert_eq!(c.connection_state(), ConnectionState::Ready);
        assert_eq!(c.status().kind, StatusKind::Ready);
        assert_eq!(c.status().text.as_deref(), Some("mock 1"));
        // No game yet: nothing sent, nothing scheduled.
        assert!(drain(&mut c).is_empty());
        assert!(!c.timer_pending());
    }

    #[test]
    fn pending_start_is_sent_on_ready() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        c.connect();
        c.start(&game);
        assert!(c.session_state().pending_start);

        c.handle_open();
        c.handle_frame(r#"{"type":"ready"}"#, &mut game);
        assert_eq!(tags(&drain(&mut c)), ["rules", "start"]);
        assert!(!c.session_state().pending_start);
        assert!(c.timer_pending());
    }

    #[test]
    fn timer_sends_one_suggest_at_a_time() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        ready(&mut c, &mut game);
        c.start(&game);
        drain(&mut c);

        c.fire_due_timer(later());
        assert_eq!(tags(&drain(&mut c)), ["suggest"]);
        assert!(c.session_state().in_flight);
        assert_eq!(c.connection_state(), ConnectionState::AwaitingSuggestion);

        // Nothing armed while in flight, and arming again would be a no-op.
        c.arm();
        c.fire_due_timer(later());
        assert!(drain(&mut c).is_empty());
    }

    #[test]
    fn suggestion_applies_and_sends_delta() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        ready(&mut c, &mut game);
        c.start(&game);
        drain(&mut c);
        c.fire_due_timer(later());
        drain(&mut c);

        let before = c.session_state().last_queue.clone();
        let outcome = c.handle_frame(&suggestion_for(&game, 4), &mut game);
        assert!(matches!(outcome, StepOutcome::Applied(_)));
        let sent = drain(&mut c);
        assert_eq!(tags(&sent), ["play", "new_piece"]);
        assert_eq!(c.session_state().last_queue[..5], before[1..]);
        assert!(!c.session_state().in_flight);
        assert!(c.timer_pending());
        assert_eq!(game.player(PlayerSlot::BOT).unwrap().pieces_placed(), 1);
    }

    #[test]
    fn resync_mode_sends_start_after_apply() {
        let mut c = controller(SyncMode::Resync);
        let mut game = Versus::new(1);
        ready(&mut c, &mut game);
        c.start(&game);
        c.fire_due_timer(later());
        drain(&mut c);

        c.handle_frame(&suggestion_for(&game, 4), &mut game);
        assert_eq!(tags(&drain(&mut c)), ["start"]);
    }

    #[test]
    fn empty_suggestion_rearms_without_apply() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        ready(&mut c, &mut game);
        c.start(&game);
        c.fire_due_timer(later());
        drain(&mut c);

        c.handle_frame(r#"{"type":"suggestion","moves":[]}"#, &mut game);
        assert!(!c.session_state().in_flight);
        assert!(c.timer_pending());
        assert!(drain(&mut c).is_empty());
        assert_eq!(game.player(PlayerSlot::BOT).unwrap().pieces_placed(), 0);
    }

    #[test]
    fn unsolicited_suggestion_is_dropped() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        ready(&mut c, &mut game);
        c.start(&game);
        drain(&mut c);

        c.handle_frame(&suggestion_for(&game, 4), &mut game);
        assert!(drain(&mut c).is_empty());
        assert_eq!(game.player(PlayerSlot::BOT).unwrap().pieces_placed(), 0);
    }

    #[test]
    fn rejected_placement_stops_once() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        ready(&mut c, &mut game);
        c.start(&game);
        c.fire_due_timer(later());
        drain(&mut c);

        let outcome = c.handle_frame(&suggestion_for(&game, 40), &mut game);
        assert!(matches!(outcome, StepOutcome::GameOver(TerminalReason::Rejected(_))));
        assert!(c.session_state().ended);
        assert!(!c.timer_pending());
        assert!(!c.observe(&game));
        assert_eq!(tags(&drain(&mut c)), ["stop"]);

        // Ended: timers and starts produce nothing.
        c.arm();
        c.fire_due_timer(later());
        assert!(drain(&mut c).is_empty());
    }

    #[test]
    fn top_out_signals_stop_exactly_once() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        // Stack up to the spawn rows, leaving one column open so nothing clears.
        let board = game.player_mut(PlayerSlot::BOT).unwrap().board_mut();
        for row in 0..22 {
            for x in 1..BOARD_WIDTH as i8 {
                board.set(x, Board::y_from_row(row), Some(PieceKind::Z));
            }
        }
        ready(&mut c, &mut game);
        c.start(&game);
        c.fire_due_timer(later());
        drain(&mut c);

        let kind = game.player(PlayerSlot::BOT).unwrap().active().kind;
        let frame = format!(
            r#"{{"type":"suggestion","moves":[{{"piece":"{kind}","column":4,"row":30,"orientation":"north"}}]}}"#
        );
        let outcome = c.handle_frame(&frame, &mut game);
        assert_eq!(outcome, StepOutcome::GameOver(TerminalReason::ToppedOut));
        // The same condition seen again through the engine signal.
        assert!(!c.observe(&game));
        assert!(!c.observe(&game));
        assert_eq!(tags(&drain(&mut c)), ["stop"]);
    }

    #[test]
    fn restart_mid_flight_discards_stale_reply() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        ready(&mut c, &mut game);
        c.start(&game);
        c.fire_due_timer(later());
        drain(&mut c);
        let stale = suggestion_for(&game, 4);

        game.restart(2);
        c.restart(&game);
        assert_eq!(tags(&drain(&mut c)), ["stop", "start"]);
        assert!(!c.session_state().in_flight);
        assert!(c.timer_pending());

        // The old game's timer is gone: only the freshly armed one exists.
        c.fire_due_timer(later());
        assert_eq!(tags(&drain(&mut c)), ["suggest"]);

        // The reply to the old request is dropped; the next one is applied.
        c.handle_frame(&stale, &mut game);
        assert!(drain(&mut c).is_empty());
        assert!(c.session_state().in_flight);
        assert_eq!(game.player(PlayerSlot::BOT).unwrap().pieces_placed(), 0);

        c.handle_frame(&suggestion_for(&game, 4), &mut game);
        assert_eq!(tags(&drain(&mut c)), ["play", "new_piece"]);
    }

    #[test]
    fn restart_before_ready_defers_start() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        c.connect();
        c.handle_open();
        drain(&mut c);
        c.restart(&game);
        assert!(c.session_state().pending_start);
        assert!(drain(&mut c).is_empty());
        c.handle_frame(r#"{"type":"ready"}"#, &mut game);
        assert_eq!(tags(&drain(&mut c)), ["start"]);
    }

    #[test]
    fn link_loss_clears_flags_and_timer() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        ready(&mut c, &mut game);
        c.start(&game);
        c.fire_due_timer(later());

        assert_eq!(c.handle_link_lost(None), StepOutcome::Disconnected);
        assert_eq!(c.connection_state(), ConnectionState::Disconnected);
        assert_eq!(c.status().kind, StatusKind::Disconnected);
        assert!(!c.session_state().in_flight);
        assert!(!c.timer_pending());
        assert!(drain(&mut c).is_empty());

        // Reconnecting renegotiates and resends the existing game.
        c.connect();
        assert!(c.session_state().pending_start);
        c.handle_open();
        c.handle_frame(r#"{"type":"ready"}"#, &mut game);
        assert_eq!(tags(&drain(&mut c)), ["rules", "start"]);
    }

    #[test]
    fn reconnect_forgets_replies_owed_to_the_old_link() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        ready(&mut c, &mut game);
        c.start(&game);
        c.fire_due_timer(later());
        game.restart(2);
        c.restart(&game);
        drain(&mut c);

        c.handle_link_lost(None);
        c.connect();
        c.handle_open();
        c.handle_frame(r#"{"type":"ready"}"#, &mut game);
        assert_eq!(tags(&drain(&mut c)), ["rules", "start"]);

        c.fire_due_timer(later());
        assert_eq!(tags(&drain(&mut c)), ["suggest"]);
        c.handle_frame(&suggestion_for(&game, 4), &mut game);
        assert_eq!(tags(&drain(&mut c)), ["play", "new_piece"]);
        assert_eq!(game.player(PlayerSlot::BOT).unwrap().pieces_placed(), 1);
    }

    #[test]
    fn transport_error_reports_error_status() {
        let mut c = controller(SyncMode::Incremental);
        c.connect();
        c.handle_link_lost(Some(BridgeError::Transport("refused".into())));
        assert_eq!(c.connection_state(), ConnectionState::Errored);
        assert_eq!(c.status().kind, StatusKind::Error);
        assert!(c.status().text.unwrap().contains("refused"));
    }

    #[test]
    fn agent_error_during_negotiation_is_fatal() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        c.connect();
        c.handle_open();
        c.handle_frame(r#"{"type":"error","reason":"unsupported_rules"}"#, &mut game);
        assert_eq!(c.connection_state(), ConnectionState::Errored);
        assert_eq!(c.status().text.as_deref(), Some("unsupported_rules"));
        assert!(c.close_requested);
    }

    #[test]
    fn unknown_and_malformed_frames_change_nothing() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        ready(&mut c, &mut game);
        c.start(&game);
        drain(&mut c);
        let before = c.session_state().clone();

        c.handle_frame(r#"{"type":"telemetry","x":1}"#, &mut game);
        c.handle_frame("{not json", &mut game);
        c.handle_frame(r#"{"type":"suggestion","moves":"nope"}"#, &mut game);
        assert_eq!(c.session_state(), &before);
        assert_eq!(c.connection_state(), ConnectionState::Ready);
        assert!(drain(&mut c).is_empty());
        assert_eq!(c.wire_log().len(), 5);
    }

    #[test]
    fn connect_is_ignored_while_connected() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        ready(&mut c, &mut game);
        c.connect();
        assert_eq!(c.connection_state(), ConnectionState::Ready);
    }

    #[test]
    fn restart_command_resets_engine() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        ready(&mut c, &mut game);
        c.start(&game);
        drain(&mut c);
        c.handle_command(HostCommand::Restart { seed: 77 }, &mut game);
        assert_eq!(game.seed(), 77);
        assert_eq!(tags(&drain(&mut c)), ["stop", "start"]);

        assert_eq!(
            c.handle_command(HostCommand::SetPps(0.0), &mut game),
            StepOutcome::Idle
        );
        assert_eq!(c.pps(), crate::config::MIN_PPS);
    }

    #[test]
    fn shutdown_command_stops_and_quits() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        ready(&mut c, &mut game);
        c.start(&game);
        drain(&mut c);
        assert_eq!(
            c.handle_command(HostCommand::Shutdown, &mut game),
            StepOutcome::Shutdown
        );
        assert_eq!(tags(&drain(&mut c)), ["stop", "quit"]);
        assert_eq!(c.connection_state(), ConnectionState::Stopped);
        assert!(!c.timer_pending());
    }

    #[test]
    fn play_acknowledges_in_the_agents_shape() {
        let mut c = controller(SyncMode::Incremental);
        let mut game = Versus::new(1);
        ready(&mut c, &mut game);
        c.start(&game);
        c.fire_due_timer(later());
        drain(&mut c);

        let kind = game.player(PlayerSlot::BOT).unwrap().active().kind;
        let frame = format!(
            r#"{{"type":"suggestion","moves":[{{"location":{{"type":"{kind}","orientation":"north","x":4,"y":2}},"spin":"none"}}]}}"#
        );
        c.handle_frame(&frame, &mut game);
        let sent = drain(&mut c);
        let Some(Message::Play { mv }) = sent.first() else {
            panic!("expected play, got {sent:?}");
        };
        assert_eq!(mv.form, PlacementForm::Location);
        let play: serde_json::Value = serde_json::from_str(&encode(&sent[0]).unwrap()).unwrap();
        assert_eq!(play["move"]["location"]["x"], 4);
        assert_eq!(play["move"]["location"]["y"], 2);
        assert_eq!(play["move"]["spin"], "none");
    }
}
