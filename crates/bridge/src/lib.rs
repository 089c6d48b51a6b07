//! Bot bridge for tetris-versus
//!
//! Connects an external placement-suggesting agent to one player slot of a
//! running game. The bridge negotiates a session, sends the agent board
//! snapshots, asks for placements at a fixed pieces-per-second pace, and
//! feeds the best suggestion back into the engine.
//!
//! ```text
//!   engine ──snapshot──> SessionController ──frames──> ConnectionManager ──> agent
//!      ^                   |        ^                                          |
//!      └──MoveApplier──────┘        └──────────── suggestion ──────────────────┘
//! ```
//!
//! All session state lives in [`SessionController`], which handles one event
//! at a time on a single task.
//!
//! ## Example
//!
//! ```no_run
//! use tetris_versus_bridge::{BridgeConfig, SessionController};
//! use tetris_versus_bridge::core::Versus;
//! use tokio::sync::mpsc;
//!
//! # async fn demo() {
//! let mut game = Versus::new(1);
//! let (_commands, rx) = mpsc::unbounded_channel();
//! let mut session = SessionController::new(BridgeConfig::from_env(), rx);
//! session.connect();
//! session.start(&game);
//! session.run(&mut game).await;
//! # }
//! ```

pub mod applier;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod handshake;
pub mod protocol;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod status;
pub mod wire_log;

pub use tetris_versus_core as core;
pub use tetris_versus_types as types;

pub use applier::{Decision, MoveApplier, TerminalReason};
pub use config::{BridgeConfig, Endpoint, SyncMode};
pub use connection::{ConnectionManager, Link, LinkEvent};
pub use engine::{ActiveDescriptor, Engine};
pub use error::{BridgeError, Result};
pub use handshake::{HandshakeNegotiator, HandshakeStep};
pub use protocol::{decode, encode, Message};
pub use scheduler::SuggestionScheduler;
pub use session::{ConnectionState, HostCommand, SessionController, SessionState, StepOutcome};
pub use snapshot::SnapshotBuilder;
pub use status::{Status, StatusKind, StatusSignal};
pub use wire_log::{Direction, WireEntry, WireLog};
