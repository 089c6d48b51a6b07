//! Bridge configuration
//!
//! Defaults suit a local agent relay; every field can be overridden from the
//! environment (see [`BridgeConfig::from_env`]).

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::{BridgeError, Result};
use crate::types::{PlayerSlot, QUEUE_LEN};

/// Lowest accepted pieces-per-second; keeps the pacing period finite.
pub const MIN_PPS: f32 = 0.1;

pub const DEFAULT_PPS: f32 = 1.8;

pub const DEFAULT_PREVIEW: usize = 5;

pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:9000";

/// Where the agent lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `ws://host:port[/path]`: one JSON object per WebSocket text frame
    WebSocket(String),
    /// `tcp://host:port`: one JSON object per line
    TcpLines(String),
}

impl FromStr for Endpoint {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("ws://") {
            if rest.is_empty() {
                return Err(BridgeError::Config(format!("missing host in {s:?}")));
            }
            Ok(Endpoint::WebSocket(s.to_string()))
        } else if let Some(rest) = s.strip_prefix("tcp://") {
            let addr = rest.trim_end_matches('/');
            match addr.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                    Ok(Endpoint::TcpLines(addr.to_string()))
                }
                _ => Err(BridgeError::Config(format!(
                    "expected tcp://host:port, got {s:?}"
                ))),
            }
        } else {
            Err(BridgeError::Config(format!(
                "unsupported endpoint {s:?} (use ws:// or tcp://)"
            )))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::WebSocket(url) => f.write_str(url),
            Endpoint::TcpLines(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::WebSocket(DEFAULT_ENDPOINT.to_string())
    }
}

/// How the agent is kept in step after a successful placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// `play` + `new_piece` when the queue simply shifted, full `start` otherwise
    #[default]
    Incremental,
    /// Always a full `start` snapshot
    Resync,
}

impl FromStr for SyncMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("incremental") {
            Ok(SyncMode::Incremental)
        } else if s.eq_ignore_ascii_case("resync") {
            Ok(SyncMode::Resync)
        } else {
            Err(BridgeError::Config(format!("invalid sync mode {s:?}")))
        }
    }
}

/// Bridge configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub endpoint: Endpoint,
    pub pps: f32,
    /// Upcoming pieces reported after the current piece.
    pub preview: usize,
    pub sync_mode: SyncMode,
    /// Player slot the agent drives.
    pub slot: PlayerSlot,
    pub log_path: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            pps: DEFAULT_PPS,
            preview: DEFAULT_PREVIEW,
            sync_mode: SyncMode::default(),
            slot: PlayerSlot::BOT,
            log_path: None,
        }
    }
}

impl BridgeConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Invalid values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("TETRIS_BOT_URL") {
            match url.parse() {
                Ok(endpoint) => config.endpoint = endpoint,
                Err(e) => warn!("ignoring TETRIS_BOT_URL: {}", e),
            }
        }

        if let Some(pps) = lookup("TETRIS_BOT_PPS").and_then(|s| s.trim().parse::<f32>().ok()) {
            if pps.is_finite() && pps > 0.0 {
                config.pps = pps;
            } else {
                warn!("ignoring non-positive TETRIS_BOT_PPS {}", pps);
            }
        }

        if let Some(preview) = lookup("TETRIS_BOT_PREVIEW").and_then(|s| s.trim().parse::<usize>().ok()) {
            if preview > QUEUE_LEN {
                warn!("TETRIS_BOT_PREVIEW {} exceeds the queue; using {}", preview, QUEUE_LEN);
            }
            config.preview = preview.min(QUEUE_LEN);
        }

        if let Some(mode) = lookup("TETRIS_BOT_SYNC") {
            match mode.parse() {
                Ok(mode) => config.sync_mode = mode,
                Err(e) => warn!("ignoring TETRIS_BOT_SYNC: {}", e),
            }
        }

        if let Some(slot) = lookup("TETRIS_BOT_SLOT").and_then(|s| s.trim().parse().ok()) {
            config.slot = PlayerSlot(slot);
        }

        config.log_path = lookup("TETRIS_BOT_LOG_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        config
    }

    /// Check if the bridge is disabled via environment
    pub fn is_disabled() -> bool {
        std::env::var("TETRIS_BOT_DISABLED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}
