//! Headless versus runner (default binary).
//!
//! Creates a game, connects the configured bot to its slot, and plays until
//! the bot's game ends, Ctrl-C, or the connection goes away. Losing the bot
//! is logged and ends the run normally. Configuration comes from the
//! environment:
//!
//! - `TETRIS_BOT_URL`, `TETRIS_BOT_PPS`, `TETRIS_BOT_PREVIEW`, `TETRIS_BOT_SYNC`,
//!   `TETRIS_BOT_SLOT`, `TETRIS_BOT_LOG_PATH`: bridge settings
//! - `TETRIS_BOT_DISABLED=1`: exit without connecting
//! - `TETRIS_SEED`: game seed (default 1)
//! - `TETRIS_RESTARTS`: further games to play after the first one ends

use std::str::FromStr;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tetris_versus::bridge::{BridgeConfig, HostCommand, SessionController, StepOutcome};
use tetris_versus::core::Versus;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if BridgeConfig::is_disabled() {
        info!("bot bridge disabled; nothing to do");
        return Ok(());
    }

    let config = BridgeConfig::from_env();
    let seed = env_number("TETRIS_SEED").unwrap_or(1);
    let restarts = env_number("TETRIS_RESTARTS").unwrap_or(0);

    // One thread: the session is driven strictly one event at a time.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config, seed, restarts))
}

async fn run(config: BridgeConfig, seed: u32, mut restarts: u32) -> Result<()> {
    let slot = config.slot;
    let mut game = Versus::new(seed);
    let (commands, rx) = mpsc::unbounded_channel();

    let interrupt = commands.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt.send(HostCommand::Shutdown);
        }
    });

    let mut session = SessionController::new(config, rx);
    session.connect();
    session.start(&game);

    let mut next_seed = seed;
    loop {
        match session.step(&mut game).await {
            StepOutcome::Idle => {}
            StepOutcome::Applied(outcome) => {
                if outcome.lines_cleared > 0 {
                    info!(
                        lines = outcome.lines_cleared,
                        combo = outcome.combo,
                        b2b = outcome.back_to_back,
                        "bot cleared lines"
                    );
                }
            }
            StepOutcome::GameOver(reason) => {
                if let Some(player) = game.player(slot) {
                    info!(
                        pieces = player.pieces_placed(),
                        lines = player.lines_cleared(),
                        "bot game over: {:?}",
                        reason
                    );
                }
                if restarts > 0 {
                    restarts -= 1;
                    next_seed = next_seed.wrapping_add(1);
                    commands.send(HostCommand::Restart { seed: next_seed })?;
                } else {
                    commands.send(HostCommand::Shutdown)?;
                }
            }
            StepOutcome::Disconnected => {
                // No automatic reconnect.
                warn!("bot unavailable ({}); stopping", session.status());
                break;
            }
            StepOutcome::Shutdown => break,
        }
    }

    session.shutdown().await;
    info!("wire log holds {} frames", session.wire_log().len());
    Ok(())
}

fn env_number<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}
