//! WebSocket relay for stdin/stdout bots.
//!
//! Accepts bridge connections and spawns one bot process per connection.
//! Each text frame becomes one line on the bot's stdin; each line the bot
//! prints becomes one text frame. The bot is killed when either side goes
//! away.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::Command;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bot-relay", about = "Expose a stdin/stdout bot over WebSocket")]
struct Args {
    /// Address to accept bridge connections on
    #[arg(long, default_value = "127.0.0.1:9000")]
    listen: String,

    /// Bot executable
    #[arg(long)]
    bot_path: PathBuf,

    /// Passed to the bot as `--config <path>`
    #[arg(long)]
    bot_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("bind {}", args.listen))?;
    info!("relay listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        info!(%peer, "bridge connected");
        let bot_path = args.bot_path.clone();
        let bot_config = args.bot_config.clone();
        tokio::spawn(async move {
            match relay(stream, &bot_path, bot_config.as_deref()).await {
                Ok(()) => info!(%peer, "relay closed"),
                Err(e) => warn!(%peer, "relay failed: {:#}", e),
            }
        });
    }
}

async fn relay(stream: TcpStream, bot_path: &Path, bot_config: Option<&Path>) -> Result<()> {
    let ws = accept_async(stream).await.context("websocket handshake")?;
    let (mut ws_tx, mut ws_rx) = ws.split();

    let mut command = Command::new(bot_path);
    if let Some(config) = bot_config {
        command.arg("--config").arg(config);
    }
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    let mut child = command
        .spawn()
        .with_context(|| format!("spawn {}", bot_path.display()))?;
    let mut stdin = child.stdin.take().context("bot stdin unavailable")?;
    let mut stdout = BufReader::new(child.stdout.take().context("bot stdout unavailable")?).lines();

    loop {
        tokio::select! {
            frame = ws_rx.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    stdin.write_all(text.as_bytes()).await?;
                    stdin.write_all(b"\n").await?;
                    stdin.flush().await?;
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
            line = stdout.next_line() => match line? {
                Some(line) => ws_tx.send(WsMessage::Text(line)).await?,
                None => {
                    info!("bot exited");
                    let _ = ws_tx.close().await;
                    break;
                }
            },
        }
    }

    let _ = child.kill().await;
    Ok(())
}
