//! Outward status signal for the surrounding application.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Disconnected,
    Connecting,
    Ready,
    Error,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Disconnected => "disconnected",
            StatusKind::Connecting => "connecting",
            StatusKind::Ready => "ready",
            StatusKind::Error => "error",
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub kind: StatusKind,
    /// Human-readable detail, e.g. the agent name or the failure reason.
    pub text: Option<String>,
}

impl Status {
    pub fn new(kind: StatusKind, text: Option<String>) -> Self {
        Self { kind, text }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.text {
            Some(text) => write!(f, "{}: {}", self.kind, text),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Latest-value status channel. Subscribers only ever see the newest status.
#[derive(Debug)]
pub struct StatusSignal {
    tx: watch::Sender<Status>,
}

impl StatusSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Status::new(StatusKind::Disconnected, None));
        Self { tx }
    }

    /// Publish a status; a no-op when nothing changed.
    pub fn set(&self, kind: StatusKind, text: Option<String>) {
        let status = Status::new(kind, text);
        self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    pub fn current(&self) -> Status {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.tx.subscribe()
    }
}

impl Default for StatusSignal {
    fn default() -> Self {
        Self::new()
    }
}
