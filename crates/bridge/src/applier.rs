//! Move application - agent suggestions back into the engine
//!
//! Only the top-ranked placement of a suggestion is ever tried. A rejected
//! placement ends the agent's game; there is no fallback to lower-ranked moves.

use tracing::{debug, warn};

use crate::config::SyncMode;
use crate::engine::Engine;
use crate::error::BridgeError;
use crate::protocol::Placement;
use crate::snapshot::SnapshotBuilder;
use crate::types::{LockOutcome, PieceKind, PlaceError, PlacementRequest};

/// How the agent's view relates to the engine after a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueDelta {
    /// The queue shifted by one; this piece entered the tail.
    NewPiece(PieceKind),
    /// Anything else. The agent needs a fresh snapshot.
    Resync,
}

/// Compare the queue the agent last saw with the current one.
///
/// A pure shift (`curr[..n-1] == prev[1..]`, same length) means one piece
/// locked and one entered the tail.
pub fn diff_queue(prev: &[PieceKind], curr: &[PieceKind]) -> QueueDelta {
    let n = curr.len();
    if n == 0 || prev.len() != n {
        return QueueDelta::Resync;
    }
    if curr[..n - 1] == prev[1..] {
        QueueDelta::NewPiece(curr[n - 1])
    } else {
        QueueDelta::Resync
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    /// The engine refused the placement.
    Rejected(PlaceError),
    /// The placement locked but the player topped out.
    ToppedOut,
}

/// What the session should do after a suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No moves offered; just ask again later.
    Skip,
    /// The agent's game is over.
    Terminal(TerminalReason),
    /// Acknowledge the move and announce the new tail piece.
    Delta {
        played: Placement,
        piece: PieceKind,
        queue: Vec<PieceKind>,
        outcome: LockOutcome,
    },
    /// Send a full snapshot.
    Resync { outcome: LockOutcome },
}

#[derive(Debug, Clone, Copy)]
pub struct MoveApplier {
    mode: SyncMode,
}

impl MoveApplier {
    pub fn new(mode: SyncMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Engine command for a wire placement.
    pub fn request(placement: &Placement) -> PlacementRequest {
        PlacementRequest {
            kind: placement.piece.into(),
            rotation: placement.orientation.into(),
            column: placement.column,
            row: placement.row,
        }
    }

    /// Apply the best of `moves` and decide how to bring the agent up to date.
    ///
    /// `prev_queue` is the queue view the agent last saw.
    pub fn apply<E: Engine + ?Sized>(
        &self,
        engine: &mut E,
        snapshots: &SnapshotBuilder,
        moves: &[Placement],
        prev_queue: &[PieceKind],
    ) -> Decision {
        let Some(best) = moves.first() else {
            return Decision::Skip;
        };
        if moves.len() > 1 {
            debug!("discarding {} lower-ranked moves", moves.len() - 1);
        }

        let outcome = match engine.apply_placement(snapshots.slot(), Self::request(best)) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("agent placement {:?}: {}", best, BridgeError::from(e));
                return Decision::Terminal(TerminalReason::Rejected(e));
            }
        };

        if outcome.topped_out {
            return Decision::Terminal(TerminalReason::ToppedOut);
        }

        match self.mode {
            SyncMode::Resync => Decision::Resync { outcome },
            SyncMode::Incremental => {
                let queue = snapshots.queue_view(engine);
                match diff_queue(prev_queue, &queue) {
                    QueueDelta::NewPiece(piece) => Decision::Delta {
                        played: *best,
                        piece,
                        queue,
                        outcome,
                    },
                    QueueDelta::Resync => {
                        debug!("queue did not shift cleanly; resyncing");
                        Decision::Resync { outcome }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Versus;
    use crate::protocol::{Orientation, PieceCode, PlacementForm};
    use crate::types::PlayerSlot;
    use PieceKind::*;

    fn placement(kind: PieceKind, column: i8) -> Placement {
        Placement {
            piece: PieceCode(kind),
            column,
            row: None,
            orientation: Orientation::North,
            spin: None,
            form: PlacementForm::Flat,
        }
    }

    #[test]
    fn diff_detects_shift() {
        assert_eq!(
            diff_queue(&[I, J, L, O, S], &[J, L, O, S, Z]),
            QueueDelta::NewPiece(Z)
        );
    }

    #[test]
    fn diff_head_change_is_not_a_shift() {
        assert_eq!(
            diff_queue(&[I, J, L, O, S], &[T, J, L, O, S]),
            QueueDelta::Resync
        );
    }

    #[test]
    fn diff_length_change_resyncs() {
        assert_eq!(diff_queue(&[I, J, L], &[J, L]), QueueDelta::Resync);
        assert_eq!(diff_queue(&[], &[]), QueueDelta::Resync);
    }

    #[test]
    fn empty_suggestion_is_skipped() {
        let mut game = Versus::new(1);
        let builder = SnapshotBuilder::new(PlayerSlot::BOT, 5);
        let prev = builder.queue_view(&game);
        let decision = MoveApplier::new(SyncMode::Incremental).apply(&mut game, &builder, &[], &prev);
        assert_eq!(decision, Decision::Skip);
        assert_eq!(game.player(PlayerSlot::BOT).unwrap().pieces_placed(), 0);
    }

    #[test]
    fn plain_lock_yields_delta() {
        let mut game = Versus::new(1);
        let builder = SnapshotBuilder::new(PlayerSlot::BOT, 5);
        let prev = builder.queue_view(&game);
        let best = placement(prev[0], 4);
        let decision = MoveApplier::new(SyncMode::Incremental).apply(
            &mut game,
            &builder,
            &[best, placement(prev[0], 0)],
            &prev,
        );
        match decision {
            Decision::Delta {
                played,
                piece,
                queue,
                ..
            } => {
                assert_eq!(played, best);
                assert_eq!(queue[..5], prev[1..]);
                assert_eq!(Some(&piece), queue.last());
            }
            other => panic!("expected delta, got {other:?}"),
        }
        // Only the first move was applied.
        assert_eq!(game.player(PlayerSlot::BOT).unwrap().pieces_placed(), 1);
    }

    #[test]
    fn resync_mode_always_resyncs() {
        let mut game = Versus::new(1);
        let builder = SnapshotBuilder::new(PlayerSlot::BOT, 5);
        let prev = builder.queue_view(&game);
        let decision = MoveApplier::new(SyncMode::Resync).apply(
            &mut game,
            &builder,
            &[placement(prev[0], 4)],
            &prev,
        );
        assert!(matches!(decision, Decision::Resync { .. }));
    }

    #[test]
    fn hold_use_forces_resync() {
        let mut game = Versus::new(4);
        let builder = SnapshotBuilder::new(PlayerSlot::BOT, 5);
        let prev = builder.queue_view(&game);
        if prev[0] == prev[1] {
            return;
        }
        // Playing the next piece parks the active one in hold.
        let decision = MoveApplier::new(SyncMode::Incremental).apply(
            &mut game,
            &builder,
            &[placement(prev[1], 4)],
            &prev,
        );
        assert!(matches!(decision, Decision::Resync { .. }), "{decision:?}");
        assert_eq!(game.player(PlayerSlot::BOT).unwrap().hold_piece(), Some(prev[0]));
    }

    #[test]
    fn rejected_placement_is_terminal() {
        let mut game = Versus::new(1);
        let builder = SnapshotBuilder::new(PlayerSlot::BOT, 5);
        let prev = builder.queue_view(&game);
        let decision = MoveApplier::new(SyncMode::Incremental).apply(
            &mut game,
            &builder,
            &[placement(prev[0], 42)],
            &prev,
        );
        assert_eq!(
            decision,
            Decision::Terminal(TerminalReason::Rejected(PlaceError::OutOfBounds))
        );
    }
}
