//! Snapshot building - engine state to `start` messages
//!
//! Read-only. The same engine state always produces the same snapshot.

use crate::engine::Engine;
use crate::protocol::{PieceCode, RandomizerState, StartSnapshot};
use crate::types::{PieceKind, PlayerSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotBuilder {
    slot: PlayerSlot,
    preview: usize,
}

impl SnapshotBuilder {
    pub fn new(slot: PlayerSlot, preview: usize) -> Self {
        Self { slot, preview }
    }

    pub fn slot(&self) -> PlayerSlot {
        self.slot
    }

    pub fn preview(&self) -> usize {
        self.preview
    }

    /// The queue as reported to the agent: the active piece, then up to
    /// `preview` upcoming pieces.
    pub fn queue_view<E: Engine + ?Sized>(&self, engine: &E) -> Vec<PieceKind> {
        engine
            .active(self.slot)
            .map(|a| a.kind)
            .into_iter()
            .chain(engine.queue(self.slot))
            .take(self.preview.saturating_add(1))
            .collect()
    }

    pub fn build<E: Engine + ?Sized>(&self, engine: &E) -> StartSnapshot {
        let board = engine
            .rows(self.slot)
            .iter()
            .rev()
            .map(|row| row.map(|cell| cell.map(PieceCode)))
            .collect();

        let upcoming = engine.queue(self.slot).len();
        let queue = self.queue_view(engine);

        // Bag contents only make sense when the agent sees the whole queue.
        let randomizer = (upcoming <= self.preview).then(|| RandomizerState::SevenBag {
            bag_state: engine
                .bag_state(self.slot)
                .into_iter()
                .map(PieceCode)
                .collect(),
        });

        StartSnapshot {
            board,
            queue: queue.into_iter().map(PieceCode).collect(),
            hold: engine.hold(self.slot).map(PieceCode),
            combo: engine.combo(self.slot),
            back_to_back: engine.back_to_back(self.slot),
            randomizer,
        }
    }
}
