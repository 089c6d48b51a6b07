//! The game engine as the bridge sees it.
//!
//! A narrow read/command surface over one player slot. Reads never mutate;
//! [`Engine::apply_placement`] is the only command.

use crate::core::{Player, Versus};
use crate::types::{LockOutcome, PieceKind, PlaceError, PlacementRequest, PlayerSlot, Row};

/// The piece currently falling for a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveDescriptor {
    pub kind: PieceKind,
}

pub trait Engine {
    /// Occupancy rows, top-first. Empty for an unknown slot.
    fn rows(&self, slot: PlayerSlot) -> &[Row];

    fn active(&self, slot: PlayerSlot) -> Option<ActiveDescriptor>;

    fn hold(&self, slot: PlayerSlot) -> Option<PieceKind>;

    /// Upcoming pieces after the active one, next first.
    fn queue(&self, slot: PlayerSlot) -> Vec<PieceKind>;

    fn combo(&self, slot: PlayerSlot) -> u32;

    fn back_to_back(&self, slot: PlayerSlot) -> bool;

    /// Pieces left in the randomizer's current bag beyond the queue.
    fn bag_state(&self, slot: PlayerSlot) -> Vec<PieceKind>;

    fn topped_out(&self, slot: PlayerSlot) -> bool;

    /// Apply an externally supplied placement as the player's next action.
    fn apply_placement(
        &mut self,
        slot: PlayerSlot,
        req: PlacementRequest,
    ) -> Result<LockOutcome, PlaceError>;

    /// Replace the current game with a fresh one.
    fn reset(&mut self, seed: u32);
}

impl Engine for Versus {
    fn rows(&self, slot: PlayerSlot) -> &[Row] {
        self.player(slot).map(|p| p.board().rows()).unwrap_or(&[])
    }

    fn active(&self, slot: PlayerSlot) -> Option<ActiveDescriptor> {
        self.player(slot).map(|p| ActiveDescriptor {
            kind: p.active().kind,
        })
    }

    fn hold(&self, slot: PlayerSlot) -> Option<PieceKind> {
        self.player(slot).and_then(Player::hold_piece)
    }

    fn queue(&self, slot: PlayerSlot) -> Vec<PieceKind> {
        self.player(slot)
            .map(|p| p.queue().iter().copied().collect())
            .unwrap_or_default()
    }

    fn combo(&self, slot: PlayerSlot) -> u32 {
        self.player(slot).map(Player::combo).unwrap_or(0)
    }

    fn back_to_back(&self, slot: PlayerSlot) -> bool {
        self.player(slot).is_some_and(Player::back_to_back)
    }

    fn bag_state(&self, slot: PlayerSlot) -> Vec<PieceKind> {
        self.player(slot)
            .map(|p| p.bag_state().to_vec())
            .unwrap_or_default()
    }

    fn topped_out(&self, slot: PlayerSlot) -> bool {
        self.player(slot).is_some_and(Player::topped_out)
    }

    fn apply_placement(
        &mut self,
        slot: PlayerSlot,
        req: PlacementRequest,
    ) -> Result<LockOutcome, PlaceError> {
        Versus::apply_placement(self, slot, req)
    }

    fn reset(&mut self, seed: u32) {
        self.restart(seed);
    }
}
