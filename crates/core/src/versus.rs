//! Two-player match: one board per slot, both fed from the same seed.

use crate::types::{LockOutcome, PlaceError, PlacementRequest, PlayerSlot};
use crate::Player;

#[derive(Debug, Clone)]
pub struct Versus {
    players: [Player; 2],
    seed: u32,
}

impl Versus {
    /// Both players draw identical piece sequences from `seed`.
    pub fn new(seed: u32) -> Self {
        Self {
            players: [Player::new(seed), Player::new(seed)],
            seed,
        }
    }

    /// Throw away both boards and start over with a new seed.
    pub fn restart(&mut self, seed: u32) {
        *self = Self::new(seed);
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn player(&self, slot: PlayerSlot) -> Option<&Player> {
        self.players.get(slot.0)
    }

    pub fn player_mut(&mut self, slot: PlayerSlot) -> Option<&mut Player> {
        self.players.get_mut(slot.0)
    }

    /// Apply a placement as the next action of the player in `slot`.
    pub fn apply_placement(
        &mut self,
        slot: PlayerSlot,
        req: PlacementRequest,
    ) -> Result<LockOutcome, PlaceError> {
        self.player_mut(slot)
            .ok_or(PlaceError::InvalidSlot)?
            .apply_placement(req)
    }

    /// The match is over once any player has topped out.
    pub fn is_over(&self) -> bool {
        self.players.iter().any(Player::topped_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PieceKind, Rotation};

    #[test]
    fn players_share_the_piece_sequence() {
        let v = Versus::new(42);
        let human = v.player(PlayerSlot::HUMAN).unwrap();
        let bot = v.player(PlayerSlot::BOT).unwrap();
        assert_eq!(human.active(), bot.active());
        assert_eq!(human.queue(), bot.queue());
    }

    #[test]
    fn placement_only_touches_its_slot() {
        let mut v = Versus::new(42);
        let kind = v.player(PlayerSlot::BOT).unwrap().active().kind;
        v.apply_placement(
            PlayerSlot::BOT,
            PlacementRequest {
                kind,
                rotation: Rotation::North,
                column: 4,
                row: None,
            },
        )
        .unwrap();
        assert_eq!(v.player(PlayerSlot::BOT).unwrap().pieces_placed(), 1);
        assert_eq!(v.player(PlayerSlot::HUMAN).unwrap().pieces_placed(), 0);
    }

    #[test]
    fn unknown_slot_is_rejected() {
        let mut v = Versus::new(1);
        let err = v
            .apply_placement(
                PlayerSlot(2),
                PlacementRequest {
                    kind: PieceKind::T,
                    rotation: Rotation::North,
                    column: 4,
                    row: None,
                },
            )
            .unwrap_err();
        assert_eq!(err, PlaceError::InvalidSlot);
    }

    #[test]
    fn restart_resets_progress_and_seed() {
        let mut v = Versus::new(1);
        let kind = v.player(PlayerSlot::BOT).unwrap().active().kind;
        v.apply_placement(
            PlayerSlot::BOT,
            PlacementRequest {
                kind,
                rotation: Rotation::North,
                column: 4,
                row: None,
            },
        )
        .unwrap();
        v.restart(9);
        assert_eq!(v.seed(), 9);
        assert_eq!(v.player(PlayerSlot::BOT).unwrap().pieces_placed(), 0);
        assert!(!v.is_over());
    }
}
