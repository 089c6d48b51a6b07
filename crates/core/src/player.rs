//! Per-player game state: board, active piece, hold slot, queue and lock bookkeeping.
//!
//! Pieces enter play only through [`Player::apply_placement`], which resolves the
//! requested piece against the active/hold/next pieces, finds its landing row,
//! locks it, clears lines and spawns the next piece.

use std::collections::VecDeque;

use arrayvec::ArrayVec;

use crate::pieces::{cells_at, get_shape, SPAWN_COLUMN, SPAWN_ROW};
use crate::rng::SevenBag;
use crate::types::{
    LockOutcome, PieceKind, PlaceError, PlacementRequest, Rotation, BOARD_HEIGHT, BOARD_WIDTH,
    QUEUE_LEN, VISIBLE_HEIGHT,
};
use crate::Board;

/// The falling piece, addressed by its rotation centre in bottom-up coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivePiece {
    pub kind: PieceKind,
    pub rotation: Rotation,
    pub column: i8,
    pub row: i8,
}

impl ActivePiece {
    pub fn spawn(kind: PieceKind) -> Self {
        Self {
            kind,
            rotation: Rotation::North,
            column: SPAWN_COLUMN,
            row: SPAWN_ROW,
        }
    }

    pub fn cells(&self) -> [(i8, i8); 4] {
        cells_at(self.kind, self.rotation, self.column, self.row)
    }
}

/// How a placement gets hold of the requested piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoldUse {
    /// The requested piece is the active piece.
    None,
    /// The requested piece is in hold; swap it with the active piece.
    Swap,
    /// Hold is empty and the requested piece is next: stash the active piece, take the next.
    TakeNext,
}

#[derive(Debug, Clone)]
pub struct Player {
    board: Board,
    active: ActivePiece,
    hold: Option<PieceKind>,
    queue: VecDeque<PieceKind>,
    bag: SevenBag,
    combo: u32,
    back_to_back: bool,
    topped_out: bool,
    pieces_placed: u32,
    lines_cleared: u32,
}

impl Player {
    pub fn new(seed: u32) -> Self {
        let mut bag = SevenBag::new(seed);
        let first = bag.draw();
        let queue = (0..QUEUE_LEN).map(|_| bag.draw()).collect();
        Self {
            board: Board::new(),
            active: ActivePiece::spawn(first),
            hold: None,
            queue,
            bag,
            combo: 0,
            back_to_back: false,
            topped_out: false,
            pieces_placed: 0,
            lines_cleared: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Direct board access for setting up positions.
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn active(&self) -> ActivePiece {
        self.active
    }

    pub fn hold_piece(&self) -> Option<PieceKind> {
        self.hold
    }

    /// Upcoming pieces after the active one, next first.
    pub fn queue(&self) -> &VecDeque<PieceKind> {
        &self.queue
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn back_to_back(&self) -> bool {
        self.back_to_back
    }

    pub fn topped_out(&self) -> bool {
        self.topped_out
    }

    pub fn pieces_placed(&self) -> u32 {
        self.pieces_placed
    }

    pub fn lines_cleared(&self) -> u32 {
        self.lines_cleared
    }

    /// Pieces left in the randomizer's current bag after the queued pieces.
    pub fn bag_state(&self) -> ArrayVec<PieceKind, 7> {
        self.bag.bag_state()
    }

    fn cell_free(&self, column: i8, row: i8) -> bool {
        row >= 0 && self.board.is_valid(column, Board::y_from_row(row))
    }

    fn fits(&self, kind: PieceKind, rotation: Rotation, column: i8, row: i8) -> bool {
        cells_at(kind, rotation, column, row)
            .iter()
            .all(|&(x, y)| self.cell_free(x, y))
    }

    fn resolve_piece(&self, kind: PieceKind) -> Result<HoldUse, PlaceError> {
        if kind == self.active.kind {
            return Ok(HoldUse::None);
        }
        match self.hold {
            Some(held) if held == kind => Ok(HoldUse::Swap),
            None if self.queue.front() == Some(&kind) => Ok(HoldUse::TakeNext),
            _ => Err(PlaceError::PieceUnavailable),
        }
    }

    /// Row the piece comes to rest on.
    ///
    /// An explicit row is honoured when the piece fits there; otherwise the piece
    /// is dropped from the top of the board in that column.
    fn landing_row(&self, req: &PlacementRequest) -> Result<i8, PlaceError> {
        let shape = get_shape(req.kind, req.rotation);
        let (min_dx, max_dx, max_dy) = shape.iter().fold(
            (i8::MAX, i8::MIN, i8::MIN),
            |(lo, hi, top), &(dx, dy)| (lo.min(dx), hi.max(dx), top.max(dy)),
        );
        let column = i16::from(req.column);
        if column + i16::from(min_dx) < 0 || column + i16::from(max_dx) >= BOARD_WIDTH as i16 {
            return Err(PlaceError::OutOfBounds);
        }

        if let Some(row) = req.row {
            if (0..BOARD_HEIGHT as i8).contains(&row)
                && self.fits(req.kind, req.rotation, req.column, row)
            {
                return Ok(row);
            }
        }

        let mut row = BOARD_HEIGHT as i8 - 1 - max_dy;
        if !self.fits(req.kind, req.rotation, req.column, row) {
            return Err(PlaceError::Collision);
        }
        while self.fits(req.kind, req.rotation, req.column, row - 1) {
            row -= 1;
        }
        Ok(row)
    }

    /// Apply an externally supplied placement as this player's next piece.
    ///
    /// Nothing is mutated when the placement is rejected.
    pub fn apply_placement(&mut self, req: PlacementRequest) -> Result<LockOutcome, PlaceError> {
        if self.topped_out {
            return Err(PlaceError::ToppedOut);
        }

        let hold_use = self.resolve_piece(req.kind)?;
        let row = self.landing_row(&req)?;

        match hold_use {
            HoldUse::None => {}
            HoldUse::Swap => {
                self.hold = Some(self.active.kind);
            }
            HoldUse::TakeNext => {
                self.hold = Some(self.active.kind);
                self.queue.pop_front();
                self.queue.push_back(self.bag.draw());
            }
        }
        self.active = ActivePiece {
            kind: req.kind,
            rotation: req.rotation,
            column: req.column,
            row,
        };

        Ok(self.lock_active())
    }

    fn lock_active(&mut self) -> LockOutcome {
        let cells = self.active.cells();
        let lock_out = cells.iter().all(|&(_, row)| row as usize >= VISIBLE_HEIGHT);
        let board_cells = cells.map(|(x, row)| (x, Board::y_from_row(row)));
        self.board.fill(&board_cells, self.active.kind);

        let cleared = self.board.clear_full_rows().len() as u8;
        if cleared > 0 {
            self.combo = self.combo.saturating_add(1);
            self.back_to_back = cleared >= 4;
        } else {
            self.combo = 0;
        }
        self.pieces_placed = self.pieces_placed.saturating_add(1);
        self.lines_cleared = self.lines_cleared.saturating_add(cleared as u32);

        if lock_out && cleared == 0 {
            self.topped_out = true;
        }
        let new_queue_piece = self.spawn_next();

        LockOutcome {
            lines_cleared: cleared,
            topped_out: self.topped_out,
            combo: self.combo,
            back_to_back: self.back_to_back,
            new_queue_piece,
        }
    }

    /// Promote the next queued piece to active and refill the queue tail.
    fn spawn_next(&mut self) -> Option<PieceKind> {
        let next = self.queue.pop_front().unwrap_or_else(|| self.bag.draw());
        let tail = self.bag.draw();
        self.queue.push_back(tail);
        self.active = ActivePiece::spawn(next);
        if !self.fits(next, Rotation::North, SPAWN_COLUMN, SPAWN_ROW) {
            self.topped_out = true;
        }
        Some(tail)
    }
}
