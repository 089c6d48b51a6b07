//! Board module - manages the game grid
//!
//! The board is a 10x40 grid (20 visible rows under a 20 row buffer). Each cell
//! is empty or holds the kind of the piece that locked there.
//!
//! Storage is top-first: `y == 0` is the top buffer row and
//! `y == BOARD_HEIGHT - 1` is the floor row. Bot-facing code works bottom-up and
//! converts with [`Board::y_from_row`].

use arrayvec::ArrayVec;

use crate::types::{Cell, PieceKind, Row, BOARD_HEIGHT, BOARD_WIDTH, BUFFER_HEIGHT};

/// The game board - 10 columns x 40 rows
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Board {
    rows: [Row; BOARD_HEIGHT],
}

impl Board {
    /// Create a new empty board
    pub fn new() -> Self {
        Self {
            rows: [[None; BOARD_WIDTH]; BOARD_HEIGHT],
        }
    }

    #[inline(always)]
    fn in_bounds(x: i8, y: i8) -> bool {
        x >= 0 && (x as usize) < BOARD_WIDTH && y >= 0 && (y as usize) < BOARD_HEIGHT
    }

    /// Convert a bottom-up row index into a storage row index.
    #[inline]
    pub fn y_from_row(row: i8) -> i8 {
        BOARD_HEIGHT as i8 - 1 - row
    }

    pub fn width(&self) -> usize {
        BOARD_WIDTH
    }

    pub fn height(&self) -> usize {
        BOARD_HEIGHT
    }

    /// Get cell at position (x, y)
    /// Returns None if out of bounds
    pub fn get(&self, x: i8, y: i8) -> Option<Cell> {
        if Self::in_bounds(x, y) {
            Some(self.rows[y as usize][x as usize])
        } else {
            None
        }
    }

    /// Set cell at position (x, y)
    /// Returns false if out of bounds
    pub fn set(&mut self, x: i8, y: i8, cell: Cell) -> bool {
        if !Self::in_bounds(x, y) {
            return false;
        }
        self.rows[y as usize][x as usize] = cell;
        true
    }

    /// Check if position is valid (within bounds and empty)
    pub fn is_valid(&self, x: i8, y: i8) -> bool {
        matches!(self.get(x, y), Some(None))
    }

    /// Check if position is occupied (within bounds and filled)
    pub fn is_occupied(&self, x: i8, y: i8) -> bool {
        matches!(self.get(x, y), Some(Some(_)))
    }

    /// Check if a row is completely filled
    pub fn is_row_full(&self, y: usize) -> bool {
        self.rows
            .get(y)
            .map(|row| row.iter().all(|cell| cell.is_some()))
            .unwrap_or(false)
    }

    /// Rows top-first, as stored.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Write the given kind into every listed cell. Cells must already be valid.
    pub fn fill(&mut self, cells: &[(i8, i8)], kind: PieceKind) {
        for &(x, y) in cells {
            self.set(x, y, Some(kind));
        }
    }

    /// Clear all full rows and return the row indices that were cleared (sorted bottom to top)
    ///
    /// Two-pointer compaction from the floor upwards; no allocation.
    pub fn clear_full_rows(&mut self) -> ArrayVec<usize, 4> {
        let mut cleared_rows = ArrayVec::new();
        let mut write_y = BOARD_HEIGHT;

        for read_y in (0..BOARD_HEIGHT).rev() {
            if self.is_row_full(read_y) {
                // A single piece spans at most four rows.
                let _ = cleared_rows.try_push(read_y);
            } else {
                write_y -= 1;
                if write_y != read_y {
                    self.rows[write_y] = self.rows[read_y];
                }
            }
        }

        for row in &mut self.rows[..write_y] {
            *row = [None; BOARD_WIDTH];
        }

        cleared_rows
    }

    /// True when every occupied cell lies in the hidden buffer (or the board is empty).
    pub fn visible_empty(&self) -> bool {
        self.rows[BUFFER_HEIGHT..]
            .iter()
            .all(|row| row.iter().all(|c| c.is_none()))
    }

    /// Height of the stack in rows, counted from the floor.
    pub fn stack_height(&self) -> usize {
        self.rows
            .iter()
            .position(|row| row.iter().any(|c| c.is_some()))
            .map(|y| BOARD_HEIGHT - y)
            .unwrap_or(0)
    }

    /// Clear the entire board
    pub fn clear(&mut self) {
        self.rows = [[None; BOARD_WIDTH]; BOARD_HEIGHT];
    }

    /// Build a board from bottom-up rows, as the bot protocol lists them.
    /// Missing rows are empty; extra rows are ignored.
    pub fn from_bottom_rows(rows: &[Row]) -> Self {
        let mut board = Self::new();
        for (row_idx, row) in rows.iter().take(BOARD_HEIGHT).enumerate() {
            board.rows[BOARD_HEIGHT - 1 - row_idx] = *row;
        }
        board
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
