//! Pieces module - tetromino geometry in bot-protocol coordinates
//!
//! Shapes are expressed relative to the piece's rotation centre with `y`
//! pointing up, which is the frame bot agents use to describe placements.
//! Rotating clockwise maps `(x, y)` to `(y, -x)`; for every kind this keeps the
//! centre on the mino the bot protocol designates (for I and O the centre sits
//! on a mino adjacent to the true SRS pivot).
//! Reference: https://tetris.wiki/SRS

use crate::types::{PieceKind, Rotation};

/// Offset of a single mino relative to the rotation centre, `y` up
pub type MinoOffset = (i8, i8);

/// Shape of a piece - 4 mino offsets from the rotation centre
pub type PieceShape = [MinoOffset; 4];

/// Column of the rotation centre for a freshly spawned piece.
pub const SPAWN_COLUMN: i8 = 4;

/// Bottom-up row of the rotation centre for a freshly spawned piece
/// (the first buffer row, directly above the visible field).
pub const SPAWN_ROW: i8 = 20;

fn north_shape(kind: PieceKind) -> PieceShape {
    match kind {
        PieceKind::I => [(-1, 0), (0, 0), (1, 0), (2, 0)],
        PieceKind::O => [(0, 0), (1, 0), (0, 1), (1, 1)],
        PieceKind::T => [(-1, 0), (0, 0), (1, 0), (0, 1)],
        PieceKind::S => [(-1, 0), (0, 0), (0, 1), (1, 1)],
        PieceKind::Z => [(-1, 1), (0, 1), (0, 0), (1, 0)],
        PieceKind::J => [(-1, 1), (-1, 0), (0, 0), (1, 0)],
        PieceKind::L => [(-1, 0), (0, 0), (1, 0), (1, 1)],
    }
}

/// Get the shape (mino offsets) for a piece kind and rotation
pub fn get_shape(kind: PieceKind, rotation: Rotation) -> PieceShape {
    let mut shape = north_shape(kind);
    for _ in 0..rotation.quarter_turns() {
        for mino in shape.iter_mut() {
            *mino = (mino.1, -mino.0);
        }
    }
    shape
}

/// Absolute bottom-up `(column, row)` cells of a piece centred at `(column, row)`.
pub fn cells_at(kind: PieceKind, rotation: Rotation, column: i8, row: i8) -> [(i8, i8); 4] {
    get_shape(kind, rotation).map(|(dx, dy)| (column + dx, row + dy))
}
