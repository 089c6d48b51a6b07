//! Core types module - shared data structures and constants
//!
//! This module defines the fundamental types shared by the game engine and the
//! bot bridge. All types are pure data with no external dependencies, so they can
//! be used on either side of the protocol boundary.
//!
//! # Board Geometry
//!
//! The playfield follows the layout bot agents expect:
//!
//! - **Width**: 10 columns (indexed 0-9, left to right)
//! - **Visible height**: 20 rows
//! - **Buffer height**: 20 rows stacked above the visible field
//! - **Total height**: 40 rows
//!
//! The engine stores rows top-first (row 0 is the top of the buffer). The bot
//! protocol reports rows bottom-first; conversion happens in the bridge.
//!
//! # Examples
//!
//! ```
//! use tetris_versus_types::{PieceKind, Rotation, BOARD_HEIGHT, BOARD_WIDTH};
//!
//! let piece = PieceKind::from_str("t").unwrap();
//! assert_eq!(piece, PieceKind::T);
//! assert_eq!(piece.as_str(), "T");
//!
//! assert_eq!(Rotation::North.rotate_cw(), Rotation::East);
//!
//! assert_eq!(BOARD_WIDTH, 10);
//! assert_eq!(BOARD_HEIGHT, 40);
//! ```

/// Board width in cells (10 columns)
pub const BOARD_WIDTH: usize = 10;

/// Rows of the visible playfield
pub const VISIBLE_HEIGHT: usize = 20;

/// Rows of hidden buffer above the visible playfield
pub const BUFFER_HEIGHT: usize = 20;

/// Total board rows (visible + buffer)
pub const BOARD_HEIGHT: usize = VISIBLE_HEIGHT + BUFFER_HEIGHT;

/// Number of upcoming pieces each player keeps queued behind the active piece.
pub const QUEUE_LEN: usize = 5;

/// The seven tetromino piece kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PieceKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl PieceKind {
    /// All kinds in canonical bag order.
    pub const ALL: [PieceKind; 7] = [
        PieceKind::I,
        PieceKind::O,
        PieceKind::T,
        PieceKind::S,
        PieceKind::Z,
        PieceKind::J,
        PieceKind::L,
    ];

    /// Parse piece kind from string (case-insensitive)
    ///
    /// # Examples
    ///
    /// ```
    /// use tetris_versus_types::PieceKind;
    ///
    /// assert_eq!(PieceKind::from_str("i"), Some(PieceKind::I));
    /// assert_eq!(PieceKind::from_str("O"), Some(PieceKind::O));
    /// assert_eq!(PieceKind::from_str("G"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "i" | "I" => Some(PieceKind::I),
            "o" | "O" => Some(PieceKind::O),
            "t" | "T" => Some(PieceKind::T),
            "s" | "S" => Some(PieceKind::S),
            "z" | "Z" => Some(PieceKind::Z),
            "j" | "J" => Some(PieceKind::J),
            "l" | "L" => Some(PieceKind::L),
            _ => None,
        }
    }

    /// Single uppercase letter used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            PieceKind::I => "I",
            PieceKind::O => "O",
            PieceKind::T => "T",
            PieceKind::S => "S",
            PieceKind::Z => "Z",
            PieceKind::J => "J",
            PieceKind::L => "L",
        }
    }
}

impl std::fmt::Display for PieceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rotation states following the Super Rotation System (SRS)
///
/// - **North**: Spawn orientation (0° rotation)
/// - **East**: Rotated 90° clockwise
/// - **South**: Rotated 180°
/// - **West**: Rotated 90° counter-clockwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    North,
    East,
    South,
    West,
}

impl Rotation {
    /// Rotate clockwise (90°)
    pub fn rotate_cw(&self) -> Self {
        match self {
            Rotation::North => Rotation::East,
            Rotation::East => Rotation::South,
            Rotation::South => Rotation::West,
            Rotation::West => Rotation::North,
        }
    }

    /// Number of clockwise quarter turns from North.
    pub fn quarter_turns(&self) -> u8 {
        match self {
            Rotation::North => 0,
            Rotation::East => 1,
            Rotation::South => 2,
            Rotation::West => 3,
        }
    }

    /// Convert to lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            Rotation::North => "north",
            Rotation::East => "east",
            Rotation::South => "south",
            Rotation::West => "west",
        }
    }
}

/// A cell on the game board
///
/// - `None`: Empty cell
/// - `Some(PieceKind)`: Cell filled by a locked piece of that kind
pub type Cell = Option<PieceKind>;

/// One board row, left to right.
pub type Row = [Cell; BOARD_WIDTH];

/// Index of a player in a versus match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PlayerSlot(pub usize);

impl PlayerSlot {
    pub const HUMAN: PlayerSlot = PlayerSlot(0);
    pub const BOT: PlayerSlot = PlayerSlot(1);
}

/// A placement to be applied as the player's next action.
///
/// `column`/`row` address the rotation-centre mino in bottom-up board
/// coordinates. With `row == None` the engine hard-drops from the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlacementRequest {
    pub kind: PieceKind,
    pub rotation: Rotation,
    pub column: i8,
    pub row: Option<i8>,
}

/// Result of locking a placed piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockOutcome {
    pub lines_cleared: u8,
    pub topped_out: bool,
    pub combo: u32,
    pub back_to_back: bool,
    /// Piece that entered the tail of the queue on respawn, if any.
    pub new_queue_piece: Option<PieceKind>,
}

/// Why the engine refused an externally supplied placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceError {
    InvalidSlot,
    ToppedOut,
    PieceUnavailable,
    OutOfBounds,
    Collision,
}

impl PlaceError {
    pub fn code(self) -> &'static str {
        match self {
            PlaceError::InvalidSlot => "invalid_slot",
            PlaceError::ToppedOut => "topped_out",
            PlaceError::PieceUnavailable => "piece_unavailable",
            PlaceError::OutOfBounds | PlaceError::Collision => "invalid_place",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            PlaceError::InvalidSlot => "no player in that slot",
            PlaceError::ToppedOut => "player has topped out",
            PlaceError::PieceUnavailable => "piece is neither active, held, nor next",
            PlaceError::OutOfBounds => "placement leaves the board",
            PlaceError::Collision => "placement collides with the stack",
        }
    }
}

impl std::fmt::Display for PlaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

impl std::error::Error for PlaceError {}
