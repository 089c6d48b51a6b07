//! Core game logic module - pure, deterministic, and testable
//!
//! This crate is the game engine the bot bridge drives. It has **zero
//! dependencies** on networking or I/O:
//!
//! - **Deterministic**: the same seed produces identical piece sequences
//! - **Placement driven**: pieces enter the board through
//!   [`Player::apply_placement`], the operation agents use to play
//! - **Transactional**: a rejected placement leaves the player untouched
//!
//! # Module Structure
//!
//! - [`board`]: 10x40 board (20 visible rows under a 20 row buffer), line clearing
//! - [`pieces`]: tetromino shapes relative to their rotation centre
//! - [`rng`]: seeded 7-bag randomizer
//! - [`player`]: one player's board, active piece, hold, queue and lock bookkeeping
//! - [`versus`]: a two-player match
//!
//! # Game Rules
//!
//! - **7-Bag Randomizer**: every run of seven pieces contains each kind once
//! - **Hold**: a placement may name the held piece (swap) or, with hold empty,
//!   the next piece (the active piece goes to hold)
//! - **Combo**: consecutive line-clearing locks; reset by a lock that clears nothing
//! - **Back-to-back**: set by a four-line clear, cleared by a smaller clear
//! - **Top-out**: a blocked spawn, or a lock entirely inside the buffer
//!
//! # Example
//!
//! ```
//! use tetris_versus_core::types::{PlacementRequest, PlayerSlot, Rotation};
//! use tetris_versus_core::Versus;
//!
//! let mut game = Versus::new(12345);
//! let kind = game.player(PlayerSlot::BOT).unwrap().active().kind;
//!
//! let outcome = game
//!     .apply_placement(
//!         PlayerSlot::BOT,
//!         PlacementRequest { kind, rotation: Rotation::North, column: 4, row: None },
//!     )
//!     .unwrap();
//! assert_eq!(outcome.lines_cleared, 0);
//! assert!(!outcome.topped_out);
//! ```

pub mod board;
pub mod pieces;
pub mod player;
pub mod rng;
pub mod versus;

pub use tetris_versus_types as types;

// Re-export commonly used types for convenience
pub use board::Board;
pub use pieces::{cells_at, get_shape};
pub use player::{ActivePiece, Player};
pub use rng::{SevenBag, SimpleRng};
pub use versus::Versus;
