//! tetris-versus (workspace facade crate).
//!
//! Re-exports the workspace crates under one roof: `types` for shared
//! definitions, `core` for the versus engine, and `bridge` for driving a
//! player slot from an external bot.

pub use tetris_versus_bridge as bridge;
pub use tetris_versus_core as core;
pub use tetris_versus_types as types;
