//! An engine that plays the board game 'Connect 4' as well as it can prove
//!
//! Moves are chosen with Allis' strategic rules where they apply: the engine
//! looks for a set of compatible patterns (claimevens, baseinverses, verticals
//! and their relatives) that keeps the opponent from ever completing a line.
//! Where the rules can't separate the candidates, an exact game tree search
//! backed by a shared database of solved positions decides.
//!
//! # Basic Usage
//!
//! ```
//! use connect4_engine::{bitboard::BitBoard, board::Board};
//!
//!# use std::error::Error;
//!# fn main() -> Result<(), Box<dyn Error>> {
//! // red has three in a row along the bottom
//! let board = Board::from_moves("112233")?;
//! let bitboard = BitBoard::from_board(&board);
//!
//! assert!(bitboard.red_to_move());
//! assert!(BitBoard::is_winner(BitBoard::new(bitboard.play(3)).red()));
//!# Ok(())
//!# }
//! ```

use static_assertions::*;
pub use anyhow;

pub mod board;

pub mod bitboard;

pub mod position_value;

pub mod position_database;

pub mod opening_database;

pub mod interrupt;

pub mod solver;

pub mod threat;

pub mod solution;

pub mod board_ext;

mod patterns;

pub mod move_simulator;

pub mod perfect_player;

pub mod players;

mod test;

/// The width of the game board in tiles
pub const WIDTH: usize = 7;

/// The height of the game board in tiles
pub const HEIGHT: usize = 6;

// ensure that the given dimensions fit in a u64 for the bitboard representation
const_assert!(WIDTH * (HEIGHT + 1) < 64);
// column and row sets are kept in a u8
const_assert!(WIDTH <= 8 && HEIGHT <= 8);
