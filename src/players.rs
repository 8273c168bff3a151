use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use crate::bitboard::{square_bit, BitBoard};
use crate::board::{Board, Color};
use crate::interrupt::Interrupt;
use crate::perfect_player::PerfectPlayer;
use crate::WIDTH;

/// Anything that can pick a column for one side of a game
pub trait Player {
    fn color(&self) -> Color;

    /// Returns the chosen column, or `None` if interrupted or no move is left
    fn choose_move(&mut self, board: &Board, interrupt: &Interrupt) -> Option<usize>;
}

impl Player for PerfectPlayer {
    fn color(&self) -> Color {
        PerfectPlayer::color(self)
    }

    fn choose_move(&mut self, board: &Board, interrupt: &Interrupt) -> Option<usize> {
        self.decide(board, interrupt).map(|decision| decision.column)
    }
}

/// Takes a win when it sees one and blocks the opponent's, otherwise plays at
/// random
pub struct RandomPlayer {
    color: Color,
    rng: StdRng,
}

impl RandomPlayer {
    pub fn new(color: Color) -> Self {
        Self::with_seed(color, rand::random())
    }

    pub fn with_seed(color: Color, seed: u64) -> Self {
        Self {
            color,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Player for RandomPlayer {
    fn color(&self) -> Color {
        self.color
    }

    fn choose_move(&mut self, board: &Board, interrupt: &Interrupt) -> Option<usize> {
        if interrupt.is_stopped() {
            return None;
        }
        let bitboard = BitBoard::from_board(board);
        let own = bitboard.color_mask(self.color);
        let other = bitboard.color_mask(self.color.other());

        let moves: Vec<(usize, u64)> = (0..WIDTH)
            .filter_map(|col| bitboard.playable_row(col).map(|row| (col, square_bit(col, row))))
            .collect();

        if let Some(&(col, _)) = moves.iter().find(|(_, square)| BitBoard::is_winner(own | square)) {
            return Some(col);
        }

        let forced: Vec<usize> = moves
            .iter()
            .filter(|(_, square)| BitBoard::is_winner(other | square))
            .map(|&(col, _)| col)
            .collect();
        if !forced.is_empty() {
            return forced.choose(&mut self.rng).copied();
        }

        let all: Vec<usize> = moves.iter().map(|&(col, _)| col).collect();
        all.choose(&mut self.rng).copied()
    }
}

/// Thinks about a move with a fixed chance and plays like a [`RandomPlayer`]
/// otherwise
pub struct ChancePlayer {
    perfect: PerfectPlayer,
    random: RandomPlayer,
    numerator: u32,
    denominator: u32,
    rng: StdRng,
}

impl ChancePlayer {
    /// Thinks `numerator` out of `denominator` times
    pub fn new(perfect: PerfectPlayer, numerator: u32, denominator: u32) -> Result<Self> {
        if denominator == 0 || numerator > denominator {
            return Err(anyhow!(
                "invalid chance {}/{}, expected a fraction between 0 and 1",
                numerator,
                denominator
            ));
        }
        let color = perfect.color();
        Ok(Self {
            perfect,
            random: RandomPlayer::new(color),
            numerator,
            denominator,
            rng: StdRng::seed_from_u64(rand::random()),
        })
    }
}

impl Player for ChancePlayer {
    fn color(&self) -> Color {
        self.perfect.color()
    }

    fn choose_move(&mut self, board: &Board, interrupt: &Interrupt) -> Option<usize> {
        if self.rng.random_range(0..self.denominator) < self.numerator {
            self.perfect.choose_move(board, interrupt)
        } else {
            self.random.choose_move(board, interrupt)
        }
    }
}
