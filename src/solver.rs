//! Exact game tree search over the outcome lattice

use log::trace;

use std::sync::Arc;

use crate::bitboard::{square_bit, BitBoard};
use crate::interrupt::Interrupt;
use crate::opening_database::DATABASE_PIECES;
use crate::position_database::PositionDatabase;
use crate::position_value::{Outcome, PositionValue};
use crate::{HEIGHT, WIDTH};

const NUM_SQUARES: usize = WIDTH * HEIGHT;

const fn min(a: i32, b: i32) -> i32 {
    if a < b {
        a
    } else {
        b
    }
}

const fn max(a: i32, b: i32) -> i32 {
    if a > b {
        a
    } else {
        b
    }
}

/// Static move ordering: every square is weighted by how many lines pass
/// through it, so central squares are tried first
pub const fn initial_history() -> [i32; NUM_SQUARES] {
    let mut history = [0; NUM_SQUARES];
    let mut col = 0;
    while col < (WIDTH + 1) / 2 {
        let mut row = 0;
        while row < (HEIGHT + 1) / 2 {
            let (c, r) = (col as i32, row as i32);
            let weight = 4 + min(3, c) + max(-1, min(3, r) - max(0, 3 - c)) + min(3, min(c, r)) + min(3, r);
            history[HEIGHT * col + row] = weight;
            history[HEIGHT * (WIDTH - 1 - col) + HEIGHT - 1 - row] = weight;
            history[HEIGHT * col + HEIGHT - 1 - row] = weight;
            history[HEIGHT * (WIDTH - 1 - col) + row] = weight;
            row += 1;
        }
        col += 1;
    }
    history
}

struct MoveSorter {
    size: usize,
    // column and row of every candidate
    moves: [(usize, usize); WIDTH],
}

impl MoveSorter {
    pub fn new() -> Self {
        Self {
            size: 0,
            moves: [(0, 0); WIDTH],
        }
    }
    pub fn push(&mut self, column: usize, row: usize) {
        self.moves[self.size] = (column, row);
        self.size += 1;
    }
    pub fn len(&self) -> usize {
        self.size
    }
    /// Moves the candidate with the highest history score to position `from`.
    /// Scores change while the search runs, so the choice is made lazily.
    pub fn select(&mut self, from: usize, history: &[i32; NUM_SQUARES]) -> (usize, usize) {
        let score = |&(column, row): &(usize, usize)| history[HEIGHT * column + row];

        let mut best = from;
        for i in from + 1..self.size {
            if score(&self.moves[i]) > score(&self.moves[best]) {
                best = i;
            }
        }
        let chosen = self.moves[best];
        // keep the remaining candidates in their original order
        for i in (from..best).rev() {
            self.moves[i + 1] = self.moves[i];
        }
        self.moves[from] = chosen;
        chosen
    }
    pub fn square(&self, index: usize) -> usize {
        let (column, row) = self.moves[index];
        HEIGHT * column + row
    }
}

/// An agent that proves the exact outcome of Connect 4 positions
///
/// # Notes
/// Values are always from Red's point of view: Red maximises and Yellow
/// minimises, with the side to move following from the number of pieces on
/// the board. Proven values of positions with a multiple of three pieces are
/// shared with every other searcher through the [`PositionDatabase`].
///
/// A searcher keeps its history table between searches, so one searcher per
/// task gives deterministic results for a fixed database.
pub struct ExactSearcher {
    database: Arc<PositionDatabase>,
    interrupt: Interrupt,
    history: [[i32; NUM_SQUARES]; 2],
    book_resident: bool,

    /// The number of nodes searched by this `ExactSearcher` so far (for diagnostics only)
    pub node_count: usize,
}

impl ExactSearcher {
    pub fn new(database: Arc<PositionDatabase>, interrupt: Interrupt) -> Self {
        Self {
            book_resident: database.book_loaded(),
            database,
            interrupt,
            history: [initial_history(); 2],
            node_count: 0,
        }
    }

    /// Proves the value of a position with the full window
    pub fn solve(&mut self, board: &BitBoard) -> PositionValue {
        let value = self.alpha_beta(
            board.code(),
            board.red(),
            board.yellow(),
            Outcome::Loss,
            Outcome::Win,
        );
        trace!("{:?} after {} nodes", value, self.node_count);
        value
    }

    /// Performs game tree search inside the window `(alpha, beta)`
    ///
    /// Returns `Unknown` when interrupted, or when the position runs into an
    /// 8-piece position missing from a resident opening book.
    pub fn alpha_beta(
        &mut self,
        code: u64,
        red: u64,
        yellow: u64,
        mut alpha: Outcome,
        mut beta: Outcome,
    ) -> PositionValue {
        self.node_count += 1;
        if self.interrupt.is_stopped() {
            return PositionValue::unknown();
        }

        let piece_count = (red | yellow).count_ones() as usize;
        let red_to_move = piece_count % 2 == 0;
        let (own, other) = if red_to_move {
            (red, yellow)
        } else {
            (yellow, red)
        };
        let loss = Outcome::win_for(!red_to_move);

        // the previous move may have ended the game
        if BitBoard::is_winner(other) {
            return PositionValue::new(loss, 0);
        }

        // check for next-move win for current player
        for column in 0..WIDTH {
            if let Some(row) = BitBoard::playable_row_of(code, column) {
                if BitBoard::is_winner(own | square_bit(column, row)) {
                    return PositionValue::new(Outcome::win_for(red_to_move), 1);
                }
            }
        }

        if let Some(value) = self.database.get(code, piece_count) {
            let outcome = value.outcome();
            // a bound is only good enough when the window fails on it anyway
            let trusted = match outcome {
                Outcome::Unknown => false,
                Outcome::DrawWin => beta <= Outcome::Draw,
                Outcome::DrawLoss => alpha >= Outcome::Draw,
                _ => true,
            };
            if trusted {
                return PositionValue::new(outcome, value.depth() + 1);
            }
        }
        // the book holds every 8-piece position worth knowing
        if piece_count == DATABASE_PIECES && self.book_resident {
            return PositionValue::unknown();
        }

        if BitBoard::is_full(code) {
            return PositionValue::new(Outcome::Draw, 0);
        }

        // look for moves that don't give the opponent a next turn win
        let mut moves = MoveSorter::new();
        let mut forced = None;
        for column in 0..WIDTH {
            let row = match BitBoard::playable_row_of(code, column) {
                Some(row) => row,
                None => continue,
            };
            let square = square_bit(column, row);
            let win_on_top = BitBoard::is_winner(other | (square << 1));

            if BitBoard::is_winner(other | square) {
                // blocking here hands over the square above, or there is a second threat
                if win_on_top || forced.is_some() {
                    return PositionValue::new(loss, 0);
                }
                forced = Some((column, row));
            } else if !win_on_top {
                moves.push(column, row);
            }
        }
        if let Some((column, row)) = forced {
            moves = MoveSorter::new();
            moves.push(column, row);
        }
        if moves.len() == 0 {
            return PositionValue::new(loss, 0);
        }

        let side = red_to_move as usize;
        let mut best_score = loss;
        let mut best_depth = 0;
        let mut value_unknown = false;

        for index in 0..moves.len() {
            if self.interrupt.is_stopped() {
                return PositionValue::unknown();
            }
            let (column, row) = moves.select(index, &self.history[side]);
            let square = square_bit(column, row);
            let (next_red, next_yellow) = if red_to_move {
                (red | square, yellow)
            } else {
                (red, yellow | square)
            };
            let child = self.alpha_beta(
                BitBoard::play_code_at(code, column, row, red_to_move),
                next_red,
                next_yellow,
                alpha,
                beta,
            );
            if self.interrupt.is_stopped() {
                return PositionValue::unknown();
            }

            let mut value = child.outcome();
            if value == Outcome::Unknown {
                value_unknown = true;
                continue;
            }

            let improves = if red_to_move {
                value > best_score
            } else {
                value < best_score
            };
            if improves {
                best_score = value;
                best_depth = child.depth();
                if red_to_move && value > alpha {
                    alpha = value;
                } else if !red_to_move && value < beta {
                    beta = value;
                }
            } else if value == best_score && child.depth() > best_depth {
                best_depth = child.depth();
            }

            if beta <= alpha {
                if index != 0 {
                    // punish the moves tried first and reward the one that cut off
                    for tried in 0..index {
                        self.history[side][moves.square(tried)] -= 1;
                    }
                    self.history[side][moves.square(index)] += index as i32;
                }

                // the unexplored siblings could still improve on a draw
                if value == Outcome::Draw && index + 1 < moves.len() {
                    value = if red_to_move {
                        Outcome::DrawWin
                    } else {
                        Outcome::DrawLoss
                    };
                }

                let result = PositionValue::new(value, 1 + best_depth);
                // a bound facing away from the mover says nothing about this node
                let wrong_way = if red_to_move {
                    value == Outcome::DrawLoss
                } else {
                    value == Outcome::DrawWin
                };
                if wrong_way {
                    return result;
                }
                return self.store(code, piece_count, result);
            }
        }

        if value_unknown {
            return PositionValue::unknown();
        }
        self.store(code, piece_count, PositionValue::new(best_score, 1 + best_depth))
    }

    fn store(&self, code: u64, piece_count: usize, value: PositionValue) -> PositionValue {
        if PositionDatabase::should_store(piece_count, value.depth() - 1) {
            self.database.insert(code, piece_count, value);
        }
        value
    }
}
