//! Judges a move without searching the game tree, by looking for a set of
//! compatible solutions that refutes every line the opponent has left

use log::trace;

use crate::board::{Board, Color};
use crate::board_ext::BoardExt;
use crate::interrupt::Interrupt;
use crate::opening_database::DATABASE_PIECES;
use crate::{HEIGHT, WIDTH};

/// How good a candidate move looks, worst first
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MoveSmartness {
    /// not judged, or the judgement was interrupted
    Unknown,
    /// the column is full
    Impossible,
    /// the opponent wins on the square above
    DirectLose,
    NotAllSolved,
    NeedsTreeSearch,
    AllSolved,
    AllSolvedWin,
}

#[derive(Clone, Debug)]
struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    fn new(size: usize) -> Self {
        Self {
            words: vec![0; (size + 63) / 64],
        }
    }

    fn insert(&mut self, index: usize) {
        self.words[index / 64] |= 1 << (index % 64);
    }

    fn contains(&self, index: usize) -> bool {
        self.words[index / 64] & (1 << (index % 64)) != 0
    }
}

/// The threats solved and the solutions ruled out along one branch
#[derive(Clone, Debug)]
struct SearchState {
    solved: BitSet,
    excluded: BitSet,
}

/// Judges the position after a move of `color`, with the opponent to move
pub struct MoveSimulator {
    board: BoardExt,
    least: MoveSmartness,
    interrupt: Interrupt,
}

impl MoveSimulator {
    /// `least` is the verdict that is good enough to stop looking for a
    /// better one
    pub fn new(board: Board, color: Color, least: MoveSmartness, interrupt: Interrupt) -> Self {
        Self {
            board: BoardExt::new(board, color),
            least,
            interrupt,
        }
    }

    pub fn simulate(&mut self) -> MoveSmartness {
        if self.interrupt.is_stopped() {
            return MoveSmartness::Unknown;
        }

        // red can only rely on the rules when it has an odd threat
        let red = self.board.color().is_red();
        if red && !self.board.has_odd_threat() {
            return self.try_yellow_replies();
        }
        if red {
            self.board.solve_by_odd_threats();
        }

        self.board.search_solutions();
        if self.interrupt.is_stopped() {
            return MoveSmartness::Unknown;
        }

        let state = SearchState {
            solved: BitSet::new(self.board.threats().len()),
            excluded: BitSet::new(self.board.solutions().len()),
        };
        let result = self.find_solution_set(&state);
        trace!("{:?} with {} solutions", result, self.board.solutions().len());
        if self.interrupt.is_stopped() {
            return MoveSmartness::Unknown;
        }
        result
    }

    /// Red without an odd threat: the move is bad if some yellow reply lets
    /// yellow refute everything red has left
    fn try_yellow_replies(&self) -> MoveSmartness {
        if self.board.piece_count() <= DATABASE_PIECES {
            return MoveSmartness::NeedsTreeSearch;
        }

        let red_wins: Vec<usize> = (0..WIDTH)
            .filter(|&col| {
                self.board
                    .playable_row(col)
                    .map_or(false, |row| self.board.has_level3_winning_threat(col, row))
            })
            .collect();

        for col in 0..WIDTH {
            if self.interrupt.is_stopped() {
                return MoveSmartness::Unknown;
            }
            let row = match self.board.playable_row(col) {
                Some(row) => row,
                None => continue,
            };
            if self.board.has_level3_threat(col, row) {
                return MoveSmartness::NotAllSolved;
            }

            // a reply that leaves red a win proves nothing
            let red_on_top = row + 1 < HEIGHT && self.board.has_level3_winning_threat(col, row + 1);
            if red_on_top || red_wins.iter().any(|&c| c != col) {
                continue;
            }

            let mut yellow = MoveSimulator::new(
                self.board.do_move(col, Color::Yellow),
                Color::Yellow,
                MoveSmartness::AllSolved,
                self.interrupt.clone(),
            );
            match yellow.simulate() {
                MoveSmartness::Unknown => return MoveSmartness::Unknown,
                result if result >= MoveSmartness::AllSolved => return MoveSmartness::NotAllSolved,
                _ => {}
            }
        }
        MoveSmartness::NeedsTreeSearch
    }

    /// The unsolved threat with the fewest usable solutions, first one on ties
    fn hardest_threat(&self, state: &SearchState) -> Option<(usize, usize)> {
        let mut hardest: Option<(usize, usize)> = None;
        for (index, threat) in self.board.threats().iter().enumerate() {
            if threat.solved || state.solved.contains(index) {
                continue;
            }
            let usable = threat
                .solutions
                .iter()
                .filter(|&&solution| !state.excluded.contains(solution))
                .count();
            if hardest.map_or(true, |(_, fewest)| usable < fewest) {
                hardest = Some((index, usable));
                if usable == 0 {
                    break;
                }
            }
        }
        hardest
    }

    fn find_solution_set(&self, state: &SearchState) -> MoveSmartness {
        if self.interrupt.is_stopped() {
            return MoveSmartness::Unknown;
        }

        let (threat, usable) = match self.hardest_threat(state) {
            Some(hardest) => hardest,
            None => {
                let solutions = self.board.solutions();
                let wins = self
                    .board
                    .solution_order()
                    .any(|s| solutions[s].wins() && !state.excluded.contains(s));
                return if wins {
                    MoveSmartness::AllSolvedWin
                } else {
                    MoveSmartness::AllSolved
                };
            }
        };
        if usable == 0 {
            return MoveSmartness::NotAllSolved;
        }

        let mut best = MoveSmartness::NotAllSolved;
        for &index in self.board.threats()[threat].solutions.iter() {
            if state.excluded.contains(index) {
                continue;
            }
            let solution = &self.board.solutions()[index];

            let mut next = state.clone();
            next.solved.insert(threat);
            for &solved in solution.solved() {
                next.solved.insert(solved);
            }
            for &conflict in solution.conflicts.iter() {
                next.excluded.insert(conflict);
            }

            let result = self.find_solution_set(&next);
            if result == MoveSmartness::Unknown {
                return MoveSmartness::Unknown;
            }
            if result > best {
                best = result;
                if best >= self.least {
                    break;
                }
            }
        }
        best
    }
}
