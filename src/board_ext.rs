//! A board annotated with the open lines of both sides and the patterns that
//! keep the opponent from completing any of them

use log::trace;

use std::collections::VecDeque;

use crate::board::{Board, Cell, Color};
use crate::solution::ThreatSolution;
use crate::threat::{Direction, LineThreat, Square, SquareIndex};
use crate::{HEIGHT, WIDTH};

/// A Red line that can only be completed on an odd row, which Red gets in
/// zugzwang play. The second square is set when two level 2 lines cross.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OddThreat {
    pub first: Square,
    pub second: Option<Square>,
}

impl OddThreat {
    pub fn uses_column(&self, col: usize) -> bool {
        self.first.col == col || self.second.map_or(false, |square| square.col == col)
    }
}

/// The analysis of a position from one side's point of view.
///
/// `threats` are the lines the opponent can still complete and
/// `winning_threats` the lines of the own side. Solutions live in an arena;
/// `solution_order` is the order they are tried in, winners first.
#[derive(Clone, Debug)]
pub struct BoardExt {
    pub(crate) board: Board,
    pub(crate) color: Color,
    pub(crate) playable: [Option<usize>; WIDTH],
    pub(crate) threats: Vec<LineThreat>,
    pub(crate) threat_index: SquareIndex,
    pub(crate) winning_threats: Vec<LineThreat>,
    pub(crate) winning_index: SquareIndex,
    pub(crate) solutions: Vec<ThreatSolution>,
    pub(crate) solution_order: VecDeque<usize>,
    pub(crate) odd_threat: Option<OddThreat>,
}

impl BoardExt {
    /// Analyses `board` for `color`: playable squares and the open lines of
    /// both sides. Solutions are only generated by [`BoardExt::search_solutions`].
    pub fn new(board: Board, color: Color) -> Self {
        let mut ext = Self {
            board,
            color,
            playable: [None; WIDTH],
            threats: Vec::new(),
            threat_index: SquareIndex::default(),
            winning_threats: Vec::new(),
            winning_index: SquareIndex::default(),
            solutions: Vec::new(),
            solution_order: VecDeque::new(),
            odd_threat: None,
        };
        ext.find_playable_cols();
        ext.search_for_winning_threats();
        ext.search_for_threats();
        ext
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn find_playable_cols(&mut self) {
        for col in 0..WIDTH {
            self.playable[col] = self.board.playable_row(col);
        }
    }

    pub fn playable_row(&self, col: usize) -> Option<usize> {
        self.playable[col]
    }

    pub fn piece_count(&self) -> usize {
        self.playable.iter().map(|row| row.unwrap_or(HEIGHT)).sum()
    }

    /// A copy of the board with a piece dropped into `col`. A full column
    /// leaves the copy unchanged.
    pub fn do_move(&self, col: usize, color: Color) -> Board {
        let mut board = self.board;
        if let Some(row) = self.playable[col] {
            board.set(col, row, color.into());
        }
        board
    }

    pub(crate) fn is_empty(&self, col: usize, row: usize) -> bool {
        self.board.get(col, row).is_empty()
    }

    /// Every line of four that `attacker` can still complete, with the number
    /// of attacking pieces already on it
    fn scan_lines(board: &Board, attacker: Color) -> (Vec<LineThreat>, SquareIndex) {
        let own = Cell::from(attacker);
        let blocker = Cell::from(attacker.other());
        let mut lines = Vec::new();
        let mut index = SquareIndex::default();

        for col in 0..WIDTH {
            for row in 0..HEIGHT {
                if board.get(col, row) == blocker {
                    continue;
                }
                let start = Square::new(col, row);
                for &direction in Direction::ALL.iter() {
                    let (dc, dr) = direction.delta();
                    if start.offset(3 * dc, 3 * dr).is_none() {
                        continue;
                    }
                    let squares = LineThreat::new(start, direction, 0).squares();
                    if squares.iter().any(|s| board.get(s.col, s.row) == blocker) {
                        continue;
                    }
                    let level = squares
                        .iter()
                        .filter(|s| board.get(s.col, s.row) == own)
                        .count();

                    let id = lines.len();
                    for &square in squares.iter() {
                        index.push(square, id);
                    }
                    lines.push(LineThreat::new(start, direction, level as u8));
                }
            }
        }
        (lines, index)
    }

    pub fn search_for_threats(&mut self) {
        let (threats, index) = Self::scan_lines(&self.board, self.color.other());
        self.threats = threats;
        self.threat_index = index;
    }

    pub fn search_for_winning_threats(&mut self) {
        let (threats, index) = Self::scan_lines(&self.board, self.color);
        self.winning_threats = threats;
        self.winning_index = index;
    }

    pub fn threats(&self) -> &[LineThreat] {
        &self.threats
    }

    pub fn winning_threats(&self) -> &[LineThreat] {
        &self.winning_threats
    }

    /// Whether the opponent completes a line by taking this square
    pub fn has_level3_threat(&self, col: usize, row: usize) -> bool {
        self.threat_index
            .at(col, row)
            .iter()
            .any(|&i| self.threats[i].level() == 3)
    }

    /// Whether the own side completes a line by taking this square
    pub fn has_level3_winning_threat(&self, col: usize, row: usize) -> bool {
        self.winning_index
            .at(col, row)
            .iter()
            .any(|&i| self.winning_threats[i].level() == 3)
    }

    pub fn odd_threat(&self) -> Option<OddThreat> {
        self.odd_threat
    }

    pub(crate) fn excluded(&self, col: usize) -> bool {
        self.odd_threat.map_or(false, |odd| odd.uses_column(col))
    }

    /// Looks for an odd threat of Red. Yellow never has one.
    pub fn has_odd_threat(&mut self) -> bool {
        self.odd_threat = if self.color.is_red() {
            self.find_odd_threat()
        } else {
            None
        };
        self.odd_threat.is_some()
    }

    fn find_odd_threat(&self) -> Option<OddThreat> {
        for threat in self.winning_threats.iter() {
            let mut empty = threat
                .squares()
                .iter()
                .copied()
                .filter(|s| self.is_empty(s.col, s.row))
                .collect::<Vec<_>>()
                .into_iter();

            match threat.level() {
                3 => {
                    if let Some(square) = empty.next() {
                        if self.playable[square.col] != Some(square.row) && square.row % 2 == 0 {
                            return Some(OddThreat {
                                first: square,
                                second: None,
                            });
                        }
                    }
                }
                2 => {
                    let (a, b) = match (empty.next(), empty.next()) {
                        (Some(a), Some(b)) => (a, b),
                        _ => continue,
                    };
                    if a.row % 2 != 0 || b.row % 2 != 0 {
                        continue;
                    }
                    let crossing = self
                        .crossing_threat(a, b)
                        .or_else(|| self.crossing_threat(b, a));
                    if crossing.is_some() {
                        return crossing;
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Two level 2 lines sharing the empty square `pivot`, whose other empty
    /// squares are stacked on top of each other in one column
    fn crossing_threat(&self, pivot: Square, other: Square) -> Option<OddThreat> {
        if self.playable[pivot.col] == Some(pivot.row) {
            return None;
        }
        for &index in self.winning_index.at(pivot.col, pivot.row) {
            let threat = &self.winning_threats[index];
            if threat.level() != 2 {
                continue;
            }
            let next = threat
                .squares()
                .iter()
                .copied()
                .find(|&s| s != pivot && self.is_empty(s.col, s.row));
            if let Some(square) = next {
                if square.col == other.col && square.row.abs_diff(other.row) == 1 {
                    return Some(OddThreat {
                        first: pivot,
                        second: Some(Square::new(other.col, other.row.min(square.row))),
                    });
                }
            }
        }
        None
    }

    /// Marks the opponent lines that the odd threat keeps out of reach
    pub fn solve_by_odd_threats(&mut self) {
        let odd = match self.odd_threat {
            Some(odd) => odd,
            None => return,
        };
        let first = odd.first;
        let mut solved = Vec::new();
        let mut candidates = Vec::new();

        if let Some(playable) = self.playable[first.col] {
            for row in playable + 1 - playable % 2..HEIGHT {
                if row % 2 == 0 {
                    solved.extend_from_slice(self.threat_index.at(first.col, row));
                } else if row > first.row {
                    candidates.extend_from_slice(self.threat_index.at(first.col, row));
                }
            }
        }

        match odd.second {
            None => solved.extend(candidates),
            Some(second) => {
                solved.extend(candidates.into_iter().filter(|&i| {
                    (second.row + 1..HEIGHT).any(|row| self.threats[i].covers(second.col, row))
                }));

                if second.row == first.row {
                    // yellow can't have both the square above the crossing and the odd square beside it
                    solved.extend(
                        self.threat_index
                            .at(first.col, first.row + 1)
                            .iter()
                            .copied()
                            .filter(|&i| self.threats[i].covers(second.col, second.row - 1)),
                    );
                    if self.playable[second.col] == Some(second.row - 1) {
                        for row in first.row + 2..HEIGHT {
                            solved.extend_from_slice(self.threat_index.at(first.col, row));
                        }
                    }
                }

                // a baseinverse on the bottom of both columns
                if let (Some(p1), Some(p2)) = (self.playable[first.col], self.playable[second.col]) {
                    if p2 < second.row && p1 % 2 == 0 {
                        solved.extend(
                            self.threat_index
                                .at(first.col, p1)
                                .iter()
                                .copied()
                                .filter(|&i| self.threats[i].covers(second.col, p2)),
                        );
                    }
                }
            }
        }

        for index in solved {
            self.threats[index].solved = true;
        }
    }

    /// Generates every solution the board allows and links the ones that
    /// can't be played together
    pub fn search_solutions(&mut self) {
        for threat in self.threats.iter_mut() {
            threat.solutions.clear();
        }
        self.solutions.clear();
        self.solution_order.clear();

        self.find_claim_evens();
        self.find_base_inverses();
        self.find_verticals();
        self.find_low_inverses();
        self.find_high_inverses();
        self.find_base_claims();
        self.find_befores();
        self.find_special_befores();
        self.find_after_evens();
        // these solve everything, so they go last and end up tried first
        self.find_after_base_inverses();
        self.find_after_verticals();

        self.connect_conflicts();
        trace!(
            "{} threats, {} solutions",
            self.threats.len(),
            self.solutions.len()
        );
    }

    /// Adds a solution to the arena. Solutions that solve nothing are dropped.
    pub(crate) fn register(&mut self, solution: ThreatSolution) {
        if solution.solved().is_empty() {
            return;
        }
        debug_assert!(!solution.squares().is_empty());

        let index = self.solutions.len();
        let wins = solution.wins();
        for &threat in solution.solved() {
            let list = &mut self.threats[threat].solutions;
            if wins {
                list.push_front(index);
            } else {
                list.push_back(index);
            }
        }
        if wins {
            self.solution_order.push_front(index);
        } else {
            self.solution_order.push_back(index);
        }
        self.solutions.push(solution);
    }

    fn connect_conflicts(&mut self) {
        let count = self.solutions.len();
        for a in 0..count {
            for b in a + 1..count {
                if !self.solutions[a].can_combine(&self.solutions[b]) {
                    self.solutions[a].conflicts.push(b);
                    self.solutions[b].conflicts.push(a);
                }
            }
        }
    }

    pub fn solutions(&self) -> &[ThreatSolution] {
        &self.solutions
    }

    pub fn solution_order(&self) -> impl Iterator<Item = usize> + '_ {
        self.solution_order.iter().copied()
    }
}
