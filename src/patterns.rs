//! Generators for every kind of [`ThreatSolution`], following the rules Allis
//! gives for the controlling side of a zugzwang.
//!
//! Columns taken by an odd threat are left alone, except by the patterns that
//! win the game on the next move anyway.

use crate::board_ext::BoardExt;
use crate::solution::{BeforeColumns, SolutionKind, ThreatSolution};
use crate::threat::{Direction, LineThreat, Square};
use crate::{HEIGHT, WIDTH};

/// Lower rows of the stacked pairs an inverse can use above `playable`
fn inverse_rows(playable: usize) -> impl Iterator<Item = usize> {
    (playable + 1 - playable % 2..HEIGHT - 1).step_by(2)
}

/// What a Before-like pattern can do with one empty square of its line
struct BeforeSquare {
    square: Square,
    claim_even: Option<Vec<usize>>,
    vertical: Vec<usize>,
}

impl BoardExt {
    /// Opponent lines through both squares
    fn threats_covering(&self, a: Square, b: Square) -> Vec<usize> {
        self.threat_index
            .at(a.col, a.row)
            .iter()
            .copied()
            .filter(|&i| self.threats[i].covers(b.col, b.row))
            .collect()
    }

    /// Vertical opponent lines that pass through `square` without starting on it
    fn verticals_through(&self, square: Square) -> Vec<usize> {
        self.threat_index
            .at(square.col, square.row)
            .iter()
            .copied()
            .filter(|&i| {
                let threat = &self.threats[i];
                threat.direction() == Direction::Vertical && threat.start().row != square.row
            })
            .collect()
    }

    /// Opponent lines through `col` from `row` upwards that also pass through
    /// `col2` from `row2` upwards
    fn threats_above_both(&self, col: usize, row: usize, col2: usize, row2: usize) -> Vec<usize> {
        (row..HEIGHT)
            .flat_map(|r| self.threat_index.at(col, r).iter().copied())
            .filter(|&i| (row2..HEIGHT).any(|r| self.threats[i].covers(col2, r)))
            .collect()
    }

    fn threats_in_column_from(&self, col: usize, row: usize) -> Vec<usize> {
        (row..HEIGHT)
            .flat_map(|r| self.threat_index.at(col, r).iter().copied())
            .collect()
    }

    /// Playable columns an inverse may use
    fn inverse_columns(&self) -> Vec<(usize, usize)> {
        (0..WIDTH)
            .filter(|&col| !self.excluded(col))
            .filter_map(|col| self.playable[col].map(|row| (col, row)))
            .filter(|&(_, row)| row < 4)
            .collect()
    }

    pub(crate) fn find_claim_evens(&mut self) {
        for col in 0..WIDTH {
            if self.excluded(col) {
                continue;
            }
            for row in (1..HEIGHT).rev().step_by(2) {
                if !self.is_empty(col, row) || !self.is_empty(col, row - 1) {
                    break;
                }
                let mut solution = ThreatSolution::new(SolutionKind::ClaimEven);
                solution.add_square(Square::new(col, row));
                solution.add_square(Square::new(col, row - 1));
                solution.add_all_solved(self.threat_index.at(col, row).iter().copied());
                self.register(solution);
            }
        }
    }

    pub(crate) fn find_base_inverses(&mut self) {
        for col in 0..WIDTH {
            let row = match self.playable[col] {
                Some(row) if !self.excluded(col) => row,
                _ => continue,
            };
            for col2 in col + 1..WIDTH.min(col + 4) {
                let row2 = match self.playable[col2] {
                    Some(row2) if !self.excluded(col2) => row2,
                    _ => continue,
                };
                // both squares must fit in one line
                if row != row2 && col2 - col != row.abs_diff(row2) {
                    continue;
                }
                let (a, b) = (Square::new(col, row), Square::new(col2, row2));
                let mut solution = ThreatSolution::new(SolutionKind::BaseInverse);
                solution.add_square(a);
                solution.add_square(b);
                solution.add_all_solved(self.threats_covering(a, b));
                self.register(solution);
            }
        }
    }

    pub(crate) fn find_verticals(&mut self) {
        for col in 0..WIDTH {
            if self.excluded(col) {
                continue;
            }
            for row in (1..HEIGHT - 1).rev().step_by(2) {
                if !self.is_empty(col, row) || !self.is_empty(col, row - 1) {
                    break;
                }
                let mut solution = ThreatSolution::new(SolutionKind::Vertical);
                solution.add_square(Square::new(col, row));
                solution.add_square(Square::new(col, row - 1));

                // we get one of the two squares, and with it the game
                if self.has_level3_winning_threat(col, row)
                    && self.has_level3_winning_threat(col, row - 1)
                {
                    solution.make_game_winner();
                    solution.add_all_solved(self.threats_in_column_from(col, row + 1));
                }
                solution.add_all_solved(self.verticals_through(Square::new(col, row - 1)));
                self.register(solution);
            }
        }
    }

    pub(crate) fn find_after_evens(&mut self) {
        for index in 0..self.winning_threats.len() {
            let squares = self.winning_threats[index].squares();
            let empty: Vec<Square> = squares
                .iter()
                .copied()
                .filter(|s| self.is_empty(s.col, s.row))
                .collect();
            let usable = !empty.is_empty()
                && empty.iter().all(|s| {
                    s.row % 2 == 1 && !self.excluded(s.col) && self.is_empty(s.col, s.row - 1)
                });
            if !usable {
                continue;
            }

            // lines above every claimeven of the group can't be completed either
            let mut above = self.threats_in_column_from(empty[0].col, empty[0].row + 1);
            for square in empty[1..].iter() {
                above.retain(|&i| {
                    (square.row + 1..HEIGHT).any(|row| self.threats[i].covers(square.col, row))
                });
            }

            let mut solution = ThreatSolution::new(SolutionKind::AfterEven);
            for square in empty.iter() {
                solution.add_all_solved(self.threat_index.at(square.col, square.row).iter().copied());
                solution.add_square(*square);
                solution.add_square(Square::new(square.col, square.row - 1));
            }
            solution.add_all_solved(above);
            self.register(solution);
        }
    }

    pub(crate) fn find_low_inverses(&mut self) {
        let columns = self.inverse_columns();
        for (i, &(col, playable)) in columns.iter().enumerate() {
            for &(col2, playable2) in columns[i + 1..].iter() {
                for row in inverse_rows(playable) {
                    for row2 in inverse_rows(playable2) {
                        let mut solution = ThreatSolution::new(SolutionKind::LowInverse);
                        solution.add_square(Square::new(col, row));
                        solution.add_square(Square::new(col, row + 1));
                        solution.add_square(Square::new(col2, row2));
                        solution.add_square(Square::new(col2, row2 + 1));

                        if self.has_level3_winning_threat(col, row + 1)
                            && self.has_level3_winning_threat(col2, row2 + 1)
                        {
                            solution.make_game_winner();
                            solution.add_all_solved(self.threats_above_both(col, row + 2, col2, row2 + 2));
                        }
                        solution.add_all_solved(self.verticals_through(Square::new(col, row)));
                        solution.add_all_solved(self.verticals_through(Square::new(col2, row2)));
                        solution.add_all_solved(
                            self.threats_covering(Square::new(col, row + 1), Square::new(col2, row2 + 1)),
                        );
                        self.register(solution);
                    }
                }
            }
        }
    }

    pub(crate) fn find_high_inverses(&mut self) {
        let columns = self.inverse_columns();
        for (i, &(col, playable)) in columns.iter().enumerate() {
            for &(col2, playable2) in columns[i + 1..].iter() {
                for row in inverse_rows(playable) {
                    for row2 in inverse_rows(playable2) {
                        let mut solution = ThreatSolution::new(SolutionKind::HighInverse);
                        for r in row..row + 3 {
                            solution.add_square(Square::new(col, r));
                        }
                        for r in row2..row2 + 3 {
                            solution.add_square(Square::new(col2, r));
                        }

                        let w3 = |c, r| self.has_level3_winning_threat(c, r);
                        let above = if w3(col, row + 1) && w3(col2, row2 + 1) {
                            Some((row + 2, row2 + 2))
                        } else if playable == row && w3(col, row) && w3(col2, row2 + 2) {
                            Some((row + 1, row2 + 3))
                        } else if playable2 == row2 && w3(col, row + 2) && w3(col2, row2) {
                            Some((row + 3, row2 + 1))
                        } else if w3(col, row + 2) && w3(col2, row2 + 2) {
                            Some((row + 3, row2 + 3))
                        } else {
                            None
                        };
                        if let Some((from, from2)) = above {
                            solution.make_game_winner();
                            solution.add_all_solved(self.threats_above_both(col, from, col2, from2));
                        }

                        let middle = (Square::new(col, row + 1), Square::new(col2, row2 + 1));
                        let upper = (Square::new(col, row + 2), Square::new(col2, row2 + 2));
                        solution.add_all_solved(self.verticals_through(middle.0));
                        solution.add_all_solved(self.verticals_through(middle.1));
                        solution.add_all_solved(self.threats_covering(middle.0, middle.1));
                        solution.add_all_solved(self.threats_covering(upper.0, upper.1));
                        if playable == row {
                            solution.add_all_solved(self.threats_covering(Square::new(col, row), upper.1));
                        }
                        if playable2 == row2 {
                            solution.add_all_solved(self.threats_covering(Square::new(col2, row2), upper.0));
                        }
                        self.register(solution);
                    }
                }
            }
        }
    }

    /// A claimeven above the playable square of `claim` combined with two
    /// baseinverses: `pair` with the upper claim square and `other` with the
    /// lower one
    fn base_claim(&self, claim: Square, pair: Square, other: Square) -> ThreatSolution {
        let upper = Square::new(claim.col, claim.row + 1);
        let mut solution = ThreatSolution::new(SolutionKind::BaseClaim);
        for &square in [claim, upper, pair, other].iter() {
            solution.add_square(square);
        }

        if self.has_level3_winning_threat(pair.col, pair.row)
            && self.has_level3_winning_threat(upper.col, upper.row)
        {
            solution.make_game_winner();
            solution.add_all_solved(self.threats_above_both(claim.col, claim.row + 2, pair.col, pair.row + 1));
        }
        solution.add_all_solved(self.threats_covering(pair, upper));
        solution.add_all_solved(self.threats_covering(claim, other));
        solution
    }

    pub(crate) fn find_base_claims(&mut self) {
        let columns: Vec<Square> = (0..WIDTH)
            .filter(|&col| !self.excluded(col))
            .filter_map(|col| self.playable[col].map(|row| Square::new(col, row)))
            .collect();

        for (i, &a) in columns.iter().enumerate() {
            for (j, &b) in columns.iter().enumerate().skip(i + 1) {
                for &c in columns[j + 1..].iter() {
                    for &(claim, y, z) in [(a, b, c), (b, a, c), (c, a, b)].iter() {
                        // the square above the claim column must be even
                        if claim.row % 2 != 0 {
                            continue;
                        }
                        let first = self.base_claim(claim, y, z);
                        self.register(first);
                        let second = self.base_claim(claim, z, y);
                        self.register(second);
                    }
                }
            }
        }
    }

    /// The options a Before has on each empty square of `line`. `claim_even`
    /// tells whether the line allows a claimeven at all.
    fn before_squares(&self, line: &LineThreat, claim_even: bool) -> Vec<BeforeSquare> {
        line.squares()
            .iter()
            .copied()
            .filter(|s| self.is_empty(s.col, s.row))
            .map(|square| {
                let claim_even = claim_even
                    && square.row % 2 == 1
                    && self.is_empty(square.col, square.row - 1)
                    && (line.direction() != Direction::Vertical || square.row == line.start().row);
                BeforeSquare {
                    square,
                    claim_even: if claim_even {
                        Some(self.threat_index.at(square.col, square.row).to_vec())
                    } else {
                        None
                    },
                    vertical: self.verticals_through(square),
                }
            })
            .collect()
    }

    /// No empty square of the line may sit in the top row, and the line must
    /// stay out of the odd threat columns
    fn before_line_allowed(&self, line: &LineThreat) -> bool {
        line.squares().iter().all(|s| {
            !(self.is_empty(s.col, s.row) && s.row == HEIGHT - 1) && !self.excluded(s.col)
        })
    }

    /// One Before solution for the given claimeven choice, one bit per empty
    /// square. `None` when a claimeven is asked where none is allowed.
    fn before_solution(
        &self,
        kind: fn(BeforeColumns) -> SolutionKind,
        mut columns: BeforeColumns,
        cells: &[BeforeSquare],
        mask: u8,
        extra: &[Square],
        solved: &[usize],
    ) -> Option<ThreatSolution> {
        let mut squares = extra.to_vec();
        let mut per_square = Vec::new();
        for (bit, cell) in cells.iter().enumerate() {
            let square = cell.square;
            squares.push(square);
            if mask & (1 << bit) != 0 {
                per_square.extend_from_slice(cell.claim_even.as_ref()?);
                columns.use_claim_even_in(square.col);
                squares.push(Square::new(square.col, square.row - 1));
            } else {
                per_square.extend_from_slice(&cell.vertical);
                squares.push(Square::new(square.col, square.row + 1));
            }
        }

        let mut solution = ThreatSolution::new(kind(columns));
        for square in squares {
            solution.add_square(square);
        }
        solution.add_all_solved(solved.iter().copied());
        solution.add_all_solved(per_square);
        Some(solution)
    }

    /// Lines of the opponent through the square above every empty cell, out
    /// of the lines through `start`
    fn threats_above_cells(&self, start: &[usize], cells: &[BeforeSquare]) -> Vec<usize> {
        start
            .iter()
            .copied()
            .filter(|&i| {
                cells
                    .iter()
                    .all(|cell| self.threats[i].covers(cell.square.col, cell.square.row + 1))
            })
            .collect()
    }

    pub(crate) fn find_befores(&mut self) {
        for index in 0..self.winning_threats.len() {
            let line = self.winning_threats[index].clone();
            if !self.before_line_allowed(&line) {
                continue;
            }
            let cells = self.before_squares(&line, true);
            let first = match cells.first() {
                Some(cell) => cell.square,
                None => continue,
            };
            let above = self.threats_above_cells(self.threat_index.at(first.col, first.row + 1), &cells);

            // every empty square picks a claimeven or a vertical, but not all claimevens
            let all = (1u8 << cells.len()) - 1;
            for mask in 0..all {
                if let Some(solution) =
                    self.before_solution(SolutionKind::Before, BeforeColumns::default(), &cells, mask, &[], &above)
                {
                    self.register(solution);
                }
            }
        }
    }

    pub(crate) fn find_special_befores(&mut self) {
        for col in 0..WIDTH {
            let row = match self.playable[col] {
                Some(row) if !self.excluded(col) => row,
                _ => continue,
            };
            let lines: Vec<LineThreat> = self
                .winning_index
                .at(col, row)
                .iter()
                .map(|&i| self.winning_threats[i].clone())
                .collect();

            for line in lines.iter() {
                if !self.before_line_allowed(line) {
                    continue;
                }
                // the playable square sits at the bottom of a vertical line
                let mut cells = self.before_squares(line, line.direction() != Direction::Vertical);
                // an opponent move on the playable square is answered in the
                // other special column, so the square above it is never taken
                for cell in cells.iter_mut().filter(|cell| cell.square == Square::new(col, row)) {
                    cell.vertical.clear();
                }

                for col2 in 0..WIDTH {
                    if line.covers_col(col2) || self.excluded(col2) {
                        continue;
                    }
                    let row2 = match self.playable[col2] {
                        Some(row2) => row2,
                        None => continue,
                    };
                    let direct = Square::new(col2, row2);
                    let mut solved = self.threats_covering(direct, Square::new(col, row));
                    solved.extend(self.threats_above_cells(self.threat_index.at(col2, row2), &cells));

                    let mut columns = BeforeColumns::default();
                    columns.add_special_column(col);
                    columns.add_special_column(col2);
                    for mask in 0..1u8 << cells.len() {
                        if let Some(solution) = self.before_solution(
                            SolutionKind::SpecialBefore,
                            columns,
                            &cells,
                            mask,
                            &[direct],
                            &solved,
                        ) {
                            self.register(solution);
                        }
                    }
                }
            }
        }
    }

    pub(crate) fn find_after_base_inverses(&mut self) {
        let direct: Vec<Square> = (0..WIDTH)
            .filter_map(|col| self.playable[col].map(|row| Square::new(col, row)))
            .filter(|s| self.has_level3_winning_threat(s.col, s.row))
            .take(2)
            .collect();
        if direct.len() < 2 {
            return;
        }
        let mut solution = ThreatSolution::new(SolutionKind::AfterBaseInverse);
        for square in direct {
            solution.add_square(square);
        }
        solution.add_all_solved(0..self.threats.len());
        self.register(solution);
    }

    pub(crate) fn find_after_verticals(&mut self) {
        for col in 0..WIDTH {
            let row = match self.playable[col] {
                Some(row) if row < HEIGHT - 1 => row,
                _ => continue,
            };
            if self.has_level3_winning_threat(col, row) && self.has_level3_winning_threat(col, row + 1) {
                let mut solution = ThreatSolution::new(SolutionKind::AfterVertical);
                solution.add_square(Square::new(col, row));
                solution.add_square(Square::new(col, row + 1));
                solution.add_all_solved(0..self.threats.len());
                self.register(solution);
            }
        }
    }
}
