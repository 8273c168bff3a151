use std::collections::VecDeque;

use crate::{HEIGHT, WIDTH};

/// A board square, ordered by column first and row second
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Square {
    pub col: usize,
    pub row: usize,
}

impl Square {
    pub const fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }

    /// The square at the given offset, if it is still on the board
    pub fn offset(self, dc: i32, dr: i32) -> Option<Self> {
        let col = self.col as i32 + dc;
        let row = self.row as i32 + dr;
        if (0..WIDTH as i32).contains(&col) && (0..HEIGHT as i32).contains(&row) {
            Some(Self::new(col as usize, row as usize))
        } else {
            None
        }
    }
}

/// Direction of a line, walking away from its start square
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// downwards
    Vertical,
    /// to the right
    Horizontal,
    /// to the right and downwards
    DiagonalRight,
    /// to the left and downwards
    DiagonalLeft,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Vertical,
        Direction::Horizontal,
        Direction::DiagonalRight,
        Direction::DiagonalLeft,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Vertical => (0, -1),
            Direction::Horizontal => (1, 0),
            Direction::DiagonalRight => (1, -1),
            Direction::DiagonalLeft => (-1, -1),
        }
    }
}

/// Four squares in a row that one side could still complete.
///
/// The level counts the attacker's pieces already on the line. `solutions`
/// holds indices into the solution arena of the board that found the threat.
#[derive(Clone, Debug)]
pub struct LineThreat {
    start: Square,
    direction: Direction,
    level: u8,
    pub solved: bool,
    pub solutions: VecDeque<usize>,
}

impl LineThreat {
    pub fn new(start: Square, direction: Direction, level: u8) -> Self {
        Self {
            start,
            direction,
            level: level.min(3),
            solved: false,
            solutions: VecDeque::new(),
        }
    }

    pub fn start(&self) -> Square {
        self.start
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// The `n`th square of the line, counting from the start
    pub fn at(&self, n: usize) -> Square {
        let (dc, dr) = self.direction.delta();
        Square::new(
            (self.start.col as i32 + dc * n as i32) as usize,
            (self.start.row as i32 + dr * n as i32) as usize,
        )
    }

    pub fn squares(&self) -> [Square; 4] {
        [self.at(0), self.at(1), self.at(2), self.at(3)]
    }

    pub fn covers(&self, col: usize, row: usize) -> bool {
        self.squares().contains(&Square::new(col, row))
    }

    pub fn covers_col(&self, col: usize) -> bool {
        self.most_left_col() <= col && col <= self.most_right_col()
    }

    pub fn most_left_col(&self) -> usize {
        match self.direction {
            Direction::DiagonalLeft => self.start.col - 3,
            _ => self.start.col,
        }
    }

    pub fn most_right_col(&self) -> usize {
        match self.direction {
            Direction::Horizontal | Direction::DiagonalRight => self.start.col + 3,
            _ => self.start.col,
        }
    }
}

/// Per-square lists of indices into a threat arena
#[derive(Clone, Debug, Default)]
pub struct SquareIndex {
    squares: [[Vec<usize>; HEIGHT]; WIDTH],
}

impl SquareIndex {
    pub fn push(&mut self, square: Square, index: usize) {
        self.squares[square.col][square.row].push(index);
    }

    /// Indices stored under a square; squares off the board hold nothing
    pub fn at(&self, col: usize, row: usize) -> &[usize] {
        if col < WIDTH && row < HEIGHT {
            &self.squares[col][row]
        } else {
            &[]
        }
    }
}
