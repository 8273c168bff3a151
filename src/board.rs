use anyhow::{anyhow, Result};
use thiserror::Error;

use crate::{HEIGHT, WIDTH};

/// The contents of a single board square
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Cell {
    Empty,
    Red,
    Yellow,
}

impl Cell {
    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }
}

/// One of the two sides. Red always moves first.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Color {
    Red,
    Yellow,
}

impl Color {
    pub fn other(self) -> Self {
        match self {
            Color::Red => Color::Yellow,
            Color::Yellow => Color::Red,
        }
    }

    pub fn is_red(self) -> bool {
        self == Color::Red
    }
}

impl From<Color> for Cell {
    fn from(color: Color) -> Self {
        match color {
            Color::Red => Cell::Red,
            Color::Yellow => Cell::Yellow,
        }
    }
}

/// A rejected move request. The caller is expected to ask the same side again.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("Invalid move, column {0} out of range. Columns must be between 1 and {}", WIDTH)]
    OutOfRange(usize),
    #[error("Invalid move, column {} full", .0 + 1)]
    ColumnFull(usize),
}

/// A plain 7x6 grid, indexed by column then row with row 0 at the bottom
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct Board {
    cells: [[Cell; HEIGHT]; WIDTH],
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [[Cell::Empty; HEIGHT]; WIDTH],
        }
    }

    /// Parses a string of 1-indexed columns, alternating from Red
    pub fn from_moves<S: AsRef<str>>(moves: S) -> Result<Self> {
        let mut board = Self::new();
        let mut color = Color::Red;

        for column_char in moves.as_ref().chars() {
            match column_char.to_digit(10).map(|c| c as usize) {
                Some(column @ 1..=WIDTH) => {
                    let column = column - 1;
                    let row = board.play(column, color)?;
                    // abort if the position is won at any point
                    if board.completes_line(column, row) {
                        return Err(anyhow!("Invalid position, game is over"));
                    }
                    color = color.other();
                }
                _ => return Err(anyhow!("could not parse '{}' as a valid move", column_char)),
            }
        }
        Ok(board)
    }

    /// Parses the 42 character column-major layout used by the opening book.
    /// The character at `col * HEIGHT + row` describes square (col, row).
    pub fn from_columns<S: AsRef<str>>(layout: S) -> Result<Self> {
        let bytes = layout.as_ref().as_bytes();
        if bytes.len() != WIDTH * HEIGHT {
            return Err(anyhow!(
                "expected {} board characters, found {}",
                WIDTH * HEIGHT,
                bytes.len()
            ));
        }

        let mut board = Self::new();
        for col in 0..WIDTH {
            for row in 0..HEIGHT {
                board.cells[col][row] = match bytes[col * HEIGHT + row] {
                    b' ' => Cell::Empty,
                    b'R' => Cell::Red,
                    b'Y' => Cell::Yellow,
                    other => {
                        return Err(anyhow!("unknown board character '{}'", other as char))
                    }
                };
            }
            // pieces must rest on each other
            if (1..HEIGHT).any(|row| {
                !board.cells[col][row].is_empty() && board.cells[col][row - 1].is_empty()
            }) {
                return Err(anyhow!("floating piece in column {}", col + 1));
            }
        }
        Ok(board)
    }

    /// Writes the board in the layout read by [`Board::from_columns`]
    pub fn to_columns(&self) -> String {
        let mut layout = String::with_capacity(WIDTH * HEIGHT);
        for column in self.cells.iter() {
            for cell in column.iter() {
                layout.push(match cell {
                    Cell::Empty => ' ',
                    Cell::Red => 'R',
                    Cell::Yellow => 'Y',
                });
            }
        }
        layout
    }

    pub fn get(&self, col: usize, row: usize) -> Cell {
        self.cells[col][row]
    }

    pub fn set(&mut self, col: usize, row: usize, cell: Cell) {
        self.cells[col][row] = cell;
    }

    /// The lowest empty row of a column, or `None` if it is full
    pub fn playable_row(&self, col: usize) -> Option<usize> {
        self.cells[col].iter().position(|cell| cell.is_empty())
    }

    /// Drops a piece into a column, returning the row it landed on
    pub fn play(&mut self, col: usize, color: Color) -> Result<usize, MoveError> {
        if col >= WIDTH {
            return Err(MoveError::OutOfRange(col.saturating_add(1)));
        }
        let row = self.playable_row(col).ok_or(MoveError::ColumnFull(col))?;
        self.cells[col][row] = color.into();
        Ok(row)
    }

    pub fn count(&self, cell: Cell) -> usize {
        self.cells
            .iter()
            .flat_map(|column| column.iter())
            .filter(|&&c| c == cell)
            .count()
    }

    pub fn piece_count(&self) -> usize {
        WIDTH * HEIGHT - self.count(Cell::Empty)
    }

    pub fn is_empty(&self) -> bool {
        self.piece_count() == 0
    }

    pub fn is_full(&self) -> bool {
        (0..WIDTH).all(|col| self.playable_row(col).is_none())
    }

    /// Red moves whenever both sides have played the same number of pieces
    pub fn side_to_move(&self) -> Color {
        if self.count(Cell::Red) == self.count(Cell::Yellow) {
            Color::Red
        } else {
            Color::Yellow
        }
    }

    /// Returns the four squares of a line through (col, row) owned by the
    /// piece on that square, if there is one
    pub fn winning_line(&self, col: usize, row: usize) -> Option<[(usize, usize); 4]> {
        let piece = self.cells[col][row];
        if piece.is_empty() {
            return None;
        }

        for &(dc, dr) in [(0i32, 1i32), (1, 0), (1, 1), (1, -1)].iter() {
            // walk back to the first square of the run
            let (mut c, mut r) = (col as i32, row as i32);
            while self.holds(c - dc, r - dr, piece) {
                c -= dc;
                r -= dr;
            }
            let mut line = [(0, 0); 4];
            let mut length = 0;
            while length < 4 && self.holds(c, r, piece) {
                line[length] = (c as usize, r as usize);
                length += 1;
                c += dc;
                r += dr;
            }
            if length == 4 {
                return Some(line);
            }
        }
        None
    }

    pub fn completes_line(&self, col: usize, row: usize) -> bool {
        self.winning_line(col, row).is_some()
    }

    fn holds(&self, col: i32, row: i32, piece: Cell) -> bool {
        col >= 0
            && row >= 0
            && (col as usize) < WIDTH
            && (row as usize) < HEIGHT
            && self.cells[col as usize][row as usize] == piece
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
