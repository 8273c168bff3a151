use crate::board::{Board, Cell, Color};
use crate::{HEIGHT, WIDTH};

/// Bits used by one column: `HEIGHT` squares plus the colour sentinel
pub const STRIDE: usize = HEIGHT + 1;

const COLUMN_PIECES: u64 = (1 << HEIGHT) - 1;
const COLUMN_SENTINEL: u64 = 1 << HEIGHT;

mod static_masks {
    use super::STRIDE;
    use crate::{HEIGHT, WIDTH};

    pub const fn sentinel_mask() -> u64 {
        let mut mask = 0;
        let mut column = 0;
        while column < WIDTH {
            mask |= 1 << (column * STRIDE + HEIGHT);
            column += 1;
        }
        mask
    }
    pub const fn top_row_mask() -> u64 {
        sentinel_mask() >> 1
    }
}

/// Bit of the square (col, row) in a colour mask
pub const fn square_bit(col: usize, row: usize) -> u64 {
    1 << (row + col * STRIDE)
}

/// A position packed into a single `u64` code.
///
/// Every column owns `STRIDE` bits. The highest occupied square of a column is
/// always a set bit; set bits below it share its colour and clear bits below it
/// belong to the other side. The sentinel bit above the column records whether
/// the set bits are red. An empty column keeps its sentinel clear so that each
/// position has exactly one code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitBoard {
    code: u64,
    // colour planes decoded from the code
    red: u64,
    yellow: u64,
    heights: [usize; WIDTH],
}

impl BitBoard {
    /// Decodes a position code
    pub fn new(code: u64) -> Self {
        let mut red = 0;
        let mut yellow = 0;
        let mut heights = [0; WIDTH];

        for (col, height) in heights.iter_mut().enumerate() {
            let shift = col * STRIDE;
            let group = (code >> shift) & (COLUMN_PIECES | COLUMN_SENTINEL);
            let pieces = group & COLUMN_PIECES;
            debug_assert!(
                pieces != 0 || group & COLUMN_SENTINEL == 0,
                "sentinel set on empty column {}",
                col
            );

            *height = Self::column_height(pieces);
            let filled = (1 << *height) - 1;
            let (top, other) = (pieces, filled & !pieces);
            if group & COLUMN_SENTINEL != 0 {
                red |= top << shift;
                yellow |= other << shift;
            } else {
                yellow |= top << shift;
                red |= other << shift;
            }
        }

        Self {
            code,
            red,
            yellow,
            heights,
        }
    }

    pub fn from_board(board: &Board) -> Self {
        Self::new(Self::encode(board))
    }

    /// Packs a board into its position code
    pub fn encode(board: &Board) -> u64 {
        let mut code = 0;
        for col in 0..WIDTH {
            let height = board.playable_row(col).unwrap_or(HEIGHT);
            if height == 0 {
                continue;
            }
            // the top piece decides which colour the set bits stand for
            let top = board.get(col, height - 1);
            if top == Cell::Red {
                code |= COLUMN_SENTINEL << (col * STRIDE);
            }
            for row in 0..height {
                if board.get(col, row) == top {
                    code |= square_bit(col, row);
                }
            }
        }
        code
    }

    pub fn to_board(&self) -> Board {
        let mut board = Board::new();
        for col in 0..WIDTH {
            for row in 0..self.heights[col] {
                let cell = if self.red & square_bit(col, row) != 0 {
                    Cell::Red
                } else {
                    Cell::Yellow
                };
                board.set(col, row, cell);
            }
        }
        board
    }

    pub fn code(&self) -> u64 {
        self.code
    }

    pub fn red(&self) -> u64 {
        self.red
    }

    pub fn yellow(&self) -> u64 {
        self.yellow
    }

    pub fn color_mask(&self, color: Color) -> u64 {
        match color {
            Color::Red => self.red,
            Color::Yellow => self.yellow,
        }
    }

    pub fn piece_count(&self) -> usize {
        (self.red | self.yellow).count_ones() as usize
    }

    pub fn red_to_move(&self) -> bool {
        self.piece_count() % 2 == 0
    }

    pub fn can_move(&self, col: usize) -> bool {
        self.heights[col] < HEIGHT
    }

    pub fn playable_row(&self, col: usize) -> Option<usize> {
        if self.can_move(col) {
            Some(self.heights[col])
        } else {
            None
        }
    }

    /// Code of the position after the side to move plays `col`
    pub fn play(&self, col: usize) -> u64 {
        Self::play_code(self.code, col, self.red_to_move())
    }

    fn column_height(pieces: u64) -> usize {
        (64 - pieces.leading_zeros()) as usize
    }

    /// Playable row of a column straight from a code
    pub fn playable_row_of(code: u64, col: usize) -> Option<usize> {
        let pieces = (code >> (col * STRIDE)) & COLUMN_PIECES;
        match Self::column_height(pieces) {
            HEIGHT => None,
            height => Some(height),
        }
    }

    /// Plays a piece for the given side on top of a column
    pub fn play_code(code: u64, col: usize, red: bool) -> u64 {
        let pieces = (code >> (col * STRIDE)) & COLUMN_PIECES;
        Self::play_code_at(code, col, Self::column_height(pieces), red)
    }

    /// Plays a piece for the given side at a known row, which must be the
    /// column's playable row
    pub fn play_code_at(mut code: u64, col: usize, row: usize, red: bool) -> u64 {
        debug_assert!(row < HEIGHT);
        let shift = col * STRIDE;
        let column_is_red = code & (COLUMN_SENTINEL << shift) != 0;
        // recolour the column so that the set bits stand for the mover
        if column_is_red != red {
            code ^= (COLUMN_SENTINEL | ((1 << row) - 1)) << shift;
        }
        code | square_bit(col, row)
    }

    /// Mirrors a code horizontally
    pub fn flip(code: u64) -> u64 {
        let mut flipped = 0;
        for col in 0..WIDTH {
            let group = (code >> (col * STRIDE)) & (COLUMN_PIECES | COLUMN_SENTINEL);
            flipped |= group << ((WIDTH - 1 - col) * STRIDE);
        }
        flipped
    }

    /// The smaller of a code and its mirror image
    pub fn canonical(code: u64) -> u64 {
        code.min(Self::flip(code))
    }

    pub fn is_full(code: u64) -> bool {
        code & static_masks::top_row_mask() == static_masks::top_row_mask()
    }

    /// Whether a single colour mask holds four in a row
    pub fn is_winner(mask: u64) -> bool {
        // sentinel bits are not pieces
        if mask & static_masks::sentinel_mask() != 0 {
            return false;
        }

        // check diagonal alignment \
        let mut m = mask & (mask >> HEIGHT);
        if m & (m >> (2 * HEIGHT)) != 0 {
            return true;
        }

        // check diagonal alignment /
        m = mask & (mask >> (HEIGHT + 2));
        if m & (m >> (2 * (HEIGHT + 2))) != 0 {
            return true;
        }

        // check horizontal alignment
        m = mask & (mask >> STRIDE);
        if m & (m >> (2 * STRIDE)) != 0 {
            return true;
        }

        // check vertical alignment
        m = mask & (mask >> 1);
        m & (m >> 2) != 0
    }
}

impl Default for BitBoard {
    fn default() -> Self {
        Self::new(0)
    }
}
