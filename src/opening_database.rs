use anyhow::{anyhow, Context, Result};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::bitboard::BitBoard;
use crate::board::Board;
use crate::position_value::{Outcome, PositionValue};
use crate::{HEIGHT, WIDTH};

pub const DATABASE_PATH: &str = "positions.db";
/// Number of pieces in every opening book position
pub const DATABASE_PIECES: usize = 8;
pub const DATABASE_NUM_POSITIONS: usize = 67557;
/// Board characters, the outcome character and the terminator
pub const LINE_LENGTH: usize = WIDTH * HEIGHT + 2;

/// Solved 8-piece positions.
///
/// Each line holds the board column by column, bottom row first (`' '`, `'R'`
/// or `'Y'`), then `'0'`, `'1'` or `'2'` for a loss, draw or win of the side to
/// move, then a newline. Red is always to move after eight pieces.
pub struct OpeningBook {
    entries: Vec<(u64, PositionValue)>,
}

impl OpeningBook {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open opening book {}", path.display()))?;
        Self::parse(BufReader::new(file))
    }

    /// Parses a whole book; any malformed line rejects it
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut entries = Vec::with_capacity(DATABASE_NUM_POSITIONS);

        for (index, line) in reader.split(b'\n').enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let (board, outcome) =
                Self::parse_line(&line).with_context(|| format!("line {}", index + 1))?;
            entries.push((BitBoard::encode(&board), PositionValue::new(outcome, 0)));
        }
        Ok(Self { entries })
    }

    fn parse_line(line: &[u8]) -> Result<(Board, Outcome)> {
        if line.len() != LINE_LENGTH - 1 {
            return Err(anyhow!(
                "expected {} bytes, found {}",
                LINE_LENGTH,
                line.len() + 1
            ));
        }
        let layout = std::str::from_utf8(&line[..WIDTH * HEIGHT])?;
        let board = Board::from_columns(layout)?;
        if board.piece_count() != DATABASE_PIECES {
            return Err(anyhow!(
                "expected {} pieces, found {}",
                DATABASE_PIECES,
                board.piece_count()
            ));
        }

        let outcome = match line[WIDTH * HEIGHT] {
            b'0' => Outcome::Loss,
            b'1' => Outcome::Draw,
            b'2' => Outcome::Win,
            other => return Err(anyhow!("unknown outcome '{}'", other as char)),
        };
        Ok((board, outcome))
    }

    /// Formats one book line, terminator included
    pub fn format_line(board: &Board, outcome: Outcome) -> String {
        let value = match outcome {
            Outcome::Win => '2',
            Outcome::Loss => '0',
            _ => '1',
        };
        format!("{}{}\n", board.to_columns(), value)
    }

    pub fn entries(&self) -> &[(u64, PositionValue)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
