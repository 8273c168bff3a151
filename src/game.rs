use anyhow::Result;
use crossterm::{
    cursor::MoveTo,
    style::{style, Attribute, Color as TermColor, PrintStyledContent},
    QueueableCommand,
};

use std::io::{stdout, Write};

use connect4_engine::board::{Board, Cell, Color, MoveError};
use connect4_engine::{HEIGHT, WIDTH};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GameState {
    Playing,
    RedWin,
    YellowWin,
    Draw,
}

/// A game in progress, with the moves played so far so they can be taken back
#[derive(Clone)]
pub struct Game {
    board: Board,
    pub turn: Color,
    pub state: GameState,
    history: Vec<usize>,
    winning_line: Option<[(usize, usize); 4]>,
}

impl Game {
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            turn: Color::Red,
            state: GameState::Playing,
            history: Vec::new(),
            winning_line: None,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The moves so far as 1-indexed column digits
    pub fn moves(&self) -> String {
        self.history.iter().map(|col| (col + 1).to_string()).collect()
    }

    pub fn play_checked(&mut self, column_one_indexed: usize) -> Result<GameState, MoveError> {
        if column_one_indexed == 0 {
            return Err(MoveError::OutOfRange(0));
        }
        let column = column_one_indexed - 1;
        let row = self.board.play(column, self.turn)?;
        self.history.push(column);

        self.winning_line = self.board.winning_line(column, row);
        self.state = match (self.winning_line, self.turn) {
            (Some(_), Color::Red) => GameState::RedWin,
            (Some(_), Color::Yellow) => GameState::YellowWin,
            (None, _) if self.board.is_full() => GameState::Draw,
            (None, _) => GameState::Playing,
        };
        self.turn = self.turn.other();
        Ok(self.state)
    }

    /// Takes back the last move, returning its column
    pub fn undo(&mut self) -> Option<usize> {
        let column = self.history.pop()?;
        let row = self.board.playable_row(column).unwrap_or(HEIGHT) - 1;
        self.board.set(column, row, Cell::Empty);
        self.turn = self.turn.other();
        self.state = GameState::Playing;
        self.winning_line = None;
        Some(column)
    }

    pub fn display(&self) -> Result<()> {
        let mut stdout = stdout();

        let cols: String = (1..=WIDTH).map(|x| x.to_string()).collect();
        stdout.queue(PrintStyledContent(style(cols + "\n")))?;
        for _ in 0..HEIGHT {
            stdout.queue(PrintStyledContent(style("\n")))?;
        }
        stdout.flush()?;

        let (origin_x, origin_y) = crossterm::cursor::position()?;

        for col in 0..WIDTH {
            for row in 0..HEIGHT {
                let highlighted = self
                    .winning_line
                    .map_or(false, |line| line.contains(&(col, row)));
                let background = if highlighted {
                    TermColor::DarkGreen
                } else {
                    TermColor::DarkBlue
                };

                stdout
                    .queue(MoveTo(origin_x + col as u16, origin_y - 1 - row as u16))?
                    .queue(PrintStyledContent(
                        style("O")
                            .attribute(Attribute::Bold)
                            .on(background)
                            .with(match self.board.get(col, row) {
                                Cell::Red => TermColor::Red,
                                Cell::Yellow => TermColor::Yellow,
                                Cell::Empty => background,
                            }),
                    ))?;
            }
        }
        stdout
            .queue(MoveTo(origin_x + WIDTH as u16, origin_y - 1))?
            .queue(PrintStyledContent(style("\n")))?;
        stdout.flush()?;
        Ok(())
    }
}
