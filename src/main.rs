use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use std::io::{stdin, stdout, Stdin, Write};
use std::path::Path;
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread;

use connect4_engine::board::Color;
use connect4_engine::interrupt::Interrupt;
use connect4_engine::opening_database::DATABASE_PATH;
use connect4_engine::perfect_player::{PerfectPlayer, Phase, StatusUpdate};
use connect4_engine::players::{ChancePlayer, Player, RandomPlayer};
use connect4_engine::position_database::PositionDatabase;

mod game;
use game::*;

fn phase_message(phase: Phase) -> &'static str {
    match phase {
        Phase::FindingPlayableCols => "Finding playable columns",
        Phase::TryingWinningMove => "Trying a winning move",
        Phase::BlockingLosingMove => "Blocking a losing move",
        Phase::SearchingSolutions => "Searching solutions",
        Phase::TreeSearching => "Thinking ahead",
        Phase::ChoosingAMove => "Choosing a move",
        Phase::Done => "Done",
    }
}

/// Draws the status of a thinking player until the player is dropped
fn progress_listener() -> Sender<StatusUpdate> {
    let (tx, rx) = channel::<StatusUpdate>();
    thread::spawn(move || {
        let mut progress: Option<ProgressBar> = None;
        for update in rx {
            if update.phase == Phase::Done {
                if let Some(bar) = progress.take() {
                    bar.finish_and_clear();
                }
                continue;
            }
            let bar = progress.get_or_insert_with(|| {
                let bar = ProgressBar::new(100);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{msg:24} {bar:40.cyan/blue} {pos:>3}%")
                        .progress_chars("█▓▒░  "),
                );
                bar
            });
            bar.set_message(phase_message(update.phase));
            if let Some(percent) = update.progress {
                bar.set_position(percent as u64);
            }
        }
    });
    tx
}

fn prompt(stdin: &Stdin, question: &str) -> Result<String> {
    let mut buffer = String::new();
    print!("{}", question);
    stdout().flush()?;
    stdin.read_line(&mut buffer)?;
    Ok(buffer.trim().to_lowercase())
}

/// Asks who controls a colour; `None` is a human
fn choose_player(
    stdin: &Stdin,
    color: Color,
    database: &Arc<PositionDatabase>,
) -> Result<Option<Box<dyn Player>>> {
    loop {
        let question = format!(
            "Who plays {:?}? (h)uman, (p)erfect, (r)andom or (c)hance: ",
            color
        );
        match prompt(stdin, &question)?.chars().next() {
            Some('h') => return Ok(None),
            Some('p') => {
                let player = PerfectPlayer::new(color, database.clone())?.with_status(progress_listener());
                return Ok(Some(Box::new(player)));
            }
            Some('r') => return Ok(Some(Box::new(RandomPlayer::new(color)))),
            Some('c') => loop {
                let answer = prompt(stdin, "Chance to think about a move, in percent: ")?;
                match answer.parse::<u32>() {
                    Ok(percent) if percent <= 100 => {
                        let perfect =
                            PerfectPlayer::new(color, database.clone())?.with_status(progress_listener());
                        return Ok(Some(Box::new(ChancePlayer::new(perfect, percent, 100)?)));
                    }
                    _ => println!("Invalid percentage: {}", answer),
                }
            },
            _ => println!("Unknown answer given"),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let stdin = stdin();
    let mut game = Game::new();
    // shared by both players so solved positions are re-used
    let database = Arc::new(PositionDatabase::new());
    let interrupt = Interrupt::new();

    println!("Welcome to Connect 4\n");

    if !Path::new(DATABASE_PATH).exists() {
        println!(
            "Opening book {} not found, expect early moves to take a long time",
            DATABASE_PATH
        );
    }

    let mut players = [
        choose_player(&stdin, Color::Red, &database)?,
        choose_player(&stdin, Color::Yellow, &database)?,
    ];
    let both_ai = players.iter().all(|player| player.is_some());

    // game loop
    loop {
        game.display()?;

        match game.state {
            GameState::Playing => {
                let turn = game.turn;
                let opponent_is_ai = players[turn.other() as usize].is_some();
                let next_move = match &mut players[turn as usize] {
                    Some(player) => {
                        // AI player
                        println!("{:?} is thinking...", turn);
                        stdout().flush()?;

                        // slow down play if both players are AI
                        if both_ai {
                            thread::sleep(std::time::Duration::new(1, 0));
                        }

                        match player.choose_move(game.board(), &interrupt) {
                            Some(column) => {
                                println!("{:?} plays {}", turn, column + 1);
                                column + 1
                            }
                            None => {
                                println!("{:?} found no move", turn);
                                break;
                            }
                        }
                    }
                    None => {
                        // human player
                        let input = prompt(&stdin, "Move input (u to undo) > ")?;
                        if input == "u" {
                            // take back the AI reply too, so it is the human's turn again
                            game.undo();
                            if opponent_is_ai {
                                game.undo();
                            }
                            continue;
                        }
                        match input.parse::<usize>() {
                            Err(_) => {
                                println!("Invalid number: {}", input);
                                continue;
                            }
                            Ok(column) => column,
                        }
                    }
                };

                if let Err(err) = game.play_checked(next_move) {
                    println!("{}", err);
                    // try the move again
                    continue;
                }
            }

            // end states
            GameState::RedWin => {
                println!("Red wins! ({})", game.moves());
                break;
            }
            GameState::YellowWin => {
                println!("Yellow wins! ({})", game.moves());
                break;
            }
            GameState::Draw => {
                println!("Draw! ({})", game.moves());
                break;
            }
        }
    }
    Ok(())
}
