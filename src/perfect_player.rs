//! Chooses moves by combining quick tactical checks, the covering search and
//! exact tree search, fanned out over a worker pool

use anyhow::Result;
use log::{debug, info};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use rayon::{ThreadPool, ThreadPoolBuilder};

use std::path::PathBuf;
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;

use crate::bitboard::BitBoard;
use crate::board::{Board, Color};
use crate::board_ext::BoardExt;
use crate::interrupt::Interrupt;
use crate::move_simulator::{MoveSimulator, MoveSmartness};
use crate::opening_database::DATABASE_PATH;
use crate::position_database::PositionDatabase;
use crate::position_value::{Outcome, PositionValue};
use crate::solver::ExactSearcher;
use crate::{HEIGHT, WIDTH};

/// Number of threads searching candidate moves in parallel
pub const WORKERS: usize = 7;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    FindingPlayableCols,
    TryingWinningMove,
    BlockingLosingMove,
    SearchingSolutions,
    TreeSearching,
    ChoosingAMove,
    Done,
}

/// A progress event of a running decision. `progress` is a percentage when
/// the phase has one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StatusUpdate {
    pub phase: Phase,
    pub progress: Option<u32>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DecisionReason {
    /// the centre column on an empty board
    OpeningMove,
    WinningMove,
    BlockingMove,
    /// the best verdict of the covering search
    Solutions,
    /// the best proven value of the tree search
    TreeSearch,
    /// every other candidate was proven lost
    LastRemaining,
    /// nothing better was known, any legal column
    Fallback,
}

#[derive(Clone, Debug)]
pub struct Decision {
    pub column: usize,
    pub reason: DecisionReason,
    pub verdicts: [MoveSmartness; WIDTH],
    pub values: [Option<PositionValue>; WIDTH],
}

impl Decision {
    fn new(column: usize, reason: DecisionReason) -> Self {
        Self {
            column,
            reason,
            verdicts: [MoveSmartness::Unknown; WIDTH],
            values: [None; WIDTH],
        }
    }
}

/// Preference of an outcome for the side to move; unknown only beats losing
fn rank(outcome: Outcome, red: bool) -> u8 {
    match (outcome, red) {
        (Outcome::Unknown, _) => 1,
        (Outcome::Loss, true) | (Outcome::Win, false) => 0,
        (Outcome::DrawLoss, true) | (Outcome::DrawWin, false) => 2,
        (Outcome::Draw, _) => 3,
        (Outcome::DrawWin, true) | (Outcome::DrawLoss, false) => 4,
        (Outcome::Win, true) | (Outcome::Loss, false) => 5,
    }
}

/// Proven values of the candidate columns, in the order the searches finish
pub(crate) struct TreeSearchTally<'a> {
    candidates: &'a [usize],
    red: bool,
    values: [Option<PositionValue>; WIDTH],
    reported: usize,
}

impl<'a> TreeSearchTally<'a> {
    pub(crate) fn new(candidates: &'a [usize], red: bool) -> Self {
        Self {
            candidates,
            red,
            values: [None; WIDTH],
            reported: 0,
        }
    }

    pub(crate) fn reported(&self) -> usize {
        self.reported
    }

    pub(crate) fn values(&self) -> [Option<PositionValue>; WIDTH] {
        self.values
    }

    /// Records the value of a column. Returns the column to play once the
    /// searches still running can't change the choice.
    pub(crate) fn record(&mut self, col: usize, value: PositionValue) -> Option<(usize, DecisionReason)> {
        self.values[col] = Some(value);
        self.reported += 1;

        if value.outcome() == Outcome::win_for(self.red) {
            return Some((col, DecisionReason::TreeSearch));
        }
        let worst = Outcome::win_for(!self.red);
        if self.reported + 1 == self.candidates.len()
            && self.values.iter().flatten().all(|v| v.outcome() == worst)
        {
            // the last column can't be any worse
            return self
                .candidates
                .iter()
                .copied()
                .find(|&c| self.values[c].is_none())
                .map(|c| (c, DecisionReason::LastRemaining));
        }
        None
    }

    /// Columns of the best rank, and of those the ones proven deepest
    pub(crate) fn best_columns(&self) -> Vec<usize> {
        let red = self.red;
        let key = |v: &PositionValue| (rank(v.outcome(), red), v.depth());
        let best = match self.values.iter().flatten().map(key).max() {
            Some(best) => best,
            None => return Vec::new(),
        };
        (0..WIDTH)
            .filter(|&col| self.values[col].as_ref().map(key) == Some(best))
            .collect()
    }
}

/// An agent that plays one colour as well as it can prove.
///
/// # Notes
/// A decision runs in phases: immediate wins and blocks first, then one
/// covering search per column on the worker pool, and an exact search of the
/// promising columns when the covering search can't tell them apart. Every
/// task a decision spawns has finished when it returns.
pub struct PerfectPlayer {
    color: Color,
    database: Arc<PositionDatabase>,
    opening_book: PathBuf,
    pool: ThreadPool,
    status: Option<Sender<StatusUpdate>>,
    board: Mutex<Option<BoardExt>>,
    rng: Mutex<StdRng>,
}

impl PerfectPlayer {
    pub fn new(color: Color, database: Arc<PositionDatabase>) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(WORKERS)
            .thread_name(|index| format!("connect4-worker-{}", index))
            .build()?;
        Ok(Self {
            color,
            database,
            opening_book: PathBuf::from(DATABASE_PATH),
            pool,
            status: None,
            board: Mutex::new(None),
            rng: Mutex::new(StdRng::seed_from_u64(rand::random())),
        })
    }

    pub fn with_opening_book<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.opening_book = path.into();
        self
    }

    pub fn with_status(mut self, status: Sender<StatusUpdate>) -> Self {
        self.status = Some(status);
        self
    }

    /// Makes the choice between equally good moves repeatable
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn database(&self) -> &Arc<PositionDatabase> {
        &self.database
    }

    fn report(&self, phase: Phase, progress: Option<u32>) {
        if let Some(status) = &self.status {
            // nobody listening is fine
            let _ = status.send(StatusUpdate { phase, progress });
        }
    }

    /// Chooses a column for this player's colour.
    ///
    /// Returns `None` if `interrupt` is stopped before a choice is made, or if
    /// the board has no legal move.
    pub fn decide(&self, board: &Board, interrupt: &Interrupt) -> Option<Decision> {
        let mut working = self.board.lock();
        if interrupt.is_stopped() {
            return None;
        }

        self.report(Phase::FindingPlayableCols, None);
        let ext: &BoardExt = working.insert(BoardExt::new(*board, self.color));
        if (0..WIDTH).all(|col| ext.playable_row(col).is_none()) {
            return None;
        }

        if board.is_empty() {
            // the book is needed later anyway
            self.report(Phase::TreeSearching, None);
            self.database.ensure_opening_book(&self.opening_book);
            return Some(self.finish(Decision::new(WIDTH / 2, DecisionReason::OpeningMove)));
        }

        self.report(Phase::TryingWinningMove, None);
        let winning = (0..WIDTH).find(|&col| {
            ext.playable_row(col)
                .map_or(false, |row| ext.has_level3_winning_threat(col, row))
        });
        if let Some(col) = winning {
            return Some(self.finish(Decision::new(col, DecisionReason::WinningMove)));
        }

        self.report(Phase::BlockingLosingMove, None);
        let blocking = (0..WIDTH).find(|&col| {
            ext.playable_row(col)
                .map_or(false, |row| ext.has_level3_threat(col, row))
        });
        if let Some(col) = blocking {
            return Some(self.finish(Decision::new(col, DecisionReason::BlockingMove)));
        }

        let verdicts = self.search_solutions(ext, interrupt);
        if interrupt.is_stopped() {
            return None;
        }
        debug!("verdicts {:?}", verdicts);

        let target = if self.color.is_red() {
            MoveSmartness::AllSolved
        } else {
            MoveSmartness::AllSolvedWin
        };
        let best = verdicts
            .iter()
            .copied()
            .max()
            .unwrap_or(MoveSmartness::Unknown);
        let candidates: Vec<usize> = (0..WIDTH)
            .filter(|&col| verdicts[col] >= MoveSmartness::NotAllSolved)
            .collect();

        if candidates.len() > 1 && best < target {
            let mut decision = self.tree_search(ext, &candidates, interrupt)?;
            decision.verdicts = verdicts;
            return Some(self.finish(decision));
        }

        self.report(Phase::ChoosingAMove, None);
        let best_columns: Vec<usize> = (0..WIDTH)
            .filter(|&col| verdicts[col] == best && ext.playable_row(col).is_some())
            .collect();
        let mut decision = match self.choose(&best_columns) {
            Some(col) => Decision::new(col, DecisionReason::Solutions),
            None => self.fallback(ext)?,
        };
        decision.verdicts = verdicts;
        Some(self.finish(decision))
    }

    /// Runs the covering search on every column that needs one
    fn search_solutions(&self, ext: &BoardExt, interrupt: &Interrupt) -> [MoveSmartness; WIDTH] {
        let target = if self.color.is_red() {
            MoveSmartness::AllSolved
        } else {
            MoveSmartness::AllSolvedWin
        };
        let progress = |done: usize| Some((100 * done / WIDTH) as u32);

        let mut verdicts = [MoveSmartness::Unknown; WIDTH];
        let mut done = 0;
        let mut pending = 0;
        let tasks = interrupt.child();
        let (tx, rx) = channel();

        self.report(Phase::SearchingSolutions, progress(0));
        for col in 0..WIDTH {
            match ext.playable_row(col) {
                None => verdicts[col] = MoveSmartness::Impossible,
                Some(row) if row + 1 < HEIGHT && ext.has_level3_threat(col, row + 1) => {
                    verdicts[col] = MoveSmartness::DirectLose
                }
                Some(_) => {
                    let (tx, interrupt) = (tx.clone(), tasks.clone());
                    let (board, color) = (ext.do_move(col, self.color), self.color);
                    self.pool.spawn(move || {
                        let verdict = MoveSimulator::new(board, color, target, interrupt).simulate();
                        let _ = tx.send((col, verdict));
                    });
                    pending += 1;
                    continue;
                }
            }
            done += 1;
            self.report(Phase::SearchingSolutions, progress(done));
        }
        drop(tx);

        let mut accepting = true;
        while pending > 0 {
            let (col, verdict) = match rx.recv() {
                Ok(result) => result,
                Err(_) => break,
            };
            pending -= 1;
            if !accepting {
                continue;
            }

            verdicts[col] = verdict;
            done += 1;
            self.report(Phase::SearchingSolutions, progress(done));
            if done == WIDTH || verdict >= target {
                accepting = false;
                tasks.stop();
            }
        }
        verdicts
    }

    /// Proves the value of every candidate column
    pub(crate) fn tree_search(
        &self,
        ext: &BoardExt,
        candidates: &[usize],
        interrupt: &Interrupt,
    ) -> Option<Decision> {
        let red = self.color.is_red();

        self.report(Phase::TreeSearching, Some(0));
        self.database.ensure_opening_book(&self.opening_book);
        if interrupt.is_stopped() {
            return None;
        }

        let code = BitBoard::encode(ext.board());
        let tasks = interrupt.child();
        let (tx, rx) = channel();
        for &col in candidates {
            let (tx, interrupt) = (tx.clone(), tasks.clone());
            let database = self.database.clone();
            let child = BitBoard::new(BitBoard::play_code(code, col, red));
            self.pool.spawn(move || {
                let mut searcher = ExactSearcher::new(database, interrupt);
                let value = searcher.solve(&child);
                let _ = tx.send((col, value));
            });
        }
        drop(tx);

        let mut tally = TreeSearchTally::new(candidates, red);
        let mut pending = candidates.len();
        let mut early = None;
        while pending > 0 {
            let (col, value): (usize, PositionValue) = match rx.recv() {
                Ok(result) => result,
                Err(_) => break,
            };
            pending -= 1;
            if early.is_some() {
                continue;
            }

            early = tally.record(col, value);
            self.report(
                Phase::TreeSearching,
                Some((100 * tally.reported() / candidates.len()) as u32),
            );
            if early.is_some() {
                tasks.stop();
            }
        }
        if interrupt.is_stopped() {
            return None;
        }
        debug!("tree search values {:?}", tally.values());

        self.report(Phase::ChoosingAMove, None);
        let mut decision = match early {
            Some((col, reason)) => Decision::new(col, reason),
            None => Decision::new(self.choose(&tally.best_columns())?, DecisionReason::TreeSearch),
        };
        decision.values = tally.values();
        Some(decision)
    }

    fn choose(&self, columns: &[usize]) -> Option<usize> {
        columns.choose(&mut *self.rng.lock()).copied()
    }

    fn fallback(&self, ext: &BoardExt) -> Option<Decision> {
        let playable: Vec<usize> = (0..WIDTH)
            .filter(|&col| ext.playable_row(col).is_some())
            .collect();
        self.choose(&playable)
            .map(|col| Decision::new(col, DecisionReason::Fallback))
    }

    fn finish(&self, decision: Decision) -> Decision {
        info!(
            "{:?} plays column {} ({:?})",
            self.color,
            decision.column + 1,
            decision.reason
        );
        self.report(Phase::Done, None);
        decision
    }
}
