#[cfg(test)]
pub mod test {
    use anyhow::{anyhow, Result};
    use rand::rngs::StdRng;
    use rand::seq::IndexedRandom;
    use rand::{Rng, SeedableRng};

    use std::cell::Cell as Flag;
    use std::io::Cursor;
    use std::sync::mpsc::channel;
    use std::sync::Arc;

    use crate::bitboard::{square_bit, BitBoard};
    use crate::board::{Board, Cell, Color, MoveError};
    use crate::board_ext::{BoardExt, OddThreat};
    use crate::interrupt::Interrupt;
    use crate::move_simulator::{MoveSimulator, MoveSmartness};
    use crate::opening_database::OpeningBook;
    use crate::perfect_player::{
        Decision, DecisionReason, PerfectPlayer, Phase, StatusUpdate, TreeSearchTally,
    };
    use crate::players::{ChancePlayer, Player, RandomPlayer};
    use crate::position_database::{BookState, PositionDatabase, MIN_STORED_DEPTH};
    use crate::position_value::{Outcome, PositionValue};
    use crate::solution::{BeforeColumns, SolutionKind, ThreatSolution};
    use crate::solver::ExactSearcher;
    use crate::threat::Square;
    use crate::{HEIGHT, WIDTH};

    const MISSING_BOOK: &str = "no-such-opening-book.db";

    /// Four in a row of `cell`, found by looking at every line
    fn has_four(board: &Board, cell: Cell) -> bool {
        let directions = [(1, 0), (0, 1), (1, 1), (1, -1)];
        (0..WIDTH as i32).any(|col| {
            (0..HEIGHT as i32).any(|row| {
                directions.iter().any(|&(dc, dr)| {
                    (0..4).all(|i| {
                        let (c, r) = (col + dc * i, row + dr * i);
                        c >= 0
                            && r >= 0
                            && c < WIDTH as i32
                            && r < HEIGHT as i32
                            && board.get(c as usize, r as usize) == cell
                    })
                })
            })
        })
    }

    fn mirror(board: &Board) -> Board {
        let mut mirrored = Board::new();
        for col in 0..WIDTH {
            for row in 0..HEIGHT {
                mirrored.set(WIDTH - 1 - col, row, board.get(col, row));
            }
        }
        mirrored
    }

    /// Plays random moves from the empty board. Without `allow_wins` no move
    /// may complete a line, and `None` is returned when that gets impossible.
    fn random_board(rng: &mut StdRng, plies: usize, allow_wins: bool) -> Option<Board> {
        let mut board = Board::new();
        let mut color = Color::Red;
        for _ in 0..plies {
            let moves: Vec<usize> = (0..WIDTH)
                .filter(|&col| match board.playable_row(col) {
                    Some(row) if !allow_wins => {
                        let mut next = board;
                        next.set(col, row, color.into());
                        !next.completes_line(col, row)
                    }
                    Some(_) => true,
                    None => false,
                })
                .collect();
            let &col = moves.choose(rng)?;
            board.play(col, color).ok()?;
            color = color.other();
        }
        Some(board)
    }

    /// Value of a position for the side to move: 1 win, 0 draw, -1 loss
    fn negamax(board: &Board, color: Color) -> i32 {
        let mut best = None;
        for col in 0..WIDTH {
            let mut next = *board;
            let row = match next.play(col, color) {
                Ok(row) => row,
                Err(_) => continue,
            };
            if next.completes_line(col, row) {
                return 1;
            }
            let value = -negamax(&next, color.other());
            best = Some(best.map_or(value, |b: i32| b.max(value)));
        }
        best.unwrap_or(0)
    }

    /// Masks of every line of four on the board
    fn line_masks() -> Vec<u64> {
        let mut lines = Vec::new();
        for col in 0..WIDTH as i32 {
            for row in 0..HEIGHT as i32 {
                for &(dc, dr) in [(1, 0), (0, 1), (1, 1), (1, -1)].iter() {
                    let (end_col, end_row) = (col + 3 * dc, row + 3 * dr);
                    if end_col >= WIDTH as i32 || end_row < 0 || end_row >= HEIGHT as i32 {
                        continue;
                    }
                    lines.push((0..4).fold(0, |mask, i| {
                        mask | square_bit((col + dc * i) as usize, (row + dr * i) as usize)
                    }));
                }
            }
        }
        lines
    }

    /// Visits every mask of at most `left` more pieces on squares from `next` on
    fn for_each_mask<F: FnMut(u64)>(squares: &[u64], next: usize, mask: u64, left: usize, visit: &mut F) {
        visit(mask);
        if left == 0 {
            return;
        }
        for i in next..squares.len() {
            for_each_mask(squares, i + 1, mask | squares[i], left - 1, visit);
        }
    }

    fn perfect_player(color: Color) -> Result<PerfectPlayer> {
        Ok(PerfectPlayer::new(color, Arc::new(PositionDatabase::new()))?
            .with_opening_book(MISSING_BOOK)
            .with_seed(7))
    }

    /// A random position in which the side to move has no immediate win
    fn quiet_board(rng: &mut StdRng, plies: usize) -> Board {
        loop {
            if let Some(board) = random_board(rng, plies, false) {
                let ext = BoardExt::new(board, board.side_to_move());
                let direct_win = (0..WIDTH).any(|c| {
                    ext.playable_row(c)
                        .map_or(false, |r| ext.has_level3_winning_threat(c, r))
                });
                if !direct_win {
                    return board;
                }
            }
        }
    }

    fn exact_outcome(position: &BitBoard) -> Outcome {
        ExactSearcher::new(Arc::new(PositionDatabase::new()), Interrupt::new())
            .solve(position)
            .outcome()
    }

    #[test]
    pub fn parse_moves() -> Result<()> {
        let board = Board::from_moves("4453")?;
        assert_eq!(board.get(3, 0), Cell::Red);
        assert_eq!(board.get(3, 1), Cell::Yellow);
        assert_eq!(board.get(4, 0), Cell::Red);
        assert_eq!(board.get(2, 0), Cell::Yellow);
        assert_eq!(board.side_to_move(), Color::Red);

        assert!(Board::from_moves("1212121").is_err());
        assert!(Board::from_moves("8").is_err());
        assert!(Board::from_moves("1111111").is_err());

        let mut full = Board::from_moves("111111")?;
        assert_eq!(full.play(0, Color::Red), Err(MoveError::ColumnFull(0)));
        assert_eq!(full.play(WIDTH, Color::Red), Err(MoveError::OutOfRange(WIDTH + 1)));
        assert_eq!(
            full.play(usize::MAX, Color::Red),
            Err(MoveError::OutOfRange(usize::MAX))
        );

        let layout = board.to_columns();
        assert_eq!(Board::from_columns(&layout)?, board);
        // only spaces mark empty squares
        assert!(Board::from_columns(layout.replace(' ', ".")).is_err());
        Ok(())
    }

    #[test]
    pub fn bitboard_follows_board() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);

        for _ in 0..300 {
            let plies = rng.random_range(0..=WIDTH * HEIGHT);
            let board = random_board(&mut rng, plies, true).ok_or(anyhow!("no playout"))?;
            let code = BitBoard::encode(&board);
            let bitboard = BitBoard::new(code);

            assert_eq!(bitboard.to_board(), board);
            assert_eq!(bitboard.piece_count(), board.piece_count());
            assert_eq!(BitBoard::is_winner(bitboard.red()), has_four(&board, Cell::Red));
            assert_eq!(BitBoard::is_winner(bitboard.yellow()), has_four(&board, Cell::Yellow));

            for col in 0..WIDTH {
                assert_eq!(bitboard.playable_row(col), board.playable_row(col));
                if let Some(row) = board.playable_row(col) {
                    let mut next = board;
                    next.set(col, row, board.side_to_move().into());
                    assert_eq!(bitboard.play(col), BitBoard::encode(&next));
                }
            }
        }
        Ok(())
    }

    #[test]
    pub fn winner_detection_is_exhaustive() -> Result<()> {
        let lines = line_masks();
        assert_eq!(lines.len(), 69);

        let squares: Vec<u64> = (0..WIDTH)
            .flat_map(|col| (0..HEIGHT).map(move |row| square_bit(col, row)))
            .collect();
        let mut masks = 0;
        let mut winners = 0;
        for_each_mask(&squares, 0, 0, 6, &mut |mask| {
            let expected = lines.iter().any(|&line| mask & line == line);
            assert_eq!(BitBoard::is_winner(mask), expected, "{:#x}", mask);
            masks += 1;
            winners += expected as usize;
        });
        // every subset of up to six of the 42 squares
        assert_eq!(masks, 6_220_768);
        assert!(winners > 0);
        Ok(())
    }

    #[test]
    pub fn mirror_symmetry() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..200 {
            let plies = rng.random_range(0..=WIDTH * HEIGHT);
            let board = random_board(&mut rng, plies, true).ok_or(anyhow!("no playout"))?;
            let code = BitBoard::encode(&board);
            let flipped = BitBoard::flip(code);

            assert_eq!(BitBoard::flip(flipped), code);
            assert_eq!(flipped, BitBoard::encode(&mirror(&board)));
            assert_eq!(BitBoard::canonical(code), BitBoard::canonical(flipped));

            let (plain, mirrored) = (BitBoard::new(code), BitBoard::new(flipped));
            assert_eq!(BitBoard::is_winner(plain.red()), BitBoard::is_winner(mirrored.red()));
            assert_eq!(
                BitBoard::is_winner(plain.yellow()),
                BitBoard::is_winner(mirrored.yellow())
            );
        }
        Ok(())
    }

    #[test]
    pub fn position_value_packing() -> Result<()> {
        let value = PositionValue::new(Outcome::DrawWin, 17);
        assert_eq!(value.outcome(), Outcome::DrawWin);
        assert_eq!(value.depth(), 17);
        assert_eq!(PositionValue::from_raw(value.raw()), value);
        assert!(PositionValue::unknown().is_unknown());
        assert!(Outcome::DrawLoss.is_ambiguous());
        assert!(Outcome::Loss < Outcome::Draw && Outcome::Draw < Outcome::Win);
        Ok(())
    }

    #[test]
    pub fn database_is_canonical() -> Result<()> {
        assert_eq!(PositionDatabase::bucket_index(8), Some(0));
        assert_eq!(PositionDatabase::bucket_index(9), Some(1));
        assert_eq!(PositionDatabase::bucket_index(39), Some(11));
        assert_eq!(PositionDatabase::bucket_index(10), None);
        assert_eq!(PositionDatabase::bucket_index(42), None);
        assert!(PositionDatabase::should_store(12, 4));
        assert!(!PositionDatabase::should_store(12, 3));
        assert!(!PositionDatabase::should_store(13, 10));

        let database = PositionDatabase::new();
        // nine pieces, lopsided so the mirror image differs
        let board = Board::from_moves("112122133")?;
        let code = BitBoard::encode(&board);
        assert_ne!(code, BitBoard::flip(code));

        let value = PositionValue::new(Outcome::Win, 11);
        database.insert(code, board.piece_count(), value);
        assert_eq!(database.get(BitBoard::flip(code), board.piece_count()), Some(value));
        assert_eq!(database.get(code, board.piece_count()), Some(value));
        assert_eq!(database.len(), 1);

        // no bucket for ten pieces
        database.insert(code, 10, value);
        assert_eq!(database.get(code, 10), None);

        database.clear();
        assert!(database.is_empty());
        Ok(())
    }

    #[test]
    pub fn opening_book() -> Result<()> {
        let board = Board::from_moves("12345671")?;
        let mut text = OpeningBook::format_line(&board, Outcome::Win);
        text.push_str(&OpeningBook::format_line(&mirror(&board), Outcome::Win));

        let book = OpeningBook::parse(Cursor::new(text.clone()))?;
        assert_eq!(book.len(), 2);
        assert_eq!(book.entries()[0].0, BitBoard::encode(&board));
        assert_eq!(book.entries()[0].1.outcome(), Outcome::Win);

        let database = PositionDatabase::new();
        let state = database.ensure_opening_book_with(|| OpeningBook::parse(Cursor::new(text)));
        assert_eq!(state, BookState::Loaded(2));
        assert!(database.book_loaded());

        let code = BitBoard::encode(&board);
        assert_eq!(database.get(code, 8).map(|v| v.outcome()), Some(Outcome::Win));
        assert_eq!(
            database.get(BitBoard::flip(code), 8).map(|v| v.outcome()),
            Some(Outcome::Win)
        );

        // only the first attempt loads anything
        let called = Flag::new(false);
        let state = database.ensure_opening_book_with(|| {
            called.set(true);
            Err(anyhow!("loaded twice"))
        });
        assert_eq!(state, BookState::Loaded(2));
        assert!(!called.get());
        Ok(())
    }

    #[test]
    pub fn malformed_opening_book() -> Result<()> {
        let board = Board::from_moves("12345671")?;
        let good = OpeningBook::format_line(&board, Outcome::Draw);

        let bad_outcome = good.replace("1\n", "X\n");
        assert!(OpeningBook::parse(Cursor::new(bad_outcome.clone())).is_err());

        let short_line = format!("{}R  1\n", &good[..10]);
        assert!(OpeningBook::parse(Cursor::new(short_line)).is_err());

        let seven_pieces = OpeningBook::format_line(&Board::from_moves("1234567")?, Outcome::Draw);
        assert!(OpeningBook::parse(Cursor::new(seven_pieces)).is_err());

        // one bad line rejects the whole book
        let database = PositionDatabase::new();
        let mixed = format!("{}{}", good, bad_outcome);
        let state = database.ensure_opening_book_with(|| OpeningBook::parse(Cursor::new(mixed)));
        assert_eq!(state, BookState::Failed);
        assert!(database.is_empty());

        let database = PositionDatabase::new();
        assert_eq!(database.ensure_opening_book(MISSING_BOOK), BookState::Failed);
        assert_eq!(database.book_state(), BookState::Failed);
        Ok(())
    }

    #[test]
    pub fn interrupt_hierarchy() -> Result<()> {
        let parent = Interrupt::new();
        let child = parent.child();
        let grandchild = child.child();

        child.stop();
        assert!(grandchild.is_stopped());
        assert!(!parent.is_stopped());

        child.reset();
        parent.stop();
        assert!(child.is_stopped() && grandchild.is_stopped());
        child.reset();
        assert!(child.is_stopped());
        Ok(())
    }

    #[test]
    pub fn exact_search_matches_minimax() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(1234);
        let database = Arc::new(PositionDatabase::new());
        let mut solved = 0;

        while solved < 16 {
            let plies = 33 + solved % 2;
            let board = match random_board(&mut rng, plies, false) {
                Some(board) => board,
                None => continue,
            };
            let mover = board.side_to_move();
            let sign = if mover.is_red() { 1 } else { -1 };
            let expected = match sign * negamax(&board, mover) {
                1 => Outcome::Win,
                0 => Outcome::Draw,
                _ => Outcome::Loss,
            };

            let mut searcher = ExactSearcher::new(database.clone(), Interrupt::new());
            let value = searcher.solve(&BitBoard::from_board(&board));
            assert_eq!(value.outcome(), expected, "{}", board.to_columns());

            // the mirror image shares database entries and must agree
            let mut searcher = ExactSearcher::new(database.clone(), Interrupt::new());
            let value = searcher.solve(&BitBoard::from_board(&mirror(&board)));
            assert_eq!(value.outcome(), expected);
            solved += 1;
        }
        Ok(())
    }

    #[test]
    pub fn covering_search_is_sound() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut proven = 0;

        while proven < 24 {
            let board = match random_board(&mut rng, 32 + proven % 2, false) {
                Some(board) => board,
                None => continue,
            };
            let mover = board.side_to_move();
            let least = if mover.is_red() {
                MoveSmartness::AllSolved
            } else {
                MoveSmartness::AllSolvedWin
            };

            for col in 0..WIDTH {
                let mut next = board;
                let row = match next.play(col, mover) {
                    Ok(row) => row,
                    Err(_) => continue,
                };
                // immediate wins are handled before any covering search
                let opponent = BoardExt::new(next, mover.other());
                let direct_win = (0..WIDTH).any(|c| {
                    opponent
                        .playable_row(c)
                        .map_or(false, |r| opponent.has_level3_winning_threat(c, r))
                });
                if next.completes_line(col, row) || direct_win {
                    continue;
                }

                let verdict = MoveSimulator::new(next, mover, least, Interrupt::new()).simulate();
                if verdict >= MoveSmartness::AllSolved {
                    assert!(negamax(&next, mover.other()) <= 0, "{}", next.to_columns());
                    proven += 1;
                }
            }
        }
        Ok(())
    }

    #[test]
    pub fn database_bounds_follow_the_window() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(36);

        for &(plies, bound) in [(36, Outcome::DrawWin), (33, Outcome::DrawLoss)].iter() {
            let board = quiet_board(&mut rng, plies);
            let position = BitBoard::from_board(&board);
            let (code, red, yellow) = (position.code(), position.red(), position.yellow());
            let exact = exact_outcome(&position);

            let database = Arc::new(PositionDatabase::new());
            let stored = PositionValue::new(bound, 20);
            let mut searcher = ExactSearcher::new(database.clone(), Interrupt::new());

            // a window that fails on the bound anyway takes it as it is
            let (closed, open) = if bound == Outcome::DrawWin {
                ((Outcome::Loss, Outcome::Draw), (Outcome::Draw, Outcome::Win))
            } else {
                ((Outcome::Draw, Outcome::Win), (Outcome::Loss, Outcome::Draw))
            };
            database.insert(code, plies, stored);
            assert_eq!(
                searcher.alpha_beta(code, red, yellow, closed.0, closed.1),
                PositionValue::new(bound, 21)
            );

            // otherwise the position is searched again, even when the bound
            // lies on the side the mover hopes for
            database.insert(code, plies, stored);
            let value = searcher.alpha_beta(code, red, yellow, open.0, open.1);
            assert!(value.depth() < 20, "{:?}", value);

            database.insert(code, plies, stored);
            let value = searcher.alpha_beta(code, red, yellow, Outcome::Loss, Outcome::Win);
            assert_eq!(value.outcome(), exact, "{}", board.to_columns());
        }
        Ok(())
    }

    #[test]
    pub fn search_stores_proven_values() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(26);
        let mut checked = 0;
        let mut relabelled = 0;

        for _ in 0..300 {
            if checked >= 30 && relabelled > 0 {
                break;
            }
            let board = match random_board(&mut rng, 26, false) {
                Some(board) => board,
                None => continue,
            };
            let database = Arc::new(PositionDatabase::new());
            let root = ExactSearcher::new(database.clone(), Interrupt::new())
                .solve(&BitBoard::from_board(&board));
            assert!(!root.is_unknown());

            let mut stored = 0;
            for piece_count in 0..=WIDTH * HEIGHT {
                for (code, value) in database.entries(piece_count) {
                    let position = BitBoard::new(code);
                    assert_eq!(position.piece_count(), piece_count);
                    assert_eq!(piece_count % 3, 0);
                    assert!(piece_count > board.piece_count());
                    assert!(value.depth() > MIN_STORED_DEPTH + 1);

                    let exact = exact_outcome(&position);
                    let layout = position.to_board().to_columns();
                    match value.outcome() {
                        // cut off at a draw with moves left to try
                        Outcome::DrawWin => {
                            assert!(exact >= Outcome::Draw, "{}", layout);
                            relabelled += 1;
                        }
                        Outcome::DrawLoss => {
                            assert!(exact <= Outcome::Draw && exact != Outcome::Unknown, "{}", layout);
                            relabelled += 1;
                        }
                        outcome => assert_eq!(outcome, exact, "{}", layout),
                    }
                    stored += 1;
                }
            }
            assert_eq!(stored, database.len());
            checked += stored;
        }
        assert!(checked >= 30);
        assert!(relabelled > 0);
        Ok(())
    }

    #[test]
    pub fn stopped_search_is_unknown() -> Result<()> {
        let interrupt = Interrupt::new();
        interrupt.stop();
        let mut searcher = ExactSearcher::new(Arc::new(PositionDatabase::new()), interrupt);
        let value = searcher.solve(&BitBoard::from_board(&Board::from_moves("4444")?));
        assert!(value.is_unknown());
        Ok(())
    }

    #[test]
    pub fn combination_rules() -> Result<()> {
        let claim_even = |col: usize| {
            let mut solution = ThreatSolution::new(SolutionKind::ClaimEven);
            solution.add_square(Square::new(col, 1));
            solution.add_square(Square::new(col, 0));
            solution
        };
        let first = claim_even(0);
        assert_eq!(first.squares()[0], Square::new(0, 0));
        assert!(!first.can_combine(&claim_even(0)));
        assert!(first.can_combine(&claim_even(1)));

        let mut inverse = ThreatSolution::new(SolutionKind::LowInverse);
        for &(col, row) in [(2, 2), (2, 3), (3, 2), (3, 3)].iter() {
            inverse.add_square(Square::new(col, row));
        }
        // no claimeven below the inverse
        assert!(!inverse.can_combine(&claim_even(2)));
        assert!(!claim_even(3).can_combine(&inverse));
        assert!(inverse.can_combine(&claim_even(4)));

        let mut above = ThreatSolution::new(SolutionKind::ClaimEven);
        above.add_square(Square::new(2, 4));
        above.add_square(Square::new(2, 5));
        assert!(inverse.can_combine(&above));

        let before = |special: bool| {
            let mut columns = BeforeColumns::default();
            if special {
                columns.add_special_column(5);
            }
            let mut solution = ThreatSolution::new(SolutionKind::Before(columns));
            solution.add_square(Square::new(5, 2));
            solution.add_square(Square::new(5, 3));
            solution
        };
        // equal squares in a shared column are fine unless the column is special
        assert!(before(false).can_combine(&before(false)));
        assert!(!before(true).can_combine(&before(false)));
        assert!(!before(false).can_combine(&before(true)));

        let after = ThreatSolution::new(SolutionKind::AfterVertical);
        assert!(after.wins());
        assert!(!first.wins());
        Ok(())
    }

    #[test]
    pub fn threat_scan() -> Result<()> {
        let board = Board::from_moves("112237")?;

        let red = BoardExt::new(board, Color::Red);
        assert!(red.has_level3_winning_threat(3, 0));
        assert!(!red.has_level3_threat(3, 0));
        assert_eq!(red.playable_row(0), Some(2));
        assert!(red.winning_threats().iter().any(|threat| threat.level() == 3));
        for threat in red.winning_threats() {
            assert!(threat
                .squares()
                .iter()
                .all(|s| board.get(s.col, s.row) != Cell::Yellow));
        }

        let yellow = BoardExt::new(board, Color::Yellow);
        assert!(yellow.has_level3_threat(3, 0));
        for threat in yellow.threats() {
            assert!(threat
                .squares()
                .iter()
                .all(|s| board.get(s.col, s.row) != Cell::Yellow));
        }
        Ok(())
    }

    #[test]
    pub fn empty_board_opens_in_the_centre() -> Result<()> {
        let player = perfect_player(Color::Red)?;
        let decision = player
            .decide(&Board::new(), &Interrupt::new())
            .ok_or(anyhow!("no decision"))?;

        assert_eq!(decision.column, 3);
        assert_eq!(decision.reason, DecisionReason::OpeningMove);
        assert_eq!(player.database().book_state(), BookState::Failed);
        Ok(())
    }

    #[test]
    pub fn takes_the_win() -> Result<()> {
        // red holds the bottom of columns 1 to 3
        let board = Board::from_moves("112237")?;
        let mut player = perfect_player(Color::Red)?;
        let decision = player
            .decide(&board, &Interrupt::new())
            .ok_or(anyhow!("no decision"))?;
        assert_eq!(decision.column, 3);
        assert_eq!(decision.reason, DecisionReason::WinningMove);
        assert_eq!(player.choose_move(&board, &Interrupt::new()), Some(3));

        let mut random = RandomPlayer::with_seed(Color::Red, 3);
        assert_eq!(random.choose_move(&board, &Interrupt::new()), Some(3));
        Ok(())
    }

    #[test]
    pub fn blocks_the_loss() -> Result<()> {
        // yellow stacks three in column 6
        let board = Board::from_moves("161676")?;
        let player = perfect_player(Color::Red)?;
        let decision = player
            .decide(&board, &Interrupt::new())
            .ok_or(anyhow!("no decision"))?;
        assert_eq!(decision.column, 5);
        assert_eq!(decision.reason, DecisionReason::BlockingMove);

        for seed in 0..8 {
            let mut random = RandomPlayer::with_seed(Color::Red, seed);
            assert_eq!(random.choose_move(&board, &Interrupt::new()), Some(5));
        }
        Ok(())
    }

    #[test]
    pub fn stopped_player_decides_nothing() -> Result<()> {
        let interrupt = Interrupt::new();
        interrupt.stop();
        let player = perfect_player(Color::Yellow)?;
        assert!(player.decide(&Board::from_moves("4")?, &interrupt).is_none());

        let mut random = RandomPlayer::with_seed(Color::Yellow, 0);
        assert_eq!(random.choose_move(&Board::from_moves("4")?, &interrupt), None);
        Ok(())
    }

    #[test]
    pub fn chance_player_checks_its_fraction() -> Result<()> {
        assert!(ChancePlayer::new(perfect_player(Color::Red)?, 3, 2).is_err());
        assert!(ChancePlayer::new(perfect_player(Color::Red)?, 1, 0).is_err());

        // never thinks, so it plays like a random player
        let mut chance = ChancePlayer::new(perfect_player(Color::Red)?, 0, 1)?;
        assert_eq!(chance.color(), Color::Red);
        assert_eq!(
            chance.choose_move(&Board::from_moves("161676")?, &Interrupt::new()),
            Some(5)
        );
        Ok(())
    }

    #[test]
    pub fn odd_threat_solves_the_position() -> Result<()> {
        //  YR.YRYY
        //  RY.RRRY
        //  YR.RYRR
        //  YYYRRYR
        //  YYRYYRR
        //  RYRRRYY
        let board = Board::from_columns("RYYYRYYYYRYRRRY   RYRRRYRYRYRRYRYRRYYRRRYY")?;
        assert_eq!(board.side_to_move(), Color::Yellow);

        let mut ext = BoardExt::new(board, Color::Red);
        assert!(ext.has_odd_threat());
        assert_eq!(
            ext.odd_threat(),
            Some(OddThreat {
                first: Square::new(2, 4),
                second: None,
            })
        );
        assert!(!BoardExt::new(board, Color::Yellow).has_odd_threat());

        let mut simulator = MoveSimulator::new(board, Color::Red, MoveSmartness::AllSolved, Interrupt::new());
        assert!(simulator.simulate() >= MoveSmartness::AllSolved);
        Ok(())
    }

    #[test]
    pub fn mirrored_moves_get_equal_verdicts() -> Result<()> {
        //  ...Y...
        //  .R.R.R.
        //  .Y.Y.Y.
        //  RRRYRRR
        //  YRYYYRY
        let board = Board::from_columns("YR    RRYR  YR    YYYRY YR    RRYR  YR    ")?;
        assert_eq!(board, mirror(&board));
        assert_eq!(board.side_to_move(), Color::Yellow);

        let ext = BoardExt::new(board, Color::Yellow);
        let verdict = |col: usize| {
            MoveSimulator::new(
                ext.do_move(col, Color::Yellow),
                Color::Yellow,
                MoveSmartness::AllSolvedWin,
                Interrupt::new(),
            )
            .simulate()
        };
        for col in 0..WIDTH / 2 {
            let (left, right) = (verdict(col), verdict(WIDTH - 1 - col));
            assert_ne!(left, MoveSmartness::Unknown);
            assert_eq!(left, right, "columns {} and {}", col, WIDTH - 1 - col);
        }
        Ok(())
    }

    #[test]
    pub fn tree_search_tally() -> Result<()> {
        let win = |depth| PositionValue::new(Outcome::Win, depth);
        let loss = |depth| PositionValue::new(Outcome::Loss, depth);
        let draw = |depth| PositionValue::new(Outcome::Draw, depth);

        // a proven win ends the search for either colour
        let candidates = [1, 2, 4];
        let mut red = TreeSearchTally::new(&candidates, true);
        assert_eq!(red.record(2, draw(9)), None);
        assert_eq!(red.record(4, win(7)), Some((4, DecisionReason::TreeSearch)));
        let mut yellow = TreeSearchTally::new(&candidates, false);
        assert_eq!(yellow.record(1, win(7)), None);
        assert_eq!(yellow.record(4, loss(5)), Some((4, DecisionReason::TreeSearch)));

        // everything else lost, the last column is played unsearched
        let candidates = [0, 3, 5, 6];
        let mut tally = TreeSearchTally::new(&candidates, true);
        assert_eq!(tally.record(6, loss(4)), None);
        assert_eq!(tally.record(0, loss(2)), None);
        assert_eq!(tally.record(5, loss(8)), Some((3, DecisionReason::LastRemaining)));
        assert_eq!(tally.reported(), 3);
        assert_eq!(tally.values()[3], None);

        // an unknown value is better than a loss, so it isn't the last one
        let mut tally = TreeSearchTally::new(&candidates, true);
        assert_eq!(tally.record(0, loss(2)), None);
        assert_eq!(tally.record(3, PositionValue::unknown()), None);
        assert_eq!(tally.record(5, loss(8)), None);
        assert_eq!(tally.record(6, loss(4)), None);
        assert_eq!(tally.best_columns(), vec![3]);

        // equal outcomes prefer the longest proof
        let candidates = [1, 2, 3, 6];
        let mut red = TreeSearchTally::new(&candidates, true);
        let mut yellow = TreeSearchTally::new(&candidates, false);
        for tally in [&mut red, &mut yellow].iter_mut() {
            assert_eq!(tally.record(1, draw(7)), None);
            assert_eq!(tally.record(2, draw(11)), None);
            assert_eq!(tally.record(3, PositionValue::new(Outcome::DrawLoss, 13)), None);
            assert_eq!(tally.record(6, draw(11)), None);
        }
        assert_eq!(red.best_columns(), vec![2, 6]);
        assert_eq!(yellow.best_columns(), vec![3]);
        assert!(TreeSearchTally::new(&candidates, true).best_columns().is_empty());
        Ok(())
    }

    /// Decides for red on a 32-piece position the covering search can't settle
    fn tree_searched(layout: &str) -> Result<(Decision, Vec<StatusUpdate>)> {
        let board = Board::from_columns(layout)?;
        assert_eq!(board.side_to_move(), Color::Red);

        let (tx, rx) = channel();
        let player = perfect_player(Color::Red)?.with_status(tx);
        let decision = player
            .decide(&board, &Interrupt::new())
            .ok_or(anyhow!("no decision"))?;
        let updates = rx.try_iter().collect();
        Ok((decision, updates))
    }

    #[test]
    pub fn tree_search_picks_the_deepest_draw() -> Result<()> {
        let (decision, updates) = tree_searched("RRYYRRYYYRYYRRY   RYRYR RYYRR Y     RRYRYY")?;
        assert_eq!(decision.reason, DecisionReason::TreeSearch);
        assert!([3, 4, 5].contains(&decision.column));

        let values: Vec<PositionValue> = [3, 4, 5]
            .iter()
            .map(|&col| decision.values[col].ok_or(anyhow!("column {} not searched", col)))
            .collect::<Result<_>>()?;
        assert!(values.iter().all(|v| v.outcome() == Outcome::Draw));
        let deepest = values.iter().map(|v| v.depth()).max();
        assert_eq!(decision.values[decision.column].map(|v| v.depth()), deepest);
        assert!(decision.values[0].is_none() && decision.verdicts[0] < MoveSmartness::NotAllSolved);

        let searching = StatusUpdate {
            phase: Phase::TreeSearching,
            progress: Some(100),
        };
        assert!(updates.contains(&searching));
        assert_eq!(updates.last().map(|u| u.phase), Some(Phase::Done));
        Ok(())
    }

    #[test]
    pub fn tree_search_plays_the_last_remaining_column() -> Result<()> {
        // every candidate loses, so the fourth is never waited for
        let (decision, _) = tree_searched("YYYRY R     RYRYYRYRYY  YYYR  RRYRRRRYRRYR")?;
        assert_eq!(decision.reason, DecisionReason::LastRemaining);
        assert!([0, 1, 3, 4].contains(&decision.column));
        assert_eq!(decision.values[decision.column], None);

        let searched: Vec<usize> = (0..WIDTH).filter(|&c| decision.values[c].is_some()).collect();
        assert_eq!(searched.len(), 3);
        for col in searched {
            assert_eq!(decision.values[col].map(|v| v.outcome()), Some(Outcome::Loss));
        }
        Ok(())
    }

    #[test]
    pub fn tree_search_stops_on_a_win() -> Result<()> {
        let (decision, _) = tree_searched("YRYYYRRYRRRYRYYRRYRRYRYRY     RYY   YYRR  ")?;
        assert_eq!(decision.reason, DecisionReason::TreeSearch);
        assert!([5, 6].contains(&decision.column));
        assert_eq!(
            decision.values[decision.column].map(|v| v.outcome()),
            Some(Outcome::Win)
        );
        assert_eq!(decision.verdicts[5], MoveSmartness::NotAllSolved);
        assert_eq!(decision.verdicts[6], MoveSmartness::NeedsTreeSearch);
        Ok(())
    }

    #[test]
    pub fn stopped_tree_search_decides_nothing() -> Result<()> {
        let board = Board::from_columns("RRYYRRYYYRYYRRY   RYRYR RYYRR Y     RRYRYY")?;
        let interrupt = Interrupt::new();
        interrupt.stop();
        let player = perfect_player(Color::Red)?;
        let ext = BoardExt::new(board, Color::Red);
        assert!(player.tree_search(&ext, &[3, 4, 5], &interrupt).is_none());
        Ok(())
    }

    #[test]
    pub fn red_needs_an_answer_to_every_yellow_reply() -> Result<()> {
        let judge = |board: Board| {
            MoveSimulator::new(board, Color::Red, MoveSmartness::AllSolved, Interrupt::new()).simulate()
        };
        let yellow_reply = |board: Board, col: usize| {
            let ext = BoardExt::new(board, Color::Yellow);
            MoveSimulator::new(
                ext.do_move(col, Color::Yellow),
                Color::Yellow,
                MoveSmartness::AllSolved,
                Interrupt::new(),
            )
            .simulate()
        };

        // too early to try any rule, even against an open three
        let early = Board::from_moves("7172637")?;
        assert!(!BoardExt::new(early, Color::Red).has_odd_threat());
        assert!(BoardExt::new(early, Color::Red).has_level3_threat(3, 0));
        assert_eq!(judge(early), MoveSmartness::NeedsTreeSearch);

        // yellow completes a line on a playable square
        let open_three = Board::from_columns("R     Y           YRRY  Y     YRR   RRY   ")?;
        assert_eq!(open_three.side_to_move(), Color::Yellow);
        assert_eq!(judge(open_three), MoveSmartness::NotAllSolved);

        // yellow's covering search claims column 3 but red wins on top of it
        let win_on_top = Board::from_columns("RRY   RRRY  RYR   YY    RYYR  YR    Y     ")?;
        let red = BoardExt::new(win_on_top, Color::Red);
        assert_eq!(red.playable_row(3), Some(2));
        assert!(red.has_level3_winning_threat(3, 3));
        assert!(yellow_reply(win_on_top, 3) >= MoveSmartness::AllSolved);
        assert_eq!(judge(win_on_top), MoveSmartness::NeedsTreeSearch);

        // red wins in column 6 whatever yellow does in column 4
        let two_wins = Board::from_columns("RYRR  YRYRYYYYR   YYRYRYRRR   YRYYRYRRR   ")?;
        let red = BoardExt::new(two_wins, Color::Red);
        assert!(red.has_level3_winning_threat(4, 3));
        assert!(red.has_level3_winning_threat(6, 3));
        assert!(yellow_reply(two_wins, 4) >= MoveSmartness::AllSolved);
        assert_eq!(judge(two_wins), MoveSmartness::NeedsTreeSearch);
        Ok(())
    }

    #[test]
    pub fn special_before_keeps_the_square_above() -> Result<()> {
        // red plays the second column and wins above it either way
        for layout in [
            "YRYY  YRR   RYRYRRRRRYYYYRYY  YYYRR RRYYRR",
            "RYRRRYYYYRRYYRR   YYRYYYR     RRYRYYRYRRRY",
        ]
        .iter()
        {
            let board = Board::from_columns(layout)?;
            assert_eq!(board.side_to_move(), Color::Red);
            assert_eq!(negamax(&board, Color::Red), 1, "{}", layout);

            let verdict = MoveSimulator::new(
                board,
                Color::Yellow,
                MoveSmartness::AllSolvedWin,
                Interrupt::new(),
            )
            .simulate();
            assert_eq!(verdict, MoveSmartness::NotAllSolved, "{}", layout);
        }
        Ok(())
    }
}
