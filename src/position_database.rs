use log::{info, warn};
use parking_lot::{Mutex, RwLock};

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;

use crate::bitboard::BitBoard;
use crate::opening_database::{OpeningBook, DATABASE_PIECES};
use crate::position_value::PositionValue;

/// One bucket for the opening book plus one per multiple of three in 9..=39
pub const NUM_BUCKETS: usize = 12;

/// Searched values are only worth keeping above this depth
pub const MIN_STORED_DEPTH: u16 = 3;

/// Whether the opening book has been brought into the store
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BookState {
    NotLoaded,
    Loaded(usize),
    Failed,
}

/// Proven position values shared by every search of a game.
///
/// Keys are canonical codes, so a position and its mirror image share an
/// entry. Each piece-count bucket is locked on its own.
pub struct PositionDatabase {
    buckets: Vec<RwLock<HashMap<u64, PositionValue>>>,
    book: Mutex<BookState>,
}

impl PositionDatabase {
    pub fn new() -> Self {
        Self {
            buckets: (0..NUM_BUCKETS).map(|_| RwLock::new(HashMap::new())).collect(),
            book: Mutex::new(BookState::NotLoaded),
        }
    }

    /// Bucket holding positions with the given number of pieces, if any
    pub fn bucket_index(piece_count: usize) -> Option<usize> {
        if piece_count == DATABASE_PIECES {
            Some(0)
        } else if (9..=39).contains(&piece_count) && piece_count % 3 == 0 {
            Some(piece_count / 3 - 2)
        } else {
            None
        }
    }

    /// Whether a searched value is kept
    pub fn should_store(piece_count: usize, depth: u16) -> bool {
        piece_count > DATABASE_PIECES && piece_count % 3 == 0 && depth > MIN_STORED_DEPTH
    }

    pub fn get(&self, code: u64, piece_count: usize) -> Option<PositionValue> {
        let bucket = Self::bucket_index(piece_count)?;
        self.buckets[bucket]
            .read()
            .get(&BitBoard::canonical(code))
            .copied()
    }

    pub fn insert(&self, code: u64, piece_count: usize, value: PositionValue) {
        if let Some(bucket) = Self::bucket_index(piece_count) {
            self.buckets[bucket]
                .write()
                .insert(BitBoard::canonical(code), value);
        }
    }

    /// Canonical codes and values stored for one piece count
    pub fn entries(&self, piece_count: usize) -> Vec<(u64, PositionValue)> {
        match Self::bucket_index(piece_count) {
            Some(bucket) => self.buckets[bucket]
                .read()
                .iter()
                .map(|(&code, &value)| (code, value))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry, including the opening book
    pub fn clear(&self) {
        let mut book = self.book.lock();
        for bucket in self.buckets.iter() {
            bucket.write().clear();
        }
        *book = BookState::NotLoaded;
    }

    pub fn book_state(&self) -> BookState {
        *self.book.lock()
    }

    pub fn book_loaded(&self) -> bool {
        matches!(self.book_state(), BookState::Loaded(_))
    }

    /// Loads the opening book from a file unless an earlier call already tried
    pub fn ensure_opening_book<P: AsRef<Path>>(&self, path: P) -> BookState {
        self.ensure_opening_book_with(|| OpeningBook::load(path))
    }

    /// Runs `load` at most once per store and seeds the 8-piece bucket with
    /// its entries. Concurrent callers wait for the first one to finish.
    pub fn ensure_opening_book_with<F>(&self, load: F) -> BookState
    where
        F: FnOnce() -> Result<OpeningBook>,
    {
        let mut book = self.book.lock();
        if *book != BookState::NotLoaded {
            return *book;
        }

        *book = match load() {
            Ok(opening_book) => {
                let mut bucket = self.buckets[0].write();
                bucket.reserve(opening_book.len());
                for &(code, value) in opening_book.entries() {
                    bucket.insert(BitBoard::canonical(code), value);
                }
                info!("Loaded {} opening positions", opening_book.len());
                BookState::Loaded(opening_book.len())
            }
            Err(err) => {
                warn!("Opening database unavailable, searching without it: {:#}", err);
                BookState::Failed
            }
        };
        *book
    }
}

impl Default for PositionDatabase {
    fn default() -> Self {
        Self::new()
    }
}
