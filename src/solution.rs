//! The tactical patterns that neutralize threats, and which of them can be
//! played together

use crate::threat::Square;
use crate::WIDTH;

/// Extra bookkeeping of the Before patterns, one bit per column
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BeforeColumns {
    claim_even: u8,
    special: u8,
}

impl BeforeColumns {
    pub fn use_claim_even_in(&mut self, col: usize) {
        self.claim_even |= 1 << col;
    }

    pub fn claim_even_used_in(&self, col: usize) -> bool {
        self.claim_even & (1 << col) != 0
    }

    pub fn add_special_column(&mut self, col: usize) {
        self.special |= 1 << col;
    }

    pub fn is_special_column(&self, col: usize) -> bool {
        self.special & (1 << col) != 0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SolutionKind {
    ClaimEven,
    BaseInverse,
    Vertical,
    AfterEven,
    LowInverse,
    HighInverse,
    BaseClaim,
    Before(BeforeColumns),
    SpecialBefore(BeforeColumns),
    AfterBaseInverse,
    AfterVertical,
}

impl SolutionKind {
    /// Position of the kind in the combination table
    pub fn index(&self) -> usize {
        match self {
            SolutionKind::ClaimEven => 0,
            SolutionKind::BaseInverse => 1,
            SolutionKind::Vertical => 2,
            SolutionKind::AfterEven => 3,
            SolutionKind::LowInverse => 4,
            SolutionKind::HighInverse => 5,
            SolutionKind::BaseClaim => 6,
            SolutionKind::Before(_) => 7,
            SolutionKind::SpecialBefore(_) => 8,
            SolutionKind::AfterBaseInverse => 9,
            SolutionKind::AfterVertical => 10,
        }
    }

    pub fn always_wins(&self) -> bool {
        matches!(
            self,
            SolutionKind::AfterEven | SolutionKind::AfterBaseInverse | SolutionKind::AfterVertical
        )
    }

    pub fn is_inverse(&self) -> bool {
        matches!(self, SolutionKind::LowInverse | SolutionKind::HighInverse)
    }

    pub fn before_columns(&self) -> Option<&BeforeColumns> {
        match self {
            SolutionKind::Before(columns) | SolutionKind::SpecialBefore(columns) => Some(columns),
            _ => None,
        }
    }
}

const SC1: u8 = 1;
const SC2: u8 = 2;
const SC3: u8 = 4;
const SC4: u8 = 8;

/// Rules two solutions must satisfy to be combined, indexed by
/// `[max(kind)][min(kind)]`.
///
/// * `SC1`: no shared square
/// * `SC2`: no claimeven below the start of an inverse
/// * `SC3`: in every shared column the squares are disjoint or equal
/// * `SC4`: no shared square, and the inverses use the same columns or none
#[rustfmt::skip]
const COMBINATION_RULES: [[u8; 11]; 11] = [
    /*         CL    BI   VE   AE        LI        HI        BC   BE   SB   AB   AV */
    /* CL */ [SC1, 0,   0,   0,        0,        0,        0,   0,   0,   0,   0  ],
    /* BI */ [SC1, SC1, 0,   0,        0,        0,        0,   0,   0,   0,   0  ],
    /* VE */ [SC1, SC1, SC1, 0,        0,        0,        0,   0,   0,   0,   0  ],
    /* AE */ [SC1, SC1, SC1, SC3,      0,        0,        0,   0,   0,   0,   0  ],
    /* LI */ [SC2, SC1, SC1, SC1 | SC2, SC4,     0,        0,   0,   0,   0,   0  ],
    /* HI */ [SC2, SC1, SC1, SC1 | SC2, SC4,     SC4,      0,   0,   0,   0,   0  ],
    /* BC */ [SC1, SC1, SC1, SC1,      SC1 | SC2, SC1 | SC2, SC1, 0,   0,   0,   0  ],
    /* BE */ [SC1, SC1, SC1, SC3,      SC2 | SC3, SC1 | SC2, SC1, SC3, 0,   0,   0  ],
    /* SB */ [SC1, SC1, SC1, SC3,      SC2 | SC3, SC1 | SC2, SC1, SC3, SC3, 0,   0  ],
    /* AB */ [SC1, SC1, SC1, SC1,      SC1,      SC1,      SC1, SC1, SC1, SC1, 0  ],
    /* AV */ [SC1, SC1, SC1, SC1,      SC1,      SC1,      SC1, SC1, SC1, SC1, SC1],
];

/// One instance of a pattern: the squares it claims, the threats it refutes
/// and whether playing it out wins the game
#[derive(Clone, Debug)]
pub struct ThreatSolution {
    kind: SolutionKind,
    // sorted by column, then row, without duplicates
    squares: Vec<Square>,
    solved: Vec<usize>,
    wins: bool,
    pub conflicts: Vec<usize>,
}

impl ThreatSolution {
    pub fn new(kind: SolutionKind) -> Self {
        Self {
            kind,
            squares: Vec::with_capacity(4),
            solved: Vec::new(),
            wins: kind.always_wins(),
            conflicts: Vec::new(),
        }
    }

    pub fn kind(&self) -> SolutionKind {
        self.kind
    }

    pub fn squares(&self) -> &[Square] {
        &self.squares
    }

    pub fn solved(&self) -> &[usize] {
        &self.solved
    }

    pub fn wins(&self) -> bool {
        self.wins
    }

    pub fn make_game_winner(&mut self) {
        self.wins = true;
    }

    pub fn add_square(&mut self, square: Square) {
        if let Err(pos) = self.squares.binary_search(&square) {
            self.squares.insert(pos, square);
        }
    }

    pub fn add_solved(&mut self, threat: usize) {
        if !self.solved.contains(&threat) {
            self.solved.push(threat);
        }
    }

    pub fn add_all_solved<I: IntoIterator<Item = usize>>(&mut self, threats: I) {
        for threat in threats {
            self.add_solved(threat);
        }
    }

    /// Rows used in a column, one bit per row
    pub fn column_rows(&self, col: usize) -> u8 {
        self.squares
            .iter()
            .filter(|square| square.col == col)
            .fold(0, |rows, square| rows | 1 << square.row)
    }

    /// Columns used, one bit per column
    pub fn columns(&self) -> u8 {
        self.squares
            .iter()
            .fold(0, |cols, square| cols | 1 << square.col)
    }

    pub fn lowest_square_in_col(&self, col: usize) -> Option<Square> {
        self.squares.iter().copied().find(|square| square.col == col)
    }

    /// Whether both solutions use a common square
    pub fn interferes(&self, other: &ThreatSolution) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.squares.len() && j < other.squares.len() {
            match self.squares[i].cmp(&other.squares[j]) {
                std::cmp::Ordering::Equal => return true,
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
            }
        }
        false
    }

    /// Whether a column used by both holds squares that are neither disjoint
    /// nor equal. Special columns of a Before must be disjoint.
    pub fn interferes_column_wise(&self, other: &ThreatSolution) -> bool {
        (0..WIDTH).any(|col| {
            let (mine, theirs) = (self.column_rows(col), other.column_rows(col));
            if mine & theirs == 0 {
                return false;
            }
            let special = |solution: &ThreatSolution| {
                solution
                    .kind
                    .before_columns()
                    .map_or(false, |columns| columns.is_special_column(col))
            };
            mine != theirs || special(self) || special(other)
        })
    }

    /// No claimeven may sit below the start squares of an inverse. `self` is
    /// the inverse.
    fn leaves_inverse_open(&self, other: &ThreatSolution) -> bool {
        let upper_row_delta = if self.kind == SolutionKind::LowInverse {
            1
        } else {
            2
        };
        let starts: Vec<Square> = (0..WIDTH)
            .filter_map(|col| self.lowest_square_in_col(col))
            .collect();
        let below_start = |square: Square| {
            starts
                .iter()
                .any(|start| start.col == square.col && square.row <= start.row + upper_row_delta)
        };

        match other.kind {
            SolutionKind::ClaimEven => !below_start(other.squares[0]),
            SolutionKind::AfterEven => !other.squares.iter().any(|&square| below_start(square)),
            SolutionKind::BaseClaim => {
                // the claimeven is the lower square of the column used twice
                let lower = other
                    .squares
                    .windows(2)
                    .find(|pair| pair[0].col == pair[1].col)
                    .map(|pair| pair[0]);
                lower.map_or(true, |square| !below_start(square))
            }
            SolutionKind::Before(columns) | SolutionKind::SpecialBefore(columns) => (0..WIDTH)
                .filter(|&col| columns.claim_even_used_in(col))
                .filter_map(|col| other.lowest_square_in_col(col))
                .all(|square| !below_start(square)),
            _ => true,
        }
    }

    pub fn can_combine(&self, other: &ThreatSolution) -> bool {
        let (a, b) = (self.kind.index(), other.kind.index());
        let rules = COMBINATION_RULES[a.max(b)][a.min(b)];

        if rules & SC1 != 0 && self.interferes(other) {
            return false;
        }
        if rules & SC2 != 0 {
            let open = if self.kind.is_inverse() {
                self.leaves_inverse_open(other)
            } else {
                other.leaves_inverse_open(self)
            };
            if !open {
                return false;
            }
        }
        if rules & SC3 != 0 && self.interferes_column_wise(other) {
            return false;
        }
        if rules & SC4 != 0 {
            let (mine, theirs) = (self.columns(), other.columns());
            if self.interferes(other) || (mine != theirs && mine & theirs != 0) {
                return false;
            }
        }
        true
    }
}
