use std::fmt;

/// Game-theoretic outcome from Red's point of view.
///
/// `DrawLoss` and `DrawWin` are bounds left behind by a cutoff: the true value
/// is a draw or worse for Red, respectively a draw or better.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Outcome {
    Unknown = 0,
    Loss = 1,
    DrawLoss = 2,
    Draw = 3,
    DrawWin = 4,
    Win = 5,
}

impl Outcome {
    fn from_bits(bits: u16) -> Self {
        match bits {
            1 => Outcome::Loss,
            2 => Outcome::DrawLoss,
            3 => Outcome::Draw,
            4 => Outcome::DrawWin,
            5 => Outcome::Win,
            _ => Outcome::Unknown,
        }
    }

    /// Win for the given side, expressed from Red's point of view
    pub fn win_for(red: bool) -> Self {
        if red {
            Outcome::Win
        } else {
            Outcome::Loss
        }
    }

    pub fn is_ambiguous(self) -> bool {
        matches!(self, Outcome::DrawLoss | Outcome::DrawWin)
    }
}

const OUTCOME_BITS: u16 = 3;
const OUTCOME_MASK: u16 = (1 << OUTCOME_BITS) - 1;

/// An outcome packed together with the search depth that established it
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct PositionValue(u16);

impl PositionValue {
    pub fn new(outcome: Outcome, depth: u16) -> Self {
        debug_assert!(depth < 1 << (16 - OUTCOME_BITS));
        Self(depth << OUTCOME_BITS | outcome as u16)
    }

    pub fn unknown() -> Self {
        Self(0)
    }

    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn outcome(self) -> Outcome {
        Outcome::from_bits(self.0 & OUTCOME_MASK)
    }

    pub fn depth(self) -> u16 {
        self.0 >> OUTCOME_BITS
    }

    pub fn is_unknown(self) -> bool {
        self.outcome() == Outcome::Unknown
    }
}

impl fmt::Debug for PositionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.outcome(), self.depth())
    }
}
