//! Tristate gate logic.
//!
//! Gate evaluation can succeed (`True`/`False`) or be undecidable (`Fail`,
//! e.g. a required context fact is missing). `Fail` must behave as a
//! non-match everywhere a gate result is consumed: release decisions fail
//! closed, never open.

use serde::{Deserialize, Serialize};

/// The result of evaluating a matcher as a release gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tristate {
    /// The gate matched.
    True,
    /// The gate did not match.
    False,
    /// The gate could not be evaluated (missing context). Treated as a
    /// non-match at every consuming site.
    Fail,
}

impl Default for Tristate {
    /// Defaults to `Fail` (safe default: undecided is a non-match).
    fn default() -> Self {
        Self::Fail
    }
}

impl Tristate {
    /// Maps a boolean onto `True`/`False`.
    pub fn from_bool(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }

    /// Collapses to a boolean, mapping `Fail` to `false`.
    ///
    /// This is the only sanctioned boolean conversion: undecided gates deny.
    pub fn is_true(self) -> bool {
        matches!(self, Self::True)
    }

    /// Logical negation. `Fail` stays `Fail`: negating "could not decide"
    /// does not make it decidable.
    pub fn negate(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Fail => Self::Fail,
        }
    }
}
