//! Flash intensity levels.
//!
//! The flash exposes five discrete brightness steps. [`Intensity`] can only hold
//! a value in `1..=5`; anything else coming from callers or from the hardware
//! has to go through [`Intensity::new`] and is rejected there.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lowest selectable level.
pub const MIN_LEVEL: u8 = 1;
/// Highest selectable level.
pub const MAX_LEVEL: u8 = 5;

/// A validated intensity level in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Intensity(u8);

impl Intensity {
    /// Level used when nothing has been saved yet.
    pub const DEFAULT: Intensity = Intensity(MIN_LEVEL);

    /// Validate a raw level. Returns `None` outside `1..=5`.
    pub fn new(level: i64) -> Option<Self> {
        if (i64::from(MIN_LEVEL)..=i64::from(MAX_LEVEL)).contains(&level) {
            Some(Intensity(level as u8))
        } else {
            None
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Every level, lowest first.
    pub fn all() -> impl Iterator<Item = Intensity> {
        (MIN_LEVEL..=MAX_LEVEL).map(Intensity)
    }
}

impl Default for Intensity {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Intensity> for u8 {
    fn from(level: Intensity) -> Self {
        level.0
    }
}

/// Raw level that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidIntensity(pub i64);

impl fmt::Display for InvalidIntensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "intensity {} out of range {MIN_LEVEL}..={MAX_LEVEL}",
            self.0
        )
    }
}

impl std::error::Error for InvalidIntensity {}

impl TryFrom<i64> for Intensity {
    type Error = InvalidIntensity;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        Intensity::new(level).ok_or(InvalidIntensity(level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_full_range() {
        for level in 1..=5 {
            assert_eq!(Intensity::new(level).unwrap().get(), level as u8);
        }
    }

    #[test]
    fn rejects_out_of_range() {
        for level in [-1, 0, 6, 255, i64::MAX, i64::MIN] {
            assert_eq!(Intensity::new(level), None, "level {level}");
        }
    }

    #[test]
    fn default_is_lowest_level() {
        assert_eq!(Intensity::default().get(), 1);
    }

    #[test]
    fn all_yields_five_levels_in_order() {
        let levels: Vec<u8> = Intensity::all().map(Intensity::get).collect();
        assert_eq!(levels, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn try_from_reports_offending_value() {
        let err = Intensity::try_from(9).unwrap_err();
        assert_eq!(err, InvalidIntensity(9));
        assert_eq!(err.to_string(), "intensity 9 out of range 1..=5");
    }

    #[test]
    fn deserialize_rejects_out_of_range() {
        let ok: Intensity = serde_json::from_str("4").unwrap();
        assert_eq!(ok.get(), 4);
        assert!(serde_json::from_str::<Intensity>("0").is_err());
    }
}
