//! Payment rate tiers.
//!
//! Colle hours are paid at one of six rates, keyed by class level crossed
//! with the enrollment-size band. The tier of a colle is derived from the
//! class's enrollment at the time the colle is added to a release, not at
//! scheduling time, because enrollment can change in between.

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// Class level (CPGE year).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassLevel {
    FirstYear,
    SecondYear,
}

/// One of the six enumerated payment rate tiers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateTier {
    FirstYearUpTo20,
    FirstYearUpTo35,
    FirstYearOver35,
    SecondYearUpTo20,
    SecondYearUpTo35,
    SecondYearOver35,
}

impl RateTier {
    /// Derive the tier for a class. Band boundaries sit at 20 and 35
    /// students.
    pub fn for_class(level: ClassLevel, enrollment: u32) -> Self {
        match level {
            ClassLevel::FirstYear => {
                if enrollment <= 20 {
                    RateTier::FirstYearUpTo20
                } else if enrollment <= 35 {
                    RateTier::FirstYearUpTo35
                } else {
                    RateTier::FirstYearOver35
                }
            }
            ClassLevel::SecondYear => {
                if enrollment <= 20 {
                    RateTier::SecondYearUpTo20
                } else if enrollment <= 35 {
                    RateTier::SecondYearUpTo35
                } else {
                    RateTier::SecondYearOver35
                }
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RateTier::FirstYearUpTo20 => "1st year - up to 20 students",
            RateTier::FirstYearUpTo35 => "1st year - 21 to 35 students",
            RateTier::FirstYearOver35 => "1st year - over 35 students",
            RateTier::SecondYearUpTo20 => "2nd year - up to 20 students",
            RateTier::SecondYearUpTo35 => "2nd year - 21 to 35 students",
            RateTier::SecondYearOver35 => "2nd year - over 35 students",
        }
    }
}

impl ValueObject for RateTier {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_boundaries() {
        assert_eq!(
            RateTier::for_class(ClassLevel::FirstYear, 20),
            RateTier::FirstYearUpTo20
        );
        assert_eq!(
            RateTier::for_class(ClassLevel::FirstYear, 21),
            RateTier::FirstYearUpTo35
        );
        assert_eq!(
            RateTier::for_class(ClassLevel::FirstYear, 35),
            RateTier::FirstYearUpTo35
        );
        assert_eq!(
            RateTier::for_class(ClassLevel::FirstYear, 36),
            RateTier::FirstYearOver35
        );
    }

    #[test]
    fn levels_map_to_distinct_tiers() {
        assert_eq!(
            RateTier::for_class(ClassLevel::SecondYear, 12),
            RateTier::SecondYearUpTo20
        );
        assert_ne!(
            RateTier::for_class(ClassLevel::FirstYear, 12),
            RateTier::for_class(ClassLevel::SecondYear, 12)
        );
    }
}
