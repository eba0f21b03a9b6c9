//! Hour quantities, tracked in exact integer minutes.
//!
//! Every posting carries two correlated durations: the total elapsed time of
//! an event and the portion attributable to per-student questioning (rates
//! depend on the latter). Both are signed (debits negative, credits
//! positive) and kept in whole minutes so sums are exact.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// A signed duration in whole minutes.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Minutes(pub i64);

impl Minutes {
    pub const ZERO: Minutes = Minutes(0);

    pub const fn hours(h: i64) -> Self {
        Minutes(h * 60)
    }

    pub const fn minutes(m: i64) -> Self {
        Minutes(m)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn as_minutes(self) -> i64 {
        self.0
    }
}

impl Add for Minutes {
    type Output = Minutes;

    fn add(self, rhs: Minutes) -> Minutes {
        Minutes(self.0 + rhs.0)
    }
}

impl AddAssign for Minutes {
    fn add_assign(&mut self, rhs: Minutes) {
        self.0 += rhs.0;
    }
}

impl Sub for Minutes {
    type Output = Minutes;

    fn sub(self, rhs: Minutes) -> Minutes {
        Minutes(self.0 - rhs.0)
    }
}

impl SubAssign for Minutes {
    fn sub_assign(&mut self, rhs: Minutes) {
        self.0 -= rhs.0;
    }
}

impl Neg for Minutes {
    type Output = Minutes;

    fn neg(self) -> Minutes {
        Minutes(-self.0)
    }
}

impl Sum for Minutes {
    fn sum<I: Iterator<Item = Minutes>>(iter: I) -> Minutes {
        iter.fold(Minutes::ZERO, |acc, m| acc + m)
    }
}

impl fmt::Display for Minutes {
    /// Formats as `3h00` / `-0h20`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{sign}{}h{:02}", abs / 60, abs % 60)
    }
}

/// The (duration, interrogation-duration) pair carried by every posting.
///
/// The two components are independently tracked and independently summed:
/// a movement must balance on both. Arithmetic is component-wise.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hours {
    /// Total elapsed time.
    pub duration: Minutes,
    /// Examiner-facing questioning time.
    pub interrogation: Minutes,
}

impl Hours {
    pub const ZERO: Hours = Hours {
        duration: Minutes::ZERO,
        interrogation: Minutes::ZERO,
    };

    pub const fn new(duration: Minutes, interrogation: Minutes) -> Self {
        Hours {
            duration,
            interrogation,
        }
    }

    /// Both components equal, the common case for plain hour transfers.
    pub const fn uniform(duration: Minutes) -> Self {
        Hours {
            duration,
            interrogation: duration,
        }
    }

    pub fn is_zero(self) -> bool {
        self.duration.is_zero() && self.interrogation.is_zero()
    }

    /// Component-wise `>=`, used for overdraft floor checks.
    pub fn at_least(self, floor: Hours) -> bool {
        self.duration >= floor.duration && self.interrogation >= floor.interrogation
    }
}

impl Add for Hours {
    type Output = Hours;

    fn add(self, rhs: Hours) -> Hours {
        Hours {
            duration: self.duration + rhs.duration,
            interrogation: self.interrogation + rhs.interrogation,
        }
    }
}

impl AddAssign for Hours {
    fn add_assign(&mut self, rhs: Hours) {
        self.duration += rhs.duration;
        self.interrogation += rhs.interrogation;
    }
}

impl Sub for Hours {
    type Output = Hours;

    fn sub(self, rhs: Hours) -> Hours {
        Hours {
            duration: self.duration - rhs.duration,
            interrogation: self.interrogation - rhs.interrogation,
        }
    }
}

impl SubAssign for Hours {
    fn sub_assign(&mut self, rhs: Hours) {
        self.duration -= rhs.duration;
        self.interrogation -= rhs.interrogation;
    }
}

impl Neg for Hours {
    type Output = Hours;

    fn neg(self) -> Hours {
        Hours {
            duration: -self.duration,
            interrogation: -self.interrogation,
        }
    }
}

impl Sum for Hours {
    fn sum<I: Iterator<Item = Hours>>(iter: I) -> Hours {
        iter.fold(Hours::ZERO, |acc, h| acc + h)
    }
}

impl fmt::Display for Hours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} interrogation)", self.duration, self.interrogation)
    }
}

impl ValueObject for Minutes {}
impl ValueObject for Hours {}
