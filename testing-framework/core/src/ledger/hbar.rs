use std::{fmt, ops::Sub};

use serde::{Deserialize, Serialize};

pub const TINYBARS_PER_HBAR: i64 = 100_000_000;

/// Native currency amount, stored in tinybars.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Hbar(i64);

impl Hbar {
    #[must_use]
    pub const fn from_tinybars(tinybars: i64) -> Self {
        Self(tinybars)
    }

    /// Saturates at `i64::MAX` tinybars.
    #[must_use]
    pub const fn from_hbars(hbars: u64) -> Self {
        let max_hbars = (i64::MAX / TINYBARS_PER_HBAR) as u64;
        if hbars > max_hbars {
            Self(i64::MAX)
        } else {
            Self(hbars as i64 * TINYBARS_PER_HBAR)
        }
    }

    #[must_use]
    pub const fn to_tinybars(self) -> i64 {
        self.0
    }
}

impl Sub for Hbar {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Hbar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = TINYBARS_PER_HBAR as u64;
        write!(f, "{sign}{}.{:08} ℏ", abs / per, abs % per)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_whole_hbars() {
        assert_eq!(Hbar::from_hbars(10).to_tinybars(), 1_000_000_000);
        assert_eq!(Hbar::from_hbars(u64::MAX).to_tinybars(), i64::MAX);
    }

    #[test]
    fn renders_with_eight_decimals() {
        assert_eq!(Hbar::from_tinybars(150_000_000).to_string(), "1.50000000 ℏ");
        assert_eq!(Hbar::from_tinybars(-1).to_string(), "-0.00000001 ℏ");
    }

    #[test]
    fn compares_by_tinybars() {
        assert!(Hbar::from_tinybars(1_000_000_001) > Hbar::from_hbars(10));
        assert!(Hbar::from_hbars(10) - Hbar::from_tinybars(1) < Hbar::from_hbars(10));
    }
}
