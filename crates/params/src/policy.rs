//! Mining size policy applied on top of the consensus limit.

use std::{fmt, str::FromStr};

use crate::{arith::muldiv, errors::ConfigError};

/// Share of the block size limit a miner fills by default, stored in
/// thousandths of a percent.  `100_000` is 100%.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlockSizePercent(u32);

impl BlockSizePercent {
    pub const FULL: Self = Self(100_000);
    pub const HALF: Self = Self(50_000);

    pub(crate) const fn from_thousandths_unchecked(thousandths: u32) -> Self {
        Self(thousandths)
    }

    pub fn from_thousandths(thousandths: u32) -> Result<Self, ConfigError> {
        if thousandths > Self::FULL.0 {
            return Err(ConfigError::InvalidPercent(format!(
                "{thousandths} thousandths above 100%"
            )));
        }
        Ok(Self(thousandths))
    }

    pub fn thousandths(&self) -> u32 {
        self.0
    }

    /// Scales `limit` by this share, rounding down.
    pub fn apply(&self, limit: u64) -> u64 {
        muldiv(limit, self.0 as u64, Self::FULL.0 as u64)
    }
}

impl fmt::Display for BlockSizePercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 1000;
        let frac = self.0 % 1000;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{frac:03}");
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

/// Parses a decimal percentage with at most three fractional digits, such as
/// `50`, `6.25` or `100.0`.
impl FromStr for BlockSizePercent {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ConfigError::InvalidPercent(s.to_owned());
        let s = s.trim();
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() || frac.len() > 3 {
            return Err(bad());
        }
        if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }

        let whole: u32 = whole.parse().map_err(|_| bad())?;
        let frac: u32 = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<3}").parse().map_err(|_| bad())?
        };
        let thousandths = whole
            .checked_mul(1000)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(bad)?;
        Self::from_thousandths(thousandths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("50".parse::<BlockSizePercent>().unwrap(), BlockSizePercent::HALF);
        assert_eq!("100.0".parse::<BlockSizePercent>().unwrap(), BlockSizePercent::FULL);
        assert_eq!("6.25".parse::<BlockSizePercent>().unwrap().thousandths(), 6_250);
        assert_eq!("0.001".parse::<BlockSizePercent>().unwrap().thousandths(), 1);

        assert!("100.001".parse::<BlockSizePercent>().is_err());
        assert!("1.2345".parse::<BlockSizePercent>().is_err());
        assert!("-5".parse::<BlockSizePercent>().is_err());
        assert!(".5".parse::<BlockSizePercent>().is_err());
        assert!("abc".parse::<BlockSizePercent>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(BlockSizePercent::FULL.to_string(), "100");
        assert_eq!(BlockSizePercent::from_thousandths(6_250).unwrap().to_string(), "6.25");
        assert_eq!(BlockSizePercent::from_thousandths(1).unwrap().to_string(), "0.001");
    }

    #[test]
    fn test_apply() {
        assert_eq!(BlockSizePercent::HALF.apply(32_000_000), 16_000_000);
        let pct = BlockSizePercent::from_thousandths(6_250).unwrap();
        assert_eq!(pct.apply(256_000_000), 16_000_000);
        assert_eq!(BlockSizePercent::FULL.apply(2_000_000), 2_000_000);
    }
}
