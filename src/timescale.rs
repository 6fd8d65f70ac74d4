// src/timescale.rs
//! Accumulation timescales and the rule deciding which months get written.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calendar::YearMonth;

/// Number of consecutive months accumulated before fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Timescale {
    One,
    Three,
    Twelve,
}

impl Timescale {
    pub const ALL: [Timescale; 3] = [Timescale::One, Timescale::Three, Timescale::Twelve];

    /// Window length in months.
    pub fn window(self) -> usize {
        match self {
            Timescale::One => 1,
            Timescale::Three => 3,
            Timescale::Twelve => 12,
        }
    }

    /// File-name prefix, e.g. `SPEI3`.
    pub fn label(self) -> &'static str {
        match self {
            Timescale::One => "SPEI1",
            Timescale::Three => "SPEI3",
            Timescale::Twelve => "SPEI12",
        }
    }

    /// Whether the calendar is needed to decide what to emit.
    pub fn needs_calendar(self) -> bool {
        !matches!(self, Timescale::One)
    }

    /// Decides whether absolute month index `t` of a `months`-long stack is
    /// written for this timescale.
    ///
    /// Indices before the first complete window never carry a value and are
    /// skipped, as is anything past the end of the stack.
    pub fn emits(self, t: usize, months: usize, start: Option<YearMonth>) -> bool {
        if t >= months || t + 1 < self.window() {
            return false;
        }
        match self {
            Timescale::One => true,
            Timescale::Three => start.is_some_and(|s| s.add_months(t).is_quarter_end()),
            Timescale::Twelve => start.is_some_and(|s| s.add_months(t).is_december()),
        }
    }

    /// Output file name for absolute month index `t`.
    ///
    /// Scale 1 uses the running index so it works without a calendar.
    pub fn file_name(self, t: usize, start: Option<YearMonth>) -> String {
        match (self, start.map(|s| s.add_months(t))) {
            (Timescale::One, _) | (_, None) => format!("{}_{:03}.tif", self.label(), t + 1),
            (Timescale::Three, Some(ym)) => {
                format!("{}_{}_{:02}.tif", self.label(), ym.year(), ym.month())
            }
            (Timescale::Twelve, Some(ym)) => format!("{}_{}.tif", self.label(), ym.year()),
        }
    }

    /// All indices written for a stack of `months` months, in order.
    pub fn selected_indices(self, months: usize, start: Option<YearMonth>) -> Vec<usize> {
        (0..months).filter(|&t| self.emits(t, months, start)).collect()
    }
}

impl fmt::Display for Timescale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SPEI-{}", self.window())
    }
}

impl TryFrom<u8> for Timescale {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Timescale::One),
            3 => Ok(Timescale::Three),
            12 => Ok(Timescale::Twelve),
            other => Err(format!("unsupported timescale {other} (expected 1, 3 or 12)")),
        }
    }
}

impl From<Timescale> for u8 {
    fn from(value: Timescale) -> Self {
        value.window() as u8
    }
}

impl FromStr for Timescale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u8 = s
            .trim()
            .parse()
            .map_err(|_| format!("invalid timescale '{s}'"))?;
        Timescale::try_from(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan_2004() -> Option<YearMonth> {
        YearMonth::new(2004, 1)
    }

    #[test]
    fn scale_one_emits_everything() {
        assert_eq!(Timescale::One.selected_indices(5, None), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn scale_three_skips_incomplete_leading_window() {
        // Starting in February, March is index 1 but no 3-month window ends there.
        let start = YearMonth::new(2004, 2);
        assert_eq!(Timescale::Three.selected_indices(8, start), vec![4, 7]);
    }

    #[test]
    fn calendar_scales_need_start() {
        assert!(Timescale::Three.selected_indices(24, None).is_empty());
        assert!(Timescale::Twelve.selected_indices(24, None).is_empty());
    }

    #[test]
    fn file_names() {
        assert_eq!(Timescale::One.file_name(0, jan_2004()), "SPEI1_001.tif");
        assert_eq!(Timescale::One.file_name(239, None), "SPEI1_240.tif");
        assert_eq!(Timescale::Three.file_name(14, jan_2004()), "SPEI3_2005_03.tif");
        assert_eq!(Timescale::Twelve.file_name(23, jan_2004()), "SPEI12_2005.tif");
    }

    #[test]
    fn parse_and_serde() {
        assert_eq!("12".parse::<Timescale>().unwrap(), Timescale::Twelve);
        assert!("6".parse::<Timescale>().is_err());
        let scales: Vec<Timescale> = serde_json::from_str("[1, 3, 12]").unwrap();
        assert_eq!(scales, Timescale::ALL.to_vec());
        assert!(serde_json::from_str::<Timescale>("2").is_err());
    }
}
