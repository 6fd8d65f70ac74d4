// src/calendar.rs
//! Calendar months and the mapping from stack index to year/month.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A calendar month, e.g. `2004-03`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u8,
}

impl YearMonth {
    /// Returns `None` unless `month` is in `1..=12`.
    pub fn new(year: i32, month: u8) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// 1-based month of the year.
    pub fn month(&self) -> u8 {
        self.month
    }

    /// The month `n` months after this one.
    pub fn add_months(&self, n: usize) -> Self {
        let zero_based = self.month as i64 - 1 + n as i64;
        Self {
            year: self.year + (zero_based / 12) as i32,
            month: (zero_based % 12) as u8 + 1,
        }
    }

    /// Last month of a calendar quarter (Mar, Jun, Sep, Dec).
    pub fn is_quarter_end(&self) -> bool {
        self.month % 3 == 0
    }

    pub fn is_december(&self) -> bool {
        self.month == 12
    }

    /// Extracts the year and month encoded in a file name.
    ///
    /// Accepts a 4-digit year followed by a 2-digit month, either as separate
    /// digit runs (`WB_MP_2004_01.tif`, `wb-2004-01.tif`) or as a single
    /// 6-digit run (`wb200401.tif`). The last match in the stem wins, so
    /// prefixes such as `WB12_` are ignored.
    pub fn from_file_name(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        let runs: Vec<&str> = stem
            .split(|c: char| !c.is_ascii_digit())
            .filter(|run| !run.is_empty())
            .collect();

        let mut found = None;
        for (i, run) in runs.iter().enumerate() {
            if run.len() == 6 {
                if let Some(ym) = parse_parts(&run[..4], &run[4..]) {
                    found = Some(ym);
                }
            } else if run.len() == 4 {
                if let Some(next) = runs.get(i + 1).filter(|next| next.len() == 2) {
                    if let Some(ym) = parse_parts(run, next) {
                        found = Some(ym);
                    }
                }
            }
        }
        found
    }
}

fn parse_parts(year: &str, month: &str) -> Option<YearMonth> {
    YearMonth::new(year.parse().ok()?, month.parse().ok()?)
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{s}'"))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in '{s}'"))?;
        let month: u8 = month
            .parse()
            .map_err(|_| format!("invalid month in '{s}'"))?;
        YearMonth::new(year, month).ok_or_else(|| format!("month must be 1..=12, got {month}"))
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}
