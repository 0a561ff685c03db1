//! Birthday date parsing and validation.
//!
//! A [`BirthDate`] is a month/day pair that forms a real Gregorian date in
//! at least one year. Stored dates come in two shapes: the ISO form
//! `YYYY-MM-DD` written by earlier versions, and the short form `MM-DD`.

use crate::error::{CakedayError, Result};
use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// Leap year used to validate month/day pairs that carry no year.
pub const PLACEHOLDER_YEAR: i32 = 2024;

/// A validated month/day pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BirthDate {
    month: u32,
    day: u32,
}

/// A date string read back from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredDate {
    /// The validated month/day.
    pub date: BirthDate,
    /// Year carried by ISO-form strings, if any. Cosmetic only.
    pub reference_year: Option<i32>,
}

impl BirthDate {
    /// Validate a month/day pair.
    ///
    /// # Errors
    /// Returns [`CakedayError::InvalidDate`] when either value is out of
    /// range or the pair is not a calendar date (e.g. 4/31, 2/30).
    pub fn new(month: u32, day: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(CakedayError::InvalidDate(format!(
                "{month}/{day} is out of range"
            )));
        }
        if NaiveDate::from_ymd_opt(PLACEHOLDER_YEAR, month, day).is_none() {
            return Err(CakedayError::InvalidDate(format!(
                "{month}/{day} is not a calendar date"
            )));
        }
        Ok(Self { month, day })
    }

    /// Validate user input given in day-then-month order.
    ///
    /// # Errors
    /// Same as [`BirthDate::new`].
    pub fn from_day_month(day: u32, month: u32) -> Result<Self> {
        Self::new(month, day)
    }

    /// Parse a stored date string, trying the ISO form before the short form.
    ///
    /// Returns `None` when the text parses under neither format.
    pub fn parse_stored(text: &str) -> Option<StoredDate> {
        let text = text.trim();
        if let Ok(iso) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Some(StoredDate {
                date: Self {
                    month: iso.month(),
                    day: iso.day(),
                },
                reference_year: Some(iso.year()),
            });
        }

        let (month, day) = text.split_once('-')?;
        let month = month.trim().parse::<u32>().ok()?;
        let day = day.trim().parse::<u32>().ok()?;
        let date = Self::new(month, day).ok()?;
        Some(StoredDate {
            date,
            reference_year: None,
        })
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn day(self) -> u32 {
        self.day
    }

    /// Returns `true` for February 29.
    pub fn is_leap_day(self) -> bool {
        self.month == 2 && self.day == 29
    }

    /// The day this birthday falls on in `year`.
    ///
    /// February 29 falls on February 28 in non-leap years.
    pub fn occurrence_in(self, year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
            .or_else(|| {
                if self.is_leap_day() {
                    NaiveDate::from_ymd_opt(year, 2, 28)
                } else {
                    None
                }
            })
            // Only reachable at the edge of chrono's supported year range.
            .unwrap_or(NaiveDate::MAX)
    }

    /// Short storage form, `MM-DD`.
    pub fn to_short(self) -> String {
        format!("{:02}-{:02}", self.month, self.day)
    }
}

impl fmt::Display for BirthDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.month, self.day)
    }
}

impl FromStr for BirthDate {
    type Err = CakedayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_stored(s)
            .map(|stored| stored.date)
            .ok_or_else(|| CakedayError::InvalidDate(format!("unrecognised date {s:?}")))
    }
}
