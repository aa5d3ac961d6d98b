//! School periods, payment states and grade kinds.
//!
//! A school year runs from September of one calendar year through August of
//! the next. Only one school year is supported at a time.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::Error;

// ─── SchoolMonth ─────────────────────────────────────────────────────────────

/// A calendar month number (1–12) placed in the cyclic 9..8 school order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SchoolMonth(u8);

impl SchoolMonth {
  /// All months in school order: September first, August last.
  pub const ORDER: [u8; 12] = [9, 10, 11, 12, 1, 2, 3, 4, 5, 6, 7, 8];

  pub fn new(month: u8) -> Result<Self, Error> {
    if (1..=12).contains(&month) {
      Ok(Self(month))
    } else {
      Err(Error::InvalidValue(format!("school month must be 1-12, got {month}")))
    }
  }

  pub fn from_date(date: NaiveDate) -> Self { Self(date.month() as u8) }

  pub fn all() -> impl Iterator<Item = SchoolMonth> { Self::ORDER.into_iter().map(Self) }

  pub fn number(self) -> u8 { self.0 }

  /// Zero-based position within the school year (September = 0).
  pub fn position(self) -> usize { (usize::from(self.0) + 3) % 12 }

  /// Whether the month falls in the first calendar year of the school year.
  pub fn in_opening_year(self) -> bool { self.0 >= 9 }
}

impl TryFrom<u8> for SchoolMonth {
  type Error = Error;

  fn try_from(value: u8) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<SchoolMonth> for u8 {
  fn from(m: SchoolMonth) -> Self { m.0 }
}

impl PartialOrd for SchoolMonth {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}

impl Ord for SchoolMonth {
  fn cmp(&self, other: &Self) -> std::cmp::Ordering { self.position().cmp(&other.position()) }
}

// ─── SchoolYear ──────────────────────────────────────────────────────────────

/// The single supported school year, labelled `YYYY-YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchoolYear {
  opening: i32,
}

impl SchoolYear {
  pub const SUPPORTED: SchoolYear = SchoolYear { opening: 2025 };

  pub fn label(self) -> String { format!("{}-{}", self.opening, self.opening + 1) }

  pub fn parse(label: &str) -> Result<Self, Error> {
    if label == Self::SUPPORTED.label() {
      Ok(Self::SUPPORTED)
    } else {
      Err(Error::InvalidValue(format!(
        "unsupported school year {label:?}; only {} is accepted",
        Self::SUPPORTED.label()
      )))
    }
  }

  /// Calendar year in which `month` of this school year falls.
  pub fn calendar_year(self, month: SchoolMonth) -> i32 {
    if month.in_opening_year() { self.opening } else { self.opening + 1 }
  }
}

impl fmt::Display for SchoolYear {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.label()) }
}

// ─── PaymentStatus ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Paid,
  Pending,
}

impl PaymentStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Paid    => "paid",
      Self::Pending => "pending",
    }
  }

  pub fn parse(s: &str) -> Result<Self, Error> {
    match s {
      "paid" => Ok(Self::Paid),
      "pending" => Ok(Self::Pending),
      other => Err(Error::InvalidValue(format!("unknown payment status {other:?}"))),
    }
  }
}

// ─── GradeKind ───────────────────────────────────────────────────────────────

/// Whether a grade value is a number or a letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeKind {
  Numeric,
  Letter,
}

impl GradeKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Numeric => "numeric",
      Self::Letter  => "letter",
    }
  }

  pub fn parse(s: &str) -> Result<Self, Error> {
    match s {
      "numeric" => Ok(Self::Numeric),
      "letter" => Ok(Self::Letter),
      other => Err(Error::InvalidValue(format!("unknown grade kind {other:?}"))),
    }
  }

  /// Numeric when the stored value parses as a number.
  pub fn classify(value: &str) -> Self {
    if value.trim().replace(',', ".").parse::<f64>().is_ok_and(f64::is_finite) {
      Self::Numeric
    } else {
      Self::Letter
    }
  }
}
