//! Human-facing identifiers and their bit-exact formats.
//!
//! - guardian national ID: `^\d{7,8}$`
//! - student badge number: `^\d{6}$` (the current format; older badges used
//!   a longer prefixed form and are regenerated by the migrator)

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, dialect::Table};

/// The identifier families this layer generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdFamily {
  GuardianNationalId,
  StudentBadge,
}

impl IdFamily {
  pub fn table(self) -> Table {
    match self {
      Self::GuardianNationalId => Table::Guardians,
      Self::StudentBadge       => Table::Students,
    }
  }

  pub fn column(self) -> &'static str {
    match self {
      Self::GuardianNationalId => "cedula",
      Self::StudentBadge       => "carnet",
    }
  }

  pub fn matches(self, candidate: &str) -> bool {
    match self {
      Self::GuardianNationalId => is_national_id(candidate),
      Self::StudentBadge       => is_badge_number(candidate),
    }
  }
}

impl fmt::Display for IdFamily {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::GuardianNationalId => "guardian national ID",
      Self::StudentBadge       => "student badge",
    })
  }
}

fn all_digits(s: &str) -> bool { s.bytes().all(|b| b.is_ascii_digit()) }

pub fn is_national_id(s: &str) -> bool { (7..=8).contains(&s.len()) && all_digits(s) }

pub fn is_badge_number(s: &str) -> bool { s.len() == 6 && all_digits(s) }

// ─── Newtypes ────────────────────────────────────────────────────────────────

/// A 7–8 digit national ID, shared by guardians and teachers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NationalId(String);

impl NationalId {
  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for NationalId {
  type Error = Error;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    if is_national_id(&value) {
      Ok(Self(value))
    } else {
      Err(Error::InvalidIdentifier { family: IdFamily::GuardianNationalId, value })
    }
  }
}

impl FromStr for NationalId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Self::try_from(s.to_owned()) }
}

impl From<NationalId> for String {
  fn from(id: NationalId) -> Self { id.0 }
}

impl fmt::Display for NationalId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// A bare 6-digit student badge number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BadgeNumber(String);

impl BadgeNumber {
  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for BadgeNumber {
  type Error = Error;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    if is_badge_number(&value) {
      Ok(Self(value))
    } else {
      Err(Error::InvalidIdentifier { family: IdFamily::StudentBadge, value })
    }
  }
}

impl FromStr for BadgeNumber {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Self::try_from(s.to_owned()) }
}

impl From<BadgeNumber> for String {
  fn from(id: BadgeNumber) -> Self { id.0 }
}

impl fmt::Display for BadgeNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}
