//! Domain records as stored by this layer.
//!
//! These are plain values: the core never holds rows on behalf of callers.
//! `New*` types are the inputs accepted by record creation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  ident::{BadgeNumber, NationalId},
  period::{GradeKind, PaymentStatus, SchoolMonth},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Administrator {
  pub id:            i64,
  pub name:          String,
  pub email:         String,
  #[serde(skip_serializing)]
  pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guardian {
  pub id:            i64,
  pub national_id:   NationalId,
  pub name:          String,
  pub email:         String,
  #[serde(skip_serializing)]
  pub password_hash: String,
}

/// Input for creating a guardian. A missing national ID is generated.
#[derive(Debug, Clone, Deserialize)]
pub struct NewGuardian {
  pub national_id:   Option<NationalId>,
  pub name:          String,
  pub email:         String,
  pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
  pub id:             i64,
  pub national_id:    NationalId,
  pub name:           String,
  pub surname:        String,
  pub email:          String,
  #[serde(skip_serializing)]
  pub password_hash:  String,
  pub assigned_grade: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTeacher {
  pub national_id:    NationalId,
  pub name:           String,
  pub surname:        String,
  pub email:          String,
  pub password_hash:  String,
  pub assigned_grade: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
  pub id:                   i64,
  pub badge:                BadgeNumber,
  pub name:                 String,
  /// Students may share or lack a national ID.
  pub national_id:          Option<String>,
  pub birth_date:           Option<NaiveDate>,
  pub grade:                Option<String>,
  pub guardian_national_id: NationalId,
}

/// Input for creating a student. The badge number is always generated.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
  pub name:                 String,
  pub national_id:          Option<String>,
  pub birth_date:           Option<NaiveDate>,
  pub grade:                Option<String>,
  pub guardian_national_id: NationalId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRecord {
  pub id:         i64,
  pub student_id: i64,
  pub subject:    String,
  pub value:      String,
  pub period:     String,
  pub kind:       GradeKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGrade {
  pub student_id: i64,
  pub subject:    String,
  pub value:      String,
  pub period:     String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
  pub id:          i64,
  pub student_id:  i64,
  pub amount:      f64,
  pub month:       SchoolMonth,
  pub school_year: String,
  pub status:      PaymentStatus,
  pub due_date:    Option<NaiveDate>,
  pub paid_date:   Option<NaiveDate>,
  pub memo:        Option<String>,
}

/// Input for recording a payment in the supported school year.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPayment {
  pub student_id: i64,
  pub amount:     f64,
  pub month:      SchoolMonth,
  pub status:     PaymentStatus,
  pub due_date:   Option<NaiveDate>,
  pub paid_date:  Option<NaiveDate>,
  pub memo:       Option<String>,
}

/// ISO `YYYY-MM-DD`, the wire format for dates on both backends.
pub fn encode_date(date: NaiveDate) -> String { date.format("%Y-%m-%d").to_string() }

/// Accepts a bare date or any value that starts with one (timestamps).
pub fn decode_date(s: &str) -> Option<NaiveDate> {
  let head = s.get(..10).unwrap_or(s);
  NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dates_accept_timestamps() {
    let d = NaiveDate::from_ymd_opt(2025, 10, 3).unwrap();
    assert_eq!(decode_date("2025-10-03"), Some(d));
    assert_eq!(decode_date("2025-10-03T12:00:00Z"), Some(d));
    assert_eq!(decode_date("2025-10-03 12:00:00"), Some(d));
    assert_eq!(decode_date("03/10/2025"), None);
    assert_eq!(encode_date(d), "2025-10-03");
  }
}
