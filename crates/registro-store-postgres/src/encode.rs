//! Parameter binding and row decoding between core [`Value`]s and the
//! PostgreSQL wire types.

use std::{error::Error as StdError, sync::Arc};

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use registro_core::{Error, Result, Row, Value, entity::decode_date};
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};

type BoxError = Box<dyn StdError + Sync + Send>;

// ─── Parameters ──────────────────────────────────────────────────────────────

/// Binds a [`Value`] to whatever type the server inferred for the parameter.
///
/// Logical statements carry untyped values, so an integer may land in an
/// `int4` column and ISO text in a `date` column.
#[derive(Debug)]
pub struct PgParam<'a>(pub &'a Value);

fn is_text(ty: &Type) -> bool {
  *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
}

fn integer_to_sql(i: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
  if *ty == Type::INT2 {
    i16::try_from(i)?.to_sql(ty, out)
  } else if *ty == Type::INT4 {
    i32::try_from(i)?.to_sql(ty, out)
  } else if *ty == Type::FLOAT4 {
    (i as f32).to_sql(ty, out)
  } else if *ty == Type::FLOAT8 {
    (i as f64).to_sql(ty, out)
  } else if *ty == Type::BOOL {
    (i != 0).to_sql(ty, out)
  } else if is_text(ty) {
    i.to_string().to_sql(ty, out)
  } else {
    i.to_sql(ty, out)
  }
}

fn real_to_sql(f: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
  if *ty == Type::FLOAT4 {
    (f as f32).to_sql(ty, out)
  } else if *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8 {
    if f.fract() != 0.0 {
      return Err(format!("{f} is not an integer").into());
    }
    integer_to_sql(f as i64, ty, out)
  } else if is_text(ty) {
    f.to_string().to_sql(ty, out)
  } else {
    f.to_sql(ty, out)
  }
}

fn text_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
  if *ty == Type::DATE {
    decode_date(s)
      .ok_or_else(|| format!("{s:?} is not a date"))?
      .to_sql(ty, out)
  } else if *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8 || *ty == Type::BOOL {
    integer_to_sql(s.trim().parse::<i64>()?, ty, out)
  } else if *ty == Type::FLOAT4 || *ty == Type::FLOAT8 {
    real_to_sql(s.trim().parse::<f64>()?, ty, out)
  } else {
    s.to_sql(ty, out)
  }
}

impl ToSql for PgParam<'_> {
  fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match self.0 {
      Value::Null       => Ok(IsNull::Yes),
      Value::Integer(i) => integer_to_sql(*i, ty, out),
      Value::Real(f)    => real_to_sql(*f, ty, out),
      Value::Text(s)    => text_to_sql(s, ty, out),
    }
  }

  fn accepts(_: &Type) -> bool { true }

  to_sql_checked!();
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A `numeric` rendered in its canonical text form (`-12.50`), scale kept.
///
/// The binary format is a header of four big-endian `i16`s (digit count,
/// weight of the first digit, sign, display scale) followed by base-10000
/// digits.
#[derive(Debug, PartialEq, Eq)]
struct NumericText(String);

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;

impl<'a> FromSql<'a> for NumericText {
  fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
    let word = |i: usize| -> Result<i16, BoxError> {
      raw
        .get(i * 2..i * 2 + 2)
        .map(|b| i16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| "truncated numeric".into())
    };
    let ndigits = usize::try_from(word(0)?)?;
    let weight = i32::from(word(1)?);
    let sign = word(2)? as u16;
    let scale = usize::try_from(word(3)?)?;
    if sign == NUMERIC_NAN {
      return Ok(Self("NaN".to_owned()));
    }
    let digits = (0..ndigits)
      .map(|k| word(4 + k))
      .collect::<Result<Vec<_>, _>>()?;
    let digit = |idx: i32| usize::try_from(idx).ok().and_then(|i| digits.get(i)).copied().unwrap_or(0);

    let mut text = String::new();
    if sign == NUMERIC_NEG {
      text.push('-');
    }
    if weight < 0 {
      text.push('0');
    } else {
      text.push_str(&digit(0).to_string());
      for idx in 1..=weight {
        text.push_str(&format!("{:04}", digit(idx)));
      }
    }
    if scale > 0 {
      let mut fraction = String::new();
      let mut idx = weight + 1;
      while fraction.len() < scale {
        fraction.push_str(&format!("{:04}", digit(idx)));
        idx += 1;
      }
      fraction.truncate(scale);
      text.push('.');
      text.push_str(&fraction);
    }
    Ok(Self(text))
  }

  fn accepts(ty: &Type) -> bool { *ty == Type::NUMERIC }
}

fn decode_cell(row: &tokio_postgres::Row, i: usize, ty: &Type) -> Result<Value, tokio_postgres::Error> {
  let value = if *ty == Type::BOOL {
    row.try_get::<_, Option<bool>>(i)?.map(|b| Value::Integer(b.into()))
  } else if *ty == Type::INT2 {
    row.try_get::<_, Option<i16>>(i)?.map(|v| Value::Integer(v.into()))
  } else if *ty == Type::INT4 {
    row.try_get::<_, Option<i32>>(i)?.map(|v| Value::Integer(v.into()))
  } else if *ty == Type::INT8 {
    row.try_get::<_, Option<i64>>(i)?.map(Value::Integer)
  } else if *ty == Type::FLOAT4 {
    row.try_get::<_, Option<f32>>(i)?.map(|v| Value::Real(v.into()))
  } else if *ty == Type::FLOAT8 {
    row.try_get::<_, Option<f64>>(i)?.map(Value::Real)
  } else if *ty == Type::NUMERIC {
    row.try_get::<_, Option<NumericText>>(i)?.map(|n| Value::Text(n.0))
  } else if *ty == Type::DATE {
    row
      .try_get::<_, Option<NaiveDate>>(i)?
      .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
  } else if *ty == Type::TIMESTAMP {
    row
      .try_get::<_, Option<NaiveDateTime>>(i)?
      .map(|d| Value::Text(d.format("%Y-%m-%d %H:%M:%S").to_string()))
  } else if *ty == Type::TIMESTAMPTZ {
    row
      .try_get::<_, Option<DateTime<Utc>>>(i)?
      .map(|d| Value::Text(d.to_rfc3339()))
  } else {
    row.try_get::<_, Option<String>>(i)?.map(Value::Text)
  };
  Ok(value.unwrap_or(Value::Null))
}

/// Convert driver rows into core rows sharing one column list.
pub fn decode_rows(rows: &[tokio_postgres::Row]) -> Result<Vec<Row>> {
  let Some(first) = rows.first() else {
    return Ok(Vec::new());
  };
  let columns: Arc<[String]> = first
    .columns()
    .iter()
    .map(|c| c.name().to_owned())
    .collect();
  let types: Vec<Type> = first.columns().iter().map(|c| c.type_().clone()).collect();

  rows
    .iter()
    .map(|row| {
      let values = types
        .iter()
        .enumerate()
        .map(|(i, ty)| {
          decode_cell(row, i, ty).map_err(|e| {
            Error::Decode(format!("column {:?} of type {ty}: {e}", columns[i]))
          })
        })
        .collect::<Result<Vec<_>>>()?;
      Ok(Row::new(columns.clone(), values))
    })
    .collect()
}
