//! Live catalog introspection: what a table looks like right now.

use registro_core::{
  Result, Store, Table,
  dialect::{
    ColumnInfo, ForeignKey, UniqueConstraint, parse_columns, parse_foreign_keys,
    parse_unique_constraints,
  },
};
use serde::Serialize;

/// Columns, unique constraints and foreign keys of one table.
///
/// A table that does not exist has an empty shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableShape {
  pub columns:      Vec<ColumnInfo>,
  pub uniques:      Vec<UniqueConstraint>,
  pub foreign_keys: Vec<ForeignKey>,
}

impl TableShape {
  pub fn exists(&self) -> bool { !self.columns.is_empty() }

  pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
    self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
  }

  pub fn has_column(&self, name: &str) -> bool { self.column(name).is_some() }

  /// The unique constraint or index covering exactly `column`, if any.
  pub fn unique_on(&self, column: &str) -> Option<&UniqueConstraint> {
    self.uniques.iter().find(|u| u.covers_only(column))
  }

  /// Whether some unique constraint covers exactly `columns`, in any order.
  pub fn unique_over(&self, columns: &[&str]) -> bool {
    self.uniques.iter().any(|u| {
      u.columns.len() == columns.len()
        && columns
          .iter()
          .all(|c| u.columns.iter().any(|uc| uc.eq_ignore_ascii_case(c)))
    })
  }

  pub fn foreign_key_on(&self, column: &str) -> Option<&ForeignKey> {
    self
      .foreign_keys
      .iter()
      .find(|fk| fk.column.eq_ignore_ascii_case(column))
  }

  /// Whether `column` can hold at least `width` characters. Unbounded text
  /// columns always can.
  pub fn fits(&self, column: &str, width: i64) -> bool {
    self
      .column(column)
      .is_some_and(|c| c.max_length.is_none_or(|len| len >= width))
  }

  /// Columns of `wanted` that are missing here.
  pub fn missing<'a>(&self, wanted: &[&'a str]) -> Vec<&'a str> {
    wanted
      .iter()
      .copied()
      .filter(|c| !self.has_column(c))
      .collect()
  }
}

pub async fn has_table<S: Store>(store: &S, table: Table) -> Result<bool> {
  let result = store.execute(store.dialect().catalog_has_table(table)).await?;
  Ok(!result.is_empty())
}

pub async fn shape<S: Store>(store: &S, table: Table) -> Result<TableShape> {
  let dialect = store.dialect();
  let columns = parse_columns(&store.execute(dialect.catalog_columns(table)).await?)?;
  if columns.is_empty() {
    return Ok(TableShape::default());
  }
  let uniques =
    parse_unique_constraints(&store.execute(dialect.catalog_unique_constraints(table)).await?)?;
  let foreign_keys =
    parse_foreign_keys(&store.execute(dialect.catalog_foreign_keys(table)).await?)?;

  Ok(TableShape { columns, uniques, foreign_keys })
}
