//! Collision-free human-facing identifiers.
//!
//! Candidates are random; the unique constraint on the identifier column is
//! the final arbiter. [`IdentifierGenerator::insert_with_fresh`] attempts the
//! write with a candidate and, when the constraint on that column rejects it,
//! retries with a fresh one. No window exists between check and write.
//!
//! The lookup-only generators are kept for callers that need a free value
//! without writing it; their result can still collide with a concurrent
//! insert and must be written through a statement that is allowed to fail.

use rand::{Rng, rngs::OsRng};
use registro_core::{
  Error, QueryResult, Result, Statement, Store,
  ident::{BadgeNumber, IdFamily, NationalId},
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 1_000;

// ─── Candidate sources ───────────────────────────────────────────────────────

/// Produces identifier candidates in the current format of each family.
pub trait CandidateSource: Send + Sync {
  fn candidate(&self, family: IdFamily) -> String;
}

/// Uniform random digits from the operating system RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCandidates;

impl CandidateSource for RandomCandidates {
  fn candidate(&self, family: IdFamily) -> String {
    let n: u32 = match family {
      // 7 or 8 digits, no leading zero.
      IdFamily::GuardianNationalId => OsRng.gen_range(1_000_000..100_000_000),
      IdFamily::StudentBadge => OsRng.gen_range(100_000..1_000_000),
    };
    n.to_string()
  }
}

impl<F> CandidateSource for F
where
  F: Fn(IdFamily) -> String + Send + Sync,
{
  fn candidate(&self, family: IdFamily) -> String { self(family) }
}

// ─── Generator ───────────────────────────────────────────────────────────────

pub struct IdentifierGenerator<C = RandomCandidates> {
  source:       C,
  max_attempts: u32,
}

impl Default for IdentifierGenerator {
  fn default() -> Self { Self::new(RandomCandidates, DEFAULT_MAX_ATTEMPTS) }
}

impl<C: CandidateSource> IdentifierGenerator<C> {
  pub fn new(source: C, max_attempts: u32) -> Self {
    Self { source, max_attempts: max_attempts.max(1) }
  }

  pub fn max_attempts(&self) -> u32 { self.max_attempts }

  fn draw(&self, family: IdFamily) -> Result<String> {
    let candidate = self.source.candidate(family);
    if family.matches(&candidate) {
      Ok(candidate)
    } else {
      Err(Error::InvalidIdentifier { family, value: candidate })
    }
  }

  /// A national ID not currently held by any guardian.
  pub async fn generate_guardian_national_id<S: Store>(&self, store: &S) -> Result<NationalId> {
    let value = self.first_free(store, IdFamily::GuardianNationalId).await?;
    value.parse()
  }

  /// A badge number not currently held by any student.
  pub async fn generate_student_badge<S: Store>(&self, store: &S) -> Result<BadgeNumber> {
    let value = self.first_free(store, IdFamily::StudentBadge).await?;
    value.parse()
  }

  async fn first_free<S: Store>(&self, store: &S, family: IdFamily) -> Result<String> {
    let lookup = format!(
      "SELECT 1 AS taken FROM {} WHERE {} = $1",
      family.table(),
      family.column()
    );
    for attempt in 1..=self.max_attempts {
      let candidate = self.draw(family)?;
      let taken = store
        .execute(Statement::new(lookup.as_str()).bind(candidate.as_str()))
        .await?;
      if taken.is_empty() {
        return Ok(candidate);
      }
      tracing::debug!(%family, attempt, "candidate already taken");
    }
    Err(Error::IdentifierExhausted { family, attempts: self.max_attempts })
  }

  /// Execute the statement built from a fresh candidate, retrying with
  /// another candidate whenever the unique constraint on the family's column
  /// rejects it. Any other failure, including other unique violations, is
  /// returned as is.
  pub async fn insert_with_fresh<S, F>(
    &self,
    store: &S,
    family: IdFamily,
    build: F,
  ) -> Result<(String, QueryResult)>
  where
    S: Store,
    F: Fn(&str) -> Statement + Send + Sync,
  {
    let dialect = store.dialect();
    for attempt in 1..=self.max_attempts {
      let candidate = self.draw(family)?;
      match store.execute(build(&candidate)).await {
        Ok(result) => return Ok((candidate, result)),
        Err(Error::UniqueViolation(db))
          if dialect.unique_violation_on(&db, family.table(), family.column()) =>
        {
          tracing::debug!(%family, attempt, "identifier collision, retrying");
        }
        Err(e) => return Err(e),
      }
    }
    tracing::warn!(%family, attempts = self.max_attempts, "identifier space exhausted");
    Err(Error::IdentifierExhausted { family, attempts: self.max_attempts })
  }

  /// Give the existing row `row_id` a fresh identifier of `family`.
  pub async fn assign<S: Store>(&self, store: &S, family: IdFamily, row_id: i64) -> Result<String> {
    let update = format!(
      "UPDATE {} SET {} = $1 WHERE id = $2",
      family.table(),
      family.column()
    );
    let (value, _) = self
      .insert_with_fresh(store, family, |candidate| {
        Statement::new(update.as_str()).bind(candidate).bind(row_id)
      })
      .await?;
    Ok(value)
  }
}

#[cfg(test)]
mod tests {
  use registro_core::ident::{is_badge_number, is_national_id};

  use super::*;

  #[test]
  fn random_candidates_match_their_format() {
    let source = RandomCandidates;
    for _ in 0..2_000 {
      assert!(is_national_id(&source.candidate(IdFamily::GuardianNationalId)));
      assert!(is_badge_number(&source.candidate(IdFamily::StudentBadge)));
    }
  }

  #[test]
  fn off_format_candidates_are_refused() {
    let ids = IdentifierGenerator::new(|_: IdFamily| "12ab".to_owned(), 3);
    assert!(matches!(
      ids.draw(IdFamily::StudentBadge),
      Err(Error::InvalidIdentifier { .. })
    ));
  }

  #[test]
  fn attempts_never_drop_to_zero() {
    let ids = IdentifierGenerator::new(RandomCandidates, 0);
    assert_eq!(ids.max_attempts(), 1);
    assert_eq!(IdentifierGenerator::default().max_attempts(), DEFAULT_MAX_ATTEMPTS);
  }
}
