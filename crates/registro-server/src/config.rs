//! Process configuration, read once at startup.
//!
//! Sources, lowest precedence first: built-in defaults, the optional TOML
//! file, `REGISTRO_*` environment variables, then the bare `DATABASE_URL`
//! and `NODE_ENV` variables that existing deployments already set.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use config::{Config, ConfigError, Environment, File};
use registro_schema::{AdminSeed, IdentifierGenerator, RandomCandidates};
use registro_store_postgres::PostgresSettings;
use registro_store_sqlite::SqliteSettings;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:                    String,
  pub port:                    u16,
  /// `production` selects PostgreSQL when a database URL is configured.
  pub node_env:                String,
  pub database_url:            Option<String>,
  pub sqlite_path:             PathBuf,
  pub statement_timeout_ms:    u64,
  pub pool_max_size:           usize,
  pub identifier_max_attempts: u32,
  pub admin_name:              String,
  pub admin_email:             String,
  pub admin_password:          String,
  /// Refuse to become ready unless every migration step succeeded.
  pub require_clean_migration: bool,
}

/// Values of the unprefixed variables honoured for compatibility.
#[derive(Debug, Clone, Default)]
pub struct LegacyEnv {
  pub database_url: Option<String>,
  pub node_env:     Option<String>,
}

impl LegacyEnv {
  pub fn from_process() -> Self {
    Self {
      database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
      node_env:     std::env::var("NODE_ENV").ok().filter(|v| !v.is_empty()),
    }
  }
}

/// Which backend the process runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend<'a> {
  Postgres { url: &'a str },
  Sqlite { path: &'a Path },
}

impl ServerConfig {
  pub fn load(path: &Path, legacy: LegacyEnv) -> Result<Self, ConfigError> {
    let seed = AdminSeed::default();
    let mut builder = Config::builder()
      .set_default("host", "0.0.0.0")?
      .set_default("port", 3000)?
      .set_default("node_env", "development")?
      .set_default("sqlite_path", "registro.db")?
      .set_default("statement_timeout_ms", 30_000)?
      .set_default("pool_max_size", 8)?
      .set_default("identifier_max_attempts", 1_000)?
      .set_default("admin_name", seed.name)?
      .set_default("admin_email", seed.email)?
      .set_default("admin_password", seed.password)?
      .set_default("require_clean_migration", false)?
      .add_source(File::from(path).required(false))
      .add_source(Environment::with_prefix("REGISTRO").try_parsing(true));

    if let Some(url) = legacy.database_url {
      builder = builder.set_override("database_url", url)?;
    }
    if let Some(env) = legacy.node_env {
      builder = builder.set_override("node_env", env)?;
    }

    builder.build()?.try_deserialize()
  }

  pub fn backend(&self) -> Backend<'_> {
    match &self.database_url {
      Some(url) if self.node_env == "production" => Backend::Postgres { url },
      _ => Backend::Sqlite { path: &self.sqlite_path },
    }
  }

  pub fn statement_timeout(&self) -> Duration { Duration::from_millis(self.statement_timeout_ms) }

  pub fn sqlite_settings(&self) -> SqliteSettings {
    SqliteSettings {
      statement_timeout: self.statement_timeout(),
      ..SqliteSettings::default()
    }
  }

  pub fn postgres_settings(&self) -> PostgresSettings {
    PostgresSettings {
      pool_max_size:     self.pool_max_size,
      statement_timeout: self.statement_timeout(),
    }
  }

  pub fn identifiers(&self) -> IdentifierGenerator {
    IdentifierGenerator::new(RandomCandidates, self.identifier_max_attempts)
  }

  pub fn admin_seed(&self) -> AdminSeed {
    AdminSeed {
      name:     self.admin_name.clone(),
      email:    self.admin_email.clone(),
      password: self.admin_password.clone(),
    }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn missing_file() -> PathBuf { std::env::temp_dir().join("registro-config-does-not-exist.toml") }

  #[test]
  fn defaults_select_sqlite() {
    let cfg = ServerConfig::load(&missing_file(), LegacyEnv::default()).unwrap();
    assert_eq!(cfg.port, 3000);
    assert_eq!(cfg.identifier_max_attempts, 1_000);
    assert_eq!(cfg.statement_timeout(), Duration::from_secs(30));
    assert_eq!(cfg.admin_email, "admin@colegio.com");
    assert_eq!(cfg.backend(), Backend::Sqlite { path: Path::new("registro.db") });
  }

  #[test]
  fn production_with_url_selects_postgres() {
    let legacy = LegacyEnv {
      database_url: Some("postgres://app@db/registro".to_owned()),
      node_env:     Some("production".to_owned()),
    };
    let cfg = ServerConfig::load(&missing_file(), legacy).unwrap();
    assert_eq!(cfg.backend(), Backend::Postgres { url: "postgres://app@db/registro" });
  }

  #[test]
  fn url_outside_production_stays_on_sqlite() {
    let legacy = LegacyEnv {
      database_url: Some("postgres://app@db/registro".to_owned()),
      node_env:     None,
    };
    let cfg = ServerConfig::load(&missing_file(), legacy).unwrap();
    assert!(matches!(cfg.backend(), Backend::Sqlite { .. }));
  }

  #[test]
  fn file_values_override_defaults() {
    let path = std::env::temp_dir().join(format!("registro-config-{}.toml", std::process::id()));
    std::fs::write(
      &path,
      "port = 8081\nsqlite_path = \"/var/lib/registro/data.db\"\nrequire_clean_migration = true\n",
    )
    .unwrap();

    let cfg = ServerConfig::load(&path, LegacyEnv::default()).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(cfg.port, 8081);
    assert!(cfg.require_clean_migration);
    assert_eq!(cfg.sqlite_settings().statement_timeout, Duration::from_secs(30));
    assert_eq!(
      cfg.backend(),
      Backend::Sqlite { path: Path::new("/var/lib/registro/data.db") }
    );
  }
}
