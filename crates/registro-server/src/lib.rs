//! Process wiring for Registro: configuration, bootstrap and the health
//! surface that reports whether the records store is ready.
//!
//! Requests other than liveness are held behind a readiness gate until
//! migrations and seeding have completed.

pub mod config;
pub mod error;
pub mod readiness;

pub use config::{Backend, LegacyEnv, ServerConfig};
pub use error::ApiError;
pub use readiness::{Phase, Readiness};

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{Request, State},
  http::StatusCode,
  middleware::{self, Next},
  response::{IntoResponse, Response},
  routing::get,
};
use registro_core::{Error as StoreError, Store, Table};
use registro_schema::{
  Argon2Hasher, BootstrapReport, bootstrap, catalog,
  ledger::{self, LedgerEntry},
  migrator::{self, Drift},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

// ─── Application state ───────────────────────────────────────────────────────

pub struct AppState<S> {
  pub store:     Arc<S>,
  pub readiness: Readiness,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), readiness: self.readiness.clone() }
  }
}

// ─── Bootstrap ───────────────────────────────────────────────────────────────

/// Migrate and seed `store`, then move `readiness` out of
/// [`Phase::Starting`]. An unreachable ledger is returned as an error; failed
/// steps only block readiness when the configuration asks for a clean run.
pub async fn bring_up<S: Store>(
  store: &S,
  config: &ServerConfig,
  readiness: &Readiness,
) -> Result<BootstrapReport, StoreError> {
  let ids = config.identifiers();
  let seed = config.admin_seed();

  match bootstrap(store, &ids, &Argon2Hasher, &seed).await {
    Ok(report) => {
      if config.require_clean_migration && !report.migration.is_clean() {
        readiness.set_failed("migration left failed or skipped steps");
      } else {
        readiness.set_ready();
      }
      Ok(report)
    }
    Err(e) => {
      readiness.set_failed(e.to_string());
      Err(e)
    }
  }
}

/// Ledger contents and drift, as reported by `status` and `/health/schema`.
#[derive(Debug, Serialize)]
pub struct SchemaStatus {
  pub ledger: Vec<LedgerEntry>,
  pub drift:  Vec<Drift>,
}

pub async fn schema_status<S: Store>(store: &S) -> Result<SchemaStatus, StoreError> {
  let ledger = if catalog::has_table(store, Table::Ledger).await? {
    ledger::entries(store).await?
  } else {
    Vec::new()
  };
  let drift = migrator::drift(store).await?;
  Ok(SchemaStatus { ledger, drift })
}

// ─── Router ──────────────────────────────────────────────────────────────────

pub fn router<S>(state: AppState<S>) -> Router
where
  S: Store + 'static,
{
  let gated = Router::new()
    .route("/health/schema", get(schema::<S>))
    .route_layer(middleware::from_fn_with_state(state.clone(), require_ready::<S>));

  Router::new()
    .route("/health/live",  get(live))
    .route("/health/ready", get(ready::<S>))
    .merge(gated)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn require_ready<S>(State(state): State<AppState<S>>, req: Request, next: Next) -> Response
where
  S: Store + 'static,
{
  match state.readiness.phase() {
    Phase::Ready => next.run(req).await,
    Phase::Starting => ApiError::Unavailable("bootstrap in progress".to_owned()).into_response(),
    Phase::Failed { reason } => ApiError::Unavailable(reason).into_response(),
  }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn live() -> StatusCode { StatusCode::OK }

async fn ready<S>(State(state): State<AppState<S>>) -> (StatusCode, Json<Phase>)
where
  S: Store + 'static,
{
  let phase = state.readiness.phase();
  let status = if phase == Phase::Ready {
    StatusCode::OK
  } else {
    StatusCode::SERVICE_UNAVAILABLE
  };
  (status, Json(phase))
}

async fn schema<S>(State(state): State<AppState<S>>) -> Result<Json<SchemaStatus>, ApiError>
where
  S: Store + 'static,
{
  Ok(Json(schema_status(state.store.as_ref()).await?))
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::path::Path;

  use axum::{body::Body, http::Request};
  use registro_core::Statement;
  use registro_store_sqlite::SqliteStore;
  use serde_json::Value;
  use tower::ServiceExt as _;

  use super::*;

  async fn make_state() -> AppState<SqliteStore> {
    AppState {
      store:     Arc::new(SqliteStore::open_in_memory().await.unwrap()),
      readiness: Readiness::new(),
    }
  }

  fn test_config() -> ServerConfig {
    ServerConfig::load(Path::new("registro-test-missing.toml"), LegacyEnv::default()).unwrap()
  }

  async fn get_json(state: AppState<SqliteStore>, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
  }

  #[tokio::test]
  async fn liveness_answers_while_starting() {
    let state = make_state().await;
    let (status, _) = get_json(state.clone(), "/health/live").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get_json(state.clone(), "/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["state"], "starting");

    let (status, body) = get_json(state, "/health/schema").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("bootstrap in progress"));
  }

  #[tokio::test]
  async fn bring_up_opens_the_gate() {
    let state = make_state().await;
    let report = bring_up(state.store.as_ref(), &test_config(), &state.readiness)
      .await
      .unwrap();
    assert!(report.migration.is_clean());

    let (status, body) = get_json(state.clone(), "/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ready");

    let (status, body) = get_json(state, "/health/schema").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ledger"].as_array().unwrap().len(), 16);
    assert_eq!(body["drift"].as_array().unwrap().len(), 0);
  }

  #[tokio::test]
  async fn unclean_migration_can_hold_the_gate() {
    let state = make_state().await;
    state
      .store
      .execute(Statement::new(
        "CREATE TABLE maestros (id INTEGER PRIMARY KEY AUTOINCREMENT, nombre TEXT NOT NULL)",
      ))
      .await
      .unwrap();

    let config = ServerConfig { require_clean_migration: true, ..test_config() };
    let report = bring_up(state.store.as_ref(), &config, &state.readiness)
      .await
      .unwrap();
    assert!(!report.migration.is_clean());

    let (status, body) = get_json(state.clone(), "/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["state"], "failed");

    let (status, _) = get_json(state, "/health/schema").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  }

  #[tokio::test]
  async fn status_of_an_untouched_store_shows_every_table_missing() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let status = schema_status(&store).await.unwrap();
    assert!(status.ledger.is_empty());
    assert_eq!(status.drift.len(), Table::DOMAIN.len());
  }
}
