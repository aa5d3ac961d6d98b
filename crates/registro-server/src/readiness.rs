//! Startup phase shared between the bootstrap task and request handling.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
  Starting,
  Ready,
  Failed { reason: String },
}

/// Cloneable handle on the current [`Phase`].
#[derive(Clone)]
pub struct Readiness {
  tx: Arc<watch::Sender<Phase>>,
}

impl Default for Readiness {
  fn default() -> Self { Self::new() }
}

impl Readiness {
  pub fn new() -> Self {
    let (tx, _) = watch::channel(Phase::Starting);
    Self { tx: Arc::new(tx) }
  }

  pub fn phase(&self) -> Phase { self.tx.borrow().clone() }

  pub fn set_ready(&self) { self.tx.send_replace(Phase::Ready); }

  pub fn set_failed(&self, reason: impl Into<String>) {
    self.tx.send_replace(Phase::Failed { reason: reason.into() });
  }

  /// Resolve once the phase leaves [`Phase::Starting`].
  pub async fn settled(&self) -> Phase {
    let mut rx = self.tx.subscribe();
    match rx.wait_for(|p| *p != Phase::Starting).await {
      Ok(phase) => phase.clone(),
      Err(_) => self.phase(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn settles_on_the_first_transition() {
    let readiness = Readiness::new();
    assert_eq!(readiness.phase(), Phase::Starting);

    let waiter = {
      let readiness = readiness.clone();
      tokio::spawn(async move { readiness.settled().await })
    };
    readiness.set_failed("ledger unreachable");

    assert_eq!(waiter.await.unwrap(), Phase::Failed { reason: "ledger unreachable".to_owned() });
    readiness.set_ready();
    assert_eq!(readiness.settled().await, Phase::Ready);
  }
}
