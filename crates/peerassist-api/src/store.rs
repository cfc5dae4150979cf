use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use peerassist_db::Database;
use tracing::warn;

use crate::error::{ApiError, Result};

/// Handle for running blocking store calls off the async runtime, each under
/// a deadline.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
    deadline: Duration,
}

impl Store {
    pub fn new(db: Arc<Database>, deadline: Duration) -> Self {
        Self { db, deadline }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Run `op` on the blocking pool. A missed deadline surfaces as
    /// [`ApiError::Unavailable`]. The blocking call itself still runs to
    /// completion in the background, so a transaction inside `op` can commit
    /// after the caller has already been told the store was unavailable.
    pub async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let task = tokio::task::spawn_blocking(move || op(&db));

        match tokio::time::timeout(self.deadline, task).await {
            Ok(Ok(result)) => result.map_err(ApiError::Internal),
            Ok(Err(join)) => Err(ApiError::Internal(anyhow!("store task failed: {}", join))),
            Err(_) => {
                let deadline_ms = self.deadline.as_millis() as u64;
                warn!(deadline_ms, "store call timed out");
                Err(ApiError::Unavailable)
            }
        }
    }
}
