//! Best-effort background work. Jobs never report back to the request that
//! queued them; failures end up in the log and are not retried.

use std::sync::Arc;

use peerassist_db::Database;
use peerassist_types::events::Notification;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::mailer::Mailer;

#[derive(Debug)]
pub enum Job {
    Notify(Notification),
    /// Bump the view counter of every task shown in a feed response.
    CountViews(Vec<String>),
}

#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl JobQueue {
    /// Spawn the worker loop. Must be called from inside a tokio runtime.
    pub fn start(db: Arc<Database>, mailer: Mailer) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, db, mailer));
        Self { tx }
    }

    pub fn push(&self, job: Job) {
        if let Err(e) = self.tx.send(job) {
            warn!(job = ?e.0, "Job queue closed, dropping job");
        }
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Job>, db: Arc<Database>, mailer: Mailer) {
    while let Some(job) = rx.recv().await {
        match job {
            Job::Notify(notification) => {
                let mailer = mailer.clone();
                tokio::spawn(async move {
                    if let Err(e) = mailer.send(&notification).await {
                        let to = notification.recipient();
                        warn!(to, "Failed to send notification: {:#}", e);
                    }
                });
            }
            Job::CountViews(ids) => {
                let db = db.clone();
                tokio::spawn(async move {
                    match tokio::task::spawn_blocking(move || db.increment_views(&ids)).await {
                        Ok(Ok(touched)) => debug!(touched, "Recorded feed views"),
                        Ok(Err(e)) => warn!("Failed to record feed views: {:#}", e),
                        Err(e) => warn!("View counter task panicked: {}", e),
                    }
                });
            }
        }
    }
    debug!("Job queue drained");
}
