use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use peerassist_db::{Database, timestamp};
use tracing::{info, warn};

/// Background task that prunes expired OTPs.
///
/// Validation already rejects expired codes; this only keeps the table small.
pub async fn run_sweep_loop(db: Arc<Database>, every: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        let db = db.clone();
        let now = timestamp(Utc::now());
        match tokio::task::spawn_blocking(move || db.purge_expired_otps(&now)).await {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Sweep: removed {} expired OTPs", count);
                }
            }
            Ok(Err(e)) => warn!("Sweep error: {}", e),
            Err(e) => warn!("Sweep task failed: {}", e),
        }
    }
}
