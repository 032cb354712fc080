use sqlx::PgPool;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::repositories::transactions::TransactionRepository;

/// Periodic sweep that pays out matured investments.
///
/// The pending investment row is the durable job entry, so nothing is lost
/// across restarts: the first tick fires immediately and settles anything
/// that matured while the process was down.
pub struct PayoutSweeper {
    repository: TransactionRepository,
    sweep_interval: Duration,
}

impl PayoutSweeper {
    pub fn new(sql_conn: PgPool, sweep_interval_secs: u64) -> Self {
        PayoutSweeper {
            repository: TransactionRepository::new(sql_conn),
            sweep_interval: Duration::from_secs(sweep_interval_secs),
        }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let now = chrono::Utc::now().naive_utc();
            match self.repository.sweep_matured(now).await {
                Ok(0) => {}
                Ok(paid) => log::info!("Payout sweep settled {} matured investment(s).", paid),
                Err(e) => log::error!("Payout sweep failed: {}", e),
            }
        }
    }
}
