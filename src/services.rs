use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::settings::Settings;

mod http;
mod payouts;
mod platform;
mod transactions;
mod users;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),
    #[error("Invalid request: {0}")]
    Invalid(String),
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub async fn start_services(pool: PgPool, settings: Settings) -> Result<(), anyhow::Error> {
    let (transaction_tx, mut transaction_rx) = mpsc::channel(512);
    let (platform_tx, mut platform_rx) = mpsc::channel(512);
    let (user_tx, mut user_rx) = mpsc::channel(512);

    let mut transaction_service = transactions::TransactionService::new();
    let mut platform_service = platform::PlatformService::new();
    let mut user_service = users::UserService::new();

    println!("[*] Starting transaction service.");
    let tx_pool_clone = pool.clone();
    tokio::spawn(async move {
        transaction_service
            .run(
                transactions::TransactionRequestHandler::new(tx_pool_clone),
                &mut transaction_rx,
            )
            .await;
    });

    println!("[*] Starting platform service.");
    let platform_pool_clone = pool.clone();
    tokio::spawn(async move {
        platform_service
            .run(
                platform::PlatformRequestHandler::new(platform_pool_clone),
                &mut platform_rx,
            )
            .await;
    });

    println!("[*] Starting user service.");
    let user_pool_clone = pool.clone();
    tokio::spawn(async move {
        user_service
            .run(
                users::UserRequestHandler::new(user_pool_clone),
                &mut user_rx,
            )
            .await;
    });

    log::info!("Starting payout sweeper.");
    let payout_pool_clone = pool.clone();
    let sweep_interval_secs = settings.payouts.sweep_interval_secs;
    tokio::spawn(async move {
        payouts::PayoutSweeper::new(payout_pool_clone, sweep_interval_secs)
            .run()
            .await;
    });

    println!("[*] Starting HTTP server.");
    http::start_http_server(
        &settings.server.bind_address,
        transaction_tx,
        platform_tx,
        user_tx,
    )
    .await?;

    Ok(())
}
