use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::transactions::{NewDeposit, NewInvestment, NewWithdrawal, Transaction};
use crate::repositories::transactions::{SettleError, SettleOutcome, TransactionRepository};
use crate::settlement::{Decision, SettlementError};

pub enum TransactionServiceRequest {
    NewDeposit {
        request: NewDeposit,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    NewWithdrawal {
        request: NewWithdrawal,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    NewInvestment {
        request: NewInvestment,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    Settle {
        transaction_id: String,
        decision: Decision,
        response: oneshot::Sender<Result<SettleOutcome, ServiceError>>,
    },
    ListForUser {
        user_id: String,
        response: oneshot::Sender<Result<Vec<Transaction>, ServiceError>>,
    },
    Get {
        transaction_id: String,
        response: oneshot::Sender<Result<Option<Transaction>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct TransactionRequestHandler {
    repository: TransactionRepository,
}

impl TransactionRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        let repository = TransactionRepository::new(sql_conn);

        TransactionRequestHandler { repository }
    }

    async fn new_deposit(&self, request: &NewDeposit) -> Result<Transaction, ServiceError> {
        self.repository
            .new_deposit(request)
            .await
            .map_err(|e| ServiceError::Invalid(e.to_string()))
    }

    async fn new_withdrawal(&self, request: &NewWithdrawal) -> Result<Transaction, ServiceError> {
        self.repository
            .new_withdrawal(request)
            .await
            .map_err(|e| ServiceError::Invalid(e.to_string()))
    }

    async fn new_investment(&self, request: &NewInvestment) -> Result<Transaction, ServiceError> {
        self.repository
            .new_investment(request)
            .await
            .map_err(|e| ServiceError::Invalid(e.to_string()))
    }

    async fn settle(
        &self,
        transaction_id: &str,
        decision: Decision,
    ) -> Result<SettleOutcome, ServiceError> {
        self.repository
            .settle(transaction_id, decision)
            .await
            .map_err(|e| match e {
                SettleError::TransactionNotFound(id) => {
                    ServiceError::NotFound(format!("transaction {}", id))
                }
                SettleError::UserNotFound(id) => ServiceError::NotFound(format!("user {}", id)),
                SettleError::Settlement(inner @ SettlementError::InsufficientBalance { .. }) => {
                    ServiceError::InsufficientBalance(inner.to_string())
                }
                SettleError::Settlement(inner) => ServiceError::Invalid(inner.to_string()),
                SettleError::InvalidRecord(msg) => ServiceError::Internal(msg),
                SettleError::Database(e) => ServiceError::Database(e.to_string()),
            })
    }

    async fn get(&self, transaction_id: &str) -> Result<Option<Transaction>, ServiceError> {
        self.repository
            .get_transaction(transaction_id)
            .await
            .map_err(|e| ServiceError::Repository("TransactionService".to_string(), e.to_string()))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Transaction>, ServiceError> {
        self.repository
            .list_for_user(user_id)
            .await
            .map_err(|e| ServiceError::Repository("TransactionService".to_string(), e.to_string()))
    }
}

#[async_trait]
impl RequestHandler<TransactionServiceRequest> for TransactionRequestHandler {
    async fn handle_request(&self, request: TransactionServiceRequest) {
        match request {
            TransactionServiceRequest::NewDeposit { request, response } => {
                let result = self.new_deposit(&request).await;
                let _ = response.send(result);
            }
            TransactionServiceRequest::NewWithdrawal { request, response } => {
                let result = self.new_withdrawal(&request).await;
                let _ = response.send(result);
            }
            TransactionServiceRequest::NewInvestment { request, response } => {
                let result = self.new_investment(&request).await;
                let _ = response.send(result);
            }
            TransactionServiceRequest::Settle {
                transaction_id,
                decision,
                response,
            } => {
                let result = self.settle(&transaction_id, decision).await;
                let _ = response.send(result);
            }
            TransactionServiceRequest::ListForUser { user_id, response } => {
                let result = self.list_for_user(&user_id).await;
                let _ = response.send(result);
            }
            TransactionServiceRequest::Get {
                transaction_id,
                response,
            } => {
                let result = self.get(&transaction_id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct TransactionService;

impl TransactionService {
    pub fn new() -> Self {
        TransactionService {}
    }
}

#[async_trait]
impl Service<TransactionServiceRequest, TransactionRequestHandler> for TransactionService {}
