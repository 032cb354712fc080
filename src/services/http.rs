use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::platform::PlatformRequest;
use super::transactions::TransactionServiceRequest;
use super::users::UserRequest;
use super::ServiceError;
use crate::models::transactions::{NewDeposit, NewInvestment, NewWithdrawal, Transaction};
use crate::models::users::{Capabilities, Role};

mod admin;
mod users;

#[derive(Clone)]
pub struct AppState {
    transaction_channel: mpsc::Sender<TransactionServiceRequest>,
    platform_channel: mpsc::Sender<PlatformRequest>,
    user_channel: mpsc::Sender<UserRequest>,
}

/// Identity forwarded by the authenticating gateway. This service never
/// verifies credentials itself.
pub fn caller_capabilities(headers: &HeaderMap) -> Capabilities {
    let role = headers
        .get("x-user-role")
        .and_then(|v| v.to_str().ok())
        .map(Role::parse)
        .unwrap_or(Role::User);

    Capabilities::for_role(role)
}

/// The calling user's id, from the same gateway headers.
pub fn caller_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn error_status(error: &ServiceError) -> StatusCode {
    match error {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Invalid(_) | ServiceError::InsufficientBalance(_) => StatusCode::BAD_REQUEST,
        ServiceError::Internal(_) | ServiceError::Database(_) | ServiceError::Repository(_, _) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Serialize)]
struct TransactionResponse {
    id: String,
    user_id: String,
    tx_type: String,
    amount_in_cents: i64,
    status: String,
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        TransactionResponse {
            id: tx.id,
            user_id: tx.user_id,
            tx_type: tx.tx_type.as_str().to_string(),
            amount_in_cents: tx.amount_in_cents,
            status: tx.status.as_str().to_string(),
        }
    }
}

async fn submit_transaction(
    state: &AppState,
    request: TransactionServiceRequest,
    rx: oneshot::Receiver<Result<Transaction, ServiceError>>,
) -> (StatusCode, Json<serde_json::Value>) {
    if let Err(e) = state.transaction_channel.send(request).await {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match rx.await {
        Ok(Ok(transaction)) => (
            StatusCode::CREATED,
            Json(json!(TransactionResponse::from(transaction))),
        ),
        Ok(Err(service_error)) => (
            error_status(&service_error),
            Json(json!({"description": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to receive response: {}", e)})),
        ),
    }
}

fn missing_identity() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"description": "Missing X-User-Id header"})),
    )
}

async fn request_new_deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut req): Json<NewDeposit>,
) -> impl IntoResponse {
    let Some(user_id) = caller_id(&headers) else {
        return missing_identity();
    };
    req.user_id = user_id;

    let (tx, rx) = oneshot::channel();
    submit_transaction(
        &state,
        TransactionServiceRequest::NewDeposit {
            request: req,
            response: tx,
        },
        rx,
    )
    .await
}

async fn request_new_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut req): Json<NewWithdrawal>,
) -> impl IntoResponse {
    let Some(user_id) = caller_id(&headers) else {
        return missing_identity();
    };
    req.user_id = user_id;

    let (tx, rx) = oneshot::channel();
    submit_transaction(
        &state,
        TransactionServiceRequest::NewWithdrawal {
            request: req,
            response: tx,
        },
        rx,
    )
    .await
}

async fn request_new_investment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut req): Json<NewInvestment>,
) -> impl IntoResponse {
    let Some(user_id) = caller_id(&headers) else {
        return missing_identity();
    };
    req.user_id = user_id;

    let (tx, rx) = oneshot::channel();
    submit_transaction(
        &state,
        TransactionServiceRequest::NewInvestment {
            request: req,
            response: tx,
        },
        rx,
    )
    .await
}

async fn list_plans(State(state): State<AppState>) -> impl IntoResponse {
    let (plans_tx, plans_rx) = oneshot::channel();

    if let Err(e) = state
        .platform_channel
        .send(PlatformRequest::ListPlans { response: plans_tx })
        .await
    {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match plans_rx.await {
        Ok(Ok(plans)) => (StatusCode::OK, Json(json!({ "plans": plans }))),
        Ok(Err(service_error)) => (
            error_status(&service_error),
            Json(json!({"description": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to receive response: {}", e)})),
        ),
    }
}

pub async fn start_http_server(
    bind_address: &str,
    transaction_channel: mpsc::Sender<TransactionServiceRequest>,
    platform_channel: mpsc::Sender<PlatformRequest>,
    user_channel: mpsc::Sender<UserRequest>,
) -> Result<(), anyhow::Error> {
    let app_state = AppState {
        transaction_channel,
        platform_channel,
        user_channel,
    };

    let app = Router::new()
        .route("/users", post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user).put(users::update_profile),
        )
        .route("/users/{id}/transactions", get(users::list_transactions))
        .route("/plans", get(list_plans))
        .route("/deposits", post(request_new_deposit))
        .route("/withdrawals", post(request_new_withdrawal))
        .route("/investments", post(request_new_investment))
        .route("/admin/transactions/{id}/settle", post(admin::settle))
        .route(
            "/admin/settings",
            get(admin::get_settings).put(admin::update_settings),
        )
        .route("/health", get(|| async { "OK" }))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    println!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn caller_id_comes_from_the_gateway_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(caller_id(&headers), None);

        headers.insert("x-user-id", HeaderValue::from_static(""));
        assert_eq!(caller_id(&headers), None);

        headers.insert("x-user-id", HeaderValue::from_static("user-7"));
        assert_eq!(caller_id(&headers), Some("user-7".to_string()));
    }

    #[test]
    fn missing_or_unknown_role_gets_no_approval_capabilities() {
        let mut headers = HeaderMap::new();
        assert!(!caller_capabilities(&headers).can_approve_deposits);

        headers.insert("x-user-role", HeaderValue::from_static("wizard"));
        assert!(!caller_capabilities(&headers).can_approve_withdrawals);

        headers.insert("x-user-role", HeaderValue::from_static("admin"));
        let capabilities = caller_capabilities(&headers);
        assert!(capabilities.can_approve_deposits);
        assert!(capabilities.can_approve_withdrawals);
        assert!(capabilities.can_edit_settings);
    }
}
