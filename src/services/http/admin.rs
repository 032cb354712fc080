use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;

use super::{caller_capabilities, error_status};
use crate::models::app_settings::AppSettingsUpdate;
use crate::models::transactions::{TxStatus, TxType};
use crate::services::platform::PlatformRequest;
use crate::services::transactions::TransactionServiceRequest;
use crate::settlement::Decision;

#[derive(Deserialize)]
pub struct SettleRequest {
    /// Terminal status to apply: "completed" or "failed".
    pub status: String,
}

pub async fn settle(
    State(state): State<super::AppState>,
    headers: HeaderMap,
    Path(transaction_id): Path<String>,
    Json(req): Json<SettleRequest>,
) -> impl IntoResponse {
    let decision = match TxStatus::parse(&req.status) {
        Some(TxStatus::Completed) => Decision::Completed,
        Some(TxStatus::Failed) => Decision::Failed,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"description": "Status must be 'completed' or 'failed'"})),
            );
        }
    };

    // Capability check depends on what is being approved.
    let capabilities = caller_capabilities(&headers);
    let (get_tx, get_rx) = oneshot::channel();
    let send_result = state
        .transaction_channel
        .send(TransactionServiceRequest::Get {
            transaction_id: transaction_id.clone(),
            response: get_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    let transaction = match get_rx.await {
        Ok(Ok(Some(transaction))) => transaction,
        Ok(Ok(None)) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"description": "Transaction not found"})),
            );
        }
        Ok(Err(service_error)) => {
            return (
                error_status(&service_error),
                Json(json!({"description": service_error.to_string()})),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"description": format!("Failed to receive response: {}", e)})),
            );
        }
    };

    // Investments terminalize through the maturity sweep; payouts and
    // commissions are born terminal.
    let allowed = match transaction.tx_type {
        TxType::Deposit => capabilities.can_approve_deposits,
        TxType::Withdrawal => capabilities.can_approve_withdrawals,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"description": "Only deposits and withdrawals can be settled"})),
            );
        }
    };
    if !allowed {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"description": "Caller may not settle this transaction"})),
        );
    }

    let (settle_tx, settle_rx) = oneshot::channel();
    let send_result = state
        .transaction_channel
        .send(TransactionServiceRequest::Settle {
            transaction_id,
            decision,
            response: settle_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match settle_rx.await {
        Ok(Ok(outcome)) => (
            StatusCode::OK,
            Json(json!({
                "settled": outcome.settled,
                "status": outcome.status.as_str(),
            })),
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

pub async fn get_settings(
    State(state): State<super::AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !caller_capabilities(&headers).can_edit_settings {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"description": "Caller may not read platform settings"})),
        );
    }

    let (settings_tx, settings_rx) = oneshot::channel();
    let send_result = state
        .platform_channel
        .send(PlatformRequest::GetSettings {
            response: settings_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match settings_rx.await {
        Ok(Ok(settings)) => (StatusCode::OK, Json(json!(settings))),
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

pub async fn update_settings(
    State(state): State<super::AppState>,
    headers: HeaderMap,
    Json(update): Json<AppSettingsUpdate>,
) -> impl IntoResponse {
    if !caller_capabilities(&headers).can_edit_settings {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"description": "Caller may not edit platform settings"})),
        );
    }

    let (settings_tx, settings_rx) = oneshot::channel();
    let send_result = state
        .platform_channel
        .send(PlatformRequest::UpdateSettings {
            update,
            response: settings_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"description": format!("Failed to process request: {}", e)})),
        );
    }

    match settings_rx.await {
        Ok(Ok(settings)) => (StatusCode::OK, Json(json!(settings))),
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
