use serde::{Deserialize, Serialize};

/// Platform-wide settings, stored as a single row and editable by admins.
/// Read-only input to the settlement routine.
#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct AppSettings {
    pub deposit_wallet_name: String,
    pub deposit_wallet_address: String,
    pub deposit_wallet_network: String,
    pub withdrawal_fee_percent: f64,
    pub min_deposit_in_cents: i64,
    pub max_deposit_in_cents: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppSettingsUpdate {
    pub deposit_wallet_name: Option<String>,
    pub deposit_wallet_address: Option<String>,
    pub deposit_wallet_network: Option<String>,
    pub withdrawal_fee_percent: Option<f64>,
    pub min_deposit_in_cents: Option<i64>,
    pub max_deposit_in_cents: Option<i64>,
}
