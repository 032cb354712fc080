use sqlx::PgPool;

use crate::models::app_settings::{AppSettings, AppSettingsUpdate};

const SETTINGS_COLUMNS: &str = "deposit_wallet_name, deposit_wallet_address, \
     deposit_wallet_network, withdrawal_fee_percent, min_deposit_in_cents, max_deposit_in_cents";

/// The settings singleton row, seeded by migration.
#[derive(Clone)]
pub struct AppSettingsRepository {
    conn: PgPool,
}

impl AppSettingsRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    pub async fn get(&self) -> Result<AppSettings, anyhow::Error> {
        let settings = sqlx::query_as(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM app_settings WHERE singleton = TRUE"
        ))
        .fetch_one(&self.conn)
        .await?;

        Ok(settings)
    }

    pub async fn update(&self, update: &AppSettingsUpdate) -> Result<AppSettings, anyhow::Error> {
        let settings = sqlx::query_as(&format!(
            r#"UPDATE app_settings SET
                deposit_wallet_name = COALESCE($1, deposit_wallet_name),
                deposit_wallet_address = COALESCE($2, deposit_wallet_address),
                deposit_wallet_network = COALESCE($3, deposit_wallet_network),
                withdrawal_fee_percent = COALESCE($4, withdrawal_fee_percent),
                min_deposit_in_cents = COALESCE($5, min_deposit_in_cents),
                max_deposit_in_cents = COALESCE($6, max_deposit_in_cents),
                updated_at = CURRENT_TIMESTAMP
            WHERE singleton = TRUE
            RETURNING {SETTINGS_COLUMNS}"#
        ))
        .bind(&update.deposit_wallet_name)
        .bind(&update.deposit_wallet_address)
        .bind(&update.deposit_wallet_network)
        .bind(update.withdrawal_fee_percent)
        .bind(update.min_deposit_in_cents)
        .bind(update.max_deposit_in_cents)
        .fetch_one(&self.conn)
        .await?;

        Ok(settings)
    }
}
