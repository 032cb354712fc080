use anyhow::bail;
use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::{PgPool, Postgres};
use thiserror::Error;
use uuid::Uuid;

use crate::models::app_settings::AppSettings;
use crate::models::plans::InvestmentPlan;
use crate::models::transactions::{
    NewDeposit, NewInvestment, NewWithdrawal, Transaction, TransactionRow, TxStatus, TxType,
};
use crate::models::users::{AccountStatus, User, UserRow};
use crate::settlement::{self, Decision, SettlementError};

const TX_COLUMNS: &str = "id, user_id, user_name, tx_type, amount_in_cents, status, \
     account_name, account_number, method, receipt_url, plan_name, daily_return_percent, \
     duration_days, maturity_date, created_at, updated_at";

#[derive(Debug, Error)]
pub enum SettleError {
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error("invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of a settle call. `settled == false` means the transaction had
/// already left `pending` and nothing was changed.
#[derive(Clone, Copy, Debug)]
pub struct SettleOutcome {
    pub settled: bool,
    pub status: TxStatus,
}

#[derive(Clone)]
pub struct TransactionRepository {
    conn: PgPool,
}

impl TransactionRepository {
    pub fn new(conn: PgPool) -> Self {
        TransactionRepository { conn }
    }

    pub async fn new_deposit(&self, req: &NewDeposit) -> Result<Transaction, anyhow::Error> {
        let settings = self.load_settings(&self.conn).await?;
        let user = self.require_user(&req.user_id).await?;

        if req.amount_in_cents < settings.min_deposit_in_cents {
            bail!("DepositBelowMinimum");
        }
        if req.amount_in_cents > settings.max_deposit_in_cents {
            bail!("DepositAboveMaximum");
        }

        let transaction_id = Uuid::new_v4().hyphenated().to_string();
        let row: TransactionRow = sqlx::query_as(&format!(
            r#"INSERT INTO transactions
            (id, user_id, user_name, tx_type, amount_in_cents, status, receipt_url)
            VALUES ($1, $2, $3, 'deposit', $4, 'pending', $5)
            RETURNING {TX_COLUMNS}"#
        ))
        .bind(&transaction_id)
        .bind(&user.id)
        .bind(&user.display_name)
        .bind(req.amount_in_cents)
        .bind(&req.receipt_url)
        .fetch_one(&self.conn)
        .await?;

        row.try_into()
    }

    pub async fn new_withdrawal(&self, req: &NewWithdrawal) -> Result<Transaction, anyhow::Error> {
        let user = self.require_user(&req.user_id).await?;

        if user.status == AccountStatus::Suspended {
            bail!("AccountSuspended");
        }
        if req.amount_in_cents <= 0 {
            bail!("InvalidAmount");
        }

        let transaction_id = Uuid::new_v4().hyphenated().to_string();
        let row: TransactionRow = sqlx::query_as(&format!(
            r#"INSERT INTO transactions
            (id, user_id, user_name, tx_type, amount_in_cents, status,
             account_name, account_number, method)
            VALUES ($1, $2, $3, 'withdrawal', $4, 'pending', $5, $6, $7)
            RETURNING {TX_COLUMNS}"#
        ))
        .bind(&transaction_id)
        .bind(&user.id)
        .bind(&user.display_name)
        .bind(req.amount_in_cents)
        .bind(&req.account_name)
        .bind(&req.account_number)
        .bind(&req.method)
        .fetch_one(&self.conn)
        .await?;

        row.try_into()
    }

    /// Buy into an investment plan. Funds are reserved at purchase time: the
    /// balance debit and the pending record are written in one transaction.
    pub async fn new_investment(&self, req: &NewInvestment) -> Result<Transaction, anyhow::Error> {
        let plan: Option<InvestmentPlan> = sqlx::query_as(
            "SELECT id, name, min_amount_in_cents, max_amount_in_cents,
                    daily_return_percent, duration_days, min_vip_level
             FROM investment_plans WHERE id = $1",
        )
        .bind(&req.plan_id)
        .fetch_optional(&self.conn)
        .await?;

        let Some(plan) = plan else {
            bail!("PlanNotFound");
        };

        if req.amount_in_cents < plan.min_amount_in_cents
            || req.amount_in_cents > plan.max_amount_in_cents
        {
            bail!("AmountOutsidePlanBounds");
        }

        let mut db_tx = self.conn.begin().await?;

        let user = self
            .lock_user(&mut db_tx, &req.user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("UserNotFound"))?;

        if user.status == AccountStatus::Suspended {
            bail!("AccountSuspended");
        }
        if user.vip_level < plan.min_vip_level {
            bail!("VipLevelTooLow");
        }
        if user.balance_in_cents < req.amount_in_cents {
            bail!("InsufficientBalance");
        }

        sqlx::query(
            "UPDATE users SET balance_in_cents = balance_in_cents - $1,
                    updated_at = CURRENT_TIMESTAMP
             WHERE id = $2",
        )
        .bind(req.amount_in_cents)
        .bind(&user.id)
        .execute(&mut *db_tx)
        .await?;

        let maturity_date = Utc::now().naive_utc() + Duration::days(plan.duration_days as i64);
        let transaction_id = Uuid::new_v4().hyphenated().to_string();
        let row: TransactionRow = sqlx::query_as(&format!(
            r#"INSERT INTO transactions
            (id, user_id, user_name, tx_type, amount_in_cents, status,
             plan_name, daily_return_percent, duration_days, maturity_date)
            VALUES ($1, $2, $3, 'investment', $4, 'pending', $5, $6, $7, $8)
            RETURNING {TX_COLUMNS}"#
        ))
        .bind(&transaction_id)
        .bind(&user.id)
        .bind(&user.display_name)
        .bind(req.amount_in_cents)
        .bind(&plan.name)
        .bind(plan.daily_return_percent)
        .bind(plan.duration_days)
        .bind(maturity_date)
        .fetch_one(&mut *db_tx)
        .await?;

        db_tx.commit().await?;

        row.try_into()
    }

    /// Settle a pending deposit or withdrawal.
    ///
    /// Runs as one database transaction over the transaction row, the owning
    /// user, the referrer (deposit approvals) and a new commission record:
    /// either every mutation commits or none do. Rows are taken `FOR UPDATE`
    /// so concurrent settles serialize and the pending guard holds.
    pub async fn settle(
        &self,
        transaction_id: &str,
        decision: Decision,
    ) -> Result<SettleOutcome, SettleError> {
        let mut db_tx = self.conn.begin().await?;

        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TX_COLUMNS} FROM transactions WHERE id = $1 FOR UPDATE"
        ))
        .bind(transaction_id)
        .fetch_optional(&mut *db_tx)
        .await?;

        let Some(row) = row else {
            return Err(SettleError::TransactionNotFound(transaction_id.to_string()));
        };
        let tx: Transaction = row
            .try_into()
            .map_err(|e: anyhow::Error| SettleError::InvalidRecord(e.to_string()))?;

        if tx.status.is_terminal() {
            return Ok(SettleOutcome {
                settled: false,
                status: tx.status,
            });
        }

        let user = self
            .lock_user(&mut db_tx, &tx.user_id)
            .await?
            .ok_or_else(|| SettleError::UserNotFound(tx.user_id.clone()))?;

        let referrer = match &user.referred_by {
            Some(referrer_id) => self.lock_user(&mut db_tx, referrer_id).await?,
            None => None,
        };

        let settings = self.load_settings(&mut *db_tx).await?;

        let now = Utc::now().naive_utc();
        let planned = settlement::plan(
            &tx,
            &user,
            referrer.as_ref(),
            settings.withdrawal_fee_percent,
            decision,
            now,
        )?;

        let Some(planned) = planned else {
            return Ok(SettleOutcome {
                settled: false,
                status: tx.status,
            });
        };

        sqlx::query(
            "UPDATE users SET balance_in_cents = $1, total_deposits_in_cents = $2,
                    vip_level = $3, vip_progress = $4, failed_deposit_count = $5,
                    status = $6, last_withdrawal_at = $7, updated_at = CURRENT_TIMESTAMP
             WHERE id = $8",
        )
        .bind(planned.user.balance_in_cents)
        .bind(planned.user.total_deposits_in_cents)
        .bind(planned.user.vip_level)
        .bind(planned.user.vip_progress)
        .bind(planned.user.failed_deposit_count)
        .bind(planned.user.status.as_str())
        .bind(planned.user.last_withdrawal_at)
        .bind(&planned.user.id)
        .execute(&mut *db_tx)
        .await?;

        if let Some(commission) = &planned.commission {
            sqlx::query(
                "UPDATE users SET balance_in_cents = balance_in_cents + $1,
                        updated_at = CURRENT_TIMESTAMP
                 WHERE id = $2",
            )
            .bind(commission.amount_in_cents)
            .bind(&commission.referrer_id)
            .execute(&mut *db_tx)
            .await?;

            let referrer_name = referrer
                .as_ref()
                .map(|r| r.display_name.clone())
                .unwrap_or_default();
            sqlx::query(
                "INSERT INTO transactions
                 (id, user_id, user_name, tx_type, amount_in_cents, status)
                 VALUES ($1, $2, $3, 'commission', $4, 'completed')",
            )
            .bind(Uuid::new_v4().hyphenated().to_string())
            .bind(&commission.referrer_id)
            .bind(referrer_name)
            .bind(commission.amount_in_cents)
            .execute(&mut *db_tx)
            .await?;
        }

        sqlx::query(
            "UPDATE transactions SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
        )
        .bind(planned.new_status.as_str())
        .bind(&tx.id)
        .execute(&mut *db_tx)
        .await?;

        db_tx.commit().await?;

        log::info!(
            "Settled transaction {} ({}) as {}.",
            tx.id,
            tx.tx_type.as_str(),
            planned.new_status.as_str()
        );

        Ok(SettleOutcome {
            settled: true,
            status: planned.new_status,
        })
    }

    /// Pay out every pending investment whose maturity date has passed.
    /// Returns the number of investments paid. Failures on individual
    /// investments are logged and skipped; the next sweep retries them.
    pub async fn sweep_matured(&self, now: NaiveDateTime) -> Result<u32, anyhow::Error> {
        let due: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM transactions
             WHERE tx_type = 'investment' AND status = 'pending' AND maturity_date <= $1
             ORDER BY maturity_date",
        )
        .bind(now)
        .fetch_all(&self.conn)
        .await?;

        let mut paid = 0;
        for id in due {
            match self.pay_out_investment(&id).await {
                Ok(true) => paid += 1,
                Ok(false) => {}
                Err(e) => log::error!("Failed to pay out investment {}: {}", id, e),
            }
        }

        Ok(paid)
    }

    /// Credit principal plus accrued return and mark the investment
    /// completed, atomically. The pending re-check under `FOR UPDATE` makes
    /// the payout exactly-once even with overlapping sweeps.
    async fn pay_out_investment(&self, transaction_id: &str) -> Result<bool, anyhow::Error> {
        let mut db_tx = self.conn.begin().await?;

        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TX_COLUMNS} FROM transactions WHERE id = $1 FOR UPDATE"
        ))
        .bind(transaction_id)
        .fetch_optional(&mut *db_tx)
        .await?;

        let Some(row) = row else {
            bail!("Investment not found: {}", transaction_id);
        };
        let tx: Transaction = row.try_into()?;

        if tx.tx_type != TxType::Investment || tx.status.is_terminal() {
            return Ok(false);
        }
        let Some(investment) = &tx.investment else {
            bail!("Investment {} is missing plan details", tx.id);
        };

        let payout = settlement::investment_payout_cents(
            tx.amount_in_cents,
            investment.daily_return_percent,
            investment.duration_days,
        );

        sqlx::query(
            "UPDATE users SET balance_in_cents = balance_in_cents + $1,
                    updated_at = CURRENT_TIMESTAMP
             WHERE id = $2",
        )
        .bind(payout)
        .bind(&tx.user_id)
        .execute(&mut *db_tx)
        .await?;

        sqlx::query(
            "INSERT INTO transactions
             (id, user_id, user_name, tx_type, amount_in_cents, status, plan_name)
             VALUES ($1, $2, $3, 'payout', $4, 'completed', $5)",
        )
        .bind(Uuid::new_v4().hyphenated().to_string())
        .bind(&tx.user_id)
        .bind(&tx.user_name)
        .bind(payout)
        .bind(&investment.plan_name)
        .execute(&mut *db_tx)
        .await?;

        sqlx::query(
            "UPDATE transactions SET status = 'completed', updated_at = CURRENT_TIMESTAMP
             WHERE id = $1",
        )
        .bind(&tx.id)
        .execute(&mut *db_tx)
        .await?;

        db_tx.commit().await?;

        log::info!(
            "Investment {} matured: paid out {} cents to user {}.",
            tx.id,
            payout,
            tx.user_id
        );

        Ok(true)
    }

    pub async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, anyhow::Error> {
        let row: Option<TransactionRow> =
            sqlx::query_as(&format!("SELECT {TX_COLUMNS} FROM transactions WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.conn)
                .await?;

        row.map(Transaction::try_from).transpose()
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Transaction>, anyhow::Error> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TX_COLUMNS} FROM transactions
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT 100"
        ))
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn require_user(&self, user_id: &str) -> Result<User, anyhow::Error> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.conn)
            .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => bail!("UserNotFound"),
        }
    }

    async fn lock_user(
        &self,
        db_tx: &mut sqlx::Transaction<'_, Postgres>,
        user_id: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **db_tx)
            .await?;

        Ok(row.map(User::from))
    }

    async fn load_settings<'e, E>(&self, executor: E) -> Result<AppSettings, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query_as(
            "SELECT deposit_wallet_name, deposit_wallet_address, deposit_wallet_network,
                    withdrawal_fee_percent, min_deposit_in_cents, max_deposit_in_cents
             FROM app_settings WHERE singleton = TRUE",
        )
        .fetch_one(executor)
        .await
    }
}
