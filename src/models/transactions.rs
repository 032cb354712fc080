use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Deposit,
    Withdrawal,
    Investment,
    Payout,
    Commission,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Deposit => "deposit",
            TxType::Withdrawal => "withdrawal",
            TxType::Investment => "investment",
            TxType::Payout => "payout",
            TxType::Commission => "commission",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "deposit" => Some(TxType::Deposit),
            "withdrawal" => Some(TxType::Withdrawal),
            "investment" => Some(TxType::Investment),
            "payout" => Some(TxType::Payout),
            "commission" => Some(TxType::Commission),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Completed => "completed",
            TxStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TxStatus::Pending),
            "completed" => Some(TxStatus::Completed),
            "failed" => Some(TxStatus::Failed),
            _ => None,
        }
    }

    /// Pending is the only non-terminal status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WithdrawalDetails {
    pub account_name: String,
    pub account_number: String,
    pub method: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InvestmentDetails {
    pub plan_name: String,
    pub daily_return_percent: f64,
    pub duration_days: i32,
    pub maturity_date: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub tx_type: TxType,
    /// Always positive; `tx_type` carries the direction.
    pub amount_in_cents: i64,
    pub status: TxStatus,
    pub withdrawal: Option<WithdrawalDetails>,
    pub receipt_url: Option<String>,
    pub investment: Option<InvestmentDetails>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

/// Raw row with the detail structs flattened into nullable columns.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub tx_type: String,
    pub amount_in_cents: i64,
    pub status: String,
    pub account_name: Option<String>,
    pub account_number: Option<String>,
    pub method: Option<String>,
    pub receipt_url: Option<String>,
    pub plan_name: Option<String>,
    pub daily_return_percent: Option<f64>,
    pub duration_days: Option<i32>,
    pub maturity_date: Option<chrono::NaiveDateTime>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = anyhow::Error;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let tx_type = TxType::parse(&row.tx_type)
            .ok_or_else(|| anyhow::anyhow!("Unknown transaction type: {}", row.tx_type))?;
        let status = TxStatus::parse(&row.status)
            .ok_or_else(|| anyhow::anyhow!("Unknown transaction status: {}", row.status))?;

        let withdrawal = match (row.account_name, row.account_number, row.method) {
            (Some(account_name), Some(account_number), Some(method)) => Some(WithdrawalDetails {
                account_name,
                account_number,
                method,
            }),
            _ => None,
        };

        let investment = match (
            row.plan_name,
            row.daily_return_percent,
            row.duration_days,
            row.maturity_date,
        ) {
            (Some(plan_name), Some(daily_return_percent), Some(duration_days), Some(maturity_date)) => {
                Some(InvestmentDetails {
                    plan_name,
                    daily_return_percent,
                    duration_days,
                    maturity_date,
                })
            }
            _ => None,
        };

        Ok(Transaction {
            id: row.id,
            user_id: row.user_id,
            user_name: row.user_name,
            tx_type,
            amount_in_cents: row.amount_in_cents,
            status,
            withdrawal,
            receipt_url: row.receipt_url,
            investment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// `user_id` is filled in from the gateway identity header at the HTTP layer,
// so request bodies need not carry it.

#[derive(Clone, Debug, Deserialize)]
pub struct NewDeposit {
    #[serde(default)]
    pub user_id: String,
    pub amount_in_cents: i64,
    #[serde(default)]
    pub receipt_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewWithdrawal {
    #[serde(default)]
    pub user_id: String,
    pub amount_in_cents: i64,
    pub account_name: String,
    pub account_number: String,
    pub method: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewInvestment {
    #[serde(default)]
    pub user_id: String,
    pub plan_id: String,
    pub amount_in_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_the_only_open_status() {
        assert!(!TxStatus::Pending.is_terminal());
        assert!(TxStatus::Completed.is_terminal());
        assert!(TxStatus::Failed.is_terminal());
    }

    #[test]
    fn tx_type_parse_rejects_unknown() {
        assert_eq!(TxType::parse("deposit"), Some(TxType::Deposit));
        assert_eq!(TxType::parse("refund"), None);
    }
}
