//! Settlement planner for pending transactions.
//!
//! Settling a transaction moves it from `pending` to a terminal status and
//! applies its financial side effects: balance movement, cumulative deposit
//! total, VIP tier and progress, referral commission, failed-deposit
//! suspension. This module only *plans* those effects; it performs no I/O.
//! `TransactionRepository::settle` applies a plan inside one database
//! transaction so that either every mutation commits or none do.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::models::transactions::{Transaction, TxStatus, TxType};
use crate::models::users::{AccountStatus, Role, User};

/// Cumulative deposit thresholds (cents) unlocking VIP tiers 2 and 3.
pub const VIP_LEVEL_2_THRESHOLD_CENTS: i64 = 100_00;
pub const VIP_LEVEL_3_THRESHOLD_CENTS: i64 = 500_00;

/// Referral commission rates by referrer role, in whole percent.
pub const PARTNER_COMMISSION_PERCENT: i64 = 10;
pub const DEFAULT_COMMISSION_PERCENT: i64 = 5;

/// Rejected deposits tolerated before the account is suspended.
pub const MAX_FAILED_DEPOSITS: i32 = 5;

/// Operator decision on a pending transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Completed,
    Failed,
}

impl Decision {
    pub fn status(&self) -> TxStatus {
        match self {
            Decision::Completed => TxStatus::Completed,
            Decision::Failed => TxStatus::Failed,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(
        "insufficient balance: available {available_in_cents} cents, required {required_in_cents} cents"
    )]
    InsufficientBalance {
        available_in_cents: i64,
        required_in_cents: i64,
    },

    #[error("{} transactions cannot be settled by an operator", .0.as_str())]
    UnsupportedType(TxType),
}

/// Commission owed to the referrer of a settled deposit.
#[derive(Clone, Debug, PartialEq)]
pub struct Commission {
    pub referrer_id: String,
    pub rate_percent: i64,
    pub amount_in_cents: i64,
}

/// The full mutation set a settlement implies.
#[derive(Clone, Debug)]
pub struct Settlement {
    pub new_status: TxStatus,
    /// Owner record with every side effect already applied.
    pub user: User,
    pub commission: Option<Commission>,
}

/// Plan the settlement of `tx` under `decision`.
///
/// Returns `Ok(None)` when the transaction already left `pending`: a second
/// settle of the same transaction is a no-op, which protects against
/// duplicate operator clicks and retried calls. `referrer` is the resolved
/// `user.referred_by` record, when one exists.
pub fn plan(
    tx: &Transaction,
    user: &User,
    referrer: Option<&User>,
    withdrawal_fee_percent: f64,
    decision: Decision,
    now: NaiveDateTime,
) -> Result<Option<Settlement>, SettlementError> {
    if tx.status.is_terminal() {
        return Ok(None);
    }

    let mut user = user.clone();
    let mut commission = None;

    match (tx.tx_type, decision) {
        (TxType::Withdrawal, Decision::Completed) => {
            let fee = fee_cents(tx.amount_in_cents, withdrawal_fee_percent);
            let required = tx.amount_in_cents + fee;
            if user.balance_in_cents < required {
                return Err(SettlementError::InsufficientBalance {
                    available_in_cents: user.balance_in_cents,
                    required_in_cents: required,
                });
            }
            user.balance_in_cents -= required;
            user.last_withdrawal_at = Some(now);
        }
        (TxType::Deposit, Decision::Completed) => {
            user.balance_in_cents += tx.amount_in_cents;
            user.total_deposits_in_cents += tx.amount_in_cents;
            // Tiers never downgrade, even if historical data says otherwise.
            user.vip_level = user.vip_level.max(vip_level_for(user.total_deposits_in_cents));
            user.vip_progress = vip_progress_for(user.total_deposits_in_cents);

            if user.referred_by.is_some() {
                if let Some(referrer) = referrer {
                    let rate = commission_rate_percent(referrer.role);
                    commission = Some(Commission {
                        referrer_id: referrer.id.clone(),
                        rate_percent: rate,
                        amount_in_cents: tx.amount_in_cents * rate / 100,
                    });
                }
            }
        }
        (TxType::Deposit, Decision::Failed) => {
            user.failed_deposit_count += 1;
            if user.failed_deposit_count >= MAX_FAILED_DEPOSITS {
                user.status = AccountStatus::Suspended;
            }
        }
        // Rejecting a withdrawal just releases the request; nothing was
        // debited when it was submitted.
        (TxType::Withdrawal, Decision::Failed) => {}
        // Investments settle through the maturity sweep, which refunds the
        // reserved principal with its return. Payouts and commissions are
        // created already completed. None of these may be settled here:
        // forcing one terminal would strand the money it represents.
        (TxType::Investment | TxType::Payout | TxType::Commission, _) => {
            return Err(SettlementError::UnsupportedType(tx.tx_type));
        }
    }

    Ok(Some(Settlement {
        new_status: decision.status(),
        user,
        commission,
    }))
}

/// Withdrawal fee, rounded to the nearest cent.
pub fn fee_cents(amount_in_cents: i64, fee_percent: f64) -> i64 {
    (amount_in_cents as f64 * fee_percent / 100.0).round() as i64
}

pub fn commission_rate_percent(referrer_role: Role) -> i64 {
    match referrer_role {
        Role::Partner => PARTNER_COMMISSION_PERCENT,
        _ => DEFAULT_COMMISSION_PERCENT,
    }
}

pub fn vip_level_for(total_deposits_in_cents: i64) -> i16 {
    if total_deposits_in_cents >= VIP_LEVEL_3_THRESHOLD_CENTS {
        3
    } else if total_deposits_in_cents >= VIP_LEVEL_2_THRESHOLD_CENTS {
        2
    } else {
        1
    }
}

/// Progress through the current tier band, as a percentage clamped to [0, 100].
pub fn vip_progress_for(total_deposits_in_cents: i64) -> i16 {
    let total = total_deposits_in_cents;
    let progress = if total >= VIP_LEVEL_3_THRESHOLD_CENTS {
        100
    } else if total >= VIP_LEVEL_2_THRESHOLD_CENTS {
        (total - VIP_LEVEL_2_THRESHOLD_CENTS) * 100
            / (VIP_LEVEL_3_THRESHOLD_CENTS - VIP_LEVEL_2_THRESHOLD_CENTS)
    } else {
        total * 100 / VIP_LEVEL_2_THRESHOLD_CENTS
    };

    progress.clamp(0, 100) as i16
}

/// Principal plus accrued return over the full investment duration.
pub fn investment_payout_cents(
    principal_in_cents: i64,
    daily_return_percent: f64,
    duration_days: i32,
) -> i64 {
    let accrued =
        principal_in_cents as f64 * daily_return_percent / 100.0 * duration_days as f64;
    principal_in_cents + accrued.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn user(balance: i64) -> User {
        User {
            id: "u-1".to_string(),
            email: "user@example.com".to_string(),
            display_name: "User One".to_string(),
            role: Role::User,
            balance_in_cents: balance,
            total_deposits_in_cents: 0,
            vip_level: 1,
            vip_progress: 0,
            failed_deposit_count: 0,
            status: AccountStatus::Active,
            referred_by: None,
            referral_code: None,
            last_withdrawal_at: None,
            created_at: at(),
            updated_at: at(),
        }
    }

    fn referrer(role: Role) -> User {
        User {
            id: "ref-1".to_string(),
            role,
            ..user(0)
        }
    }

    fn tx(tx_type: TxType, amount: i64, status: TxStatus) -> Transaction {
        Transaction {
            id: "tx-1".to_string(),
            user_id: "u-1".to_string(),
            user_name: "User One".to_string(),
            tx_type,
            amount_in_cents: amount,
            status,
            withdrawal: None,
            receipt_url: None,
            investment: None,
            created_at: at(),
            updated_at: at(),
        }
    }

    #[test]
    fn settling_a_terminal_transaction_is_a_noop() {
        let u = user(1000_00);
        for status in [TxStatus::Completed, TxStatus::Failed] {
            let t = tx(TxType::Deposit, 50_00, status);
            let plan = plan(&t, &u, None, 2.0, Decision::Completed, at()).unwrap();
            assert!(plan.is_none());
        }
    }

    #[test]
    fn completed_deposit_credits_balance_and_total() {
        let u = user(1000_00);
        let t = tx(TxType::Deposit, 150_00, TxStatus::Pending);
        let s = plan(&t, &u, None, 2.0, Decision::Completed, at())
            .unwrap()
            .unwrap();

        assert_eq!(s.new_status, TxStatus::Completed);
        assert_eq!(s.user.balance_in_cents, 1150_00);
        assert_eq!(s.user.total_deposits_in_cents, 150_00);
        assert!(s.commission.is_none());
    }

    #[test]
    fn deposit_of_150_crosses_level_2_threshold() {
        // Worked scenario: balance 1000, totals 0, level 1; approve 150.
        let u = user(1000_00);
        let t = tx(TxType::Deposit, 150_00, TxStatus::Pending);
        let s = plan(&t, &u, None, 2.0, Decision::Completed, at())
            .unwrap()
            .unwrap();

        assert_eq!(s.user.vip_level, 2);
        // 50 units into the [100, 500) band of 400 -> 12%.
        assert_eq!(s.user.vip_progress, 12);
    }

    #[test]
    fn vip_level_never_decreases() {
        let mut u = user(0);
        u.total_deposits_in_cents = 300_00;
        u.vip_level = 3;
        // Planner recomputes from totals but must keep the higher level.
        let t = tx(TxType::Deposit, 1_00, TxStatus::Pending);
        let s = plan(&t, &u, None, 2.0, Decision::Completed, at())
            .unwrap()
            .unwrap();
        assert_eq!(s.user.vip_level, 3);

        let mut sequence_user = user(0);
        let mut last_level = sequence_user.vip_level;
        for amount in [20_00, 90_00, 300_00, 10_00, 200_00] {
            let t = tx(TxType::Deposit, amount, TxStatus::Pending);
            let s = plan(&t, &sequence_user, None, 2.0, Decision::Completed, at())
                .unwrap()
                .unwrap();
            assert!(s.user.vip_level >= last_level);
            last_level = s.user.vip_level;
            sequence_user = s.user;
        }
        assert_eq!(sequence_user.vip_level, 3);
        assert_eq!(sequence_user.vip_progress, 100);
    }

    #[test]
    fn referred_deposit_pays_partner_ten_percent() {
        let mut u = user(0);
        u.referred_by = Some("ref-1".to_string());
        let r = referrer(Role::Partner);
        let t = tx(TxType::Deposit, 200_00, TxStatus::Pending);
        let s = plan(&t, &u, Some(&r), 2.0, Decision::Completed, at())
            .unwrap()
            .unwrap();

        let commission = s.commission.unwrap();
        assert_eq!(commission.referrer_id, "ref-1");
        assert_eq!(commission.rate_percent, 10);
        assert_eq!(commission.amount_in_cents, 20_00);
    }

    #[test]
    fn referred_deposit_pays_regular_referrer_five_percent() {
        let mut u = user(0);
        u.referred_by = Some("ref-1".to_string());
        let r = referrer(Role::User);
        let t = tx(TxType::Deposit, 200_00, TxStatus::Pending);
        let s = plan(&t, &u, Some(&r), 2.0, Decision::Completed, at())
            .unwrap()
            .unwrap();

        let commission = s.commission.unwrap();
        assert_eq!(commission.rate_percent, 5);
        assert_eq!(commission.amount_in_cents, 10_00);
    }

    #[test]
    fn missing_referrer_record_skips_commission() {
        let mut u = user(0);
        u.referred_by = Some("gone".to_string());
        let t = tx(TxType::Deposit, 200_00, TxStatus::Pending);
        let s = plan(&t, &u, None, 2.0, Decision::Completed, at())
            .unwrap()
            .unwrap();
        assert!(s.commission.is_none());
    }

    #[test]
    fn completed_withdrawal_debits_amount_plus_fee() {
        let u = user(1050_00);
        let t = tx(TxType::Withdrawal, 1000_00, TxStatus::Pending);
        let s = plan(&t, &u, None, 2.0, Decision::Completed, at())
            .unwrap()
            .unwrap();

        // fee = 2% of 1000 = 20; debit 1020, leaving 30.
        assert_eq!(s.user.balance_in_cents, 30_00);
        assert_eq!(s.user.last_withdrawal_at, Some(at()));
    }

    #[test]
    fn withdrawal_exceeding_balance_plus_fee_aborts() {
        // Worked scenario: balance 1000, request 1000 at 2% -> required 1020.
        let u = user(1000_00);
        let t = tx(TxType::Withdrawal, 1000_00, TxStatus::Pending);
        let err = plan(&t, &u, None, 2.0, Decision::Completed, at()).unwrap_err();

        match err {
            SettlementError::InsufficientBalance {
                available_in_cents,
                required_in_cents,
            } => {
                assert_eq!(available_in_cents, 1000_00);
                assert_eq!(required_in_cents, 1020_00);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn only_deposits_and_withdrawals_can_be_settled() {
        let u = user(300_00);
        for tx_type in [TxType::Investment, TxType::Payout, TxType::Commission] {
            for decision in [Decision::Completed, Decision::Failed] {
                let t = tx(tx_type, 200_00, TxStatus::Pending);
                let err = plan(&t, &u, None, 2.0, decision, at()).unwrap_err();
                assert!(matches!(err, SettlementError::UnsupportedType(kind) if kind == tx_type));
            }
        }
    }

    #[test]
    fn rejected_withdrawal_leaves_balance_untouched() {
        let u = user(500_00);
        let t = tx(TxType::Withdrawal, 200_00, TxStatus::Pending);
        let s = plan(&t, &u, None, 2.0, Decision::Failed, at())
            .unwrap()
            .unwrap();

        assert_eq!(s.new_status, TxStatus::Failed);
        assert_eq!(s.user.balance_in_cents, 500_00);
        assert_eq!(s.user.last_withdrawal_at, None);
    }

    #[test]
    fn fifth_failed_deposit_suspends_the_account() {
        let mut u = user(0);
        u.failed_deposit_count = 3;

        let t = tx(TxType::Deposit, 50_00, TxStatus::Pending);
        let s = plan(&t, &u, None, 2.0, Decision::Failed, at())
            .unwrap()
            .unwrap();
        assert_eq!(s.user.failed_deposit_count, 4);
        assert_eq!(s.user.status, AccountStatus::Active);

        let s = plan(&t, &s.user, None, 2.0, Decision::Failed, at())
            .unwrap()
            .unwrap();
        assert_eq!(s.user.failed_deposit_count, 5);
        assert_eq!(s.user.status, AccountStatus::Suspended);
    }

    #[test]
    fn failed_deposit_does_not_touch_balances() {
        let u = user(300_00);
        let t = tx(TxType::Deposit, 50_00, TxStatus::Pending);
        let s = plan(&t, &u, None, 2.0, Decision::Failed, at())
            .unwrap()
            .unwrap();
        assert_eq!(s.user.balance_in_cents, 300_00);
        assert_eq!(s.user.total_deposits_in_cents, 0);
        assert_eq!(s.user.vip_level, 1);
    }

    #[test]
    fn vip_progress_stays_within_bounds() {
        assert_eq!(vip_progress_for(0), 0);
        assert_eq!(vip_progress_for(50_00), 50);
        assert_eq!(vip_progress_for(100_00), 0);
        assert_eq!(vip_progress_for(300_00), 50);
        assert_eq!(vip_progress_for(500_00), 100);
        assert_eq!(vip_progress_for(10_000_00), 100);
    }

    #[test]
    fn vip_levels_at_thresholds() {
        assert_eq!(vip_level_for(99_99), 1);
        assert_eq!(vip_level_for(100_00), 2);
        assert_eq!(vip_level_for(499_99), 2);
        assert_eq!(vip_level_for(500_00), 3);
    }

    #[test]
    fn fee_rounds_to_nearest_cent() {
        assert_eq!(fee_cents(1000_00, 2.0), 20_00);
        assert_eq!(fee_cents(33, 2.0), 1);
        assert_eq!(fee_cents(24, 2.0), 0);
        assert_eq!(fee_cents(100_00, 0.0), 0);
    }

    #[test]
    fn investment_payout_is_principal_plus_accrued_return() {
        // 100 units at 1%/day for 30 days -> 130 units.
        assert_eq!(investment_payout_cents(100_00, 1.0, 30), 130_00);
        assert_eq!(investment_payout_cents(250_00, 0.5, 10), 262_50);
    }
}
