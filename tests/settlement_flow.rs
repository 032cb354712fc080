//! Multi-step settlement scenarios exercising the planner the way the
//! repository applies it: each step feeds the mutated user back in.

use chrono::{NaiveDate, NaiveDateTime};

use aurum_dealer::models::transactions::{Transaction, TxStatus, TxType};
use aurum_dealer::models::users::{AccountStatus, Role, User};
use aurum_dealer::settlement::{self, Decision, SettlementError};

fn at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 1)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

fn user(id: &str, role: Role, balance: i64) -> User {
    User {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        display_name: id.to_string(),
        role,
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

fn pending(tx_type: TxType, user_id: &str, amount: i64) -> Transaction {
    Transaction {
        id: format!("tx-{}-{}", user_id, amount),
        user_id: user_id.to_string(),
        user_name: user_id.to_string(),
        tx_type,
        amount_in_cents: amount,
        status: TxStatus::Pending,
        withdrawal: None,
        receipt_url: None,
        investment: None,
        created_at: at(),
        updated_at: at(),
    }
}

fn approve_deposit(user: User, referrer: Option<&User>, amount: i64) -> (User, Option<i64>) {
    let tx = pending(TxType::Deposit, &user.id, amount);
    let settled = settlement::plan(&tx, &user, referrer, 2.0, Decision::Completed, at())
        .expect("deposit approval should not fail")
        .expect("pending deposit should settle");
    let commission = settled.commission.as_ref().map(|c| c.amount_in_cents);
    (settled.user, commission)
}

#[test]
fn referred_user_lifecycle_deposits_then_withdrawal() {
    let partner = user("partner", Role::Partner, 0);
    let mut investor = user("investor", Role::User, 0);
    investor.referred_by = Some(partner.id.clone());

    // Two approved deposits: 80 then 70 units.
    let (investor, commission) = approve_deposit(investor, Some(&partner), 80_00);
    assert_eq!(commission, Some(8_00));
    assert_eq!(investor.vip_level, 1);
    assert_eq!(investor.vip_progress, 80);

    let (investor, commission) = approve_deposit(investor, Some(&partner), 70_00);
    assert_eq!(commission, Some(7_00));
    assert_eq!(investor.balance_in_cents, 150_00);
    assert_eq!(investor.total_deposits_in_cents, 150_00);
    assert_eq!(investor.vip_level, 2);
    assert_eq!(investor.vip_progress, 12);

    // Withdraw 100 units at 2%: debit 102, leaving 48.
    let withdrawal = pending(TxType::Withdrawal, &investor.id, 100_00);
    let settled = settlement::plan(&withdrawal, &investor, None, 2.0, Decision::Completed, at())
        .unwrap()
        .unwrap();
    assert_eq!(settled.user.balance_in_cents, 48_00);
    assert_eq!(settled.user.total_deposits_in_cents, 150_00);
    assert_eq!(settled.user.last_withdrawal_at, Some(at()));
}

#[test]
fn settling_twice_changes_nothing_the_second_time() {
    let holder = user("holder", Role::User, 0);
    let mut tx = pending(TxType::Deposit, &holder.id, 40_00);

    let first = settlement::plan(&tx, &holder, None, 2.0, Decision::Completed, at())
        .unwrap()
        .unwrap();
    assert_eq!(first.user.balance_in_cents, 40_00);

    // The repository writes the terminal status back before the next call.
    tx.status = first.new_status;
    let second = settlement::plan(&tx, &first.user, None, 2.0, Decision::Completed, at()).unwrap();
    assert!(second.is_none());
}

#[test]
fn five_rejected_deposits_suspend_and_four_do_not() {
    let mut account = user("risky", Role::User, 0);

    for attempt in 1..=5 {
        let tx = pending(TxType::Deposit, &account.id, 25_00);
        let settled = settlement::plan(&tx, &account, None, 2.0, Decision::Failed, at())
            .unwrap()
            .unwrap();
        account = settled.user;

        assert_eq!(account.failed_deposit_count, attempt);
        if attempt < 5 {
            assert_eq!(account.status, AccountStatus::Active);
        } else {
            assert_eq!(account.status, AccountStatus::Suspended);
        }
    }
}

#[test]
fn commission_rate_depends_on_referrer_role_not_amount() {
    let partner = user("partner", Role::Partner, 0);
    let plain = user("plain", Role::User, 0);

    for amount in [10_00, 33_33, 999_99] {
        let mut referred = user("referred", Role::User, 0);
        referred.referred_by = Some(partner.id.clone());
        let (_, commission) = approve_deposit(referred, Some(&partner), amount);
        assert_eq!(commission, Some(amount * 10 / 100));

        let mut referred = user("referred2", Role::User, 0);
        referred.referred_by = Some(plain.id.clone());
        let (_, commission) = approve_deposit(referred, Some(&plain), amount);
        assert_eq!(commission, Some(amount * 5 / 100));
    }
}

#[test]
fn reserved_principal_survives_a_settle_attempt_on_an_investment() {
    // 200 units were debited when the investment was purchased. An operator
    // decision must not terminalize the row: completing it would skip the
    // payout and failing it would skip the refund, either way losing the
    // principal.
    let mut investor = user("investor", Role::User, 500_00);
    investor.balance_in_cents -= 200_00;
    let tx = pending(TxType::Investment, &investor.id, 200_00);

    for decision in [Decision::Completed, Decision::Failed] {
        let err = settlement::plan(&tx, &investor, None, 2.0, decision, at()).unwrap_err();
        assert!(matches!(
            err,
            SettlementError::UnsupportedType(TxType::Investment)
        ));
    }
    // Nothing was planned, so the row stays pending for the maturity sweep
    // and the balance is untouched.
    assert_eq!(investor.balance_in_cents, 300_00);
}

#[test]
fn matured_investment_pays_principal_plus_return() {
    // Growth plan terms: 0.8%/day for 45 days on 200 units.
    let principal = 200_00;
    let payout = settlement::investment_payout_cents(principal, 0.8, 45);
    assert_eq!(payout, 272_00);

    // Crediting the payout restores more than the reserved principal.
    let mut investor = user("investor", Role::User, 500_00);
    investor.balance_in_cents -= principal; // reserved at purchase time
    investor.balance_in_cents += payout;
    assert_eq!(investor.balance_in_cents, 572_00);
}
