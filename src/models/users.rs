use serde::{Deserialize, Serialize};

/// Account role as stored in the `role` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Partner,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Partner => "partner",
            Role::Admin => "admin",
        }
    }

    /// Unknown values fall back to the least privileged role.
    pub fn parse(value: &str) -> Self {
        match value {
            "partner" => Role::Partner,
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "suspended" => AccountStatus::Suspended,
            _ => AccountStatus::Active,
        }
    }
}

/// What an authenticated identity is allowed to do. Operator endpoints
/// check capabilities rather than role names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub can_approve_deposits: bool,
    pub can_approve_withdrawals: bool,
    pub can_edit_settings: bool,
}

impl Capabilities {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Capabilities {
                can_approve_deposits: true,
                can_approve_withdrawals: true,
                can_edit_settings: true,
            },
            Role::Partner | Role::User => Capabilities {
                can_approve_deposits: false,
                can_approve_withdrawals: false,
                can_edit_settings: false,
            },
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub balance_in_cents: i64,
    pub total_deposits_in_cents: i64,
    pub vip_level: i16,
    pub vip_progress: i16,
    pub failed_deposit_count: i32,
    pub status: AccountStatus,
    pub referred_by: Option<String>,
    pub referral_code: Option<String>,
    pub last_withdrawal_at: Option<chrono::NaiveDateTime>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

/// Raw row; TEXT enums are converted at the repository boundary.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub balance_in_cents: i64,
    pub total_deposits_in_cents: i64,
    pub vip_level: i16,
    pub vip_progress: i16,
    pub failed_deposit_count: i32,
    pub status: String,
    pub referred_by: Option<String>,
    pub referral_code: Option<String>,
    pub last_withdrawal_at: Option<chrono::NaiveDateTime>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            role: Role::parse(&row.role),
            balance_in_cents: row.balance_in_cents,
            total_deposits_in_cents: row.total_deposits_in_cents,
            vip_level: row.vip_level,
            vip_progress: row.vip_progress,
            failed_deposit_count: row.failed_deposit_count,
            status: AccountStatus::parse(&row.status),
            referred_by: row.referred_by,
            referral_code: row.referral_code,
            last_withdrawal_at: row.last_withdrawal_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub referral_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_falls_back_to_user() {
        assert_eq!(Role::parse("partner"), Role::Partner);
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("agent"), Role::User);
        assert_eq!(Role::parse(""), Role::User);
    }

    #[test]
    fn only_admins_can_operate() {
        let admin = Capabilities::for_role(Role::Admin);
        assert!(admin.can_approve_deposits);
        assert!(admin.can_approve_withdrawals);
        assert!(admin.can_edit_settings);

        for role in [Role::User, Role::Partner] {
            let caps = Capabilities::for_role(role);
            assert!(!caps.can_approve_deposits);
            assert!(!caps.can_approve_withdrawals);
            assert!(!caps.can_edit_settings);
        }
    }

    #[test]
    fn status_round_trip() {
        assert_eq!(AccountStatus::parse("active"), AccountStatus::Active);
        assert_eq!(AccountStatus::parse("suspended"), AccountStatus::Suspended);
        assert_eq!(AccountStatus::Suspended.as_str(), "suspended");
    }
}
