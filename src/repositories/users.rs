use anyhow::bail;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::users::{NewUser, Role, User, UserRow};

#[derive(Clone)]
pub struct UserRepository {
    conn: PgPool,
}

impl UserRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    /// Create a user record on first authentication. A supplied referral
    /// code is resolved to the owning user; unknown codes are ignored.
    pub async fn insert_user(&self, new_user: &NewUser) -> Result<User, anyhow::Error> {
        let user_id = Uuid::new_v4().hyphenated().to_string();

        let referred_by: Option<String> = match &new_user.referral_code {
            Some(code) => {
                sqlx::query_scalar("SELECT id FROM users WHERE referral_code = $1")
                    .bind(code)
                    .fetch_optional(&self.conn)
                    .await?
            }
            None => None,
        };

        let role = new_user.role.unwrap_or(Role::User);
        let own_code = generate_referral_code(&user_id);

        let row: UserRow = sqlx::query_as(
            r#"
                INSERT INTO users (id, email, display_name, role, referred_by, referral_code)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            "#,
        )
        .bind(&user_id)
        .bind(&new_user.email)
        .bind(&new_user.display_name)
        .bind(role.as_str())
        .bind(&referred_by)
        .bind(&own_code)
        .fetch_one(&self.conn)
        .await?;

        Ok(row.into())
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, anyhow::Error> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(row.map(User::from))
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        display_name: &str,
    ) -> Result<(), anyhow::Error> {
        let user = self.get_user_by_id(user_id).await?;

        if user.is_some() {
            sqlx::query(
                "UPDATE users SET display_name = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
            )
            .bind(display_name)
            .bind(user_id)
            .execute(&self.conn)
            .await?;

            Ok(())
        } else {
            bail!("User not found")
        }
    }
}

/// Short shareable code derived from the user id and creation instant.
fn generate_referral_code(user_id: &str) -> String {
    let input = format!(
        "{}{}",
        user_id,
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
    );
    let hash = Sha256::digest(input.as_bytes());
    let hex: String = hash.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..8].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_codes_are_short_and_unique_per_call() {
        let a = generate_referral_code("user-a");
        let b = generate_referral_code("user-a");
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_ne!(a, b);
    }
}
