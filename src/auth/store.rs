//! Credential store: users and one-time codes in SQLite.

use sqlx::SqlitePool;
use tracing::debug;

use super::models::{NewUser, OneTimeCode, OtpPurpose, User};
use crate::common::{generate_user_id, safe_email_log};

#[derive(Debug, Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
}

impl CredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Inserts the user unless the email is already taken, then returns
    /// whichever row owns the email. Two concurrent callers end up with the
    /// same user.
    pub async fn create_user_if_absent(
        &self,
        new_user: &NewUser,
        created_at: i64,
    ) -> Result<User, sqlx::Error> {
        self.insert_user_unless_email_taken(&generate_user_id(), new_user, created_at)
            .await
    }

    /// Only a duplicate email is tolerated; any other constraint failure,
    /// including an id collision, is an error.
    async fn insert_user_unless_email_taken(
        &self,
        id: &str,
        new_user: &NewUser,
        created_at: i64,
    ) -> Result<User, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (id, email, name, dob, provider, provider_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?) ON CONFLICT(email) DO NOTHING",
        )
        .bind(id)
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(new_user.dob.as_deref())
        .bind(new_user.provider.as_str())
        .bind(new_user.provider_id.as_deref())
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        debug!(
            email = %safe_email_log(&new_user.email),
            inserted = result.rows_affected() == 1,
            "User upsert by email"
        );

        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(&new_user.email)
            .fetch_one(&self.pool)
            .await
    }

    #[cfg(test)]
    pub async fn count_users_with_email(&self, email: &str) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn insert_otp(&self, code: &OneTimeCode) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO otp_codes (id, email, code_hash, purpose, expires_at, attempts, used, ip, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&code.id)
        .bind(&code.email)
        .bind(&code.code_hash)
        .bind(code.purpose.as_str())
        .bind(code.expires_at)
        .bind(code.attempts)
        .bind(code.used)
        .bind(code.ip.as_deref())
        .bind(code.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Newest code for (email, purpose) by creation time.
    pub async fn latest_otp(
        &self,
        email: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OneTimeCode>, sqlx::Error> {
        sqlx::query_as::<_, OneTimeCode>(
            "SELECT * FROM otp_codes WHERE email = ? AND purpose = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(email)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await
    }

    /// Newest code for the email regardless of purpose.
    pub async fn latest_otp_for_email(
        &self,
        email: &str,
    ) -> Result<Option<OneTimeCode>, sqlx::Error> {
        sqlx::query_as::<_, OneTimeCode>(
            "SELECT * FROM otp_codes WHERE email = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// Codes for the email created strictly after `since` (unix ms).
    pub async fn count_otps_for_email_since(
        &self,
        email: &str,
        since: i64,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM otp_codes WHERE email = ? AND created_at > ?")
                .bind(email)
                .bind(since)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Codes requested from the IP created strictly after `since` (unix ms).
    pub async fn count_otps_for_ip_since(&self, ip: &str, since: i64) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM otp_codes WHERE ip = ? AND created_at > ?")
                .bind(ip)
                .bind(since)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn increment_otp_attempts(&self, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE otp_codes SET attempts = attempts + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Flips `used` on. Returns false when another request got there first.
    pub async fn mark_otp_used(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE otp_codes SET used = 1 WHERE id = ? AND used = 0")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
