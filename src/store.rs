// User store contract and its Postgres implementation
// The core only touches users through this trait; raw SQL lives here

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AuthError;
use crate::models::User;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, avatar, refresh_token, role, confirmed, created_at, updated_at";

/// Collaborator contract for the user record store
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Persist (or clear) the user's current refresh token
    async fn update_refresh_token(
        &self,
        email: &str,
        token: Option<&str>,
    ) -> Result<(), AuthError>;

    /// Mark the user's email address as confirmed
    async fn mark_confirmed(&self, email: &str) -> Result<(), AuthError>;

    /// Replace the user's avatar URL, returning the updated record so the
    /// caller can re-populate the cache entry it just made stale
    async fn update_avatar(&self, email: &str, url: &str) -> Result<User, AuthError>;
}

/// Postgres-backed user store
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(user)
    }

    async fn update_refresh_token(
        &self,
        email: &str,
        token: Option<&str>,
    ) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET refresh_token = $2, updated_at = NOW() WHERE email = $1")
            .bind(email)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(())
    }

    async fn mark_confirmed(&self, email: &str) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET confirmed = TRUE, updated_at = NOW() WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(())
    }

    async fn update_avatar(&self, email: &str, url: &str) -> Result<User, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET avatar = $2, updated_at = NOW() WHERE email = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(user)
    }
}
