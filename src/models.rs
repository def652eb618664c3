// User data models shared by the store, the cache and the request boundary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User role, backed by the `user_role` Postgres enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    #[default]
    User,
}

/// User database model
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub refresh_token: Option<String>,
    pub role: Role,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a [`User`] as stored in the user cache.
///
/// Typed here, opaque bytes to the cache itself. A snapshot reflects the user
/// at lookup time: the cache is never invalidated on mutation, so a snapshot
/// may lag the store by up to the cache TTL unless the mutating caller
/// re-populates the entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub refresh_token: Option<String>,
    pub role: Role,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserSnapshot {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            avatar: user.avatar.clone(),
            refresh_token: user.refresh_token.clone(),
            role: user.role,
            confirmed: user.confirmed,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<UserSnapshot> for User {
    fn from(snapshot: UserSnapshot) -> Self {
        Self {
            id: snapshot.id,
            username: snapshot.username,
            email: snapshot.email,
            password_hash: snapshot.password_hash,
            avatar: snapshot.avatar,
            refresh_token: snapshot.refresh_token,
            role: snapshot.role,
            confirmed: snapshot.confirmed,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        }
    }
}
