// Authenticator: resolves "who is making this request" from a bearer token
// through the token codec, the user cache and the user store

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::UserCache;
use crate::error::AuthError;
use crate::models::{User, UserSnapshot};
use crate::password;
use crate::store::UserStore;
use crate::token::{Scope, TokenCodec};

/// Lifetime of a cached user snapshot.
///
/// The cache is never invalidated when a user record is mutated elsewhere;
/// a mutated user may be served stale for up to this long unless the caller
/// that performed the mutation re-populates the entry with
/// [`AuthContext::cache_user`].
pub const USER_CACHE_TTL: Duration = Duration::from_secs(300);

/// Injected dependency bundle shared by every request task.
///
/// One instance is constructed at startup and cloned into the router state;
/// tests construct their own with in-memory collaborators.
#[derive(Clone)]
pub struct AuthContext {
    store: Arc<dyn UserStore>,
    cache: Arc<dyn UserCache>,
    codec: TokenCodec,
}

impl AuthContext {
    pub fn new(store: Arc<dyn UserStore>, cache: Arc<dyn UserCache>, codec: TokenCodec) -> Self {
        Self {
            store,
            cache,
            codec,
        }
    }

    /// Resolve the user behind an access token.
    ///
    /// Decode failure, a wrong-scope token and an unknown subject all
    /// collapse into [`AuthError::Unauthenticated`]. On a cache miss the
    /// store is consulted and the snapshot cached for [`USER_CACHE_TTL`];
    /// that population is the only side effect.
    pub async fn resolve_user(&self, token: &str) -> Result<User, AuthError> {
        let claims = self
            .codec
            .decode(token, Scope::AccessToken)
            .map_err(|_| AuthError::Unauthenticated)?;

        if let Some(bytes) = self.cache.get(&claims.sub).await? {
            match serde_json::from_slice::<UserSnapshot>(&bytes) {
                Ok(snapshot) => {
                    debug!("User {} served from cache", claims.sub);
                    return Ok(snapshot.into());
                }
                Err(e) => {
                    // Treat an undecodable blob as a miss and fall through
                    warn!("Discarding undecodable cache entry for {}: {}", claims.sub, e);
                }
            }
        }

        debug!("User {} served from store", claims.sub);
        let user = self
            .store
            .find_by_email(&claims.sub)
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        self.cache_user(&user).await?;
        Ok(user)
    }

    /// Write the user's snapshot to the cache with the standard TTL.
    ///
    /// Callers that mutate a user record own refreshing its entry; the cache
    /// does not watch the store.
    pub async fn cache_user(&self, user: &User) -> Result<(), AuthError> {
        let bytes = serde_json::to_vec(&UserSnapshot::from(user))
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        self.cache.set(&user.email, bytes).await?;
        self.cache.expire(&user.email, USER_CACHE_TTL).await
    }

    /// Access token: subject = email, 15 minute lifetime
    pub fn issue_access_token(&self, user: &User) -> Result<String, AuthError> {
        self.codec.create(&user.email, Scope::AccessToken, None)
    }

    /// Refresh token: subject = email, 7 day lifetime
    pub fn issue_refresh_token(&self, user: &User) -> Result<String, AuthError> {
        self.codec.create(&user.email, Scope::RefreshToken, None)
    }

    /// Decode a refresh token and return its subject email.
    ///
    /// The caller still has to compare the presented token against the one
    /// stored on the user record before issuing new tokens; only the scope
    /// and validity checks live here.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self
            .codec
            .decode(refresh_token, Scope::RefreshToken)
            .map_err(|_| AuthError::Unauthenticated)?;
        Ok(claims.sub)
    }

    /// Email-verification token: subject = email, 2 day lifetime
    pub fn issue_email_verification_token(&self, user: &User) -> Result<String, AuthError> {
        self.codec.create(&user.email, Scope::EmailToken, None)
    }

    /// Extract the email from an email-verification token.
    ///
    /// This path does not gate API access, so it fails with the distinct
    /// [`AuthError::InvalidVerificationToken`] (422) rather than 401.
    pub fn email_from_token(&self, token: &str) -> Result<String, AuthError> {
        let claims = self
            .codec
            .decode(token, Scope::EmailToken)
            .map_err(|_| AuthError::InvalidVerificationToken)?;
        Ok(claims.sub)
    }

    /// Hash a password off the async runtime's worker threads
    pub async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        tokio::task::spawn_blocking(move || password::hash(&password))
            .await
            .map_err(|_| AuthError::PasswordHash)?
    }

    /// Verify a password off the async runtime's worker threads
    pub async fn verify_password(
        &self,
        password: String,
        stored_hash: String,
    ) -> Result<bool, AuthError> {
        tokio::task::spawn_blocking(move || password::verify(&password, &stored_hash))
            .await
            .map_err(|_| AuthError::PasswordHash)
    }
}
