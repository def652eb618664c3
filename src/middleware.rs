// Request boundary: current-user extraction and the per-route role gate

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::models::{Role, User};
use crate::service::AuthContext;

/// The authenticated user behind the current request.
///
/// Usable as an extractor on any protected handler whose router state can
/// hand out an [`AuthContext`]. When a [`RoleGuard`] already ran for the
/// route, the user it resolved is reused from the request extensions instead
/// of hitting the cache or store a second time.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::Unauthenticated)?
        .to_str()
        .map_err(|_| AuthError::Unauthenticated)?;

    value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::Unauthenticated)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AuthContext: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let ctx = AuthContext::from_ref(state);
        let token = bearer_token(&parts.headers)?;
        let user = ctx.resolve_user(token).await?;
        Ok(CurrentUser(user))
    }
}

/// Role gate for a route: an allow-list of roles compared by membership.
///
/// Authorization runs strictly after authentication; the gate never resolves
/// identity itself. An empty allow-list rejects every role.
#[derive(Debug, Clone)]
pub struct RoleGuard {
    allowed: Arc<Vec<Role>>,
}

impl RoleGuard {
    pub fn new(allowed: impl Into<Vec<Role>>) -> Self {
        Self {
            allowed: Arc::new(allowed.into()),
        }
    }

    /// Routes reserved for administrators
    pub fn admin() -> Self {
        Self::new([Role::Admin])
    }

    /// Routes open to administrators and moderators
    pub fn moderators() -> Self {
        Self::new([Role::Admin, Role::Moderator])
    }

    /// Membership check against the allow-list
    pub fn check(&self, role: Role) -> Result<(), AuthError> {
        if self.allowed.contains(&role) {
            Ok(())
        } else {
            warn!("Role {:?} not in allow-list {:?}", role, self.allowed);
            Err(AuthError::Forbidden)
        }
    }

    /// Middleware guarding a route with this allow-list.
    ///
    /// Wire it with `axum::middleware::from_fn_with_state`:
    ///
    /// ```ignore
    /// let gate = RoleGuard::moderators();
    /// let admin_routes = Router::new()
    ///     .route("/contacts/all", get(list_everyone))
    ///     .layer(middleware::from_fn_with_state(
    ///         ctx.clone(),
    ///         move |state, req, next| gate.clone().guard(state, req, next),
    ///     ));
    /// ```
    ///
    /// The resolved [`CurrentUser`] is inserted into the request extensions,
    /// so downstream extractors see the same user without another lookup.
    pub async fn guard(
        self,
        State(ctx): State<AuthContext>,
        request: Request,
        next: Next,
    ) -> Result<Response, AuthError> {
        let (mut parts, body) = request.into_parts();

        let current = CurrentUser::from_request_parts(&mut parts, &ctx).await?;
        self.check(current.0.role)?;
        debug!("Authorized {} as {:?}", current.0.email, current.0.role);

        let mut request = Request::from_parts(parts, body);
        request.extensions_mut().insert(current);
        Ok(next.run(request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryUserCache;
    use crate::models::User;
    use crate::store::UserStore;
    use crate::token::TokenCodec;
    use async_trait::async_trait;
    use axum::body::Body;
    use chrono::Utc;
    use std::sync::Arc;

    struct SingleUserStore {
        user: User,
    }

    #[async_trait]
    impl UserStore for SingleUserStore {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
            Ok(Some(self.user.clone()).filter(|u| u.email == email))
        }

        async fn update_refresh_token(
            &self,
            _email: &str,
            _token: Option<&str>,
        ) -> Result<(), AuthError> {
            Ok(())
        }

        async fn mark_confirmed(&self, _email: &str) -> Result<(), AuthError> {
            Ok(())
        }

        async fn update_avatar(&self, _email: &str, _url: &str) -> Result<User, AuthError> {
            Ok(self.user.clone())
        }
    }

    fn test_user(role: Role) -> User {
        User {
            id: 7,
            username: "anna".to_string(),
            email: "anna@example.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            avatar: None,
            refresh_token: None,
            role,
            confirmed: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_context(user: User) -> AuthContext {
        AuthContext::new(
            Arc::new(SingleUserStore { user }),
            Arc::new(InMemoryUserCache::new()),
            TokenCodec::new("test_secret_key"),
        )
    }

    fn parts_with_auth(auth_value: &str) -> Parts {
        let request = axum::http::Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, auth_value)
            .body(Body::empty())
            .unwrap();
        request.into_parts().0
    }

    fn parts_without_auth() -> Parts {
        let request = axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();
        request.into_parts().0
    }

    #[tokio::test]
    async fn test_valid_bearer_token_resolves_user() {
        let ctx = test_context(test_user(Role::User));
        let token = ctx.issue_access_token(&test_user(Role::User)).unwrap();

        let mut parts = parts_with_auth(&format!("Bearer {}", token));
        let current = CurrentUser::from_request_parts(&mut parts, &ctx)
            .await
            .unwrap();
        assert_eq!(current.0.email, "anna@example.com");
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthenticated() {
        let ctx = test_context(test_user(Role::User));
        let mut parts = parts_without_auth();
        let result = CurrentUser::from_request_parts(&mut parts, &ctx).await;
        assert!(matches!(result, Err(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_non_bearer_schemes_are_unauthenticated() {
        let ctx = test_context(test_user(Role::User));
        for auth_value in ["Basic dXNlcjpwYXNz", "token_without_scheme", ""] {
            let mut parts = parts_with_auth(auth_value);
            let result = CurrentUser::from_request_parts(&mut parts, &ctx).await;
            assert!(matches!(result, Err(AuthError::Unauthenticated)));
        }
    }

    #[tokio::test]
    async fn test_extension_user_short_circuits_resolution() {
        // A store that would reject the lookup; the extension wins
        let ctx = test_context(test_user(Role::User));
        let mut parts = parts_without_auth();
        parts
            .extensions
            .insert(CurrentUser(test_user(Role::Admin)));

        let current = CurrentUser::from_request_parts(&mut parts, &ctx)
            .await
            .unwrap();
        assert_eq!(current.0.role, Role::Admin);
    }

    #[test]
    fn test_role_in_allow_list_passes() {
        let gate = RoleGuard::new([Role::Admin, Role::Moderator]);
        assert!(gate.check(Role::Admin).is_ok());
        assert!(gate.check(Role::Moderator).is_ok());
    }

    #[test]
    fn test_role_outside_allow_list_is_forbidden() {
        let gate = RoleGuard::new([Role::Admin, Role::Moderator]);
        assert!(matches!(gate.check(Role::User), Err(AuthError::Forbidden)));
    }

    #[test]
    fn test_empty_allow_list_rejects_every_role() {
        let gate = RoleGuard::new(Vec::new());
        for role in [Role::Admin, Role::Moderator, Role::User] {
            assert!(matches!(gate.check(role), Err(AuthError::Forbidden)));
        }
    }

    #[test]
    fn test_admin_helper_gates_out_everyone_else() {
        let gate = RoleGuard::admin();
        assert!(gate.check(Role::Admin).is_ok());
        assert!(gate.check(Role::Moderator).is_err());
        assert!(gate.check(Role::User).is_err());
    }
}
