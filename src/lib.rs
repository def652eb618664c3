// Authentication core of the contacts API
// Token issuance and verification, cache-backed user resolution, and the
// role gate used by protected routes

pub mod cache;
pub mod error;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod store;
pub mod token;

// Re-export commonly used types
pub use cache::{InMemoryUserCache, RedisUserCache, UserCache};
pub use error::AuthError;
pub use middleware::{CurrentUser, RoleGuard};
pub use models::{Role, User, UserSnapshot};
pub use service::{AuthContext, USER_CACHE_TTL};
pub use store::{PgUserStore, UserStore};
pub use token::{Claims, Scope, TokenCodec};
