//! Account authentication: password hashing, session tokens and extractors.

pub mod handlers;
pub mod middleware;
pub mod password;

pub use handlers::seed_superadmin;
pub use middleware::{AuthContext, SuperAdmin, SESSION_COOKIE_NAME};
