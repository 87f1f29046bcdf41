//! Authentication Module
//! Token issuance and verification, request gates, and the credential store

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod user_store;

pub use api::AuthState;
pub use jwt::{IdentityClaim, IssuedToken, TokenError, TokenService};
pub use middleware::{auth_middleware, require_roles, AuthError, AuthGate, RoleGate};
pub use models::{AuthContext, Role, User};
pub use user_store::{CredentialStore, UserStore};
