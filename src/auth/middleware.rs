//! Authentication Middleware
//! Auth gate (bearer token -> AuthContext) and role gate (AuthContext -> allow/deny)

use crate::auth::{
    jwt::{IdentityClaim, TokenError, TokenService},
    models::{AuthContext, Role},
    user_store::CredentialStore,
};
use crate::config::RolePolicy;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// State for `auth_middleware`.
#[derive(Clone)]
pub struct AuthGate {
    tokens: Arc<TokenService>,
    store: Arc<dyn CredentialStore>,
    policy: RolePolicy,
}

impl AuthGate {
    pub fn new(
        tokens: Arc<TokenService>,
        store: Arc<dyn CredentialStore>,
        policy: RolePolicy,
    ) -> Self {
        Self {
            tokens,
            store,
            policy,
        }
    }

    /// Verify a raw bearer token and build the request identity.
    pub async fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claim = self.tokens.verify(token).map_err(|e| {
            match e {
                TokenError::Expired => debug!("Rejected expired token"),
                TokenError::Malformed | TokenError::SignatureMismatch => {
                    warn!(reason = %e, "Rejected bearer token")
                }
            }
            AuthError::TokenInvalid
        })?;

        self.resolve(claim).await
    }

    async fn resolve(&self, claim: IdentityClaim) -> Result<AuthContext, AuthError> {
        match self.policy {
            RolePolicy::TrustToken => Ok(AuthContext {
                subject: claim.subject().to_string(),
                role: claim.role(),
            }),
            RolePolicy::StoreLookup => {
                let id = Uuid::parse_str(claim.subject()).map_err(|_| {
                    warn!(subject = claim.subject(), "Token subject is not a user id");
                    AuthError::Unauthenticated
                })?;

                let user = self
                    .store
                    .find_by_id(&id)
                    .await
                    .map_err(|e| {
                        error!(error = %e, user_id = %id, "Credential store lookup failed");
                        AuthError::Internal
                    })?
                    .ok_or_else(|| {
                        debug!(user_id = %id, "Token subject no longer exists");
                        AuthError::Unauthenticated
                    })?;

                if user.role != claim.role() {
                    debug!(
                        user_id = %id,
                        token_role = %claim.role(),
                        stored_role = %user.role,
                        "Stored role differs from token role, using stored role"
                    );
                }

                Ok(AuthContext {
                    subject: user.id.to_string(),
                    role: user.role,
                })
            }
        }
    }
}

/// Auth middleware that validates bearer tokens
pub async fn auth_middleware(
    State(gate): State<AuthGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers())
        .map(str::to_string)
        .ok_or(AuthError::TokenMissing)?;

    let ctx = gate.authenticate(&token).await?;

    // Handlers and the role gate read this back out of the extensions
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Guard admitting only the configured roles. Layer after `auth_middleware`.
#[derive(Debug, Clone)]
pub struct RoleGate {
    allowed: Arc<[Role]>,
}

impl RoleGate {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        let mut allowed: Vec<Role> = Vec::new();
        for role in roles {
            if !allowed.contains(&role) {
                allowed.push(role);
            }
        }
        Self {
            allowed: allowed.into(),
        }
    }

    pub fn only(role: Role) -> Self {
        Self::new([role])
    }

    pub fn allowed(&self) -> &[Role] {
        &self.allowed
    }

    pub fn permits(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }

    pub fn check(&self, ctx: Option<&AuthContext>) -> Result<(), AuthError> {
        let ctx = ctx.ok_or(AuthError::Unauthenticated)?;
        if self.permits(ctx.role) {
            Ok(())
        } else {
            debug!(
                subject = %ctx.subject,
                role = %ctx.role,
                allowed = ?self.allowed,
                "Role not permitted"
            );
            Err(AuthError::Forbidden)
        }
    }
}

/// Role gate middleware
pub async fn require_roles(
    State(gate): State<RoleGate>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    gate.check(req.extensions().get::<AuthContext>())?;
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

/// Auth error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    TokenMissing,
    TokenInvalid,
    Unauthenticated,
    Forbidden,
    Internal,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::TokenMissing | AuthError::TokenInvalid | AuthError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. All 401 causes share one message.
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::TokenMissing | AuthError::TokenInvalid | AuthError::Unauthenticated => {
                "Authentication required"
            }
            AuthError::Forbidden => "Access denied",
            AuthError::Internal => "Internal server error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": self.message(),
        });
        (self.status(), Json(body)).into_response()
    }
}
