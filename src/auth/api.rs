//! Authentication API Endpoints
//! Registration, login, profile and admin user management

use crate::api::{parse_id, ApiError, ApiJson, ApiResponse};
use crate::auth::{
    jwt::TokenService,
    models::{
        AuthContext, CreateUserRequest, LoginRequest, LoginResponse, RegisterRequest, Role, User,
        UserResponse,
    },
    user_store::{UserStore, UserStoreError, MAX_PASSWORD_LEN},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub tokens: Arc<TokenService>,
}

impl AuthState {
    pub fn new(user_store: Arc<UserStore>, tokens: Arc<TokenService>) -> Self {
        Self { user_store, tokens }
    }

    fn login_response(&self, user: &User) -> Result<LoginResponse, ApiError> {
        let issued = self
            .tokens
            .issue(&user.id.to_string(), user.role)
            .map_err(ApiError::internal)?;

        Ok(LoginResponse {
            success: true,
            token: issued.token,
            expires_in: issued.expires_in,
            user: UserResponse::from_user(user),
        })
    }

    fn create_account(
        &self,
        login: &str,
        password: &str,
        full_name: &str,
        role: Role,
    ) -> Result<User, ApiError> {
        validate_login(login)?;
        validate_password(password)?;
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(ApiError::bad_request("Full name must not be empty"));
        }

        self.user_store
            .create_user(login, password, role, full_name)
            .map_err(|e| match e {
                UserStoreError::LoginTaken => ApiError::Conflict("Login already taken"),
                other => ApiError::internal(other),
            })
    }
}

/// Register endpoint - POST /api/auth/register
/// Self-service accounts are always students.
pub async fn register(
    State(state): State<AuthState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let user = state.create_account(
        &payload.login,
        &payload.password,
        &payload.full_name,
        Role::Student,
    )?;

    info!(login = %user.login, "Registered new student");

    let response = state.login_response(&user)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AuthState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    info!(login = %payload.login, "Login attempt");

    if payload.login.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Login and password are required"));
    }

    let user = state
        .user_store
        .verify_credentials(&payload.login, &payload.password)
        .map_err(ApiError::internal)?
        .ok_or_else(|| {
            warn!(login = %payload.login, "Failed login attempt");
            ApiError::InvalidCredentials
        })?;

    info!(login = %user.login, role = %user.role, "Login successful");

    Ok(Json(state.login_response(&user)?))
}

/// Current user - GET /api/auth/profile
pub async fn profile(
    State(state): State<AuthState>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let id = auth
        .user_id()
        .ok_or(ApiError::NotFound("User"))?;

    let user = state
        .user_store
        .get_user_by_id(&id)
        .map_err(ApiError::internal)?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(ApiResponse::ok(UserResponse::from_user(&user))))
}

/// List all users - GET /api/auth/users (admin)
pub async fn list_users(
    State(state): State<AuthState>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    let users = state
        .user_store
        .list_users()
        .map_err(ApiError::internal)?;

    let response: Vec<UserResponse> = users.iter().map(UserResponse::from_user).collect();
    Ok(Json(ApiResponse::ok(response)))
}

/// Create user with any role - POST /api/auth/users (admin)
pub async fn create_user(
    State(state): State<AuthState>,
    auth: AuthContext,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    let user = state.create_account(
        &payload.login,
        &payload.password,
        &payload.full_name,
        payload.role,
    )?;

    info!(login = %user.login, role = %user.role, by = %auth.subject, "User created by admin");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(UserResponse::from_user(&user))),
    ))
}

#[derive(Debug, Deserialize)]
pub struct RoleChangeRequest {
    pub role: Role,
}

/// Change a user's role - PATCH /api/auth/users/:id/role (admin)
pub async fn set_user_role(
    State(state): State<AuthState>,
    auth: AuthContext,
    Path(user_id): Path<String>,
    ApiJson(payload): ApiJson<RoleChangeRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let id = parse_id(&user_id)?;

    // Admins cannot change their own role
    if auth.user_id() == Some(id) {
        return Err(ApiError::bad_request("Cannot change your own role"));
    }

    if !state
        .user_store
        .set_role(&id, payload.role)
        .map_err(ApiError::internal)?
    {
        return Err(ApiError::NotFound("User"));
    }

    let user = state
        .user_store
        .get_user_by_id(&id)
        .map_err(ApiError::internal)?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(ApiResponse::ok(UserResponse::from_user(&user))))
}

/// Delete user - DELETE /api/auth/users/:id (admin)
pub async fn delete_user(
    State(state): State<AuthState>,
    auth: AuthContext,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&user_id)?;

    if auth.user_id() == Some(id) {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }

    if !state
        .user_store
        .delete_user(&id)
        .map_err(ApiError::internal)?
    {
        return Err(ApiError::NotFound("User"));
    }

    Ok(StatusCode::NO_CONTENT)
}

fn validate_login(login: &str) -> Result<(), ApiError> {
    let len = login.chars().count();
    if !(3..=64).contains(&len) {
        return Err(ApiError::bad_request(
            "Login must be between 3 and 64 characters",
        ));
    }
    if !login
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ApiError::bad_request(
            "Login may contain only letters, digits, '.', '_' and '-'",
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(ApiError::bad_request(
            "Password must be at most 72 bytes",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_validation() {
        assert!(validate_login("ivanov").is_ok());
        assert!(validate_login("a.b_c-d").is_ok());
        assert!(validate_login("иванов").is_ok());
        assert!(validate_login("ab").is_err());
        assert!(validate_login("has space").is_err());
        assert!(validate_login(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_password_validation() {
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"p".repeat(73)).is_err());
    }
}
