//! Authentication Models
//! Users, roles and the request/response bodies of the auth endpoints

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub login: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub role: Role,
    pub full_name: String,
    pub created_at: String,
}

/// Canteen roles. Closed set; route guards name these directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Cook,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Cook, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Cook => "cook",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "student" => Some(Role::Student),
            "cook" => Some(Role::Cook),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request identity attached by the auth gate.
///
/// Lives in the request extensions for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub subject: String,
    pub role: Role,
}

impl AuthContext {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.subject).ok()
    }
}

/// Registration request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub login: String,
    pub password: String,
    pub full_name: String,
}

/// Admin user creation request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub login: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub expires_in: u64, // seconds until expiration
    pub user: UserResponse,
}

/// User response (sanitized)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub login: String,
    pub role: Role,
    pub full_name: String,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            login: user.login.clone(),
            role: user.role,
            full_name: user.full_name.clone(),
            created_at: user.created_at.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::Cook).unwrap();
        assert_eq!(json, r#""cook""#);

        let admin: Role = serde_json::from_str(r#""admin""#).unwrap();
        assert_eq!(admin, Role::Admin);

        assert!(serde_json::from_str::<Role>(r#""trader""#).is_err());
    }

    #[test]
    fn test_role_string_conversion() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse(" STUDENT "), Some(Role::Student));
        assert_eq!(Role::parse("chef"), None);
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn test_user_response_hides_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            login: "ivanov".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            role: Role::Student,
            full_name: "Ivan Ivanov".to_string(),
            created_at: "2025-09-01T08:00:00Z".to_string(),
        };

        let body = serde_json::to_value(UserResponse::from_user(&user)).unwrap();
        assert_eq!(body["login"], "ivanov");
        assert_eq!(body["fullName"], "Ivan Ivanov");
        assert!(body.get("passwordHash").is_none());

        let raw = serde_json::to_value(&user).unwrap();
        assert!(raw.get("password_hash").is_none());
    }

    #[test]
    fn test_auth_context_user_id() {
        let id = Uuid::new_v4();
        let ctx = AuthContext {
            subject: id.to_string(),
            role: Role::Cook,
        };
        assert_eq!(ctx.user_id(), Some(id));

        let opaque = AuthContext {
            subject: "not-a-uuid".to_string(),
            role: Role::Cook,
        };
        assert_eq!(opaque.user_id(), None);
    }
}
