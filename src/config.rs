//! Service configuration
//! Built once at startup from the environment and handed to the components that need it

use std::{
    env, fmt,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

pub const MIN_SECRET_LEN: usize = 32;
pub const MAX_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set when APP_ENV=production")]
    MissingSecret,
    #[error("JWT_SECRET must be at least 32 bytes, got {0}")]
    WeakSecret(usize),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("cannot load env file {path}: {reason}")]
    EnvFile { path: String, reason: String },
}

/// Load `.env` files into the process environment.
///
/// dotenv never overrides a variable that is already set, so the first file to
/// define a key wins. `explicit` is loaded first and must exist; missing
/// `defaults` are skipped.
pub fn load_env_files(explicit: Option<&Path>, defaults: &[PathBuf]) -> Result<(), ConfigError> {
    if let Some(path) = explicit {
        load_env_file(path)?;
    }
    for path in defaults.iter().filter(|p| p.exists()) {
        load_env_file(path)?;
    }
    Ok(())
}

fn load_env_file(path: &Path) -> Result<(), ConfigError> {
    dotenv::from_path(path)
        .map(|_| ())
        .map_err(|e| ConfigError::EnvFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "development" | "dev" => Some(Environment::Development),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }
}

/// Where the auth gate takes the caller's role from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolePolicy {
    /// Role embedded in the verified token.
    TrustToken,
    /// Role re-read from the credential store on every request.
    StoreLookup,
}

impl RolePolicy {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "token" => Some(RolePolicy::TrustToken),
            "store" => Some(RolePolicy::StoreLookup),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub leeway_secs: u64,
    pub role_policy: RolePolicy,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_ttl_hours: MAX_TOKEN_TTL_HOURS,
            leeway_secs: 0,
            role_policy: RolePolicy::StoreLookup,
        }
    }

    pub fn with_role_policy(mut self, policy: RolePolicy) -> Self {
        self.role_policy = policy;
        self
    }
}

// Keeps the secret out of logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("leeway_secs", &self.leeway_secs)
            .field("role_policy", &self.role_policy)
            .finish()
    }
}

#[derive(Clone)]
pub struct BootstrapAdmin {
    pub login: String,
    pub password: String,
    pub full_name: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("login", &self.login)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub database_path: String,
    pub bind_addr: String,
    pub port: u16,
    pub auth: AuthConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV") {
            Some(raw) => Environment::parse(&raw).ok_or(ConfigError::InvalidValue {
                key: "APP_ENV",
                value: raw,
            })?,
            None => Environment::Production,
        };

        let jwt_secret = match (lookup("JWT_SECRET"), environment) {
            (Some(secret), _) if !secret.trim().is_empty() => {
                if environment == Environment::Production && secret.len() < MIN_SECRET_LEN {
                    return Err(ConfigError::WeakSecret(secret.len()));
                }
                secret
            }
            (_, Environment::Production) => return Err(ConfigError::MissingSecret),
            (_, Environment::Development) => {
                warn!("JWT_SECRET not set, using a random per-process secret (development only)");
                format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
            }
        };

        let token_ttl_hours = parse_or(&lookup, "JWT_TTL_HOURS", MAX_TOKEN_TTL_HOURS)?;
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&token_ttl_hours) {
            return Err(ConfigError::InvalidValue {
                key: "JWT_TTL_HOURS",
                value: token_ttl_hours.to_string(),
            });
        }

        let leeway_secs = parse_or(&lookup, "JWT_LEEWAY_SECS", 0u64)?;

        let role_policy = match lookup("AUTH_ROLE_POLICY") {
            Some(raw) => RolePolicy::parse(&raw).ok_or(ConfigError::InvalidValue {
                key: "AUTH_ROLE_POLICY",
                value: raw,
            })?,
            None => RolePolicy::StoreLookup,
        };

        let bootstrap_admin = match (
            lookup("BOOTSTRAP_ADMIN_LOGIN"),
            lookup("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(login), Some(password)) => Some(BootstrapAdmin {
                login,
                password,
                full_name: lookup("BOOTSTRAP_ADMIN_NAME")
                    .unwrap_or_else(|| "Administrator".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            environment,
            database_path: lookup("DATABASE_PATH").unwrap_or_else(|| "./canteen.db".to_string()),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3000u16)?,
            auth: AuthConfig {
                jwt_secret,
                token_ttl_hours,
                leeway_secs,
                role_policy,
            },
            bootstrap_admin,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(default),
    }
}
