//! User Storage
//! Credential store for canteen accounts, backed by SQLite with bcrypt password hashes

use crate::auth::models::{Role, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, types::Type, Connection, ErrorCode, OptionalExtension, Row};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Lookups the auth layer needs from wherever accounts live.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>>;
}

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("login already taken")]
    LoginTaken,
    #[error("failed to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

/// bcrypt only looks at the first 72 bytes of a password.
pub const MAX_PASSWORD_LEN: usize = 72;

const USER_COLUMNS: &str = "id, login, password_hash, role, full_name, created_at";

/// User storage with SQLite backend
pub struct UserStore {
    conn: Arc<Mutex<Connection>>,
    hash_cost: u32,
    // Compared against when the login is unknown so both paths cost one bcrypt verify.
    dummy_hash: String,
}

impl UserStore {
    /// Open (or create) the user database at `db_path`
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open user db at {}", db_path))?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        Self::from_connection(conn, DEFAULT_COST)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, DEFAULT_COST)
    }

    /// Cheaper bcrypt cost, meant for tests.
    pub fn in_memory_with_cost(cost: u32) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, cost)
    }

    fn from_connection(conn: Connection, hash_cost: u32) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                login TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                full_name TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create users table")?;

        let dummy_hash = hash(Uuid::new_v4().to_string(), hash_cost)
            .context("Failed to hash password")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            hash_cost,
            dummy_hash,
        })
    }

    /// Create a new user
    pub fn create_user(
        &self,
        login: &str,
        password: &str,
        role: Role,
        full_name: &str,
    ) -> Result<User, UserStoreError> {
        let password_hash = hash(password, self.hash_cost)?;

        let user = User {
            id: Uuid::new_v4(),
            login: login.to_string(),
            password_hash,
            role,
            full_name: full_name.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, login, password_hash, role, full_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id.to_string(),
                user.login,
                user.password_hash,
                user.role.as_str(),
                user.full_name,
                user.created_at,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                UserStoreError::LoginTaken
            }
            other => UserStoreError::Database(other),
        })?;

        info!(login = %user.login, role = %user.role, "Created user");

        Ok(user)
    }

    /// Get user by primary key
    pub fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id.to_string()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Get user by login name
    pub fn get_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE login = ?1", USER_COLUMNS),
                params![login],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Verify login and password, returning the account on success
    pub fn verify_credentials(&self, login: &str, password: &str) -> Result<Option<User>> {
        // Longer inputs would be truncated and match on their first 72 bytes
        if password.len() > MAX_PASSWORD_LEN {
            return Ok(None);
        }

        match self.get_user_by_login(login)? {
            Some(user) => {
                let valid =
                    verify(password, &user.password_hash).context("Failed to verify password")?;
                Ok(valid.then_some(user))
            }
            None => {
                let _ = verify(password, &self.dummy_hash);
                Ok(None)
            }
        }
    }

    /// List all users, oldest first
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY created_at, login",
            USER_COLUMNS
        ))?;

        let users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    pub fn count_admins(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let count = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE role = 'admin'",
                [],
                |row| row.get(0),
            )
            .context("Failed to check for admin users")?;
        Ok(count)
    }

    /// Create the configured admin account if no admin exists yet
    pub fn ensure_admin(&self, login: &str, password: &str, full_name: &str) -> Result<bool> {
        if self.count_admins()? > 0 {
            return Ok(false);
        }
        self.create_user(login, password, Role::Admin, full_name)
            .context("Failed to create bootstrap admin")?;
        info!(login, "Bootstrap admin created");
        Ok(true)
    }

    /// Change a user's role. Returns false if the user does not exist.
    pub fn set_role(&self, id: &Uuid, role: Role) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE users SET role = ?1 WHERE id = ?2",
            params![role.as_str(), id.to_string()],
        )?;
        if rows > 0 {
            info!(user_id = %id, role = %role, "Changed user role");
        }
        Ok(rows > 0)
    }

    /// Delete a user by ID. Returns false if the user does not exist.
    pub fn delete_user(&self, id: &Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
        if rows > 0 {
            info!(user_id = %id, "Deleted user");
        }
        Ok(rows > 0)
    }
}

#[async_trait]
impl CredentialStore for UserStore {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        self.get_user_by_id(id)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let role: String = row.get(3)?;
    Ok(User {
        id: Uuid::parse_str(&id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
        login: row.get(1)?,
        password_hash: row.get(2)?,
        role: Role::parse(&role).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                Type::Text,
                format!("unknown role {:?}", role).into(),
            )
        })?,
        full_name: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> UserStore {
        UserStore::in_memory_with_cost(4).unwrap()
    }

    #[test]
    fn test_create_and_retrieve_user() {
        let store = create_test_store();

        let cook = store
            .create_user("cook1", "password123", Role::Cook, "Anna Petrova")
            .unwrap();
        assert_eq!(cook.role, Role::Cook);
        assert_ne!(cook.password_hash, "password123");

        let by_login = store.get_user_by_login("cook1").unwrap().unwrap();
        assert_eq!(by_login.id, cook.id);
        assert_eq!(by_login.full_name, "Anna Petrova");

        let by_id = store.get_user_by_id(&cook.id).unwrap().unwrap();
        assert_eq!(by_id.login, "cook1");

        assert!(store.get_user_by_login("nobody").unwrap().is_none());
        assert!(store.get_user_by_id(&Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_login_rejected() {
        let store = create_test_store();
        store
            .create_user("student1", "password123", Role::Student, "A")
            .unwrap();

        let err = store
            .create_user("student1", "otherpass1", Role::Student, "B")
            .unwrap_err();
        assert!(matches!(err, UserStoreError::LoginTaken));
    }

    #[test]
    fn test_password_verification() {
        let store = create_test_store();
        store
            .create_user("student1", "password123", Role::Student, "A")
            .unwrap();

        let user = store.verify_credentials("student1", "password123").unwrap();
        assert_eq!(user.map(|u| u.login), Some("student1".to_string()));

        assert!(store
            .verify_credentials("student1", "wrongpassword")
            .unwrap()
            .is_none());
        assert!(store
            .verify_credentials("nonexistent", "password123")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_overlong_password_never_matches() {
        let store = create_test_store();
        let password = "p".repeat(MAX_PASSWORD_LEN);
        store
            .create_user("longpass", &password, Role::Student, "L")
            .unwrap();

        assert!(store
            .verify_credentials("longpass", &password)
            .unwrap()
            .is_some());

        // Same first 72 bytes, extra suffix
        let extended = format!("{}suffix", password);
        assert!(store
            .verify_credentials("longpass", &extended)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_ensure_admin_only_once() {
        let store = create_test_store();
        assert_eq!(store.count_admins().unwrap(), 0);

        assert!(store.ensure_admin("root", "rootpass123", "Root").unwrap());
        assert!(!store.ensure_admin("root2", "rootpass123", "Root 2").unwrap());

        assert_eq!(store.count_admins().unwrap(), 1);
        assert!(store.get_user_by_login("root2").unwrap().is_none());
    }

    #[test]
    fn test_set_role_and_delete() {
        let store = create_test_store();
        let user = store
            .create_user("tempuser", "password123", Role::Student, "Temp")
            .unwrap();

        assert!(store.set_role(&user.id, Role::Cook).unwrap());
        assert_eq!(
            store.get_user_by_id(&user.id).unwrap().unwrap().role,
            Role::Cook
        );

        assert!(store.delete_user(&user.id).unwrap());
        assert!(store.get_user_by_login("tempuser").unwrap().is_none());
        assert!(!store.delete_user(&user.id).unwrap());
        assert!(!store.set_role(&user.id, Role::Admin).unwrap());
    }

    #[test]
    fn test_list_users() {
        let store = create_test_store();
        store.create_user("a", "password123", Role::Student, "A").unwrap();
        store.create_user("b", "password123", Role::Cook, "B").unwrap();
        store.create_user("c", "password123", Role::Admin, "C").unwrap();

        let users = store.list_users().unwrap();
        assert_eq!(users.len(), 3);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();

        let id = {
            let store = UserStore::new(db_path).unwrap();
            store
                .create_user("persisted", "password123", Role::Cook, "P")
                .unwrap()
                .id
        };

        let reopened = UserStore::new(db_path).unwrap();
        assert_eq!(
            reopened.get_user_by_id(&id).unwrap().unwrap().login,
            "persisted"
        );
    }

    #[tokio::test]
    async fn test_credential_store_trait() {
        let store = create_test_store();
        let user = store
            .create_user("trait", "password123", Role::Student, "T")
            .unwrap();

        let dyn_store: &dyn CredentialStore = &store;
        assert_eq!(
            dyn_store.find_by_id(&user.id).await.unwrap().map(|u| u.login),
            Some("trait".to_string())
        );
        assert!(dyn_store.find_by_id(&Uuid::new_v4()).await.unwrap().is_none());
    }
}
