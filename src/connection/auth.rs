use crate::core::{DbError, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Database login
#[derive(Debug, Clone)]
pub struct User {
    username: String,
    password_hash: String,
}

impl User {
    pub fn new(username: String, password_hash: String) -> Self {
        Self {
            username,
            password_hash,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Credential store of one database.
///
/// Passwords are kept as bcrypt hashes. The low work factor keeps connection
/// setup cheap; this guards an in-process store, not a network listener.
pub struct AuthManager {
    users: RwLock<HashMap<String, User>>,
}

impl AuthManager {
    pub const DEFAULT_USERNAME: &'static str = "admin";
    pub const DEFAULT_PASSWORD: &'static str = "adminpass";

    const HASH_COST: u32 = 4;

    /// Creates a manager holding only the default login.
    pub fn new() -> Result<Self> {
        Self::with_user(Self::DEFAULT_USERNAME, Self::DEFAULT_PASSWORD)
    }

    pub fn with_user(username: &str, password: &str) -> Result<Self> {
        let manager = Self {
            users: RwLock::new(HashMap::new()),
        };
        manager.create_user(username, password)?;
        Ok(manager)
    }

    fn hash_password(password: &str) -> Result<String> {
        bcrypt::hash(password, Self::HASH_COST)
            .map_err(|e| DbError::ConfigError(format!("Failed to hash password: {}", e)))
    }

    fn verify_password(password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let users = self.users.read()?;

        let user = users
            .get(username)
            .ok_or_else(|| DbError::AuthenticationFailed(username.to_string()))?;

        if !Self::verify_password(password, &user.password_hash) {
            return Err(DbError::AuthenticationFailed(username.to_string()));
        }

        Ok(user.clone())
    }

    pub fn create_user(&self, username: &str, password: &str) -> Result<()> {
        if username.is_empty() {
            return Err(DbError::ConfigError("Username cannot be empty".into()));
        }
        if password.is_empty() {
            return Err(DbError::ConfigError("Password cannot be empty".into()));
        }

        let hash = Self::hash_password(password)?;
        let mut users = self.users.write()?;

        if users.contains_key(username) {
            return Err(DbError::ConfigError(format!(
                "User '{}' already exists",
                username
            )));
        }

        users.insert(username.to_string(), User::new(username.to_string(), hash));
        Ok(())
    }

    pub fn user_exists(&self, username: &str) -> Result<bool> {
        Ok(self.users.read()?.contains_key(username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user_authenticates() {
        let auth = AuthManager::new().unwrap();
        let user = auth
            .authenticate(AuthManager::DEFAULT_USERNAME, AuthManager::DEFAULT_PASSWORD)
            .unwrap();
        assert_eq!(user.username(), "admin");
    }

    #[test]
    fn test_wrong_password_rejected() {
        let auth = AuthManager::new().unwrap();
        let result = auth.authenticate("admin", "nope");
        assert!(matches!(result, Err(DbError::AuthenticationFailed(_))));
    }

    #[test]
    fn test_unknown_user_rejected() {
        let auth = AuthManager::new().unwrap();
        assert!(auth.authenticate("ghost", "adminpass").is_err());
    }

    #[test]
    fn test_create_user() {
        let auth = AuthManager::new().unwrap();
        auth.create_user("teller", "s3cret").unwrap();

        assert!(auth.user_exists("teller").unwrap());
        assert!(auth.authenticate("teller", "s3cret").is_ok());
        assert!(auth.create_user("teller", "again").is_err());
    }
}
