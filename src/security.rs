//! Credential store: a YAML table of `username: <argon2 PHC hash>`.
//!
//! The table is read and written as a whole. There is no row locking, so two
//! signups racing on the same username can both pass the uniqueness check and
//! the later write wins.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

pub type UserTable = BTreeMap<String, String>;

/// Usernames are keyed case-insensitively: trimmed and lower-cased everywhere.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| AppError::internal(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::internal(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::internal(e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    pub fn path(&self) -> &Path { &self.path }

    /// Create an empty table when none exists. Only the explicit user bootstrap
    /// calls this; a server start with no table is a configuration error.
    pub fn initialize(&self) -> AppResult<()> {
        if self.path.exists() { return Ok(()); }
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        self.save_users(&UserTable::new())?;
        info!(target: "flatcms::security", "initialized empty credential table at {}", self.path.display());
        Ok(())
    }

    pub fn load_users(&self) -> AppResult<UserTable> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::configuration(format!("credential table {} does not exist", self.path.display())));
            }
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() { return Ok(UserTable::new()); }
        let table: Option<UserTable> = serde_yaml::from_str(&text)
            .map_err(|e| AppError::configuration(format!("credential table {} is malformed: {}", self.path.display(), e)))?;
        Ok(table.unwrap_or_default())
    }

    fn save_users(&self, users: &UserTable) -> AppResult<()> {
        let text = serde_yaml::to_string(users).map_err(|e| AppError::internal(e.to_string()))?;
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| AppError::Io(e.error))?;
        Ok(())
    }

    /// False for unknown users. Known users are checked with the Argon2 verifier.
    pub fn verify(&self, username: &str, password: &str) -> AppResult<bool> {
        let users = self.load_users()?;
        let key = normalize_username(username);
        let Some(hash) = users.get(&key) else { return Ok(false); };
        let ok = verify_password(hash, password);
        if !ok { warn!(target: "flatcms::security", "failed password check for {}", key); }
        Ok(ok)
    }

    /// Signup form checks, in order: confirmation match, username free, nothing blank.
    pub fn check_signup(&self, username: &str, password: &str, password_confirm: &str) -> AppResult<()> {
        if password != password_confirm {
            return Err(AppError::PasswordMismatch);
        }
        let key = normalize_username(username);
        if self.load_users()?.contains_key(&key) {
            return Err(AppError::UsernameTaken);
        }
        if key.is_empty() || password.is_empty() {
            return Err(AppError::BlankCredentials);
        }
        Ok(())
    }

    /// Hash `password` with a fresh salt and store it, replacing any previous entry.
    pub fn register(&self, username: &str, password: &str) -> AppResult<()> {
        let key = normalize_username(username);
        let mut users = self.load_users()?;
        users.insert(key.clone(), hash_password(password)?);
        self.save_users(&users)?;
        info!(target: "flatcms::security", "registered user {}", key);
        Ok(())
    }
}
