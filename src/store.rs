/// User record storage backed by a JSON file in the data directory.
use std::{fs, path::PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config;

/// A stored user account. The password is kept as a salted SHA-256 digest,
/// never in the clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    pub salt: String,
    pub password_hash: String,
}

pub struct UserStore {
    path: PathBuf,
}

impl UserStore {
    /// Store at the default location, `~/.envdb/users.json`.
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(config::data_dir()?.join("users.json")))
    }

    pub fn open(path: PathBuf) -> Self {
        UserStore { path }
    }

    /// All users in file order. A missing file is an empty store.
    pub fn find_all(&self) -> Result<Vec<User>> {
        self.load()
    }

    pub fn find_by_email(&self, email: &str) -> Result<User> {
        self.load()?
            .into_iter()
            .find(|user| user.email == email)
            .ok_or_else(|| anyhow!("user with email '{}' not found", email))
    }

    pub fn create(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let mut users = self.load()?;

        if users.iter().any(|user| user.email == email) {
            bail!("user with email '{}' already exists", email);
        }

        let mut salt = [0u8; 16];
        rand::rng().fill_bytes(&mut salt);

        let user = User {
            name: name.to_string(),
            email: email.to_string(),
            salt: general_purpose::STANDARD.encode(salt),
            password_hash: general_purpose::STANDARD.encode(hash_password(&salt, password)),
        };

        users.push(user.clone());
        self.save(&users)?;

        Ok(user)
    }

    pub fn delete(&self, user: &User) -> Result<()> {
        let mut users = self.load()?;
        let before = users.len();

        users.retain(|existing| existing.email != user.email);

        if users.len() == before {
            bail!("user with email '{}' not found", user.email);
        }

        self.save(&users)
    }

    fn load(&self) -> Result<Vec<User>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }

    fn save(&self, users: &[User]) -> Result<()> {
        let contents =
            serde_json::to_string_pretty(users).context("failed to serialize user records")?;

        // Write-then-rename so a crash never leaves a truncated store behind.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;

        Ok(())
    }
}

/// Check a password against a stored user record.
pub fn verify_password(user: &User, password: &str) -> Result<bool> {
    let salt = general_purpose::STANDARD
        .decode(&user.salt)
        .context("stored salt is not valid base64")?;
    let stored = general_purpose::STANDARD
        .decode(&user.password_hash)
        .context("stored password hash is not valid base64")?;

    Ok(hash_password(&salt, password) == stored.as_slice())
}

fn hash_password(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

/// Structural email check: one `@`, non-empty local part, dotted domain,
/// no whitespace anywhere.
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') {
        return false;
    }

    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
