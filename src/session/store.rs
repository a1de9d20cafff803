use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// On-disk client storage: the bearer token and the cached user profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<Value>,
}

pub struct TokenStore {
    path: PathBuf,
    data: RwLock<StoredSession>,
}

impl TokenStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read session from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            StoredSession::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn set_token(&self, token: Option<String>) -> Result<()> {
        let mut guard = self.write();
        guard.access_token = token;
        self.persist(&guard)
    }

    pub fn user(&self) -> Option<Value> {
        self.read().user.clone()
    }

    pub fn set_user(&self, user: Option<Value>) -> Result<()> {
        let mut guard = self.write();
        guard.user = user;
        self.persist(&guard)
    }

    /// Re-reads the file so changes made by another instance become visible.
    /// A missing file means an empty session.
    pub fn reload(&self) -> Result<()> {
        let data = if self.path.exists() {
            let contents = fs::read_to_string(&self.path)
                .with_context(|| format!("Failed to read session from {}", self.path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            StoredSession::default()
        };
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &StoredSession) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write session to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, StoredSession> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoredSession> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
