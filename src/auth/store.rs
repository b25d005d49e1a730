// Credential storage
// Process-wide key/value store for the credential pair, optionally persisted to SQLite

use anyhow::{Context, Result};
use dashmap::DashMap;
use std::path::Path;
use std::sync::Mutex;

use super::types::{Session, UserInfo};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_ID_KEY: &str = "user_id";
pub const USER_EMAIL_KEY: &str = "user_email";

/// All keys that make up one credential pair; evicted together
const CREDENTIAL_KEYS: [&str; 4] = [
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    USER_ID_KEY,
    USER_EMAIL_KEY,
];

/// Thread-safe credential store
///
/// Reads are served from an in-process map; writes go through to the
/// SQLite key/value table when the store was opened from disk.
pub struct CredentialStore {
    /// In-process view of the stored keys
    entries: DashMap<String, String>,

    /// Backing database, absent for in-memory stores
    conn: Option<Mutex<rusqlite::Connection>>,
}

impl CredentialStore {
    /// Open a persistent store, creating the database and table if needed
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create credentials directory: {}", parent.display())
            })?;
        }

        let conn = rusqlite::Connection::open(path)
            .with_context(|| format!("Failed to open credentials database: {}", path.display()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS credential_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .context("Failed to create credential_kv table")?;

        let entries = DashMap::new();
        {
            let mut stmt = conn
                .prepare("SELECT key, value FROM credential_kv")
                .context("Failed to read stored credentials")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (key, value) = row?;
                entries.insert(key, value);
            }
        }

        tracing::debug!(
            path = %path.display(),
            has_session = entries.contains_key(ACCESS_TOKEN_KEY),
            "Opened credential store"
        );

        Ok(Self {
            entries,
            conn: Some(Mutex::new(conn)),
        })
    }

    /// Create a store with no on-disk backing
    pub fn in_memory() -> Self {
        Self {
            entries: DashMap::new(),
            conn: None,
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get(REFRESH_TOKEN_KEY)
    }

    pub fn user_id(&self) -> Option<String> {
        self.get(USER_ID_KEY)
    }

    pub fn user_email(&self) -> Option<String> {
        self.get(USER_EMAIL_KEY)
    }

    /// Identity of the stored session, if one is present
    pub fn current_user(&self) -> Option<UserInfo> {
        Some(UserInfo {
            id: self.user_id()?,
            email: self.user_email()?,
        })
    }

    /// True when both tokens of the credential pair are present
    pub fn has_credentials(&self) -> bool {
        self.entries.contains_key(ACCESS_TOKEN_KEY) && self.entries.contains_key(REFRESH_TOKEN_KEY)
    }

    /// Store a full credential pair (login or account switch)
    pub fn store_session(&self, session: &Session) -> Result<()> {
        self.set(ACCESS_TOKEN_KEY, &session.access_token)?;
        self.set(REFRESH_TOKEN_KEY, &session.refresh_token)?;
        self.set(USER_ID_KEY, &session.user_id)?;
        self.set(USER_EMAIL_KEY, &session.user_email)?;
        Ok(())
    }

    /// Overwrite just the access token (refresh success path)
    pub fn set_access_token(&self, token: &str) -> Result<()> {
        self.set(ACCESS_TOKEN_KEY, token)
    }

    /// Delete every credential key; used on logout and on terminal refresh failure
    pub fn clear(&self) -> Result<()> {
        for key in CREDENTIAL_KEYS {
            self.entries.remove(key);
        }

        if let Some(ref conn) = self.conn {
            let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
            conn.execute(
                "DELETE FROM credential_kv WHERE key IN (?1, ?2, ?3, ?4)",
                CREDENTIAL_KEYS,
            )
            .context("Failed to clear persisted credentials")?;
        }

        tracing::debug!("Cleared stored credentials");
        Ok(())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());

        if let Some(ref conn) = self.conn {
            let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
            conn.execute(
                "INSERT INTO credential_kv (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                [key, value],
            )
            .with_context(|| format!("Failed to persist credential key: {}", key))?;
        }

        Ok(())
    }
}
