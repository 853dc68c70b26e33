//! Credential cache.
//!
//! Tokens obtained by an exchange are stored per (method, target), where the
//! target is the API URL plus namespace. The file-backed cache keeps one JSON
//! file per key under `<config dir>/cache/`:
//!
//! ```text
//! ~/.config/bosun/cache/token-ldap-3f2a9c1b7d4e
//! ```
//!
//! **Cache files contain secrets and are written with 0600 permissions.**
//!
//! Several processes may read and write the same files. Writes are atomic
//! renames, but nothing coordinates readers with writers; a stale token
//! simply fails at the API and the user retries with `--refresh-cached-token`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::Result;
use crate::auth::{AuthMethod, claims, mask_token};
use crate::config::{EffectiveConfig, KEY_API, KEY_NAMESPACE};

/// Directory under the config dir holding cache files.
pub const CACHE_DIR: &str = "cache";

/// Prefix of every cache file name.
const FILE_PREFIX: &str = "token-";

/// Required permissions for cache files (Unix: 0600, owner read/write only).
#[cfg(unix)]
pub const CACHE_FILE_MODE: u32 = 0o600;

/// Required permissions for the cache directory (Unix: 0700).
#[cfg(unix)]
pub const CACHE_DIR_MODE: u32 = 0o700;

/// Identity of a cached credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub method: AuthMethod,
    pub target: String,
}

impl CacheKey {
    pub fn new(method: AuthMethod, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
        }
    }

    /// Key for a method against the API and namespace in the config.
    pub fn for_config(method: AuthMethod, config: &EffectiveConfig) -> Self {
        let api = config.get_str(KEY_API).unwrap_or_default();
        let namespace = config.get_str(KEY_NAMESPACE).unwrap_or_default();
        Self::new(method, format!("{}#{}", api, namespace))
    }

    /// File name: method plus the first 12 hex chars of the target's SHA-256.
    pub fn file_name(&self) -> String {
        let hash = Sha256::digest(self.target.as_bytes());
        let hex = format!("{:x}", hash);
        format!("{}{}-{}", FILE_PREFIX, self.method, &hex[..12])
    }
}

/// A credential plus the key it was stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub method: AuthMethod,
    pub target: String,
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(key: &CacheKey, token: impl Into<String>) -> Self {
        Self {
            method: key.method,
            target: key.target.clone(),
            token: token.into(),
            issued_at: Utc::now(),
        }
    }

    pub fn masked(&self) -> String {
        mask_token(&self.token)
    }

    /// Expiry read from the token itself when it is a JWT.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        claims::decode(&self.token)?.expires_at()
    }

    /// True only for JWTs whose `exp` has passed. Opaque tokens never expire here.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }

    fn matches(&self, key: &CacheKey) -> bool {
        self.method == key.method && self.target == key.target
    }
}

/// Storage for previously obtained credentials.
pub trait CredentialCache {
    /// Look up the token for a key. Missing or unreadable entries are `None`.
    fn get(&self, key: &CacheKey) -> Result<Option<CachedToken>>;

    /// Store a token for a key, replacing any previous one.
    fn put(&self, key: &CacheKey, token: &str) -> Result<CachedToken>;

    /// Drop the token for a key. Returns true if one was removed.
    fn invalidate(&self, key: &CacheKey) -> Result<bool>;

    /// Drop every cached token. Returns how many were removed.
    fn clear(&self) -> Result<usize>;
}

/// File-backed cache, one JSON file per key.
#[derive(Debug, Clone)]
pub struct FileCredentialCache {
    dir: PathBuf,
}

impl FileCredentialCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache rooted at `<config_dir>/cache`.
    pub fn in_config_dir(config_dir: &Path) -> Self {
        Self::new(config_dir.join(CACHE_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    fn ensure_dir(&self) -> Result<()> {
        if self.dir.is_dir() {
            return Ok(());
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .recursive(true)
                .mode(CACHE_DIR_MODE)
                .create(&self.dir)?;
        }
        #[cfg(not(unix))]
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}

impl CredentialCache for FileCredentialCache {
    fn get(&self, key: &CacheKey) -> Result<Option<CachedToken>> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<CachedToken>(&content) {
            Ok(cached) if cached.matches(key) => Ok(Some(cached)),
            Ok(_) => {
                debug!(path = %path.display(), "cache entry belongs to another target");
                Ok(None)
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring malformed cache entry");
                Ok(None)
            }
        }
    }

    fn put(&self, key: &CacheKey, token: &str) -> Result<CachedToken> {
        self.ensure_dir()?;
        let cached = CachedToken::new(key, token);
        let json = serde_json::to_string_pretty(&cached)?;

        // NamedTempFile is created 0600 on Unix; persist() renames atomically.
        let mut file = tempfile::NamedTempFile::new_in(&self.dir)?;
        file.write_all(json.as_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(fs::Permissions::from_mode(CACHE_FILE_MODE))?;
        }
        file.persist(self.path_for(key)).map_err(|e| e.error)?;

        debug!(method = %key.method, token = %cached.masked(), "cached token");
        Ok(cached)
    }

    fn invalidate(&self, key: &CacheKey) -> Result<bool> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => {
                debug!(method = %key.method, "invalidated cached token");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let is_token = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(FILE_PREFIX));
            if is_token && entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Process-local cache used when the config directory is unavailable.
#[derive(Debug, Default)]
pub struct MemoryCredentialCache {
    entries: RefCell<HashMap<CacheKey, CachedToken>>,
}

impl MemoryCredentialCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialCache for MemoryCredentialCache {
    fn get(&self, key: &CacheKey) -> Result<Option<CachedToken>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn put(&self, key: &CacheKey, token: &str) -> Result<CachedToken> {
        let cached = CachedToken::new(key, token);
        self.entries.borrow_mut().insert(key.clone(), cached.clone());
        Ok(cached)
    }

    fn invalidate(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.borrow_mut().remove(key).is_some())
    }

    fn clear(&self) -> Result<usize> {
        let mut entries = self.entries.borrow_mut();
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }
}
