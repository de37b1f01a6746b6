//! Credential persistence.
//!
//! The client keeps its session in an opaque key-value store. Three
//! independent keys hold the access token, the refresh token and the user
//! record; they are written and cleared together by [`CredentialStore`].

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::types::{Credential, User};

/// Key holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "chat_access_token";
/// Key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "chat_refresh_token";
/// Key holding the JSON-serialized user record.
pub const USER_KEY: &str = "chat_user";

/// A persisted string-to-string map.
///
/// Reads never fail; implementations that touch disk load eagerly and only
/// report errors on write.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// A process-local store, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

/// A store persisted as a single JSON object on disk.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
                Error::serialization(
                    format!("failed to parse credential file {}", path.display()),
                    Some(Box::new(err)),
                )
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(Error::io(
                    format!("failed to read credential file {}", path.display()),
                    err,
                ));
            }
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Returns the file backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let fail = |what: &str, err: std::io::Error| {
            Error::storage(format!("failed to {what} {}: {err}", self.path.display()))
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| fail("create directory for", err))?;
        }
        let bytes = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        write_owner_only(&tmp, &bytes).map_err(|err| fail("write", err))?;
        fs::rename(&tmp, &self.path).map_err(|err| fail("replace", err))
    }
}

/// Writes `bytes` to `path`, readable and writable by the owner only.
fn write_owner_only(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    // `mode` only applies on creation; a leftover temp file keeps its old bits.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(bytes)?;
    file.sync_all()
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

/// Typed access to the session credential held in a [`KeyValueStore`].
///
/// Cheap to clone; clones share the backing store. Multi-key writes are
/// serialized so readers never observe tokens from two different sessions.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl CredentialStore {
    /// Wraps a key-value backend.
    pub fn new<S: KeyValueStore + 'static>(backend: S) -> Self {
        Self {
            backend: Arc::new(backend),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Creates a store backed by a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Returns the stored access token.
    pub fn access_token(&self) -> Option<String> {
        self.backend.get(ACCESS_TOKEN_KEY)
    }

    /// Returns the stored refresh token.
    pub fn refresh_token(&self) -> Option<String> {
        self.backend.get(REFRESH_TOKEN_KEY)
    }

    /// Returns the stored user record. A record that fails to parse reads as absent.
    pub fn user(&self) -> Option<User> {
        let raw = self.backend.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unparsable stored user record");
                None
            }
        }
    }

    /// Returns the full credential if tokens and user are all present.
    pub fn credential(&self) -> Option<Credential> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let access_token = self.access_token()?;
        let refresh_token = self.refresh_token()?;
        let user = self.user()?;
        Some(Credential {
            access_token,
            refresh_token,
            user_id: user.id,
            email: user.email,
        })
    }

    /// True iff an access token is present.
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Persists a complete credential: both tokens and the user record.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        let user = serde_json::to_string(&credential.user())?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.backend.set(ACCESS_TOKEN_KEY, &credential.access_token)?;
        self.backend
            .set(REFRESH_TOKEN_KEY, &credential.refresh_token)?;
        self.backend.set(USER_KEY, &user)
    }

    /// Replaces both tokens, leaving the user record untouched.
    pub fn save_tokens(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.backend.set(ACCESS_TOKEN_KEY, access_token)?;
        self.backend.set(REFRESH_TOKEN_KEY, refresh_token)
    }

    /// Removes tokens and user record.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.backend.remove(ACCESS_TOKEN_KEY)?;
        self.backend.remove(REFRESH_TOKEN_KEY)?;
        self.backend.remove(USER_KEY)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
