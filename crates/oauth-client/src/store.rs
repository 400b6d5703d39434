//! Token storage
//!
//! `TokenRepository` is the save/load/clear capability the rest of the
//! crate depends on. `FileTokenStore` keeps the single current token set in
//! a JSON file, written atomically (temp file + rename) with 0600
//! permissions.
//!
//! Writes and clears within one process are serialized by a mutex held
//! across the whole temp-write-rename sequence. The store does not
//! coordinate writers across processes.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::expiry::unix_now;
use crate::tokens::TokenSet;

/// One persistent slot holding the current `TokenSet`.
///
/// Uses `Pin<Box<dyn Future>>` return types so it can live behind
/// `Arc<dyn TokenRepository>`.
pub trait TokenRepository: Send + Sync {
    /// Stamp `obtained_at` with the current time, overwrite the slot, and
    /// return the set as written.
    fn save(&self, tokens: TokenSet) -> Pin<Box<dyn Future<Output = Result<TokenSet>> + Send + '_>>;

    /// The persisted set, or `None` when the slot is empty or unreadable.
    fn load(&self) -> Pin<Box<dyn Future<Output = Option<TokenSet>> + Send + '_>>;

    /// Empty the slot. Clearing an empty slot succeeds.
    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Distinguishes temp files of concurrent writers that share a directory.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// File-backed token repository.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save_inner(&self, mut tokens: TokenSet) -> Result<TokenSet> {
        let _guard = self.write_lock.lock().await;
        tokens.obtained_at = Some(unix_now());
        write_atomic(&self.path, &tokens).await?;
        Ok(tokens)
    }

    async fn load_inner(&self) -> Option<TokenSet> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored token set");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "token file unreadable, treating as signed out");
                return None;
            }
        };

        match serde_json::from_str::<TokenSet>(&contents) {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "token file corrupt, treating as signed out");
                None
            }
        }
    }

    async fn clear_inner(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "token set cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(format!("removing token file: {e}"))),
        }
    }
}

impl TokenRepository for FileTokenStore {
    fn save(&self, tokens: TokenSet) -> Pin<Box<dyn Future<Output = Result<TokenSet>> + Send + '_>> {
        Box::pin(self.save_inner(tokens))
    }

    fn load(&self) -> Pin<Box<dyn Future<Output = Option<TokenSet>> + Send + '_>> {
        Box::pin(self.load_inner())
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.clear_inner())
    }
}

/// Write the token set to `path` atomically.
///
/// The temp file sits in the same directory so the rename never crosses a
/// filesystem. It is created with mode 0600, never chmod-ed afterwards.
async fn write_atomic(path: &Path, tokens: &TokenSet) -> Result<()> {
    let json = serde_json::to_string_pretty(tokens)
        .map_err(|e| Error::Serialize(format!("serializing token set: {e}")))?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io(format!("token path {} has no file name", path.display())))?
        .to_string_lossy();
    let tmp_path = dir.join(format!(
        ".{file_name}.tmp.{}.{}",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    if let Err(e) = write_private(&tmp_path, json.as_bytes()).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(Error::Io(format!("writing temp token file: {e}")));
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(Error::Io(format!("renaming temp token file: {e}")));
    }

    debug!(path = %path.display(), "persisted token set");
    Ok(())
}

async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}
