//! Ephemeral audio handles
//!
//! A handle is the desktop counterpart of a browser object URL: a local,
//! session-only location for a generated payload. Each handle is owned by
//! exactly one session result and must be released once, from the history
//! store's removal path.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::error::{Result, StudioError};
use crate::models::ResponseFormat;

/// Creates and revokes local locations for audio payloads
pub trait HandleMinter: Send + Sync {
    /// Store `audio` and return its location
    fn mint(&self, audio: &Bytes, format: ResponseFormat) -> Result<String>;

    /// Free the location; called exactly once per minted handle
    fn revoke(&self, uri: &str);
}

/// Owning wrapper around a minted location
pub struct AudioHandle {
    uri: String,
    minter: Arc<dyn HandleMinter>,
    released: AtomicBool,
}

impl AudioHandle {
    pub fn mint(
        minter: Arc<dyn HandleMinter>,
        audio: &Bytes,
        format: ResponseFormat,
    ) -> Result<Self> {
        let uri = minter.mint(audio, format)?;
        Ok(Self {
            uri,
            minter,
            released: AtomicBool::new(false),
        })
    }

    /// Location of the payload, `None` once released
    pub fn uri(&self) -> Option<&str> {
        if self.is_released() {
            None
        } else {
            Some(&self.uri)
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Revoke the location. Returns `false` if it was already released.
    pub(crate) fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            log::warn!("Audio handle {} released twice", self.uri);
            return false;
        }
        self.minter.revoke(&self.uri);
        true
    }
}

impl fmt::Debug for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioHandle")
            .field("uri", &self.uri)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Writes each payload to its own file inside a private temp directory
pub struct TempFileMinter {
    dir: TempDir,
    counter: AtomicUsize,
}

impl TempFileMinter {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("tts-studio-").tempdir()?;
        Ok(Self {
            dir,
            counter: AtomicUsize::new(0),
        })
    }

    pub fn dir(&self) -> &std::path::Path {
        self.dir.path()
    }
}

impl HandleMinter for TempFileMinter {
    fn mint(&self, audio: &Bytes, format: ResponseFormat) -> Result<String> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path: PathBuf = self
            .dir
            .path()
            .join(format!("result_{}_{}.{}", std::process::id(), n, format.extension()));
        std::fs::write(&path, audio)
            .map_err(|e| StudioError::Audio(format!("Failed to write {}: {}", path.display(), e)))?;
        Ok(path.to_string_lossy().to_string())
    }

    fn revoke(&self, uri: &str) {
        if let Err(e) = std::fs::remove_file(uri) {
            log::warn!("Failed to remove audio file {}: {}", uri, e);
        }
    }
}

/// Keeps payloads in memory; counts mints and revocations
#[derive(Default)]
pub struct MemoryMinter {
    entries: Mutex<HashMap<String, Bytes>>,
    minted: AtomicUsize,
    revoked: AtomicUsize,
}

impl MemoryMinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn minted(&self) -> usize {
        self.minted.load(Ordering::SeqCst)
    }

    pub fn revoked(&self) -> usize {
        self.revoked.load(Ordering::SeqCst)
    }

    /// Handles minted but not yet revoked
    pub fn live(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn get(&self, uri: &str) -> Option<Bytes> {
        self.entries.lock().get(uri).cloned()
    }
}

impl HandleMinter for MemoryMinter {
    fn mint(&self, audio: &Bytes, format: ResponseFormat) -> Result<String> {
        let n = self.minted.fetch_add(1, Ordering::SeqCst);
        let uri = format!("mem://audio/{}.{}", n, format.extension());
        self.entries.lock().insert(uri.clone(), audio.clone());
        Ok(uri)
    }

    fn revoke(&self, uri: &str) {
        if self.entries.lock().remove(uri).is_some() {
            self.revoked.fetch_add(1, Ordering::SeqCst);
        }
    }
}
