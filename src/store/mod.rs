//! Configuration store documents and persistence.
//!
//! A store hands out a snapshot of its document with [`ConfigStore::load`]
//! and replaces it with [`ConfigStore::commit`]. Backends follow a strict
//! load → check → mutate → commit sequence per operation and take no locks:
//! the store is assumed to have a single writer for the duration of a call.
pub mod application_host;
pub mod metabase;

use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

/// Load/commit access to one configuration document.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigStore<T: 'static> {
    /// Human-readable description of the store (path or kind).
    fn description(&self) -> String;

    /// Read the current document.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read or parsed.
    fn load(&self) -> Result<T, StoreError>;

    /// Replace the stored document with `document`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized or written.
    fn commit(&self, document: &T) -> Result<(), StoreError>;
}

impl<T: 'static, S: ConfigStore<T> + ?Sized> ConfigStore<T> for Arc<S> {
    fn description(&self) -> String {
        (**self).description()
    }

    fn load(&self) -> Result<T, StoreError> {
        (**self).load()
    }

    fn commit(&self, document: &T) -> Result<(), StoreError> {
        (**self).commit(document)
    }
}

/// A store persisted as pretty-printed JSON at a fixed path.
///
/// A missing file loads as `T::default()`, the pristine document of a fresh
/// installation. Commits write a sibling temporary file and rename it over
/// the original.
pub struct JsonFileStore<T> {
    path: PathBuf,
    _document: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    /// Create a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _document: PhantomData,
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> fmt::Debug for JsonFileStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonFileStore")
            .field("path", &self.path)
            .finish()
    }
}

impl<T> ConfigStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Default + 'static,
{
    fn description(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<T, StoreError> {
        if !self.path.exists() {
            return Ok(T::default());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn commit(&self, document: &T) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(document).map_err(StoreError::Serialize)?;
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, content).map_err(io_err)?;
        std::fs::rename(&staging, &self.path).map_err(io_err)
    }
}

/// A store holding its document in memory.
#[derive(Debug, Default)]
pub struct MemoryStore<T> {
    document: Mutex<T>,
    commits: Mutex<usize>,
}

impl<T> MemoryStore<T> {
    /// Create a store seeded with `document`.
    #[must_use]
    pub const fn new(document: T) -> Self {
        Self {
            document: Mutex::new(document),
            commits: Mutex::new(0),
        }
    }

    /// Number of commits received so far.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.lock().map_or(0, |guard| *guard)
    }
}

impl<T: Clone + 'static> MemoryStore<T> {
    /// Copy of the current document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if a previous holder panicked.
    pub fn snapshot(&self) -> Result<T, StoreError> {
        self.document
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| StoreError::Poisoned)
    }
}

impl<T: Clone + 'static> ConfigStore<T> for MemoryStore<T> {
    fn description(&self) -> String {
        "in-memory store".to_string()
    }

    fn load(&self) -> Result<T, StoreError> {
        self.snapshot()
    }

    fn commit(&self, document: &T) -> Result<(), StoreError> {
        let mut guard = self.document.lock().map_err(|_| StoreError::Poisoned)?;
        guard.clone_from(document);
        if let Ok(mut commits) = self.commits.lock() {
            *commits += 1;
        }
        Ok(())
    }
}

/// A store that reads through to another store but keeps commits in memory.
///
/// Used for `--dry-run`: every operation runs its full check sequence
/// against the real document, and the would-be result is logged instead of
/// written.
pub struct DryRunStore<T: 'static> {
    inner: Box<dyn ConfigStore<T>>,
    staged: Mutex<Option<T>>,
}

impl<T: 'static> DryRunStore<T> {
    /// Wrap `inner`; nothing is ever committed to it.
    #[must_use]
    pub fn new(inner: Box<dyn ConfigStore<T>>) -> Self {
        Self {
            inner,
            staged: Mutex::new(None),
        }
    }
}

impl<T: 'static> fmt::Debug for DryRunStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DryRunStore")
            .field("inner", &self.inner.description())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> ConfigStore<T> for DryRunStore<T> {
    fn description(&self) -> String {
        format!("dry run over {}", self.inner.description())
    }

    fn load(&self) -> Result<T, StoreError> {
        let staged = self.staged.lock().map_err(|_| StoreError::Poisoned)?;
        match staged.as_ref() {
            Some(document) => Ok(document.clone()),
            None => self.inner.load(),
        }
    }

    fn commit(&self, document: &T) -> Result<(), StoreError> {
        tracing::info!(
            target: "iisutil::dry_run",
            "would commit changes to {}",
            self.inner.description()
        );
        let mut staged = self.staged.lock().map_err(|_| StoreError::Poisoned)?;
        *staged = Some(document.clone());
        Ok(())
    }
}

/// Case-insensitive name comparison used for every lookup in both stores.
#[must_use]
pub fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
