// Shared helpers for integration tests.
//
// Builds either backend over an in-memory store so contract tests can run
// the same scenario against both, and writes settings files for end-to-end
// runs of the command layer.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use iisutil_cli::backends::Backend;
use iisutil_cli::backends::legacy::MetabaseBackend;
use iisutil_cli::backends::modern::ServerManagerBackend;
use iisutil_cli::config::Settings;
use iisutil_cli::model::{SecureBinding, SiteBindings, VirtualPath};
use iisutil_cli::store::MemoryStore;
use iisutil_cli::store::application_host::ApplicationHost;
use iisutil_cli::store::metabase::Metabase;

/// Which store the fixture snapshots.
enum Document {
    Metabase(Arc<MemoryStore<Metabase>>),
    ApplicationHost(Arc<MemoryStore<ApplicationHost>>),
}

/// A backend over an in-memory store plus a scratch directory for physical
/// paths.
pub struct Fixture {
    pub backend: Box<dyn Backend>,
    document: Document,
    dir: tempfile::TempDir,
}

impl Fixture {
    /// IIS 6 backend over a pristine metabase.
    pub fn metabase() -> Self {
        let store = Arc::new(MemoryStore::new(Metabase::default()));
        let backend = MetabaseBackend::new(Box::new(Arc::clone(&store)), &Settings::default());
        Self {
            backend: Box::new(backend),
            document: Document::Metabase(store),
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// IIS 7 backend over a pristine applicationHost document.
    pub fn application_host() -> Self {
        let store = Arc::new(MemoryStore::new(ApplicationHost::default()));
        let backend =
            ServerManagerBackend::new(Box::new(Arc::clone(&store)), &Settings::default());
        Self {
            backend: Box::new(backend),
            document: Document::ApplicationHost(store),
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// One fixture per backend.
    pub fn all() -> [Self; 2] {
        [Self::metabase(), Self::application_host()]
    }

    /// Serialized store document, for before/after comparisons.
    pub fn snapshot(&self) -> String {
        match &self.document {
            Document::Metabase(store) => {
                serde_json::to_string(&store.snapshot().expect("snapshot")).expect("serialize")
            }
            Document::ApplicationHost(store) => {
                serde_json::to_string(&store.snapshot().expect("snapshot")).expect("serialize")
            }
        }
    }

    /// Number of commits the store has received.
    pub fn commits(&self) -> usize {
        match &self.document {
            Document::Metabase(store) => store.commit_count(),
            Document::ApplicationHost(store) => store.commit_count(),
        }
    }

    /// A physical directory named `name` inside the scratch directory.
    pub fn physical(&self, name: &str) -> String {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(&path).expect("create physical dir");
        path.display().to_string()
    }
}

/// HTTP-only bindings.
pub fn http(port: u16) -> SiteBindings {
    SiteBindings::new(Some(port), None).expect("bindings")
}

/// HTTPS-only bindings with a fixed test certificate.
pub fn https(port: u16) -> SiteBindings {
    SiteBindings::new(
        None,
        Some(SecureBinding {
            port,
            thumbprint: "0A0B0C0D".parse().expect("thumbprint"),
        }),
    )
    .expect("bindings")
}

/// Parse a virtual path.
pub fn vpath(path: &str) -> VirtualPath {
    path.parse().expect("virtual path")
}

/// Write `iisutil.toml` with `body` into `dir` and return its path.
pub fn write_settings(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("iisutil.toml");
    std::fs::write(&path, body).expect("write settings");
    path
}
