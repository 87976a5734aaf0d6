//! Provisioning backends.
//!
//! [`Backend`] is the operation set every IIS generation supports. The two
//! implementations work against different configuration stores but report
//! through the same [`ErrorCode`]s with the same existence and conflict
//! rules:
//!
//! - [`legacy::MetabaseBackend`] for IIS 6 (metabase tree);
//! - [`modern::ServerManagerBackend`] for IIS 7 and 8 (applicationHost).
//!
//! Each call loads the store, checks, mutates and commits. Failures of the
//! store itself never escape a call; they are logged and reported as
//! [`ErrorCode::Unknown`].
pub mod legacy;
pub mod modern;

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::certificate::Thumbprint;
use crate::config::Settings;
use crate::error::ErrorCode;
use crate::model::{SiteBindings, VirtualPath};
use crate::store::{ConfigStore, DryRunStore, JsonFileStore};

/// Site, pool, directory and application provisioning.
///
/// Arguments have already been validated; every method reports its outcome
/// as an [`ErrorCode`] and never panics on store contents.
#[cfg_attr(test, mockall::automock)]
pub trait Backend {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Create a site with its root application.
    ///
    /// `SiteExists`, `HttpPortUsed` or `HttpsPortUsed` on conflict.
    fn create_site(&self, name: &str, bindings: &SiteBindings, physical_path: &str) -> ErrorCode;

    /// Remove a site and everything below it.
    fn remove_site(&self, name: &str) -> ErrorCode;

    /// Create an application pool.
    fn create_app_pool(&self, name: &str) -> ErrorCode;

    /// Remove an application pool.
    fn remove_app_pool(&self, name: &str) -> ErrorCode;

    /// Create a virtual directory below the site root.
    ///
    /// `enable_all_mime_types` serves files of any extension.
    fn create_virtual_directory(
        &self,
        site: &str,
        path: &VirtualPath,
        physical_path: &str,
        enable_all_mime_types: bool,
    ) -> ErrorCode;

    /// Remove a virtual directory.
    fn remove_virtual_directory(&self, site: &str, path: &VirtualPath) -> ErrorCode;

    /// Create an application below the site root.
    ///
    /// An empty `pool` leaves the server default pool in place.
    fn create_application(
        &self,
        site: &str,
        path: &VirtualPath,
        physical_path: &str,
        pool: &str,
        ssl_required: bool,
    ) -> ErrorCode;

    /// Remove an application.
    fn remove_application(&self, site: &str, path: &VirtualPath) -> ErrorCode;

    /// `SiteExists` when the site is present, otherwise `SiteNotFound`.
    fn site_exists(&self, name: &str) -> ErrorCode;

    /// Replace the server certificate of a site.
    fn set_certificate(&self, site: &str, thumbprint: &Thumbprint) -> ErrorCode;

    /// Rebind a site to new ports; `None` leaves a binding as it is.
    ///
    /// Ports are not checked against other sites.
    fn set_port(&self, site: &str, http_port: Option<u16>, https_port: Option<u16>)
    -> ErrorCode;
}

/// Which backend serves a given IIS generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// IIS 6 metabase.
    Metabase,
    /// IIS 7 and 8 applicationHost.
    ServerManager,
}

impl BackendKind {
    /// Map an IIS major version to its backend.
    ///
    /// # Examples
    ///
    /// ```
    /// use iisutil_cli::backends::BackendKind;
    ///
    /// assert_eq!(BackendKind::from_major_version(6), Some(BackendKind::Metabase));
    /// assert_eq!(BackendKind::from_major_version(8), Some(BackendKind::ServerManager));
    /// assert_eq!(BackendKind::from_major_version(10), None);
    /// ```
    #[must_use]
    pub const fn from_major_version(version: u32) -> Option<Self> {
        match version {
            6 => Some(Self::Metabase),
            7 | 8 => Some(Self::ServerManager),
            _ => None,
        }
    }

    /// Build the backend over the stores named in `settings`.
    ///
    /// With `dry_run` the file stores are wrapped so that nothing is written.
    #[must_use]
    pub fn build(self, settings: &Settings, dry_run: bool) -> Box<dyn Backend> {
        match self {
            Self::Metabase => Box::new(legacy::MetabaseBackend::new(
                file_store(&settings.metabase, dry_run),
                settings,
            )),
            Self::ServerManager => Box::new(
                modern::ServerManagerBackend::new(
                    file_store(&settings.application_host, dry_run),
                    settings,
                )
                .with_dry_run(dry_run),
            ),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metabase => f.write_str("metabase"),
            Self::ServerManager => f.write_str("applicationHost"),
        }
    }
}

/// Pick the backend for `major_version`, or `None` when the version is
/// unknown or could not be determined.
#[must_use]
pub fn select(
    major_version: Option<u32>,
    settings: &Settings,
    dry_run: bool,
) -> Option<Box<dyn Backend>> {
    let kind = major_version.and_then(BackendKind::from_major_version)?;
    tracing::debug!("IIS {major_version:?} uses the {kind} backend");
    Some(kind.build(settings, dry_run))
}

fn file_store<T>(path: &std::path::Path, dry_run: bool) -> Box<dyn ConfigStore<T>>
where
    T: Serialize + DeserializeOwned + Default + Clone + 'static,
{
    let store: Box<dyn ConfigStore<T>> = Box::new(JsonFileStore::new(path));
    if dry_run {
        Box::new(DryRunStore::new(store))
    } else {
        store
    }
}

/// Run one backend operation, collapsing any error into
/// [`ErrorCode::Unknown`].
pub(crate) fn guarded(
    operation: &str,
    body: impl FnOnce() -> anyhow::Result<ErrorCode>,
) -> ErrorCode {
    match body() {
        Ok(code) => {
            tracing::debug!("{operation}: {code}");
            code
        }
        Err(e) => {
            tracing::error!("{operation} failed: {e:#}");
            ErrorCode::Unknown
        }
    }
}
