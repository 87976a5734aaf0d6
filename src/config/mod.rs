//! Settings file (`iisutil.toml`).
//!
//! Every field has a default, so a missing file or an empty one is valid.
//! Store and certificate paths given relative are resolved against the
//! directory containing the settings file.
//!
//! ```toml
//! iis_version = 7
//! application_host = "state/applicationHost.json"
//! certificate_store = "certs"
//!
//! [app_pool_defaults]
//! managed_runtime_version = "v4.0"
//! pipeline_mode = "integrated"
//! queue_length = 10000
//! ```
pub mod toml_loader;

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::store::application_host::PipelineMode;

/// Default settings file name, looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "iisutil.toml";

/// Configuration applied to application pools created on IIS 7+.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppPoolDefaults {
    /// Managed runtime version (`v4.0`).
    pub managed_runtime_version: String,
    /// Request pipeline mode.
    pub pipeline_mode: PipelineMode,
    /// Maximum request queue length.
    pub queue_length: u32,
}

impl Default for AppPoolDefaults {
    fn default() -> Self {
        Self {
            managed_runtime_version: "v4.0".to_string(),
            pipeline_mode: PipelineMode::Integrated,
            queue_length: 10_000,
        }
    }
}

/// Process-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Installed IIS major version; overrides registry detection.
    pub iis_version: Option<u32>,
    /// Metabase document used on IIS 6.
    pub metabase: PathBuf,
    /// applicationHost document used on IIS 7 and later.
    pub application_host: PathBuf,
    /// Directory of DER certificates checked by `sslHash`; unset accepts
    /// any well-formed hash.
    pub certificate_store: Option<PathBuf>,
    /// Windows directory used to locate the ASP.NET ISAPI module.
    pub windows_dir: String,
    /// .NET Framework version registered for new applications on IIS 6.
    pub framework_version: String,
    /// Defaults for new application pools.
    pub app_pool_defaults: AppPoolDefaults,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            iis_version: None,
            metabase: PathBuf::from("metabase.json"),
            application_host: PathBuf::from("applicationHost.json"),
            certificate_store: None,
            windows_dir: r"C:\WINDOWS".to_string(),
            framework_version: "v4.0.30319".to_string(),
            app_pool_defaults: AppPoolDefaults::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path` and resolve relative paths against its
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut settings: Self = toml_loader::load_config(path)?;
        let base = base_dir(path);
        settings.metabase = resolve(&base, &settings.metabase);
        settings.application_host = resolve(&base, &settings.application_host);
        settings.certificate_store = settings
            .certificate_store
            .as_deref()
            .map(|p| resolve(&base, p));
        Ok(settings)
    }
}

fn base_dir(settings_file: &Path) -> PathBuf {
    let parent = settings_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    dunce::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf())
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
