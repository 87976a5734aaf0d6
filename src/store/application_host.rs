//! Typed applicationHost document used by IIS 7 and later.
use serde::{Deserialize, Serialize};

use super::names_match;
use crate::binding;

/// Protocol name of plain HTTP bindings.
pub const HTTP: &str = "http";
/// Protocol name of TLS bindings.
pub const HTTPS: &str = "https";
/// Certificate store holding server certificates.
pub const PERSONAL_STORE: &str = "MY";
/// Path of a site's root application and of an application's root directory.
pub const ROOT_PATH: &str = "/";

/// Request pipeline mode of an application pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// Integrated pipeline.
    #[default]
    Integrated,
    /// Classic ISAPI pipeline.
    Classic,
}

/// An application pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPool {
    /// Pool name.
    pub name: String,
    /// Managed runtime version (`v4.0`, `v2.0`, or empty for none).
    #[serde(default)]
    pub managed_runtime_version: String,
    /// Request pipeline mode.
    #[serde(default)]
    pub managed_pipeline_mode: PipelineMode,
    /// Maximum number of queued requests.
    #[serde(default = "default_queue_length")]
    pub queue_length: u32,
}

const fn default_queue_length() -> u32 {
    1000
}

impl ApplicationPool {
    /// A pool with the server's built-in defaults.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            managed_runtime_version: "v2.0".to_string(),
            managed_pipeline_mode: PipelineMode::Integrated,
            queue_length: default_queue_length(),
        }
    }
}

/// A site binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// `http` or `https`.
    pub protocol: String,
    /// `address:port:host` endpoint text.
    pub binding_information: String,
    /// Upper-case hex certificate thumbprint (HTTPS only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_hash: Option<String>,
    /// Certificate store name (HTTPS only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_store_name: Option<String>,
}

impl Binding {
    /// A wildcard HTTP binding on `port`.
    #[must_use]
    pub fn http(port: u16) -> Self {
        Self {
            protocol: HTTP.to_string(),
            binding_information: binding::endpoint_binding(port),
            certificate_hash: None,
            certificate_store_name: None,
        }
    }

    /// A wildcard HTTPS binding on `port` using the certificate `hash`.
    #[must_use]
    pub fn https(port: u16, hash: String) -> Self {
        Self {
            protocol: HTTPS.to_string(),
            binding_information: binding::endpoint_binding(port),
            certificate_hash: Some(hash),
            certificate_store_name: Some(PERSONAL_STORE.to_string()),
        }
    }

    /// `true` when the binding uses `protocol` (case-insensitive).
    #[must_use]
    pub fn is_protocol(&self, protocol: &str) -> bool {
        self.protocol.eq_ignore_ascii_case(protocol)
    }

    /// Port of the binding endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when the binding information is malformed.
    pub fn port(&self) -> Result<u16, binding::BindingError> {
        binding::parse_port(&self.binding_information)
    }
}

/// A virtual directory of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualDirectory {
    /// Path relative to the owning application (`/` for its root).
    pub path: String,
    /// Physical directory served.
    pub physical_path: String,
}

/// An application of a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Path relative to the site (`/` for the root application).
    pub path: String,
    /// Owning pool; `None` runs in the server default pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_pool: Option<String>,
    /// Virtual directories, the first being the application root.
    #[serde(default)]
    pub virtual_directories: Vec<VirtualDirectory>,
}

impl Application {
    /// An application at `path` whose root directory serves `physical_path`.
    #[must_use]
    pub fn new(path: impl Into<String>, physical_path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            application_pool: None,
            virtual_directories: vec![VirtualDirectory {
                path: ROOT_PATH.to_string(),
                physical_path: physical_path.into(),
            }],
        }
    }

    /// `true` for a site's root application.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.path == ROOT_PATH
    }
}

/// A site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    /// Site identifier.
    pub id: u32,
    /// Site name.
    pub name: String,
    /// Whether the site starts with the service.
    #[serde(default)]
    pub server_auto_start: bool,
    /// Whether request logging is enabled.
    #[serde(default = "default_true")]
    pub log_file_enabled: bool,
    /// Bindings in declaration order.
    #[serde(default)]
    pub bindings: Vec<Binding>,
    /// Applications, including the root application.
    #[serde(default)]
    pub applications: Vec<Application>,
}

const fn default_true() -> bool {
    true
}

impl Site {
    /// The root application, if present.
    #[must_use]
    pub fn root_application(&self) -> Option<&Application> {
        self.applications.iter().find(|app| app.is_root())
    }

    /// Mutable access to the root application, if present.
    pub fn root_application_mut(&mut self) -> Option<&mut Application> {
        self.applications.iter_mut().find(|app| app.is_root())
    }

    /// First binding using `protocol`.
    pub fn binding_mut(&mut self, protocol: &str) -> Option<&mut Binding> {
        self.bindings.iter_mut().find(|b| b.is_protocol(protocol))
    }
}

/// Per-path `system.webServer/security/access` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLocation {
    /// `<site name><application path>` the settings apply to.
    pub path: String,
    /// `sslFlags` bit set.
    pub ssl_flags: u32,
}

/// The applicationHost document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationHost {
    /// Configured sites.
    #[serde(default)]
    pub sites: Vec<Site>,
    /// Configured application pools.
    #[serde(default)]
    pub application_pools: Vec<ApplicationPool>,
    /// Location-scoped access settings.
    #[serde(default)]
    pub access_locations: Vec<AccessLocation>,
}

impl Default for ApplicationHost {
    fn default() -> Self {
        Self {
            sites: Vec::new(),
            application_pools: vec![ApplicationPool::new("DefaultAppPool")],
            access_locations: Vec::new(),
        }
    }
}

impl ApplicationHost {
    /// Site named `name` (case-insensitive).
    #[must_use]
    pub fn site(&self, name: &str) -> Option<&Site> {
        self.sites.iter().find(|s| names_match(&s.name, name))
    }

    /// Mutable access to the site named `name` (case-insensitive).
    pub fn site_mut(&mut self, name: &str) -> Option<&mut Site> {
        self.sites.iter_mut().find(|s| names_match(&s.name, name))
    }

    /// Next free site identifier.
    #[must_use]
    ///
    /// `None` once the highest identifier in use is `u32::MAX`.
    pub fn next_site_id(&self) -> Option<u32> {
        self.sites
            .iter()
            .map(|s| s.id)
            .max()
            .map_or(Some(1), |max| max.checked_add(1))
    }

    /// Build (without inserting) a site with the given first binding and a
    /// root application serving `physical_path`.
    ///
    /// `None` when no site identifier is left.
    #[must_use]
    pub fn new_site(&self, name: &str, physical_path: &str, binding: Binding) -> Option<Site> {
        Some(Site {
            id: self.next_site_id()?,
            name: name.to_string(),
            server_auto_start: false,
            log_file_enabled: true,
            bindings: vec![binding],
            applications: vec![Application::new(ROOT_PATH, physical_path)],
        })
    }

    /// Access settings for `path` (case-insensitive).
    #[must_use]
    pub fn access_location(&self, path: &str) -> Option<&AccessLocation> {
        self.access_locations
            .iter()
            .find(|l| names_match(&l.path, path))
    }

    /// Set `sslFlags` for `path`, creating the location if needed.
    pub fn set_ssl_flags(&mut self, path: &str, ssl_flags: u32) {
        match self
            .access_locations
            .iter_mut()
            .find(|l| names_match(&l.path, path))
        {
            Some(location) => location.ssl_flags = ssl_flags,
            None => self.access_locations.push(AccessLocation {
                path: path.to_string(),
                ssl_flags,
            }),
        }
    }

    /// Drop access settings for `path` and everything below it.
    pub fn remove_access_locations(&mut self, path: &str) {
        let prefix = format!("{}/", path.to_lowercase());
        self.access_locations.retain(|l| {
            let candidate = l.path.to_lowercase();
            candidate != path.to_lowercase() && !candidate.starts_with(&prefix)
        });
    }
}
