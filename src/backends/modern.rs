//! IIS 7/8 backend over the applicationHost document.
use std::fmt;
use std::path::Path;

use anyhow::Context as _;

use super::{Backend, guarded};
use crate::binding::endpoint_binding;
use crate::certificate::Thumbprint;
use crate::config::{AppPoolDefaults, Settings};
use crate::error::ErrorCode;
use crate::logging::DRY_RUN_TARGET;
use crate::model::{SiteBindings, VirtualPath};
use crate::store::application_host::{
    Application, ApplicationHost, ApplicationPool, Binding, HTTP, HTTPS, Site, VirtualDirectory,
};
use crate::store::{ConfigStore, names_match};

/// `sslFlags` value requiring TLS.
pub const SSL_FLAG_REQUIRED: u32 = 8;

/// File name of the directory-level configuration file.
pub const WEB_CONFIG: &str = "web.config";

/// `web.config` serving every file extension as a download.
pub const ALL_MIME_TYPES_WEB_CONFIG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<configuration>
  <system.webServer>
    <staticContent>
      <mimeMap fileExtension=".*" mimeType="application/octet-stream" />
    </staticContent>
  </system.webServer>
</configuration>
"#;

/// [`Backend`] for IIS 7 and 8.
pub struct ServerManagerBackend {
    store: Box<dyn ConfigStore<ApplicationHost>>,
    pool_defaults: AppPoolDefaults,
    dry_run: bool,
}

impl ServerManagerBackend {
    /// Create a backend over `store`; new pools take their configuration from
    /// `settings`.
    #[must_use]
    pub fn new(store: Box<dyn ConfigStore<ApplicationHost>>, settings: &Settings) -> Self {
        Self {
            store,
            pool_defaults: settings.app_pool_defaults.clone(),
            dry_run: false,
        }
    }

    /// Log `web.config` writes instead of performing them.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn load(&self) -> anyhow::Result<ApplicationHost> {
        self.store
            .load()
            .with_context(|| format!("loading applicationHost from {}", self.store.description()))
    }

    fn commit(&self, doc: &ApplicationHost) -> anyhow::Result<()> {
        self.store
            .commit(doc)
            .with_context(|| format!("committing applicationHost to {}", self.store.description()))
    }

    fn write_all_mime_types_config(&self, physical_path: &str) -> anyhow::Result<()> {
        let target = Path::new(physical_path).join(WEB_CONFIG);
        if self.dry_run {
            tracing::info!(target: DRY_RUN_TARGET, "would write {}", target.display());
            return Ok(());
        }
        std::fs::write(&target, ALL_MIME_TYPES_WEB_CONFIG)
            .with_context(|| format!("writing {}", target.display()))
    }
}

impl fmt::Debug for ServerManagerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerManagerBackend")
            .field("store", &self.store.description())
            .field("pool_defaults", &self.pool_defaults)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Ports bound by existing sites for `protocol`.
fn bound_ports(doc: &ApplicationHost, protocol: &str) -> anyhow::Result<Vec<u16>> {
    doc.sites
        .iter()
        .flat_map(|site| site.bindings.iter())
        .filter(|b| b.is_protocol(protocol))
        .map(|b| b.port().map_err(anyhow::Error::from))
        .collect()
}

fn has_application(site: &Site, path: &VirtualPath) -> bool {
    site.applications
        .iter()
        .any(|app| !app.is_root() && path.matches(&app.path))
}

fn has_root_directory(root: &Application, path: &VirtualPath) -> bool {
    root.virtual_directories
        .iter()
        .any(|dir| path.matches(&dir.path))
}

/// Remove the application or root-level virtual directory at `path`.
///
/// Directories and applications are both reachable under a single segment,
/// so both removals search both collections.
fn remove_entry(doc: &mut ApplicationHost, site: &str, path: &VirtualPath, missing: ErrorCode) -> ErrorCode {
    let Some(target) = doc.site_mut(site) else {
        return ErrorCode::SiteNotFound;
    };
    let site_name = target.name.clone();

    if let Some(index) = target
        .applications
        .iter()
        .position(|app| !app.is_root() && path.matches(&app.path))
    {
        target.applications.remove(index);
    } else {
        let Some(root) = target.root_application_mut() else {
            return ErrorCode::RootAppNotFound;
        };
        let Some(index) = root
            .virtual_directories
            .iter()
            .position(|dir| path.matches(&dir.path))
        else {
            return missing;
        };
        root.virtual_directories.remove(index);
    }

    doc.remove_access_locations(&format!("{site_name}{path}"));
    ErrorCode::Succeed
}

impl Backend for ServerManagerBackend {
    fn name(&self) -> &'static str {
        "IIS7"
    }

    fn create_site(&self, name: &str, bindings: &SiteBindings, physical_path: &str) -> ErrorCode {
        guarded("CreateSite", || {
            let mut doc = self.load()?;
            if doc.site(name).is_some() {
                return Ok(ErrorCode::SiteExists);
            }
            if let Some(port) = bindings.http()
                && bound_ports(&doc, HTTP)?.contains(&port)
            {
                return Ok(ErrorCode::HttpPortUsed);
            }
            if let Some(secure) = bindings.https()
                && bound_ports(&doc, HTTPS)?.contains(&secure.port)
            {
                return Ok(ErrorCode::HttpsPortUsed);
            }

            let secure = bindings
                .https()
                .map(|s| Binding::https(s.port, s.thumbprint.to_hex()));
            let site = match (bindings.http(), secure) {
                (Some(port), secure) => doc
                    .new_site(name, physical_path, Binding::http(port))
                    .map(|mut site| {
                        site.bindings.extend(secure);
                        site
                    }),
                (None, Some(secure)) => doc.new_site(name, physical_path, secure),
                (None, None) => anyhow::bail!("site '{name}' has no bindings"),
            };
            let mut site = site.context("no free site identifier")?;
            site.server_auto_start = true;
            site.log_file_enabled = false;
            let id = site.id;
            doc.sites.push(site);

            self.commit(&doc)?;
            tracing::debug!("created site '{name}' with identifier {id}");
            Ok(ErrorCode::Succeed)
        })
    }

    fn remove_site(&self, name: &str) -> ErrorCode {
        guarded("RemoveSite", || {
            let mut doc = self.load()?;
            let Some(index) = doc.sites.iter().position(|s| names_match(&s.name, name)) else {
                return Ok(ErrorCode::SiteNotFound);
            };
            let removed = doc.sites.remove(index);
            doc.remove_access_locations(&removed.name);
            self.commit(&doc)?;
            Ok(ErrorCode::Succeed)
        })
    }

    fn create_app_pool(&self, name: &str) -> ErrorCode {
        guarded("CreateAppPool", || {
            let mut doc = self.load()?;
            if doc
                .application_pools
                .iter()
                .any(|p| names_match(&p.name, name))
            {
                return Ok(ErrorCode::AppPoolExists);
            }
            doc.application_pools.push(ApplicationPool {
                name: name.to_string(),
                managed_runtime_version: self.pool_defaults.managed_runtime_version.clone(),
                managed_pipeline_mode: self.pool_defaults.pipeline_mode,
                queue_length: self.pool_defaults.queue_length,
            });
            self.commit(&doc)?;
            Ok(ErrorCode::Succeed)
        })
    }

    fn remove_app_pool(&self, name: &str) -> ErrorCode {
        guarded("RemoveAppPool", || {
            let mut doc = self.load()?;
            let before = doc.application_pools.len();
            doc.application_pools.retain(|p| !names_match(&p.name, name));
            if doc.application_pools.len() == before {
                return Ok(ErrorCode::AppPoolNotFound);
            }
            self.commit(&doc)?;
            Ok(ErrorCode::Succeed)
        })
    }

    fn create_virtual_directory(
        &self,
        site: &str,
        path: &VirtualPath,
        physical_path: &str,
        enable_all_mime_types: bool,
    ) -> ErrorCode {
        guarded("CreateDir", || {
            let mut doc = self.load()?;
            let Some(target) = doc.site_mut(site) else {
                return Ok(ErrorCode::SiteNotFound);
            };
            let nested_app = has_application(target, path);
            let Some(root) = target.root_application_mut() else {
                return Ok(ErrorCode::RootAppNotFound);
            };
            if nested_app || has_root_directory(root, path) {
                return Ok(ErrorCode::VirtualDirExists);
            }
            root.virtual_directories.push(VirtualDirectory {
                path: path.to_string(),
                physical_path: physical_path.to_string(),
            });

            self.commit(&doc)?;
            if enable_all_mime_types {
                self.write_all_mime_types_config(physical_path)?;
            }
            Ok(ErrorCode::Succeed)
        })
    }

    fn remove_virtual_directory(&self, site: &str, path: &VirtualPath) -> ErrorCode {
        guarded("RemoveDir", || {
            let mut doc = self.load()?;
            let code = remove_entry(&mut doc, site, path, ErrorCode::VirtualDirNotFound);
            if code.is_success() {
                self.commit(&doc)?;
            }
            Ok(code)
        })
    }

    fn create_application(
        &self,
        site: &str,
        path: &VirtualPath,
        physical_path: &str,
        pool: &str,
        ssl_required: bool,
    ) -> ErrorCode {
        guarded("CreateApp", || {
            let mut doc = self.load()?;
            let Some(target) = doc.site_mut(site) else {
                return Ok(ErrorCode::SiteNotFound);
            };
            let root_conflict = target
                .root_application()
                .is_some_and(|root| has_root_directory(root, path));
            if root_conflict || has_application(target, path) {
                return Ok(ErrorCode::AppExists);
            }

            let mut app = Application::new(path.as_str(), physical_path);
            if !pool.is_empty() {
                app.application_pool = Some(pool.to_string());
            }
            target.applications.push(app);
            let location = format!("{}{path}", target.name);

            if ssl_required {
                doc.set_ssl_flags(&location, SSL_FLAG_REQUIRED);
            }
            self.commit(&doc)?;
            Ok(ErrorCode::Succeed)
        })
    }

    fn remove_application(&self, site: &str, path: &VirtualPath) -> ErrorCode {
        guarded("RemoveApp", || {
            let mut doc = self.load()?;
            let code = remove_entry(&mut doc, site, path, ErrorCode::AppNotFound);
            if code.is_success() {
                self.commit(&doc)?;
            }
            Ok(code)
        })
    }

    fn site_exists(&self, name: &str) -> ErrorCode {
        guarded("SiteExist", || {
            let doc = self.load()?;
            Ok(if doc.site(name).is_some() {
                ErrorCode::SiteExists
            } else {
                ErrorCode::SiteNotFound
            })
        })
    }

    fn set_certificate(&self, site: &str, thumbprint: &Thumbprint) -> ErrorCode {
        guarded("SetCert", || {
            let mut doc = self.load()?;
            let Some(target) = doc.site_mut(site) else {
                return Ok(ErrorCode::SiteNotFound);
            };
            // Sites without an HTTPS binding are left as they are.
            let Some(binding) = target.binding_mut(HTTPS) else {
                tracing::warn!("site '{site}' has no https binding; certificate not set");
                return Ok(ErrorCode::Succeed);
            };
            binding.certificate_hash = Some(thumbprint.to_hex());
            self.commit(&doc)?;
            Ok(ErrorCode::Succeed)
        })
    }

    fn set_port(
        &self,
        site: &str,
        http_port: Option<u16>,
        https_port: Option<u16>,
    ) -> ErrorCode {
        guarded("SetPort", || {
            let mut doc = self.load()?;
            let Some(target) = doc.site_mut(site) else {
                return Ok(ErrorCode::SiteNotFound);
            };
            for binding in &mut target.bindings {
                let port = if binding.is_protocol(HTTP) {
                    http_port
                } else if binding.is_protocol(HTTPS) {
                    https_port
                } else {
                    None
                };
                if let Some(port) = port {
                    binding.binding_information = endpoint_binding(port);
                }
            }
            self.commit(&doc)?;
            Ok(ErrorCode::Succeed)
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::model::SecureBinding;
    use crate::store::application_host::PipelineMode;
    use crate::store::{MemoryStore, MockConfigStore};
    use std::sync::Arc;

    fn backend() -> (ServerManagerBackend, Arc<MemoryStore<ApplicationHost>>) {
        let store = Arc::new(MemoryStore::new(ApplicationHost::default()));
        let backend =
            ServerManagerBackend::new(Box::new(Arc::clone(&store)), &Settings::default());
        (backend, store)
    }

    fn http(port: u16) -> SiteBindings {
        SiteBindings::new(Some(port), None).unwrap()
    }

    fn both(http: u16, https: u16, hash: &str) -> SiteBindings {
        SiteBindings::new(
            Some(http),
            Some(SecureBinding {
                port: https,
                thumbprint: hash.parse().unwrap(),
            }),
        )
        .unwrap()
    }

    fn path(p: &str) -> VirtualPath {
        p.parse().unwrap()
    }

    #[test]
    fn create_site_with_both_bindings() {
        let (backend, store) = backend();
        assert_eq!(
            backend.create_site("Shop", &both(80, 443, "abcd"), "C:\\shop"),
            ErrorCode::Succeed
        );
        let doc = store.snapshot().unwrap();
        let site = doc.site("shop").unwrap();
        assert!(site.server_auto_start);
        assert!(!site.log_file_enabled);
        assert_eq!(site.bindings.len(), 2);
        assert_eq!(site.bindings[0].protocol, HTTP);
        assert_eq!(site.bindings[0].binding_information, "*:80:");
        assert_eq!(site.bindings[1].protocol, HTTPS);
        assert_eq!(site.bindings[1].certificate_hash.as_deref(), Some("ABCD"));
        assert_eq!(
            site.root_application().unwrap().virtual_directories[0].physical_path,
            "C:\\shop"
        );
    }

    #[test]
    fn create_https_only_site() {
        let (backend, store) = backend();
        let bindings = SiteBindings::new(
            None,
            Some(SecureBinding {
                port: 8443,
                thumbprint: "01".parse().unwrap(),
            }),
        )
        .unwrap();
        assert_eq!(backend.create_site("s", &bindings, "C:\\s"), ErrorCode::Succeed);
        let doc = store.snapshot().unwrap();
        let site = doc.site("s").unwrap();
        assert_eq!(site.bindings.len(), 1);
        assert!(site.bindings[0].is_protocol(HTTPS));
    }

    #[test]
    fn https_port_conflict_is_reported() {
        let (backend, store) = backend();
        backend.create_site("a", &both(80, 443, "01"), "C:\\a");
        assert_eq!(
            backend.create_site("b", &both(81, 443, "02"), "C:\\b"),
            ErrorCode::HttpsPortUsed
        );
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn http_port_is_not_confused_with_https() {
        let (backend, _store) = backend();
        backend.create_site("a", &both(80, 443, "01"), "C:\\a");
        assert_eq!(backend.create_site("b", &http(443), "C:\\b"), ErrorCode::Succeed);
    }

    #[test]
    fn create_app_pool_applies_defaults() {
        let (backend, store) = backend();
        assert_eq!(backend.create_app_pool("Shop"), ErrorCode::Succeed);
        assert_eq!(backend.create_app_pool("shop"), ErrorCode::AppPoolExists);
        let doc = store.snapshot().unwrap();
        let pool = doc.application_pools.iter().find(|p| p.name == "Shop").unwrap();
        assert_eq!(pool.managed_runtime_version, "v4.0");
        assert_eq!(pool.managed_pipeline_mode, PipelineMode::Integrated);
        assert_eq!(pool.queue_length, 10_000);
        assert_eq!(backend.remove_app_pool("SHOP"), ErrorCode::Succeed);
        assert_eq!(backend.remove_app_pool("shop"), ErrorCode::AppPoolNotFound);
    }

    #[test]
    fn create_application_sets_pool_and_ssl_flags() {
        let (backend, store) = backend();
        backend.create_site("Shop", &http(80), "C:\\shop");
        assert_eq!(
            backend.create_application("shop", &path("/api"), "C:\\api", "ShopPool", true),
            ErrorCode::Succeed
        );
        let doc = store.snapshot().unwrap();
        let app = doc
            .site("Shop")
            .unwrap()
            .applications
            .iter()
            .find(|a| a.path == "/api")
            .unwrap();
        assert_eq!(app.application_pool.as_deref(), Some("ShopPool"));
        assert_eq!(
            doc.access_location("Shop/api").map(|l| l.ssl_flags),
            Some(SSL_FLAG_REQUIRED)
        );
    }

    #[test]
    fn create_application_conflicts() {
        let (backend, _store) = backend();
        backend.create_site("s", &http(80), "C:\\s");
        backend.create_virtual_directory("s", &path("/files"), "C:\\f", false);
        backend.create_application("s", &path("/app"), "C:\\a", "", false);
        assert_eq!(
            backend.create_application("s", &path("/APP"), "C:\\a", "", false),
            ErrorCode::AppExists
        );
        assert_eq!(
            backend.create_application("s", &path("/files"), "C:\\f", "", false),
            ErrorCode::AppExists
        );
        assert_eq!(
            backend.create_virtual_directory("s", &path("/app"), "C:\\a", false),
            ErrorCode::VirtualDirExists
        );
    }

    #[test]
    fn remove_application_prunes_access_location() {
        let (backend, store) = backend();
        backend.create_site("s", &http(80), "C:\\s");
        backend.create_application("s", &path("/secure"), "C:\\x", "", true);
        assert_eq!(
            backend.remove_application("s", &path("/secure")),
            ErrorCode::Succeed
        );
        let doc = store.snapshot().unwrap();
        assert!(doc.access_locations.is_empty());
        assert_eq!(
            backend.remove_application("s", &path("/secure")),
            ErrorCode::AppNotFound
        );
    }

    #[test]
    fn remove_site_prunes_its_access_locations_only() {
        let (backend, store) = backend();
        backend.create_site("s", &http(80), "C:\\s");
        backend.create_site("s2", &http(81), "C:\\s2");
        backend.create_application("s", &path("/a"), "C:\\a", "", true);
        backend.create_application("s2", &path("/a"), "C:\\a", "", true);
        assert_eq!(backend.remove_site("s"), ErrorCode::Succeed);
        let doc = store.snapshot().unwrap();
        let paths: Vec<&str> = doc.access_locations.iter().map(|l| l.path.as_str()).collect();
        assert_eq!(paths, vec!["s2/a"]);
    }

    #[test]
    fn site_without_root_application() {
        let mut doc = ApplicationHost::default();
        let mut site = doc.new_site("bare", "C:\\b", Binding::http(80)).unwrap();
        site.applications.clear();
        doc.sites.push(site);
        let store = Arc::new(MemoryStore::new(doc));
        let backend =
            ServerManagerBackend::new(Box::new(Arc::clone(&store)), &Settings::default());
        assert_eq!(
            backend.create_virtual_directory("bare", &path("/x"), "C:\\x", false),
            ErrorCode::RootAppNotFound
        );
        assert_eq!(
            backend.remove_virtual_directory("bare", &path("/x")),
            ErrorCode::RootAppNotFound
        );
    }

    #[test]
    fn exhausted_site_ids_are_unknown() {
        let mut doc = ApplicationHost::default();
        let mut last = doc.new_site("last", "C:\\l", Binding::http(80)).unwrap();
        last.id = u32::MAX;
        doc.sites.push(last);
        let store = Arc::new(MemoryStore::new(doc));
        let backend =
            ServerManagerBackend::new(Box::new(Arc::clone(&store)), &Settings::default());
        assert_eq!(
            backend.create_site("next", &http(81), "C:\\n"),
            ErrorCode::Unknown
        );
        assert_eq!(store.commit_count(), 0);
        assert_eq!(backend.site_exists("next"), ErrorCode::SiteNotFound);
    }

    #[test]
    fn failed_commit_writes_no_web_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MockConfigStore::<ApplicationHost>::new();
        store.expect_load().returning(|| {
            let mut doc = ApplicationHost::default();
            let site = doc.new_site("s", "C:\\s", Binding::http(80)).unwrap();
            doc.sites.push(site);
            Ok(doc)
        });
        store
            .expect_description()
            .returning(|| "mock".to_string());
        store
            .expect_commit()
            .times(1)
            .returning(|_| Err(StoreError::Poisoned));
        let backend = ServerManagerBackend::new(Box::new(store), &Settings::default());
        let physical = dir.path().to_str().unwrap();
        assert_eq!(
            backend.create_virtual_directory("s", &path("/dl"), physical, true),
            ErrorCode::Unknown
        );
        assert!(!dir.path().join(WEB_CONFIG).exists());
    }

    #[test]
    fn all_mime_types_writes_web_config() {
        let dir = tempfile::tempdir().unwrap();
        let (backend, _store) = backend();
        backend.create_site("s", &http(80), "C:\\s");
        let physical = dir.path().to_str().unwrap();
        assert_eq!(
            backend.create_virtual_directory("s", &path("/dl"), physical, true),
            ErrorCode::Succeed
        );
        let written = std::fs::read_to_string(dir.path().join(WEB_CONFIG)).unwrap();
        assert!(written.contains(r#"fileExtension=".*""#));
    }

    #[test]
    fn web_config_write_failure_is_unknown_and_not_committed() {
        let dir = tempfile::tempdir().unwrap();
        let (backend, store) = backend();
        backend.create_site("s", &http(80), "C:\\s");
        let missing = dir.path().join("missing");
        assert_eq!(
            backend.create_virtual_directory("s", &path("/dl"), missing.to_str().unwrap(), true),
            ErrorCode::Unknown
        );
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn dry_run_skips_web_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new(ApplicationHost::default()));
        let backend = ServerManagerBackend::new(Box::new(Arc::clone(&store)), &Settings::default())
            .with_dry_run(true);
        backend.create_site("s", &http(80), "C:\\s");
        backend.create_virtual_directory("s", &path("/dl"), dir.path().to_str().unwrap(), true);
        assert!(!dir.path().join(WEB_CONFIG).exists());
    }

    #[test]
    fn set_certificate_updates_first_https_binding() {
        let (backend, store) = backend();
        backend.create_site("s", &both(80, 443, "01"), "C:\\s");
        let thumbprint: Thumbprint = "ffee".parse().unwrap();
        assert_eq!(backend.set_certificate("S", &thumbprint), ErrorCode::Succeed);
        let doc = store.snapshot().unwrap();
        assert_eq!(
            doc.site("s").unwrap().bindings[1].certificate_hash.as_deref(),
            Some("FFEE")
        );
    }

    #[test]
    fn set_certificate_without_https_binding_changes_nothing() {
        let (backend, store) = backend();
        backend.create_site("s", &http(80), "C:\\s");
        let thumbprint: Thumbprint = "ffee".parse().unwrap();
        assert_eq!(backend.set_certificate("s", &thumbprint), ErrorCode::Succeed);
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn set_port_rewrites_matching_protocols() {
        let (backend, store) = backend();
        backend.create_site("s", &both(80, 443, "01"), "C:\\s");
        assert_eq!(backend.set_port("s", Some(8080), None), ErrorCode::Succeed);
        let doc = store.snapshot().unwrap();
        let site = doc.site("s").unwrap();
        assert_eq!(site.bindings[0].binding_information, "*:8080:");
        assert_eq!(site.bindings[1].binding_information, "*:443:");
    }
}
