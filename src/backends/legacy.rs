//! IIS 6 backend over the metabase tree.
//!
//! Sites are `IIsWebServer` children of `W3SVC` whose node name is a numeric
//! identifier and whose `ServerComment` is the display name, so every lookup
//! by name scans the service node. Bindings are `":port:"` strings; the
//! certificate hash is stored as one two-character hex token per byte.
use std::collections::BTreeSet;
use std::fmt;

use anyhow::Context as _;

use super::{Backend, guarded};
use crate::binding::{metabase_binding, parse_optional_port};
use crate::certificate::Thumbprint;
use crate::config::Settings;
use crate::error::ErrorCode;
use crate::model::{SiteBindings, VirtualPath};
use crate::store::metabase::{
    APPLICATION_POOL, Metabase, MetabaseNode, PropertyValue, ROOT_NODE, WEB_DIRECTORY,
    WEB_SERVER, WEB_VIRTUAL_DIR,
};
use crate::store::{ConfigStore, names_match};

/// Largest identifier the metabase accepts for a site.
pub const MAX_SITE_ID: u32 = 65_535;

const SERVER_COMMENT: &str = "ServerComment";
const SERVER_BINDINGS: &str = "ServerBindings";
const SECURE_BINDINGS: &str = "SecureBindings";
const SSL_CERT_HASH: &str = "SSLCertHash";
const SSL_STORE_NAME: &str = "SSLStoreName";
const WEB_SVC_EXT_LIST: &str = "WebSvcExtRestrictionList";
const WILDCARD_MIME_MAP: &str = "*,application/octet-stream";

/// Process isolation mode of a pooled application.
const POOLED_ISOLATION: i64 = 2;

/// Lowest identifier in `1..=MAX_SITE_ID` not present in `used`.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use iisutil_cli::backends::legacy::allocate_site_id;
///
/// let used: BTreeSet<u32> = [1, 2, 4].into_iter().collect();
/// assert_eq!(allocate_site_id(&used), Some(3));
/// ```
#[must_use]
pub fn allocate_site_id(used: &BTreeSet<u32>) -> Option<u32> {
    (1..=MAX_SITE_ID).find(|id| !used.contains(id))
}

/// [`Backend`] for IIS 6.
pub struct MetabaseBackend {
    store: Box<dyn ConfigStore<Metabase>>,
    web_service_extension: String,
    isapi_script_map: String,
}

impl MetabaseBackend {
    /// Create a backend over `store`.
    ///
    /// `settings` supplies the framework version registered for new sites and
    /// applications.
    #[must_use]
    pub fn new(store: Box<dyn ConfigStore<Metabase>>, settings: &Settings) -> Self {
        let framework = &settings.framework_version;
        Self {
            store,
            web_service_extension: format!("ASP.NET {framework}"),
            isapi_script_map: format!(
                r"*,{}\Microsoft.NET\Framework\{framework}\aspnet_isapi.dll,0,GET,HEAD,POST",
                settings.windows_dir.trim_end_matches('\\'),
            ),
        }
    }

    fn load(&self) -> anyhow::Result<Metabase> {
        self.store
            .load()
            .with_context(|| format!("loading metabase from {}", self.store.description()))
    }

    fn commit(&self, doc: &Metabase) -> anyhow::Result<()> {
        self.store
            .commit(doc)
            .with_context(|| format!("committing metabase to {}", self.store.description()))
    }

    /// Allow the ASP.NET ISAPI extension on the web service; no-op when it is
    /// already allowed.
    fn enable_web_service_extension(&self, service: &mut MetabaseNode) {
        let enabled = format!("1,{}", self.web_service_extension);
        let disabled = format!("0,{}", self.web_service_extension);
        let mut entries = service.list(WEB_SVC_EXT_LIST).to_vec();
        if entries.iter().any(|e| names_match(e, &enabled)) {
            return;
        }
        entries.retain(|e| !names_match(e, &disabled));
        entries.push(enabled);
        service.set(WEB_SVC_EXT_LIST, entries);
    }
}

impl fmt::Debug for MetabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetabaseBackend")
            .field("store", &self.store.description())
            .field("web_service_extension", &self.web_service_extension)
            .finish_non_exhaustive()
    }
}

fn is_site_named(node: &MetabaseNode, name: &str) -> bool {
    node.is_class(WEB_SERVER)
        && node
            .text(SERVER_COMMENT)
            .is_some_and(|comment| !comment.is_empty() && names_match(comment, name))
}

fn find_site<'a>(service: &'a MetabaseNode, name: &str) -> Option<&'a MetabaseNode> {
    service.children.iter().find(|n| is_site_named(n, name))
}

fn find_site_mut<'a>(service: &'a mut MetabaseNode, name: &str) -> Option<&'a mut MetabaseNode> {
    service.children.iter_mut().find(|n| is_site_named(n, name))
}

/// The site's `ROOT` virtual directory.
fn site_root_mut(site: &mut MetabaseNode) -> Option<&mut MetabaseNode> {
    site.children
        .iter_mut()
        .find(|n| n.is_class(WEB_VIRTUAL_DIR) && names_match(&n.name, ROOT_NODE))
}

/// Whether `root` already has a directory entry at `path`.
fn has_entry(root: &MetabaseNode, path: &VirtualPath) -> bool {
    root.children_of_class(&[WEB_VIRTUAL_DIR, WEB_DIRECTORY])
        .any(|n| names_match(&n.name, path.segment()))
}

/// Turn `node` into an application root at metabase path `app_root`.
fn mark_application_root(node: &mut MetabaseNode, app_root: String) {
    node.set("AppRoot", app_root);
    node.set("AppIsolated", PropertyValue::Number(POOLED_ISOLATION));
}

fn ssl_cert_hash(thumbprint: &Thumbprint) -> PropertyValue {
    PropertyValue::List(thumbprint.tokens())
}

/// Identifiers and bound ports of the existing sites.
#[derive(Default)]
struct SiteUsage {
    ids: BTreeSet<u32>,
    http_ports: BTreeSet<u16>,
    https_ports: BTreeSet<u16>,
}

fn site_usage(service: &MetabaseNode) -> anyhow::Result<SiteUsage> {
    let mut usage = SiteUsage::default();
    for site in service.children_of_class(&[WEB_SERVER]) {
        let id = site
            .name
            .parse::<u32>()
            .with_context(|| format!("site node '{}' is not a numeric identifier", site.name))?;
        usage.ids.insert(id);
        if let Some(port) = parse_optional_port(site.text(SERVER_BINDINGS))? {
            usage.http_ports.insert(port);
        }
        if let Some(port) = parse_optional_port(site.text(SECURE_BINDINGS))? {
            usage.https_ports.insert(port);
        }
    }
    Ok(usage)
}

impl Backend for MetabaseBackend {
    fn name(&self) -> &'static str {
        "IIS6"
    }

    fn create_site(&self, name: &str, bindings: &SiteBindings, physical_path: &str) -> ErrorCode {
        guarded("CreateSite", || {
            let mut doc = self.load()?;
            if find_site(&doc.root, name).is_some() {
                return Ok(ErrorCode::SiteExists);
            }

            let usage = site_usage(&doc.root)?;
            if let Some(port) = bindings.http()
                && usage.http_ports.contains(&port)
            {
                return Ok(ErrorCode::HttpPortUsed);
            }
            if let Some(secure) = bindings.https()
                && usage.https_ports.contains(&secure.port)
            {
                return Ok(ErrorCode::HttpsPortUsed);
            }
            let id = allocate_site_id(&usage.ids).context("no free site identifier")?;

            let mut site = MetabaseNode::new(id.to_string(), WEB_SERVER)
                .with(SERVER_COMMENT, name)
                .with("ServerAutoStart", true)
                .with("AccessScript", true)
                .with("AccessRead", true)
                .with("LogType", "0");
            if let Some(port) = bindings.http() {
                site.set(SERVER_BINDINGS, metabase_binding(port));
            }
            if let Some(secure) = bindings.https() {
                site.set(SECURE_BINDINGS, metabase_binding(secure.port));
                site.set(SSL_STORE_NAME, "MY");
                site.set(SSL_CERT_HASH, ssl_cert_hash(&secure.thumbprint));
            }

            let mut root = MetabaseNode::new(ROOT_NODE, WEB_VIRTUAL_DIR).with("Path", physical_path);
            mark_application_root(&mut root, format!("/LM/W3SVC/{id}/{ROOT_NODE}"));
            site.add_child(root);

            self.enable_web_service_extension(&mut doc.root);
            doc.root.add_child(site);
            self.commit(&doc)?;
            tracing::debug!("created site '{name}' with identifier {id}");
            Ok(ErrorCode::Succeed)
        })
    }

    fn remove_site(&self, name: &str) -> ErrorCode {
        guarded("RemoveSite", || {
            let mut doc = self.load()?;
            if doc.root.remove_child_where(|n| is_site_named(n, name)).is_none() {
                return Ok(ErrorCode::SiteNotFound);
            }
            self.commit(&doc)?;
            Ok(ErrorCode::Succeed)
        })
    }

    fn create_app_pool(&self, name: &str) -> ErrorCode {
        guarded("CreateAppPool", || {
            let mut doc = self.load()?;
            let pools = doc.app_pools_mut().context("metabase has no AppPools node")?;
            if pools
                .children_of_class(&[APPLICATION_POOL])
                .any(|p| names_match(&p.name, name))
            {
                return Ok(ErrorCode::AppPoolExists);
            }
            pools.add_child(MetabaseNode::new(name, APPLICATION_POOL));
            self.commit(&doc)?;
            Ok(ErrorCode::Succeed)
        })
    }

    fn remove_app_pool(&self, name: &str) -> ErrorCode {
        guarded("RemoveAppPool", || {
            let mut doc = self.load()?;
            let pools = doc.app_pools_mut().context("metabase has no AppPools node")?;
            let removed = pools
                .remove_child_where(|p| p.is_class(APPLICATION_POOL) && names_match(&p.name, name));
            if removed.is_none() {
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
            let Some(site_node) = find_site_mut(&mut doc.root, site) else {
                return Ok(ErrorCode::SiteNotFound);
            };
            let Some(root) = site_root_mut(site_node) else {
                return Ok(ErrorCode::RootAppNotFound);
            };
            if has_entry(root, path) {
                return Ok(ErrorCode::AppExists);
            }

            let mut dir = MetabaseNode::new(path.segment(), WEB_VIRTUAL_DIR)
                .with("Path", physical_path)
                .with("AppFriendlyName", path.segment())
                .with("AccessRead", true)
                .with("DontLog", true);
            if enable_all_mime_types {
                dir.set("MimeMap", vec![WILDCARD_MIME_MAP.to_string()]);
            }
            root.add_child(dir);
            self.commit(&doc)?;
            Ok(ErrorCode::Succeed)
        })
    }

    fn remove_virtual_directory(&self, site: &str, path: &VirtualPath) -> ErrorCode {
        self.remove_application(site, path)
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
            let Some(site_node) = find_site_mut(&mut doc.root, site) else {
                return Ok(ErrorCode::SiteNotFound);
            };
            let app_root = format!("/LM/W3SVC/{}/{ROOT_NODE}/{}", site_node.name, path.segment());
            let Some(root) = site_root_mut(site_node) else {
                return Ok(ErrorCode::RootAppNotFound);
            };
            if has_entry(root, path) {
                return Ok(ErrorCode::AppExists);
            }

            let mut app = MetabaseNode::new(path.segment(), WEB_VIRTUAL_DIR)
                .with("Path", physical_path)
                .with("AppFriendlyName", path.segment())
                .with("AccessRead", true)
                .with("AccessScript", true)
                .with("DontLog", true);
            if !pool.is_empty() {
                app.set("AppPoolId", pool);
            }
            if ssl_required {
                app.set("AccessSSL", true);
            }
            app.push_to_list("ScriptMaps", self.isapi_script_map.as_str());
            mark_application_root(&mut app, app_root);
            root.add_child(app);

            self.enable_web_service_extension(&mut doc.root);
            self.commit(&doc)?;
            Ok(ErrorCode::Succeed)
        })
    }

    fn remove_application(&self, site: &str, path: &VirtualPath) -> ErrorCode {
        guarded("RemoveApp", || {
            let mut doc = self.load()?;
            let Some(site_node) = find_site_mut(&mut doc.root, site) else {
                return Ok(ErrorCode::SiteNotFound);
            };
            let Some(root) = site_root_mut(site_node) else {
                return Ok(ErrorCode::RootAppNotFound);
            };
            let removed = root.remove_child_where(|n| {
                (n.is_class(WEB_VIRTUAL_DIR) || n.is_class(WEB_DIRECTORY))
                    && names_match(&n.name, path.segment())
            });
            if removed.is_none() {
                return Ok(ErrorCode::AppNotFound);
            }
            self.commit(&doc)?;
            Ok(ErrorCode::Succeed)
        })
    }

    fn site_exists(&self, name: &str) -> ErrorCode {
        guarded("SiteExist", || {
            let doc = self.load()?;
            Ok(if find_site(&doc.root, name).is_some() {
                ErrorCode::SiteExists
            } else {
                ErrorCode::SiteNotFound
            })
        })
    }

    fn set_certificate(&self, site: &str, thumbprint: &Thumbprint) -> ErrorCode {
        guarded("SetCert", || {
            let mut doc = self.load()?;
            let Some(site_node) = find_site_mut(&mut doc.root, site) else {
                return Ok(ErrorCode::SiteNotFound);
            };
            site_node.set(SSL_CERT_HASH, ssl_cert_hash(thumbprint));
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
            let Some(site_node) = find_site_mut(&mut doc.root, site) else {
                return Ok(ErrorCode::SiteNotFound);
            };
            if let Some(port) = http_port {
                site_node.set(SERVER_BINDINGS, metabase_binding(port));
            }
            if let Some(port) = https_port {
                site_node.set(SECURE_BINDINGS, metabase_binding(port));
            }
            self.commit(&doc)?;
            Ok(ErrorCode::Succeed)
        })
    }
}
