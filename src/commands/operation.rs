//! Validated backend operations.
//!
//! [`Operation::from_command`] is the parameter boundary: everything a
//! backend receives has passed through it, and every rejection is a
//! [`ParameterError`].
use crate::backends::Backend;
use crate::certificate::{CertificateResolver, Thumbprint};
use crate::cli::Command;
use crate::error::{ErrorCode, ParameterError};
use crate::model::{SecureBinding, SiteBindings, VirtualPath};

/// One backend call with its arguments already checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `CREATESITE`
    CreateSite {
        /// Site name.
        name: String,
        /// HTTP and/or HTTPS bindings.
        bindings: SiteBindings,
        /// Root directory.
        physical_path: String,
    },
    /// `REMOVESITE`
    RemoveSite {
        /// Site name.
        name: String,
    },
    /// `CREATEAPPPOOL`
    CreateAppPool {
        /// Pool name.
        name: String,
    },
    /// `REMOVEAPPPOOL`
    RemoveAppPool {
        /// Pool name.
        name: String,
    },
    /// `CREATEDIR`
    CreateDirectory {
        /// Owning site.
        site: String,
        /// Directory path below the site root.
        path: VirtualPath,
        /// Directory served.
        physical_path: String,
        /// Serve every file extension.
        enable_all_mime_types: bool,
    },
    /// `REMOVEDIR`
    RemoveDirectory {
        /// Owning site.
        site: String,
        /// Directory path below the site root.
        path: VirtualPath,
    },
    /// `CREATEAPP`
    CreateApplication {
        /// Owning site.
        site: String,
        /// Application path below the site root.
        path: VirtualPath,
        /// Directory served.
        physical_path: String,
        /// Pool name; empty for the server default.
        pool: String,
        /// Require TLS.
        ssl_required: bool,
    },
    /// `REMOVEAPP`
    RemoveApplication {
        /// Owning site.
        site: String,
        /// Application path below the site root.
        path: VirtualPath,
    },
    /// `SITEEXIST`
    SiteExists {
        /// Site name.
        name: String,
    },
    /// `SETCERT`
    SetCertificate {
        /// Site name.
        site: String,
        /// New server certificate.
        thumbprint: Thumbprint,
    },
    /// `SETPORT`
    SetPort {
        /// Site name.
        site: String,
        /// New HTTP port.
        http_port: Option<u16>,
        /// New HTTPS port.
        https_port: Option<u16>,
    },
}

impl Operation {
    /// Validate the parameters of `command`.
    ///
    /// Returns `Ok(None)` for verbs that do not touch a backend.
    ///
    /// # Errors
    ///
    /// Returns a [`ParameterError`] for a missing or empty required
    /// parameter, a malformed virtual path, a missing port, or a certificate
    /// hash `resolver` cannot resolve.
    pub fn from_command(
        command: &Command,
        resolver: &dyn CertificateResolver,
    ) -> Result<Option<Self>, ParameterError> {
        let operation = match command {
            Command::Version => return Ok(None),
            Command::CreateSite(args) => {
                let name = required(args.site_name.as_ref(), "siteName")?;
                let physical_path = required(args.physical_path.as_ref(), "physicalPath")?;
                let https = match args.https_port {
                    Some(port) => {
                        let hash = args
                            .ssl_hash
                            .as_deref()
                            .filter(|h| !h.trim().is_empty())
                            .ok_or(ParameterError::MissingCertificate)?;
                        Some(SecureBinding {
                            port,
                            thumbprint: resolve(resolver, hash)?,
                        })
                    }
                    None => None,
                };
                let bindings =
                    SiteBindings::new(args.http_port, https).ok_or(ParameterError::NoPort)?;
                Self::CreateSite {
                    name,
                    bindings,
                    physical_path,
                }
            }
            Command::RemoveSite(args) => Self::RemoveSite {
                name: required(args.site_name.as_ref(), "siteName")?,
            },
            Command::SiteExist(args) => Self::SiteExists {
                name: required(args.site_name.as_ref(), "siteName")?,
            },
            Command::CreateAppPool(args) => Self::CreateAppPool {
                name: required(args.pool_name.as_ref(), "poolName")?,
            },
            Command::RemoveAppPool(args) => Self::RemoveAppPool {
                name: required(args.pool_name.as_ref(), "poolName")?,
            },
            Command::CreateDir(args) => Self::CreateDirectory {
                site: required(args.site_name.as_ref(), "siteName")?,
                path: virtual_path(args.virtual_path.as_ref())?,
                physical_path: required(args.physical_path.as_ref(), "physicalPath")?,
                enable_all_mime_types: args.enable_all_mime_types,
            },
            Command::RemoveDir(args) => Self::RemoveDirectory {
                site: required(args.site_name.as_ref(), "siteName")?,
                path: virtual_path(args.virtual_path.as_ref())?,
            },
            Command::CreateApp(args) => Self::CreateApplication {
                site: required(args.site_name.as_ref(), "siteName")?,
                path: virtual_path(args.virtual_path.as_ref())?,
                physical_path: required(args.physical_path.as_ref(), "physicalPath")?,
                pool: args
                    .pool_name
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string(),
                ssl_required: args.use_ssl,
            },
            Command::RemoveApp(args) => Self::RemoveApplication {
                site: required(args.site_name.as_ref(), "siteName")?,
                path: virtual_path(args.virtual_path.as_ref())?,
            },
            Command::SetCert(args) => {
                let site = required(args.site_name.as_ref(), "siteName")?;
                let hash = required(args.ssl_hash.as_ref(), "sslHash")?;
                Self::SetCertificate {
                    site,
                    thumbprint: resolve(resolver, &hash)?,
                }
            }
            Command::SetPort(args) => {
                let site = required(args.site_name.as_ref(), "siteName")?;
                if args.http_port.is_none() && args.https_port.is_none() {
                    return Err(ParameterError::NoPort);
                }
                Self::SetPort {
                    site,
                    http_port: args.http_port,
                    https_port: args.https_port,
                }
            }
        };
        Ok(Some(operation))
    }

    /// Run the operation against `backend`.
    pub fn apply(&self, backend: &dyn Backend) -> ErrorCode {
        match self {
            Self::CreateSite {
                name,
                bindings,
                physical_path,
            } => backend.create_site(name, bindings, physical_path),
            Self::RemoveSite { name } => backend.remove_site(name),
            Self::CreateAppPool { name } => backend.create_app_pool(name),
            Self::RemoveAppPool { name } => backend.remove_app_pool(name),
            Self::CreateDirectory {
                site,
                path,
                physical_path,
                enable_all_mime_types,
            } => backend.create_virtual_directory(
                site,
                path,
                physical_path,
                *enable_all_mime_types,
            ),
            Self::RemoveDirectory { site, path } => backend.remove_virtual_directory(site, path),
            Self::CreateApplication {
                site,
                path,
                physical_path,
                pool,
                ssl_required,
            } => backend.create_application(site, path, physical_path, pool, *ssl_required),
            Self::RemoveApplication { site, path } => backend.remove_application(site, path),
            Self::SiteExists { name } => backend.site_exists(name),
            Self::SetCertificate { site, thumbprint } => backend.set_certificate(site, thumbprint),
            Self::SetPort {
                site,
                http_port,
                https_port,
            } => backend.set_port(site, *http_port, *https_port),
        }
    }
}

fn required(value: Option<&String>, key: &'static str) -> Result<String, ParameterError> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ParameterError::Missing(key))
}

fn virtual_path(value: Option<&String>) -> Result<VirtualPath, ParameterError> {
    required(value, "virtualPath")?.parse()
}

fn resolve(resolver: &dyn CertificateResolver, hash: &str) -> Result<Thumbprint, ParameterError> {
    resolver
        .resolve(hash)
        .map_err(|e| ParameterError::InvalidCertificate {
            hash: hash.to_string(),
            reason: e.to_string(),
        })
}
