//! Result codes and domain-specific error types.
//!
//! Every backend operation reports its outcome as an [`ErrorCode`], the closed
//! set of numeric codes that also becomes the process exit code. Typed
//! [`thiserror`] enums describe the failures that happen *before* a code is
//! chosen (malformed parameters, unreadable stores, bad settings); the
//! command boundary logs them and collapses them into the matching code.
//!
//! # Error hierarchy
//!
//! ```text
//! ErrorCode             result of every operation (exit code)
//! ParameterError        boundary validation     → InvalidParameter
//! StoreError            configuration store I/O → Unknown
//! ConfigError           settings file           → Unknown
//! ```
//!
//! [`BindingError`](crate::binding::BindingError) and
//! [`CertificateError`](crate::certificate::CertificateError) live next to the
//! code that produces them.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Numeric result code shared by every backend.
///
/// # Examples
///
/// ```
/// use iisutil_cli::error::ErrorCode;
///
/// assert_eq!(ErrorCode::SiteNotFound.code(), 400);
/// assert_eq!(ErrorCode::from_code(503), Some(ErrorCode::SiteExists));
/// assert!(ErrorCode::Succeed.is_success());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// The operation completed.
    Succeed = 0,
    /// A required parameter was missing or malformed.
    InvalidParameter = 302,
    /// No site with the requested name exists.
    SiteNotFound = 400,
    /// No application pool with the requested name exists.
    AppPoolNotFound = 401,
    /// No application exists at the requested path.
    AppNotFound = 402,
    /// The site has no root application.
    RootAppNotFound = 403,
    /// No virtual directory exists at the requested path.
    VirtualDirNotFound = 404,
    /// The installed server version has no matching backend.
    UnknownIISVer = 500,
    /// The HTTP port is already bound by another site.
    HttpPortUsed = 501,
    /// The HTTPS port is already bound by another site.
    HttpsPortUsed = 502,
    /// A site with the requested name already exists.
    SiteExists = 503,
    /// An application pool with the requested name already exists.
    AppPoolExists = 504,
    /// An application (or directory) already exists at the requested path.
    AppExists = 505,
    /// A virtual directory already exists at the requested path.
    VirtualDirExists = 506,
    /// Any unexpected failure.
    Unknown = 999,
}

impl ErrorCode {
    /// Every code, in ascending numeric order.
    pub const ALL: [Self; 15] = [
        Self::Succeed,
        Self::InvalidParameter,
        Self::SiteNotFound,
        Self::AppPoolNotFound,
        Self::AppNotFound,
        Self::RootAppNotFound,
        Self::VirtualDirNotFound,
        Self::UnknownIISVer,
        Self::HttpPortUsed,
        Self::HttpsPortUsed,
        Self::SiteExists,
        Self::AppPoolExists,
        Self::AppExists,
        Self::VirtualDirExists,
        Self::Unknown,
    ];

    /// Numeric value of the code, used as the process exit code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Look up a code by its numeric value.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// `true` only for [`ErrorCode::Succeed`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Succeed)
    }

    /// Symbolic name of the code.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Succeed => "Succeed",
            Self::InvalidParameter => "InvalidParameter",
            Self::SiteNotFound => "SiteNotFound",
            Self::AppPoolNotFound => "AppPoolNotFound",
            Self::AppNotFound => "AppNotFound",
            Self::RootAppNotFound => "RootAppNotFound",
            Self::VirtualDirNotFound => "VirtualDirNotFound",
            Self::UnknownIISVer => "UnknownIISVer",
            Self::HttpPortUsed => "HttpPortUsed",
            Self::HttpsPortUsed => "HttpsPortUsed",
            Self::SiteExists => "SiteExists",
            Self::AppPoolExists => "AppPoolExists",
            Self::AppExists => "AppExists",
            Self::VirtualDirExists => "VirtualDirExists",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Errors raised while validating command parameters.
///
/// All variants map to [`ErrorCode::InvalidParameter`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParameterError {
    /// A required `/key:value` parameter was absent or empty.
    #[error("missing required parameter '{0}'")]
    Missing(&'static str),

    /// Neither an HTTP nor an HTTPS port was supplied.
    #[error("at least one of httpPort or httpsPort is required")]
    NoPort,

    /// An HTTPS port was supplied without a certificate hash.
    #[error("httpsPort requires sslHash")]
    MissingCertificate,

    /// The virtual path is not a single `/segment`.
    #[error("invalid virtual path '{0}': expected a single segment starting with '/'")]
    InvalidVirtualPath(String),

    /// The certificate hash could not be resolved.
    #[error("invalid certificate hash '{hash}': {reason}")]
    InvalidCertificate {
        /// Hash as supplied on the command line.
        hash: String,
        /// Why the hash was rejected.
        reason: String,
    },
}

/// Errors that arise while loading or committing a configuration store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store file could not be read or written.
    #[error("IO error on configuration store {path}: {source}")]
    Io {
        /// Path of the store file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The store file is not a valid document.
    #[error("malformed configuration store {path}: {source}")]
    Parse {
        /// Path of the store file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The document could not be serialized.
    #[error("failed to serialize configuration store: {0}")]
    Serialize(#[source] serde_json::Error),

    /// An in-memory store lock was poisoned by a panicking holder.
    #[error("configuration store state is poisoned")]
    Poisoned,
}

/// Errors that arise from loading the settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("IO error reading settings file {path}: {source}")]
    Io {
        /// Path of the settings file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The settings file is not valid TOML for the settings schema.
    #[error("invalid settings file {path}: {source}")]
    InvalidSyntax {
        /// Path of the settings file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}
