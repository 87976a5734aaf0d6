//! Validated values handed from the command boundary to the backends.
use std::fmt;
use std::str::FromStr;

use crate::certificate::Thumbprint;
use crate::error::ParameterError;
use crate::store::names_match;

/// A single-segment virtual path such as `/app`.
///
/// # Examples
///
/// ```
/// use iisutil_cli::model::VirtualPath;
///
/// let path: VirtualPath = "/Reports".parse().unwrap();
/// assert_eq!(path.segment(), "Reports");
/// assert!(path.matches("/reports"));
/// assert!("/a/b".parse::<VirtualPath>().is_err());
/// assert!("app".parse::<VirtualPath>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPath(String);

impl VirtualPath {
    /// The path without its leading `/`.
    #[must_use]
    pub fn segment(&self) -> &str {
        self.0.strip_prefix('/').unwrap_or(&self.0)
    }

    /// The path including its leading `/`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when `other` names the same path (case-insensitive).
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        names_match(&self.0, other)
    }
}

impl FromStr for VirtualPath {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.strip_prefix('/') {
            Some(segment)
                if !segment.is_empty()
                    && !segment.contains(['/', '\\'])
                    && segment.trim() == segment =>
            {
                Ok(Self(trimmed.to_string()))
            }
            _ => Err(ParameterError::InvalidVirtualPath(s.to_string())),
        }
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An HTTPS port and the certificate served on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureBinding {
    /// TLS port.
    pub port: u16,
    /// Server certificate.
    pub thumbprint: Thumbprint,
}

/// The bindings of a new site: HTTP, HTTPS, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteBindings {
    http: Option<u16>,
    https: Option<SecureBinding>,
}

impl SiteBindings {
    /// Combine the optional bindings; `None` when both are absent.
    #[must_use]
    pub fn new(http: Option<u16>, https: Option<SecureBinding>) -> Option<Self> {
        if http.is_none() && https.is_none() {
            None
        } else {
            Some(Self { http, https })
        }
    }

    /// HTTP port, if any.
    #[must_use]
    pub const fn http(&self) -> Option<u16> {
        self.http
    }

    /// HTTPS binding, if any.
    #[must_use]
    pub const fn https(&self) -> Option<&SecureBinding> {
        self.https.as_ref()
    }
}
