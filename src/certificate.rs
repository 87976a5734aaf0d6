//! Certificate hash resolution.
//!
//! A site's HTTPS binding refers to its server certificate by thumbprint, the
//! SHA-1 hash of the DER encoding. Callers pass the thumbprint as hex text;
//! this module turns it into a [`Thumbprint`], optionally checking that the
//! certificate is present in a certificate directory.
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use sha1::{Digest as _, Sha1};
use thiserror::Error;

/// File extensions recognised as DER certificates in a [`CertificateDirectory`].
const CERTIFICATE_EXTENSIONS: [&str; 3] = ["cer", "crt", "der"];

/// Errors produced while resolving a certificate hash.
#[derive(Error, Debug)]
pub enum CertificateError {
    /// The hash is empty.
    #[error("certificate hash is empty")]
    Empty,

    /// The hash is not an even-length hexadecimal string.
    #[error("certificate hash is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// No certificate in the store has the requested thumbprint.
    #[error("no certificate with thumbprint {0} in {1}")]
    NotFound(String, String),

    /// The certificate directory could not be read.
    #[error("cannot read certificate store {path}: {source}")]
    Io {
        /// Directory or file that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// A decoded certificate thumbprint.
///
/// # Examples
///
/// ```
/// use iisutil_cli::certificate::Thumbprint;
///
/// let t: Thumbprint = "0a1B".parse().unwrap();
/// assert_eq!(t.as_bytes(), &[0x0a, 0x1b]);
/// assert_eq!(t.to_string(), "0A1B");
/// assert_eq!(t.tokens(), vec!["0A".to_string(), "1B".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Thumbprint(Vec<u8>);

impl Thumbprint {
    /// Raw thumbprint bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Upper-case hex rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.0)
    }

    /// The thumbprint as two-character hex tokens, one per byte.
    ///
    /// The metabase only accepts `SSLCertHash` in this form.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl FromStr for Thumbprint {
    type Err = CertificateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CertificateError::Empty);
        }
        Ok(Self(hex::decode(trimmed)?))
    }
}

impl fmt::Display for Thumbprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Resolves a hex certificate hash to the thumbprint used by bindings.
pub trait CertificateResolver {
    /// Human-readable description of the certificate source.
    fn description(&self) -> String;

    /// Resolve `hash` to a thumbprint.
    ///
    /// # Errors
    ///
    /// Returns an error if the hash is malformed or the certificate is not
    /// available from this source.
    fn resolve(&self, hash: &str) -> Result<Thumbprint, CertificateError>;
}

/// Decodes the hash without consulting any certificate store.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexResolver;

impl CertificateResolver for HexResolver {
    fn description(&self) -> String {
        "hex decoding".to_string()
    }

    fn resolve(&self, hash: &str) -> Result<Thumbprint, CertificateError> {
        hash.parse()
    }
}

/// A directory of DER certificates standing in for the machine's personal
/// certificate store.
#[derive(Debug, Clone)]
pub struct CertificateDirectory {
    root: PathBuf,
}

impl CertificateDirectory {
    /// Create a resolver over the certificates in `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Compute the thumbprint of every certificate file in the directory.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::Io`] if the directory or a certificate
    /// file cannot be read.
    pub fn thumbprints(&self) -> Result<Vec<(PathBuf, Thumbprint)>, CertificateError> {
        let entries = std::fs::read_dir(&self.root).map_err(|source| CertificateError::Io {
            path: self.root.clone(),
            source,
        })?;

        let mut found = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| CertificateError::Io {
                    path: self.root.clone(),
                    source,
                })?
                .path();
            if !is_certificate_file(&path) {
                continue;
            }
            let der = std::fs::read(&path).map_err(|source| CertificateError::Io {
                path: path.clone(),
                source,
            })?;
            found.push((path, thumbprint_of(&der)));
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }
}

impl CertificateResolver for CertificateDirectory {
    fn description(&self) -> String {
        format!("certificate directory {}", self.root.display())
    }

    fn resolve(&self, hash: &str) -> Result<Thumbprint, CertificateError> {
        let wanted: Thumbprint = hash.parse()?;
        self.thumbprints()?
            .into_iter()
            .map(|(_, thumbprint)| thumbprint)
            .find(|thumbprint| *thumbprint == wanted)
            .ok_or_else(|| CertificateError::NotFound(wanted.to_hex(), self.description()))
    }
}

/// SHA-1 thumbprint of a DER-encoded certificate.
#[must_use]
pub fn thumbprint_of(der: &[u8]) -> Thumbprint {
    Thumbprint(Sha1::digest(der).to_vec())
}

fn is_certificate_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                CERTIFICATE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
}
