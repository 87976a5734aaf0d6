//! Binding string codec.
//!
//! Both configuration stores encode a binding endpoint as
//! `[address] ":" port ":" [host header]`. The metabase writes the address
//! empty (`":80:"`), applicationHost writes a wildcard (`"*:80:"`). Only the
//! port is meaningful here; it is the text between the first and the second
//! colon.
use thiserror::Error;

/// Errors produced while parsing a binding string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// The string does not contain two colons.
    #[error("binding '{0}' is not of the form [address]:port:[host]")]
    Malformed(String),

    /// The text between the colons is not a port number in 1..=65535.
    #[error("binding '{binding}' has an invalid port '{port}'")]
    InvalidPort {
        /// Full binding string.
        binding: String,
        /// Text found in the port position.
        port: String,
    },
}

/// Extract the port from a binding string.
///
/// # Errors
///
/// Returns [`BindingError::Malformed`] when the string lacks the two
/// delimiting colons and [`BindingError::InvalidPort`] when the port text is
/// not a number in `1..=65535`.
///
/// # Examples
///
/// ```
/// use iisutil_cli::binding::parse_port;
///
/// assert_eq!(parse_port(":8080:").unwrap(), 8080);
/// assert_eq!(parse_port("*:443:www.example.com").unwrap(), 443);
/// assert!(parse_port("8080").is_err());
/// ```
pub fn parse_port(binding: &str) -> Result<u16, BindingError> {
    let (_, rest) = binding
        .split_once(':')
        .ok_or_else(|| BindingError::Malformed(binding.to_string()))?;
    let (port, _) = rest
        .split_once(':')
        .ok_or_else(|| BindingError::Malformed(binding.to_string()))?;

    port.parse::<u16>()
        .ok()
        .filter(|&p| p > 0)
        .ok_or_else(|| BindingError::InvalidPort {
            binding: binding.to_string(),
            port: port.to_string(),
        })
}

/// Parse an optional binding value, treating an absent or blank value as
/// "no binding".
///
/// # Errors
///
/// Propagates [`parse_port`] failures for non-blank values.
pub fn parse_optional_port(binding: Option<&str>) -> Result<Option<u16>, BindingError> {
    match binding.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_port(value).map(Some),
    }
}

/// Format a metabase binding (`":port:"`).
#[must_use]
pub fn metabase_binding(port: u16) -> String {
    format!(":{port}:")
}

/// Format an applicationHost binding (`"*:port:"`).
#[must_use]
pub fn endpoint_binding(port: u16) -> String {
    format!("*:{port}:")
}
