//! Detection of the installed IIS version.
//!
//! IIS records its major version under the `INetStp` registry key. Hosts
//! without a registry (and tests) supply the version through settings or
//! `--iis-version` instead.

/// Registry location of the version value (display only).
pub const INETSTP_KEY: &str = r"HKLM:\SOFTWARE\Microsoft\INetStp";

#[cfg(windows)]
const INETSTP_SUBKEY: &str = r"SOFTWARE\Microsoft\INetStp";

/// Registry value holding the major version.
pub const MAJOR_VERSION_VALUE: &str = "MajorVersion";

/// Read the installed major version from the registry.
///
/// Returns `None` when IIS is not installed, the value cannot be read, or
/// the host is not Windows.
#[must_use]
pub fn installed_major_version() -> Option<u32> {
    #[cfg(windows)]
    {
        use winreg::RegKey;
        use winreg::enums::HKEY_LOCAL_MACHINE;
        let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
        match hklm.open_subkey(INETSTP_SUBKEY) {
            Ok(key) => key.get_value::<u32, _>(MAJOR_VERSION_VALUE).ok(),
            Err(e) => {
                tracing::debug!("cannot open {INETSTP_KEY}: {e}");
                None
            }
        }
    }
    #[cfg(not(windows))]
    {
        tracing::debug!("no registry on this platform; {INETSTP_KEY} not consulted");
        None
    }
}

/// The major version to select a backend with: the explicit `configured`
/// value when present, otherwise the registry.
#[must_use]
pub fn major_version(configured: Option<u32>) -> Option<u32> {
    configured.or_else(installed_major_version)
}
