//! Command-line surface.
//!
//! Verbs are upper-case (`CREATESITE`, `SETPORT`, …) and parameters use the
//! `/key:value` form, e.g.
//!
//! ```text
//! iisutil CREATESITE /siteName:Shop /httpPort:80 /physicalPath:C:\sites\shop
//! ```
//!
//! [`normalize_args`] rewrites that form into clap's `--key=value` before
//! parsing, so `--siteName Shop` works as well. Verbs and keys are matched
//! case-insensitively.
use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};

use crate::config::DEFAULT_SETTINGS_FILE;

/// Parameter keys accepted in `/key:value` form, in canonical spelling.
pub const PARAMETER_KEYS: [&str; 9] = [
    "siteName",
    "httpPort",
    "httpsPort",
    "sslHash",
    "physicalPath",
    "virtualPath",
    "poolName",
    "enableAllMimeTypes",
    "useSsl",
];

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "iisutil",
    about = "Provision IIS sites, application pools, applications and virtual directories",
    version
)]
pub struct Cli {
    /// Operation to perform.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every verb.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all verbs.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Settings file
    #[arg(short, long, global = true, default_value = DEFAULT_SETTINGS_FILE)]
    pub config: PathBuf,

    /// IIS major version to target instead of the installed one
    #[arg(long, global = true)]
    pub iis_version: Option<u32>,

    /// Check and log changes without writing them
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,
}

/// Available verbs.
#[derive(Subcommand, Debug, Clone)]
#[command(rename_all = "UPPER")]
pub enum Command {
    /// Create a site with HTTP and/or HTTPS bindings
    CreateSite(CreateSiteArgs),
    /// Remove a site and everything below it
    RemoveSite(SiteArgs),
    /// Create an application pool
    CreateAppPool(PoolArgs),
    /// Remove an application pool
    RemoveAppPool(PoolArgs),
    /// Create a virtual directory under a site
    CreateDir(CreateDirArgs),
    /// Remove a virtual directory
    RemoveDir(PathArgs),
    /// Create an application under a site
    CreateApp(CreateAppArgs),
    /// Remove an application
    RemoveApp(PathArgs),
    /// Report whether a site exists (503) or not (400)
    SiteExist(SiteArgs),
    /// Replace the certificate of a site's HTTPS binding
    SetCert(SetCertArgs),
    /// Change the ports a site is bound to
    SetPort(SetPortArgs),
    /// Print version information
    Version,
}

impl Command {
    /// Verb name as typed on the command line.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::CreateSite(_) => "CREATESITE",
            Self::RemoveSite(_) => "REMOVESITE",
            Self::CreateAppPool(_) => "CREATEAPPPOOL",
            Self::RemoveAppPool(_) => "REMOVEAPPPOOL",
            Self::CreateDir(_) => "CREATEDIR",
            Self::RemoveDir(_) => "REMOVEDIR",
            Self::CreateApp(_) => "CREATEAPP",
            Self::RemoveApp(_) => "REMOVEAPP",
            Self::SiteExist(_) => "SITEEXIST",
            Self::SetCert(_) => "SETCERT",
            Self::SetPort(_) => "SETPORT",
            Self::Version => "VERSION",
        }
    }

    /// `true` for verbs whose non-zero code answers a question rather than
    /// reporting a failure.
    #[must_use]
    pub const fn is_query(&self) -> bool {
        matches!(self, Self::SiteExist(_))
    }
}

/// `/siteName` only.
#[derive(Parser, Debug, Clone)]
pub struct SiteArgs {
    /// Site name
    #[arg(long = "siteName")]
    pub site_name: Option<String>,
}

/// `/poolName` only.
#[derive(Parser, Debug, Clone)]
pub struct PoolArgs {
    /// Application pool name
    #[arg(long = "poolName")]
    pub pool_name: Option<String>,
}

/// Options for `CREATESITE`.
#[derive(Parser, Debug, Clone)]
pub struct CreateSiteArgs {
    /// Site name
    #[arg(long = "siteName")]
    pub site_name: Option<String>,

    /// HTTP port
    #[arg(long = "httpPort", value_parser = clap::value_parser!(u16).range(1..))]
    pub http_port: Option<u16>,

    /// HTTPS port (requires sslHash)
    #[arg(long = "httpsPort", value_parser = clap::value_parser!(u16).range(1..))]
    pub https_port: Option<u16>,

    /// Certificate thumbprint in hex
    #[arg(long = "sslHash")]
    pub ssl_hash: Option<String>,

    /// Directory served by the site root
    #[arg(long = "physicalPath")]
    pub physical_path: Option<String>,
}

/// Options for `CREATEDIR`.
#[derive(Parser, Debug, Clone)]
pub struct CreateDirArgs {
    /// Site name
    #[arg(long = "siteName")]
    pub site_name: Option<String>,

    /// Single-segment path such as /files
    #[arg(long = "virtualPath")]
    pub virtual_path: Option<String>,

    /// Directory served
    #[arg(long = "physicalPath")]
    pub physical_path: Option<String>,

    /// Serve files of every extension
    #[arg(
        long = "enableAllMimeTypes",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub enable_all_mime_types: bool,
}

/// Options for `CREATEAPP`.
#[derive(Parser, Debug, Clone)]
pub struct CreateAppArgs {
    /// Site name
    #[arg(long = "siteName")]
    pub site_name: Option<String>,

    /// Single-segment path such as /api
    #[arg(long = "virtualPath")]
    pub virtual_path: Option<String>,

    /// Directory served
    #[arg(long = "physicalPath")]
    pub physical_path: Option<String>,

    /// Application pool; the server default when omitted
    #[arg(long = "poolName")]
    pub pool_name: Option<String>,

    /// Require TLS for the application
    #[arg(
        long = "useSsl",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub use_ssl: bool,
}

/// Options for `REMOVEDIR` and `REMOVEAPP`.
#[derive(Parser, Debug, Clone)]
pub struct PathArgs {
    /// Site name
    #[arg(long = "siteName")]
    pub site_name: Option<String>,

    /// Single-segment path
    #[arg(long = "virtualPath")]
    pub virtual_path: Option<String>,
}

/// Options for `SETCERT`.
#[derive(Parser, Debug, Clone)]
pub struct SetCertArgs {
    /// Site name
    #[arg(long = "siteName")]
    pub site_name: Option<String>,

    /// Certificate thumbprint in hex
    #[arg(long = "sslHash")]
    pub ssl_hash: Option<String>,
}

/// Options for `SETPORT`.
#[derive(Parser, Debug, Clone)]
pub struct SetPortArgs {
    /// Site name
    #[arg(long = "siteName")]
    pub site_name: Option<String>,

    /// New HTTP port
    #[arg(long = "httpPort", value_parser = clap::value_parser!(u16).range(1..))]
    pub http_port: Option<u16>,

    /// New HTTPS port
    #[arg(long = "httpsPort", value_parser = clap::value_parser!(u16).range(1..))]
    pub https_port: Option<u16>,
}

fn canonical_key(key: &str) -> Option<&'static str> {
    PARAMETER_KEYS
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(key))
}

/// Rewrite `/key:value` parameters as `--key=value` and canonicalise the
/// spelling of verbs and parameter keys.
///
/// The first element is the program name and is passed through. Arguments
/// that are neither a known key nor a verb are left for clap to judge.
///
/// # Examples
///
/// ```
/// use iisutil_cli::cli::normalize_args;
///
/// let args = normalize_args(["iisutil", "createsite", "/SITENAME:Shop", "/httpPort:80"]);
/// assert_eq!(args, ["iisutil", "CREATESITE", "--siteName=Shop", "--httpPort=80"]);
/// ```
pub fn normalize_args<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let command = Cli::command();
    let mut verb_seen = false;
    let mut out = Vec::new();

    for (index, arg) in args.into_iter().map(Into::into).enumerate() {
        let rewritten = if index == 0 {
            None
        } else if let Some(parameter) = rewrite_parameter(&arg) {
            Some(parameter)
        } else if verb_seen {
            None
        } else {
            let verb = command
                .get_subcommands()
                .find(|sub| sub.get_name().eq_ignore_ascii_case(&arg))
                .map(|sub| sub.get_name().to_string());
            verb_seen = verb.is_some();
            verb
        };
        out.push(rewritten.unwrap_or(arg));
    }
    out
}

/// `/key:value` or `--key[=value]` with `key` spelled canonically, or `None`
/// when `arg` is not a known parameter.
fn rewrite_parameter(arg: &str) -> Option<String> {
    if let Some((key, value)) = arg.strip_prefix('/').and_then(|rest| rest.split_once(':')) {
        return canonical_key(key).map(|canonical| format!("--{canonical}={value}"));
    }
    let rest = arg.strip_prefix("--")?;
    match rest.split_once('=') {
        Some((key, value)) => canonical_key(key).map(|canonical| format!("--{canonical}={value}")),
        None => canonical_key(rest).map(|canonical| format!("--{canonical}")),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(normalize_args(args.iter().copied())).expect("arguments should parse")
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn verbs_are_upper_case() {
        let names: Vec<String> = Cli::command()
            .get_subcommands()
            .map(|s| s.get_name().to_string())
            .collect();
        insta::assert_snapshot!(names.join(" "), @"CREATESITE REMOVESITE CREATEAPPPOOL REMOVEAPPPOOL CREATEDIR REMOVEDIR CREATEAPP REMOVEAPP SITEEXIST SETCERT SETPORT VERSION");
    }

    #[test]
    fn parse_create_site_slash_form() {
        let cli = parse(&[
            "iisutil",
            "CREATESITE",
            "/siteName:Shop",
            "/httpPort:80",
            "/physicalPath:C:\\sites\\shop",
        ]);
        let Command::CreateSite(args) = cli.command else {
            panic!("expected CREATESITE");
        };
        assert_eq!(args.site_name.as_deref(), Some("Shop"));
        assert_eq!(args.http_port, Some(80));
        assert_eq!(args.https_port, None);
        assert_eq!(args.physical_path.as_deref(), Some("C:\\sites\\shop"));
    }

    #[test]
    fn verb_and_keys_are_case_insensitive() {
        let cli = parse(&["iisutil", "removesite", "/SiteName:a"]);
        assert_eq!(cli.command.verb(), "REMOVESITE");
    }

    #[test]
    fn only_site_exist_is_a_query() {
        assert!(parse(&["iisutil", "SITEEXIST", "/siteName:a"]).command.is_query());
        assert!(!parse(&["iisutil", "REMOVESITE", "/siteName:a"]).command.is_query());
        assert!(!parse(&["iisutil", "VERSION"]).command.is_query());
    }

    #[test]
    fn native_long_flags_work() {
        let cli = parse(&["iisutil", "SITEEXIST", "--siteName", "Shop"]);
        let Command::SiteExist(args) = cli.command else {
            panic!("expected SITEEXIST");
        };
        assert_eq!(args.site_name.as_deref(), Some("Shop"));
    }

    #[test]
    fn boolean_flags_accept_words_and_bare_form() {
        let cli = parse(&[
            "iisutil",
            "CREATEAPP",
            "/siteName:s",
            "/virtualPath:/a",
            "/physicalPath:C:\\a",
            "/useSsl:True",
        ]);
        let Command::CreateApp(args) = cli.command else {
            panic!("expected CREATEAPP");
        };
        assert!(args.use_ssl);

        let cli = parse(&["iisutil", "CREATEDIR", "--enableAllMimeTypes"]);
        let Command::CreateDir(args) = cli.command else {
            panic!("expected CREATEDIR");
        };
        assert!(args.enable_all_mime_types);

        let cli = parse(&["iisutil", "CREATEDIR", "/enableAllMimeTypes:false"]);
        let Command::CreateDir(args) = cli.command else {
            panic!("expected CREATEDIR");
        };
        assert!(!args.enable_all_mime_types);
    }

    #[test]
    fn global_options_before_or_after_verb() {
        let cli = parse(&["iisutil", "-d", "--iis-version", "6", "SITEEXIST", "-c", "x.toml"]);
        assert!(cli.global.dry_run);
        assert_eq!(cli.global.iis_version, Some(6));
        assert_eq!(cli.global.config, PathBuf::from("x.toml"));
    }

    #[test]
    fn config_defaults_to_settings_file() {
        let cli = parse(&["iisutil", "VERSION"]);
        assert_eq!(cli.global.config, PathBuf::from(DEFAULT_SETTINGS_FILE));
        assert!(!cli.verbose);
    }

    #[test]
    fn version_verb_is_case_insensitive() {
        let cli = parse(&["iisutil", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn invalid_port_is_rejected() {
        for port in ["0", "65536", "http", ""] {
            let args = normalize_args(["iisutil", "SETPORT", &format!("/httpPort:{port}")]);
            assert!(Cli::try_parse_from(args).is_err(), "port {port:?}");
        }
    }

    #[test]
    fn unknown_verb_and_key_are_rejected() {
        assert!(Cli::try_parse_from(normalize_args(["iisutil", "DELETEALL"])).is_err());
        assert!(
            Cli::try_parse_from(normalize_args(["iisutil", "REMOVESITE", "/color:red"])).is_err()
        );
    }

    #[test]
    fn slash_value_is_not_mistaken_for_key() {
        let args = normalize_args(["iisutil", "REMOVEDIR", "--virtualPath", "/files"]);
        assert_eq!(args[3], "/files");
    }
}
