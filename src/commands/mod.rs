//! Verb orchestration: validate, select a backend, apply.
//!
//! Parameter validation always happens before the backend is selected, so an
//! invalid invocation reports [`ErrorCode::InvalidParameter`] on any host and
//! never touches a store.
pub mod operation;
pub mod version;

use crate::backends::{self, Backend};
use crate::certificate::{CertificateDirectory, CertificateResolver, HexResolver};
use crate::cli::{Cli, Command};
use crate::config::Settings;
use crate::error::ErrorCode;
use crate::logging::Log;
use crate::platform;

pub use operation::Operation;

/// Validate `command` and apply it to the backend returned by `select`.
///
/// `select` is only called once the parameters are valid; `None` from it
/// reports [`ErrorCode::UnknownIISVer`].
pub fn dispatch(
    command: &Command,
    resolver: &dyn CertificateResolver,
    select: impl FnOnce() -> Option<Box<dyn Backend>>,
    log: &dyn Log,
) -> ErrorCode {
    log.stage(command.verb());

    let operation = match Operation::from_command(command, resolver) {
        Ok(Some(operation)) => operation,
        Ok(None) => {
            version::run(log);
            return ErrorCode::Succeed;
        }
        Err(e) => {
            log.error(&e.to_string());
            return ErrorCode::InvalidParameter;
        }
    };
    log.debug(&format!("{operation:?}"));

    let Some(backend) = select() else {
        log.error("IIS version not detected or not supported (6, 7 and 8 are)");
        return ErrorCode::UnknownIISVer;
    };
    log.debug(&format!("using {} backend", backend.name()));

    operation.apply(backend.as_ref())
}

/// Run a parsed command line.
///
/// Loads the settings file, picks the certificate resolver and hands the
/// command to [`dispatch`] with a selector over the detected IIS version.
pub fn run(cli: &Cli, log: &dyn Log) -> ErrorCode {
    if matches!(cli.command, Command::Version) {
        version::run(log);
        return ErrorCode::Succeed;
    }

    let settings = match Settings::load(&cli.global.config) {
        Ok(settings) => settings,
        Err(e) => {
            log.error(&e.to_string());
            return ErrorCode::Unknown;
        }
    };
    log.debug(&format!("settings: {}", cli.global.config.display()));

    let dry_run = cli.global.dry_run;
    if dry_run {
        log.dry_run("configuration stores will not be written");
    }

    let resolver: Box<dyn CertificateResolver> = match &settings.certificate_store {
        Some(dir) => Box::new(CertificateDirectory::new(dir)),
        None => Box::new(HexResolver),
    };
    log.debug(&format!("certificates: {}", resolver.description()));

    let configured = cli.global.iis_version.or(settings.iis_version);
    dispatch(
        &cli.command,
        resolver.as_ref(),
        || backends::select(platform::major_version(configured), &settings, dry_run),
        log,
    )
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::backends::MockBackend;
    use crate::cli::normalize_args;
    use clap::Parser;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct RecordingLog {
        lines: RefCell<Vec<String>>,
    }

    impl RecordingLog {
        fn push(&self, level: &str, msg: &str) {
            self.lines.borrow_mut().push(format!("{level}: {msg}"));
        }

        fn contains(&self, needle: &str) -> bool {
            self.lines.borrow().iter().any(|l| l.contains(needle))
        }
    }

    impl Log for RecordingLog {
        fn stage(&self, msg: &str) {
            self.push("stage", msg);
        }
        fn info(&self, msg: &str) {
            self.push("info", msg);
        }
        fn debug(&self, msg: &str) {
            self.push("debug", msg);
        }
        fn warn(&self, msg: &str) {
            self.push("warn", msg);
        }
        fn error(&self, msg: &str) {
            self.push("error", msg);
        }
        fn dry_run(&self, msg: &str) {
            self.push("dry run", msg);
        }
    }

    fn command(args: &[&str]) -> Command {
        let mut argv = vec!["iisutil"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(normalize_args(argv))
            .expect("arguments should parse")
            .command
    }

    fn backend(mut mock: MockBackend) -> Option<Box<dyn Backend>> {
        mock.expect_name().return_const("mock");
        Some(Box::new(mock))
    }

    #[test]
    fn invalid_parameters_never_select_a_backend() {
        let log = RecordingLog::default();
        let selected = Cell::new(false);
        let code = dispatch(
            &command(&["CREATESITE", "/siteName:Shop", "/physicalPath:C:\\shop"]),
            &HexResolver,
            || {
                selected.set(true);
                None
            },
            &log,
        );
        assert_eq!(code, ErrorCode::InvalidParameter);
        assert!(!selected.get());
        assert!(log.contains("error: at least one of httpPort or httpsPort"));
    }

    #[test]
    fn invalid_parameters_win_over_unknown_version() {
        let log = RecordingLog::default();
        let code = dispatch(&command(&["REMOVESITE"]), &HexResolver, || None, &log);
        assert_eq!(code, ErrorCode::InvalidParameter);
    }

    #[test]
    fn missing_backend_is_unknown_version() {
        let log = RecordingLog::default();
        let code = dispatch(
            &command(&["SITEEXIST", "/siteName:Shop"]),
            &HexResolver,
            || None,
            &log,
        );
        assert_eq!(code, ErrorCode::UnknownIISVer);
        assert!(log.contains("stage: SITEEXIST"));
    }

    #[test]
    fn backend_code_is_returned_unchanged() {
        let mut mock = MockBackend::new();
        mock.expect_site_exists()
            .withf(|name| name.to_string() == "Shop")
            .times(1)
            .return_const(ErrorCode::SiteExists);
        let log = RecordingLog::default();
        let code = dispatch(
            &command(&["siteexist", "/SITENAME:Shop"]),
            &HexResolver,
            || backend(mock),
            &log,
        );
        assert_eq!(code, ErrorCode::SiteExists);
        assert!(log.contains("using mock backend"));
    }

    #[test]
    fn create_site_reaches_backend_with_bindings() {
        let mut mock = MockBackend::new();
        mock.expect_create_site()
            .withf(|name, bindings, physical| {
                name.to_string() == "Shop"
                    && bindings.http() == Some(8080)
                    && bindings.https().map(|b| b.port) == Some(8443)
                    && physical.to_string() == "C:\\shop"
            })
            .times(1)
            .return_const(ErrorCode::Succeed);
        let code = dispatch(
            &command(&[
                "CREATESITE",
                "/siteName:Shop",
                "/httpPort:8080",
                "/httpsPort:8443",
                "/sslHash:0A0B",
                "/physicalPath:C:\\shop",
            ]),
            &HexResolver,
            || backend(mock),
            &RecordingLog::default(),
        );
        assert_eq!(code, ErrorCode::Succeed);
    }

    #[test]
    fn set_port_passes_only_given_ports() {
        let mut mock = MockBackend::new();
        mock.expect_set_port()
            .withf(|site, http, https| {
                site.to_string() == "Shop" && *http == Some(81) && https.is_none()
            })
            .times(1)
            .return_const(ErrorCode::Succeed);
        let code = dispatch(
            &command(&["SETPORT", "/siteName:Shop", "/httpPort:81"]),
            &HexResolver,
            || backend(mock),
            &RecordingLog::default(),
        );
        assert_eq!(code, ErrorCode::Succeed);
    }

    #[test]
    fn run_reports_unknown_version_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("iisutil.toml");
        std::fs::write(&config, "iis_version = 5\n").unwrap();
        let cli = Cli::try_parse_from(normalize_args([
            "iisutil",
            "SITEEXIST",
            "/siteName:Shop",
            "-c",
            config.to_str().unwrap(),
        ]))
        .unwrap();
        assert_eq!(run(&cli, &RecordingLog::default()), ErrorCode::UnknownIISVer);
    }

    #[test]
    fn run_with_unreadable_settings_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("iisutil.toml");
        std::fs::write(&config, "iis_version = \"seven\"\n").unwrap();
        let cli = Cli::try_parse_from(normalize_args([
            "iisutil",
            "SITEEXIST",
            "/siteName:Shop",
            "-c",
            config.to_str().unwrap(),
        ]))
        .unwrap();
        let log = RecordingLog::default();
        assert_eq!(run(&cli, &log), ErrorCode::Unknown);
        assert!(log.contains("invalid settings file"));
    }

    #[test]
    fn run_version_logs_build_version() {
        let cli = Cli::try_parse_from(["iisutil", "VERSION"]).unwrap();
        let log = RecordingLog::default();
        assert_eq!(run(&cli, &log), ErrorCode::Succeed);
        assert!(log.contains(&format!("info: iisutil {}", version::version())));
    }

    #[test]
    fn run_dry_run_is_announced() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("iisutil.toml");
        let cli = Cli::try_parse_from(normalize_args([
            "iisutil",
            "-d",
            "--iis-version",
            "7",
            "SITEEXIST",
            "/siteName:Shop",
            "-c",
            config.to_str().unwrap(),
        ]))
        .unwrap();
        let log = RecordingLog::default();
        assert_eq!(run(&cli, &log), ErrorCode::SiteNotFound);
        assert!(log.contains("dry run: configuration stores will not be written"));
        assert!(!dir.path().join("applicationHost.json").exists());
    }
}
