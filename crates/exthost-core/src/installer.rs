//! Installer Input Validation
//!
//! Free-text install/uninstall/update requests are validated here before any
//! subprocess is spawned. The package manager is then invoked with an argv
//! vector, never through a shell.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Maximum accepted length of an install specification
pub const MAX_SPEC_LEN: usize = 500;

/// Characters that separate or substitute shell commands
pub const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '`', '$', '(', ')', '<', '>', '\n', '\r', '\0'];

/// Which validation rule rejected an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    Empty,
    TooLong,
    ShellMetacharacter,
    LeadingDash,
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationRule::Empty => write!(f, "empty"),
            ValidationRule::TooLong => write!(f, "too_long"),
            ValidationRule::ShellMetacharacter => write!(f, "shell_metacharacter"),
            ValidationRule::LeadingDash => write!(f, "leading_dash"),
        }
    }
}

/// Validate a free-form install specification (package name, version range, URL)
///
/// Returns the trimmed specification.
pub fn validate_spec(spec: &str) -> Result<&str> {
    let trimmed = spec.trim();

    if trimmed.is_empty() {
        return Err(Error::validation(
            ValidationRule::Empty,
            "specification cannot be empty",
        ));
    }

    check_common(trimmed)?;
    Ok(trimmed)
}

/// Validate an extension name used for uninstall/update or as a store namespace
pub fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(Error::validation(
            ValidationRule::Empty,
            "extension name cannot be empty",
        ));
    }

    if trimmed.contains("..") || trimmed.contains('/') || trimmed.contains('\\') {
        return Err(Error::path_traversal(name));
    }

    check_common(trimmed)?;
    Ok(trimmed)
}

fn check_common(input: &str) -> Result<()> {
    let len = input.chars().count();
    if len > MAX_SPEC_LEN {
        return Err(Error::validation(
            ValidationRule::TooLong,
            format!("{} characters exceeds the limit of {}", len, MAX_SPEC_LEN),
        ));
    }

    if let Some(c) = input.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(Error::validation(
            ValidationRule::ShellMetacharacter,
            format!("'{}' contains forbidden character {:?}", input, c),
        ));
    }

    // Would be parsed as an option by the package manager
    if input.starts_with('-') {
        return Err(Error::validation(
            ValidationRule::LeadingDash,
            format!("'{}' cannot start with '-'", input),
        ));
    }

    Ok(())
}

/// Captured output of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs external programs on behalf of the installer
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandOutput>;
}

/// Spawns real processes with tokio
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let resolved = which::which(program).map_err(|_| Error::not_found("program", program))?;

        tokio::fs::create_dir_all(cwd).await?;

        let mut cmd = Command::new(&resolved);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| Error::timeout(format!("{} {}", program, args.join(" ")), timeout.as_millis() as u64))??;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Installer configuration
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Package manager program (resolved on PATH)
    pub program: String,
    /// Directory the package manager runs in
    pub extensions_dir: PathBuf,
    /// Per-command timeout
    pub timeout: Duration,
}

/// Installs, removes, and updates extension packages
pub struct Installer<R: CommandRunner = TokioCommandRunner> {
    config: InstallerConfig,
    runner: R,
}

impl Installer<TokioCommandRunner> {
    /// Create an installer that spawns real processes
    pub fn new(config: InstallerConfig) -> Self {
        Self::with_runner(config, TokioCommandRunner)
    }
}

impl<R: CommandRunner> Installer<R> {
    /// Create an installer with a custom command runner
    pub fn with_runner(config: InstallerConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Install a package from a free-form specification
    pub async fn install(&self, spec: &str) -> Result<CommandOutput> {
        let spec = validate_spec(spec)?;
        info!("Installing extension package {}", spec);
        self.exec("install", spec).await
    }

    /// Uninstall an extension by name
    pub async fn uninstall(&self, name: &str) -> Result<CommandOutput> {
        let name = validate_name(name)?;
        info!("Uninstalling extension {}", name);
        self.exec("uninstall", name).await
    }

    /// Update an extension by name
    pub async fn update(&self, name: &str) -> Result<CommandOutput> {
        let name = validate_name(name)?;
        info!("Updating extension {}", name);
        self.exec("update", name).await
    }

    async fn exec(&self, verb: &str, target: &str) -> Result<CommandOutput> {
        let args = vec![verb.to_string(), target.to_string()];
        debug!("Running {} {:?} in {:?}", self.config.program, args, self.config.extensions_dir);

        let output = self
            .runner
            .run(
                &self.config.program,
                &args,
                &self.config.extensions_dir,
                self.config.timeout,
            )
            .await?;

        if !output.success() {
            return Err(Error::command_failed(
                format!("{} {}", self.config.program, args.join(" ")),
                output.stderr.trim(),
            ));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every invocation instead of spawning
    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<Vec<String>>>,
        exit_code: i32,
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(
            &self,
            program: &str,
            args: &[String],
            _cwd: &Path,
            _timeout: Duration,
        ) -> Result<CommandOutput> {
            let mut call = vec![program.to_string()];
            call.extend(args.iter().cloned());
            self.calls.lock().unwrap().push(call);
            Ok(CommandOutput {
                status: Some(self.exit_code),
                stdout: String::new(),
                stderr: "boom".into(),
            })
        }
    }

    fn test_installer(exit_code: i32) -> Installer<RecordingRunner> {
        Installer::with_runner(
            InstallerConfig {
                program: "npm".into(),
                extensions_dir: PathBuf::from("/tmp/exthost-test"),
                timeout: Duration::from_secs(5),
            },
            RecordingRunner {
                exit_code,
                ..Default::default()
            },
        )
    }

    fn rule_of(err: Error) -> ValidationRule {
        match err {
            Error::Validation { rule, .. } => rule,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_spec_valid() {
        assert_eq!(validate_spec("left-pad").unwrap(), "left-pad");
        assert_eq!(validate_spec("  @scope/pkg@^1.2.0 ").unwrap(), "@scope/pkg@^1.2.0");
        assert!(validate_spec("https://example.com/pkg.tgz").is_ok());
        assert!(validate_spec(&"a".repeat(MAX_SPEC_LEN)).is_ok());
    }

    #[test]
    fn test_validate_spec_invalid() {
        assert_eq!(rule_of(validate_spec("").unwrap_err()), ValidationRule::Empty);
        assert_eq!(rule_of(validate_spec("   \t").unwrap_err()), ValidationRule::Empty);
        assert_eq!(
            rule_of(validate_spec(&"a".repeat(MAX_SPEC_LEN + 1)).unwrap_err()),
            ValidationRule::TooLong
        );

        for bad in ["pkg;rm -rf /", "a&&b", "a|b", "a`id`", "$(id)", "a>out", "a\nb"] {
            assert_eq!(
                rule_of(validate_spec(bad).unwrap_err()),
                ValidationRule::ShellMetacharacter,
                "{bad:?}"
            );
        }

        assert_eq!(
            rule_of(validate_spec("--global").unwrap_err()),
            ValidationRule::LeadingDash
        );
    }

    #[test]
    fn test_validate_name_traversal() {
        for bad in ["..", "../etc", "foo/bar", "foo\\bar", "a..b"] {
            assert!(
                matches!(validate_name(bad).unwrap_err(), Error::PathTraversal { .. }),
                "{bad}"
            );
        }
        assert!(validate_name("weather-tools").is_ok());
        assert_eq!(rule_of(validate_name(" ").unwrap_err()), ValidationRule::Empty);
    }

    #[tokio::test]
    async fn test_rejections_never_spawn() {
        let installer = test_installer(0);

        assert!(installer.install("").await.is_err());
        assert!(installer.install(&"a".repeat(501)).await.is_err());
        assert!(installer.install("pkg;rm -rf /").await.is_err());
        assert!(matches!(
            installer.uninstall("../etc").await.unwrap_err(),
            Error::PathTraversal { .. }
        ));
        assert!(matches!(
            installer.uninstall("foo/bar").await.unwrap_err(),
            Error::PathTraversal { .. }
        ));
        assert!(matches!(
            installer.update("..").await.unwrap_err(),
            Error::PathTraversal { .. }
        ));

        assert!(installer.runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_valid_requests_use_argv() {
        let installer = test_installer(0);

        installer.install("left-pad@1.3.0").await.unwrap();
        installer.uninstall("weather").await.unwrap();
        installer.update("weather").await.unwrap();

        let calls = installer.runner.calls.lock().unwrap();
        assert_eq!(calls[0], vec!["npm", "install", "left-pad@1.3.0"]);
        assert_eq!(calls[1], vec!["npm", "uninstall", "weather"]);
        assert_eq!(calls[2], vec!["npm", "update", "weather"]);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_error() {
        let installer = test_installer(1);
        let err = installer.install("left-pad").await.unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
        assert!(err.to_string().contains("boom"));
    }
}
