//! Generic check that runs an external command.

use async_trait::async_trait;
use gatehouse_core::{CheckId, ExecutionResult, GateSettings};
use regex::Regex;
use std::path::Path;
use std::process::Output;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

use crate::applicability::any_file_exists;
use crate::check::Check;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors building a [`CommandCheck`].
#[derive(Debug, thiserror::Error)]
pub enum CommandCheckError {
    /// No program was given
    #[error("command check {0} has no program")]
    MissingProgram(CheckId),

    /// Output pattern does not compile
    #[error("invalid output pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// A quality gate backed by an external tool.
///
/// The gate passes when the tool exits with the expected code and its
/// output does not match the fail pattern. A warn pattern match downgrades
/// a pass to Warned. Spawn failures and timeouts are evaluation errors.
///
/// Gate settings may override `timeout_secs` and `args`.
#[derive(Debug, Clone)]
pub struct CommandCheck {
    id: CheckId,
    display_name: String,
    program: String,
    args: Vec<String>,
    depends_on: Vec<CheckId>,
    applies_when: Vec<String>,
    fix_command: Option<(String, Vec<String>)>,
    timeout: Duration,
    expected_exit_code: i32,
    fail_pattern: Option<Regex>,
    warn_pattern: Option<Regex>,
    fix_suggestion: Option<String>,
}

impl CommandCheck {
    /// Start building a command check.
    pub fn builder(category: impl Into<String>, name: impl Into<String>) -> CommandCheckBuilder {
        CommandCheckBuilder::new(CheckId::new(category, name))
    }

    /// Copy of this check with gate settings applied.
    pub fn with_settings(&self, settings: &GateSettings) -> Self {
        let mut check = self.clone();
        if let Some(secs) = settings.get_u64("timeout_secs") {
            check.timeout = Duration::from_secs(secs);
        }
        if let Some(args) = settings.get_str_list("args") {
            check.args = args;
        }
        check
    }

    /// Factory suitable for [`CheckRegistry::register`](crate::CheckRegistry::register).
    pub fn into_factory(self) -> impl Fn(&GateSettings) -> Box<dyn Check> + Send + Sync + 'static {
        move |settings: &GateSettings| -> Box<dyn Check> { Box::new(self.with_settings(settings)) }
    }

    /// Effective timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Effective arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    async fn run(&self, program: &str, args: &[String], project_root: &Path) -> anyhow::Result<Output> {
        debug!("Running {} {:?} in {}", program, args, project_root.display());

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(project_root).kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(output) => Ok(output.map_err(|e| anyhow::anyhow!("failed to run {program}: {e}"))?),
            Err(_) => anyhow::bail!("{} timed out after {}s", program, self.timeout.as_secs_f64()),
        }
    }
}

#[async_trait]
impl Check for CommandCheck {
    fn id(&self) -> CheckId {
        self.id.clone()
    }

    fn display_name(&self) -> String {
        self.display_name.clone()
    }

    fn depends_on(&self) -> Vec<CheckId> {
        self.depends_on.clone()
    }

    fn is_applicable(&self, project_root: &Path) -> bool {
        if self.applies_when.is_empty() {
            return true;
        }
        let markers: Vec<&str> = self.applies_when.iter().map(String::as_str).collect();
        any_file_exists(project_root, &markers).is_some()
    }

    fn skip_reason(&self, _project_root: &Path) -> String {
        format!("none of {} found", self.applies_when.join(", "))
    }

    async fn execute(&self, project_root: &Path) -> anyhow::Result<ExecutionResult> {
        let start = Instant::now();
        let output = self.run(&self.program, &self.args, project_root).await?;
        let duration = start.elapsed();

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        let exit_code = output.status.code().unwrap_or(-1);
        let failure = if exit_code != self.expected_exit_code {
            Some(format!(
                "{} exited with code {} (expected {})",
                self.program, exit_code, self.expected_exit_code
            ))
        } else {
            self.fail_pattern
                .as_ref()
                .filter(|p| p.is_match(&text))
                .map(|p| format!("output matched fail pattern '{}'", p.as_str()))
        };

        let result = match failure {
            Some(error) => {
                let mut result = ExecutionResult::failed(self.id.clone(), duration, error);
                if let Some(suggestion) = &self.fix_suggestion {
                    result = result.with_fix_suggestion(suggestion.clone());
                }
                result
            }
            None if self.warn_pattern.as_ref().is_some_and(|p| p.is_match(&text)) => {
                ExecutionResult::warned(self.id.clone(), duration)
            }
            None => ExecutionResult::passed(self.id.clone(), duration),
        };

        Ok(result.with_output(text))
    }

    fn can_auto_fix(&self) -> bool {
        self.fix_command.is_some()
    }

    async fn auto_fix(&self, project_root: &Path) -> anyhow::Result<bool> {
        let Some((program, args)) = &self.fix_command else {
            return Ok(false);
        };
        let output = self.run(program, args, project_root).await?;
        Ok(output.status.success())
    }
}

/// Builder for [`CommandCheck`].
pub struct CommandCheckBuilder {
    id: CheckId,
    display_name: Option<String>,
    program: String,
    args: Vec<String>,
    depends_on: Vec<CheckId>,
    applies_when: Vec<String>,
    fix_command: Option<(String, Vec<String>)>,
    timeout: Duration,
    expected_exit_code: i32,
    fail_pattern: Option<String>,
    warn_pattern: Option<String>,
    fix_suggestion: Option<String>,
}

impl CommandCheckBuilder {
    fn new(id: CheckId) -> Self {
        Self {
            id,
            display_name: None,
            program: String::new(),
            args: Vec::new(),
            depends_on: Vec::new(),
            applies_when: Vec::new(),
            fix_command: None,
            timeout: DEFAULT_TIMEOUT,
            expected_exit_code: 0,
            fail_pattern: None,
            warn_pattern: None,
            fix_suggestion: None,
        }
    }

    /// Set display name. Defaults to the qualified id.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the program and its arguments.
    pub fn command(mut self, program: impl Into<String>, args: &[&str]) -> Self {
        self.program = program.into();
        self.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Add a dependency.
    pub fn depends_on(mut self, dependency: CheckId) -> Self {
        self.depends_on.push(dependency);
        self
    }

    /// Only apply when one of these files exists in the project root.
    pub fn applies_when(mut self, marker: impl Into<String>) -> Self {
        self.applies_when.push(marker.into());
        self
    }

    /// Command run as remediation before evaluation.
    pub fn fix_command(mut self, program: impl Into<String>, args: &[&str]) -> Self {
        self.fix_command = Some((program.into(), args.iter().map(|a| a.to_string()).collect()));
        self
    }

    /// Set timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set expected exit code.
    pub fn expected_exit_code(mut self, code: i32) -> Self {
        self.expected_exit_code = code;
        self
    }

    /// Fail when the output matches this pattern.
    pub fn fail_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.fail_pattern = Some(pattern.into());
        self
    }

    /// Warn when the output matches this pattern.
    pub fn warn_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.warn_pattern = Some(pattern.into());
        self
    }

    /// Suggestion attached to failures.
    pub fn fix_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.fix_suggestion = Some(suggestion.into());
        self
    }

    /// Build the check.
    pub fn build(self) -> Result<CommandCheck, CommandCheckError> {
        if self.program.is_empty() {
            return Err(CommandCheckError::MissingProgram(self.id));
        }

        Ok(CommandCheck {
            display_name: self.display_name.unwrap_or_else(|| self.id.to_string()),
            id: self.id,
            program: self.program,
            args: self.args,
            depends_on: self.depends_on,
            applies_when: self.applies_when,
            fix_command: self.fix_command,
            timeout: self.timeout,
            expected_exit_code: self.expected_exit_code,
            fail_pattern: self.fail_pattern.as_deref().map(Regex::new).transpose()?,
            warn_pattern: self.warn_pattern.as_deref().map(Regex::new).transpose()?,
            fix_suggestion: self.fix_suggestion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::CheckStatus;
    use serde_json::json;
    use tempfile::TempDir;

    fn sh(name: &str, script: &str) -> CommandCheckBuilder {
        CommandCheck::builder("general", name).command("sh", &["-c", script])
    }

    #[test]
    fn test_builder_validation() {
        assert!(matches!(
            CommandCheck::builder("general", "empty").build(),
            Err(CommandCheckError::MissingProgram(_))
        ));
        assert!(matches!(
            sh("bad", "true").fail_pattern("(unclosed").build(),
            Err(CommandCheckError::InvalidPattern(_))
        ));

        let check = sh("ok", "true").build().unwrap();
        assert_eq!(check.display_name(), "general:ok");
        assert_eq!(check.timeout(), DEFAULT_TIMEOUT);
        assert!(!check.can_auto_fix());
    }

    #[test]
    fn test_settings_override() {
        let check = sh("ok", "true").build().unwrap();
        let settings: GateSettings = serde_json::from_value(json!({
            "timeout_secs": 5,
            "args": ["-c", "exit 0"]
        }))
        .unwrap();

        let bound = check.with_settings(&settings);
        assert_eq!(bound.timeout(), Duration::from_secs(5));
        assert_eq!(bound.args(), ["-c".to_string(), "exit 0".to_string()]);
    }

    #[test]
    fn test_applicability_markers() {
        let temp = TempDir::new().unwrap();
        let check = sh("py", "true").applies_when("pyproject.toml").build().unwrap();
        assert!(!check.is_applicable(temp.path()));
        assert_eq!(check.skip_reason(temp.path()), "none of pyproject.toml found");

        std::fs::write(temp.path().join("pyproject.toml"), "").unwrap();
        assert!(check.is_applicable(temp.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_decides_verdict() {
        let temp = TempDir::new().unwrap();

        let pass = sh("pass", "echo all good").build().unwrap();
        let result = pass.execute(temp.path()).await.unwrap();
        assert_eq!(result.status, CheckStatus::Passed);
        assert!(result.output.contains("all good"));

        let fail = sh("fail", "exit 3").fix_suggestion("fix it").build().unwrap();
        let result = fail.execute(temp.path()).await.unwrap();
        assert_eq!(result.status, CheckStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("sh exited with code 3 (expected 0)"));
        assert_eq!(result.fix_suggestion.as_deref(), Some("fix it"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_patterns() {
        let temp = TempDir::new().unwrap();

        let warn = sh("warn", "echo 'warning: unused import'")
            .warn_pattern(r"warning:")
            .build()
            .unwrap();
        assert_eq!(warn.execute(temp.path()).await.unwrap().status, CheckStatus::Warned);

        let fail = sh("fail", "echo 'FAILED 2 tests'")
            .fail_pattern(r"FAILED \d+")
            .warn_pattern(r"tests")
            .build()
            .unwrap();
        assert_eq!(fail.execute(temp.path()).await.unwrap().status, CheckStatus::Failed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_an_error() {
        let temp = TempDir::new().unwrap();
        let slow = sh("slow", "sleep 5")
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();

        let err = slow.execute(temp.path()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let temp = TempDir::new().unwrap();
        let check = CommandCheck::builder("general", "ghost")
            .command("gatehouse-no-such-program", &[])
            .build()
            .unwrap();
        assert!(check.execute(temp.path()).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_auto_fix_runs_fix_command() {
        let temp = TempDir::new().unwrap();
        let check = sh("fmt", "test -f formatted")
            .fix_command("sh", &["-c", "touch formatted"])
            .build()
            .unwrap();

        assert!(check.can_auto_fix());
        assert_eq!(check.execute(temp.path()).await.unwrap().status, CheckStatus::Failed);
        assert!(check.auto_fix(temp.path()).await.unwrap());
        assert_eq!(check.execute(temp.path()).await.unwrap().status, CheckStatus::Passed);
    }
}
