//! Runs the user's command for a settled change.
//!
//! The command is kept as an argument vector and handed straight to the OS, never to a
//! shell. Every occurrence of the substitution marker inside an argument is replaced with
//! the changed path. Shell quoting is only applied when a command line is rendered for logs.
//!
//! Paths travel as `OsStr` all the way to the child process, so names that are not valid
//! UTF-8 reach the command unchanged. Only the logged command line is lossily decoded.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::error::{AutorunError, Result};
use crate::events::ChangeEvent;

pub const DEFAULT_MARKER: char = '%';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    args: Vec<String>,
    marker: char,
}

impl CommandTemplate {
    pub fn new(args: Vec<String>, marker: char) -> Result<Self> {
        if args.is_empty() {
            return Err(AutorunError::EmptyCommand);
        }
        Ok(Self { args, marker })
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Concrete argument vector for one changed path.
    pub fn render(&self, path: &OsStr) -> Vec<OsString> {
        self.args
            .iter()
            .map(|arg| {
                let mut pieces = arg.split(self.marker);
                let mut rendered = OsString::from(pieces.next().unwrap_or_default());
                for piece in pieces {
                    rendered.push(path);
                    rendered.push(piece);
                }
                rendered
            })
            .collect()
    }
}

/// Quote each argument so the logged line can be pasted back into a shell.
pub fn quote_command_line<S: AsRef<OsStr>>(args: &[S]) -> String {
    let display: Vec<String> = args
        .iter()
        .map(|arg| arg.as_ref().to_string_lossy().into_owned())
        .collect();
    shlex::try_join(display.iter().map(String::as_str))
        .unwrap_or_else(|_| format!("{:?}", display))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Non-zero exit. `None` when the process was killed by a signal.
    Failed { code: Option<i32> },
    LaunchFailed { error: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub command_line: String,
    pub path: String,
    pub outcome: Outcome,
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Success => write!(f, "{} (for {}) succeeded", self.command_line, self.path),
            Outcome::Failed { code: Some(code) } => write!(
                f,
                "{} (for {}) failed with exit code {}",
                self.command_line, self.path, code
            ),
            Outcome::Failed { code: None } => write!(
                f,
                "{} (for {}) was terminated by a signal",
                self.command_line, self.path
            ),
            Outcome::LaunchFailed { error } => write!(
                f,
                "{} (for {}) could not be launched: {}",
                self.command_line, self.path, error
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    template: CommandTemplate,
}

impl Dispatcher {
    pub fn new(template: CommandTemplate) -> Self {
        Self { template }
    }

    /// Run the command to completion and report how it went. Never fails past this point.
    pub fn run(&self, event: &ChangeEvent) -> DispatchReport {
        let path = event.path_str().into_owned();
        let args = self.template.render(event.path.as_os_str());
        let command_line = quote_command_line(&args);

        tracing::debug!(command = %command_line, path = %path, "running command");

        let outcome = match spawn_and_wait(&args, &command_line) {
            Ok(status) if status.success() => Outcome::Success,
            Ok(status) => Outcome::Failed { code: status.code() },
            Err(AutorunError::Spawn { source, .. }) => Outcome::LaunchFailed {
                error: source.to_string(),
            },
            Err(err) => Outcome::LaunchFailed {
                error: err.to_string(),
            },
        };

        let report = DispatchReport {
            command_line,
            path,
            outcome,
        };

        match &report.outcome {
            Outcome::Success => tracing::info!(
                command = %report.command_line,
                path = %report.path,
                "command succeeded"
            ),
            Outcome::Failed { code: Some(code) } => tracing::error!(
                command = %report.command_line,
                path = %report.path,
                exit_code = code,
                "command failed"
            ),
            Outcome::Failed { code: None } => tracing::error!(
                command = %report.command_line,
                path = %report.path,
                "command terminated by signal"
            ),
            Outcome::LaunchFailed { error } => tracing::error!(
                command = %report.command_line,
                path = %report.path,
                error = %error,
                "command could not be launched"
            ),
        }

        report
    }
}

fn spawn_and_wait(args: &[OsString], command_line: &str) -> Result<std::process::ExitStatus> {
    let (program, rest) = args.split_first().ok_or(AutorunError::EmptyCommand)?;

    Command::new(program)
        .args(rest)
        .status()
        .map_err(|source| AutorunError::Spawn {
            command: command_line.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeKind;

    fn template(args: &[&str]) -> CommandTemplate {
        let args = args.iter().map(|s| s.to_string()).collect();
        CommandTemplate::new(args, DEFAULT_MARKER).unwrap()
    }

    #[test]
    fn test_empty_template_rejected() {
        assert!(matches!(
            CommandTemplate::new(vec![], DEFAULT_MARKER),
            Err(AutorunError::EmptyCommand)
        ));
    }

    #[test]
    fn test_render_substitutes_marker() {
        let t = template(&["echo", "%"]);
        assert_eq!(t.render(OsStr::new("/tmp/a.txt")), vec!["echo", "/tmp/a.txt"]);
    }

    #[test]
    fn test_render_substitutes_every_occurrence() {
        let t = template(&["cp", "%", "--target=%.bak", "plain"]);
        assert_eq!(
            t.render(OsStr::new("a.txt")),
            vec!["cp", "a.txt", "--target=a.txt.bak", "plain"]
        );
    }

    #[test]
    fn test_render_custom_marker() {
        let t = CommandTemplate::new(vec!["echo".into(), "@".into(), "100%".into()], '@')
            .unwrap();
        assert_eq!(t.render(OsStr::new("x.rs")), vec!["echo", "x.rs", "100%"]);
    }

    #[test]
    fn test_render_marker_at_edges() {
        let t = template(&["%%", "%-", "-%", "none"]);
        assert_eq!(t.render(OsStr::new("p")), vec!["pp", "p-", "-p", "none"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_render_keeps_non_utf8_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let path = OsStr::from_bytes(b"/tmp/caf\xe9.txt");
        let rendered = template(&["cat", "--file=%"]).render(path);

        assert_eq!(rendered[1].as_bytes(), b"--file=/tmp/caf\xe9.txt");
    }

    #[test]
    fn test_quote_command_line() {
        let args = vec![
            "echo".to_string(),
            "hello world".to_string(),
            "it's".to_string(),
        ];
        let line = quote_command_line(&args);

        assert!(line.starts_with("echo "));
        assert!(line.contains("'hello world'"));
        assert_eq!(shlex::split(&line).unwrap(), args);
    }

    #[test]
    fn test_report_display_includes_exit_code() {
        let report = DispatchReport {
            command_line: "make test".to_string(),
            path: "src/lib.rs".to_string(),
            outcome: Outcome::Failed { code: Some(2) },
        };
        let text = report.to_string();
        assert!(text.contains("make test"));
        assert!(text.contains("exit code 2"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_success() {
        let dispatcher = Dispatcher::new(template(&["true"]));
        let report = dispatcher.run(&ChangeEvent::new("/tmp/a.txt", ChangeKind::Modified));

        assert!(report.outcome.is_success());
        assert_eq!(report.path, "/tmp/a.txt");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_exit_code() {
        let dispatcher = Dispatcher::new(template(&["sh", "-c", "exit 2"]));
        let report = dispatcher.run(&ChangeEvent::new("a.txt", ChangeKind::Modified));

        assert_eq!(report.outcome, Outcome::Failed { code: Some(2) });
        assert!(report.to_string().contains('2'));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_passes_path_without_shell_interpretation() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out.txt");
        let script = format!("printf '%s' \"$1\" > {}", out.display());
        let t = CommandTemplate::new(
            vec!["sh".into(), "-c".into(), script, "sh".into(), "@".into()],
            '@',
        )
        .unwrap();

        let tricky = "dir with spaces/$(touch nope);.txt";
        let report = Dispatcher::new(t).run(&ChangeEvent::new(tricky, ChangeKind::Modified));

        assert!(report.outcome.is_success());
        assert_eq!(std::fs::read_to_string(&out).unwrap(), tricky);
        assert!(!std::path::Path::new("nope").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_passes_non_utf8_path_unchanged() {
        use std::os::unix::ffi::OsStrExt;
        use std::path::PathBuf;

        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out.bin");
        let script = format!("printf '%s' \"$1\" > {}", out.display());
        let t = CommandTemplate::new(
            vec!["sh".into(), "-c".into(), script, "sh".into(), "@".into()],
            '@',
        )
        .unwrap();

        let raw = b"/tmp/caf\xe9.txt";
        let path = PathBuf::from(OsStr::from_bytes(raw));
        let report = Dispatcher::new(t).run(&ChangeEvent::new(path, ChangeKind::Modified));

        assert!(report.outcome.is_success());
        assert_eq!(std::fs::read(&out).unwrap(), raw);
        // The logged form is the lossy decoding
        assert!(report.path.contains('\u{FFFD}'));
    }

    #[test]
    fn test_run_launch_failure_is_reported() {
        let dispatcher = Dispatcher::new(template(&["definitely-not-a-real-command-autorun"]));
        let report = dispatcher.run(&ChangeEvent::new("a.txt", ChangeKind::Created));

        assert!(matches!(report.outcome, Outcome::LaunchFailed { .. }));
        assert!(report.to_string().contains("could not be launched"));
    }
}
