//! Shell command execution.
//!
//! Commands are written as templates with `{placeholder}` tokens. Every
//! placeholder value is single-quoted before substitution, so paths with
//! spaces or shell metacharacters reach the command as one argument.

use std::{
    fmt,
    io::{BufRead, BufReader},
    process::{Command, Stdio},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Exit code reported when the shell itself could not be spawned.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Outcome of a single shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// The command line after placeholder substitution
    pub command: String,
    pub exit_code: i32,
    /// Merged stdout/stderr in emission order, trailing whitespace trimmed
    pub output_lines: Vec<String>,
}

impl CommandResult {
    pub fn new(command: impl Into<String>, exit_code: i32, output_lines: Vec<String>) -> Self {
        Self {
            command: command.into(),
            exit_code,
            output_lines,
        }
    }

    /// Whether the command exited with status 0. Output content is not inspected.
    pub fn is_ok(&self) -> bool {
        self.exit_code == 0
    }

    pub fn output(&self) -> String {
        self.output_with("\n")
    }

    pub fn output_with(&self, glue: &str) -> String {
        self.output_lines.join(glue)
    }

    pub fn is_output_empty(&self) -> bool {
        self.output_lines.is_empty()
    }

    /// Case-insensitive substring check over the joined output.
    pub fn output_contains(&self, needle: &str) -> bool {
        self.output()
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }

    /// Regex match over the joined output. An invalid pattern never matches.
    pub fn output_matches(&self, pattern: &str) -> bool {
        regex::Regex::new(pattern)
            .map(|re| re.is_match(&self.output()))
            .unwrap_or(false)
    }

    /// Command, output and exit code, one per line; used for run logs.
    pub fn trace(&self) -> String {
        format!(
            "{}\n{}\nExit code: {}",
            self.command,
            self.output(),
            self.exit_code
        )
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.trace())
    }
}

/// Quote a value for `sh`, always wrapping it in single quotes.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Replace placeholders in `template` with their quoted values.
///
/// Works in a single left-to-right pass: at each position the longest
/// matching placeholder wins and substituted text is never rescanned.
pub fn substitute(template: &str, placeholders: &[(&str, &str)]) -> String {
    if placeholders.is_empty() {
        return template.to_string();
    }

    let mut replacements: Vec<(&str, String)> = placeholders
        .iter()
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (*key, quote(value)))
        .collect();
    replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    'scan: while !rest.is_empty() {
        for (key, value) in &replacements {
            if let Some(tail) = rest.strip_prefix(key) {
                out.push_str(value);
                rest = tail;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

/// Run `template` through `sh -c` after placeholder substitution.
///
/// Never fails on a non-zero exit: the returned [`CommandResult`] carries the
/// status and callers decide what counts as failure. If `sh` cannot be
/// spawned the result has exit code [`SPAWN_FAILURE_EXIT_CODE`] and the OS
/// error as its only output line.
pub fn execute(template: &str, placeholders: &[(&str, &str)]) -> CommandResult {
    let command = substitute(template, placeholders);
    debug!(%command, "executing shell command");

    // fd 2 is pointed at the stdout pipe so both streams interleave in order
    let mut child = match Command::new("sh")
        .arg("-c")
        .arg(format!("exec 2>&1\n{command}"))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            return CommandResult::new(command, SPAWN_FAILURE_EXIT_CODE, vec![err.to_string()]);
        }
    };

    let mut output_lines = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => output_lines.push(String::from_utf8_lossy(&buf).trim_end().to_string()),
                Err(err) => {
                    output_lines.push(err.to_string());
                    break;
                }
            }
        }
    }

    let exit_code = match child.wait() {
        Ok(status) => status.code().unwrap_or(-1),
        Err(err) => {
            output_lines.push(err.to_string());
            -1
        }
    };

    debug!(%command, exit_code, "shell command finished");
    CommandResult::new(command, exit_code, output_lines)
}

/// A single command-line option.
///
/// Deserializes from either a bare string (`"no-dev"`) or a
/// `{ name, value }` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShellOption {
    Flag(String),
    Value { name: String, value: String },
}

impl ShellOption {
    pub fn flag(name: impl Into<String>) -> Self {
        Self::Flag(name.into())
    }

    pub fn value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Value {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Option name without its value
    pub fn name(&self) -> &str {
        match self {
            Self::Flag(name) | Self::Value { name, .. } => name,
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Flag(name) => normalize_option_name(name),
            Self::Value { name, value } => {
                format!("{}={}", normalize_option_name(name), quote(value))
            }
        }
    }
}

impl From<&str> for ShellOption {
    fn from(name: &str) -> Self {
        Self::Flag(name.to_string())
    }
}

/// Render options as `--flag --name='value'`, space separated, in input order.
pub fn build_option_string(options: &[ShellOption]) -> String {
    options
        .iter()
        .map(ShellOption::render)
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_option_name(name: &str) -> String {
    if name.starts_with('-') {
        name.to_string()
    } else {
        format!("--{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn result(lines: &[&str]) -> CommandResult {
        CommandResult::new(
            "test",
            0,
            lines.iter().map(|line| line.to_string()).collect(),
        )
    }

    #[test]
    fn test_output_joins_lines() {
        assert_eq!(result(&["line1", "line2"]).output(), "line1\nline2");
        assert_eq!(result(&["a", "b"]).output_with(", "), "a, b");
    }

    #[test]
    fn test_is_ok_ignores_output() {
        let mut res = result(&["fatal error"]);
        assert!(res.is_ok());
        res.exit_code = 1;
        assert!(!res.is_ok());
        res.output_lines.clear();
        assert!(!res.is_ok());
    }

    #[test]
    fn test_output_checks() {
        let res = result(&["line1", "Line2", "line3"]);
        assert!(!res.is_output_empty());
        assert!(result(&[]).is_output_empty());
        assert!(res.output_contains("line2"));
        assert!(!res.output_contains("line4"));
        assert!(res.output_matches(r"line\d"));
        assert!(!res.output_matches("line4"));
        assert!(!res.output_matches("(unclosed"));
    }

    #[test]
    fn test_trace_format() {
        let res = CommandResult::new("ls", 2, vec!["no such file".to_string()]);
        assert_eq!(res.trace(), "ls\nno such file\nExit code: 2");
        assert_eq!(res.to_string(), res.trace());
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("root"), "'root'");
        assert_eq!(quote("it's"), r"'it'\''s'");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn test_substitute_prefers_longest_placeholder() {
        let cmd = substitute("{a} {ab} {a}", &[("{a}", "x"), ("{ab}", "y")]);
        assert_eq!(cmd, "'x' 'y' 'x'");
    }

    #[test]
    fn test_substitute_does_not_rescan_values() {
        let cmd = substitute("echo {a}", &[("{a}", "{b}"), ("{b}", "nope")]);
        assert_eq!(cmd, "echo '{b}'");
    }

    #[test]
    fn test_execute_records_command_and_exit_code() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_string_lossy().to_string();

        let res = execute("ls {dir}", &[("{dir}", path.as_str())]);
        assert_eq!(res.exit_code, 0);
        assert_eq!(res.command, format!("ls '{path}'"));

        let missing = format!("{path}/unexisting_dir");
        let res = execute("ls {dir}", &[("{dir}", missing.as_str())]);
        assert!(!res.is_ok());
        assert!(!res.is_output_empty());
    }

    #[test]
    fn test_execute_merges_streams_in_order() {
        let res = execute("echo out; echo err 1>&2; echo out2; exit 3", &[]);
        assert_eq!(res.exit_code, 3);
        assert_eq!(res.output_lines, vec!["out", "err", "out2"]);
    }

    #[test]
    fn test_execute_passes_hostile_value_as_single_argument() {
        let dir = TempDir::new().unwrap();
        let name = "dir with spaces; $(touch pwned) 'q' `x` &";
        let hostile = dir.path().join(name);
        std::fs::create_dir(&hostile).unwrap();
        let hostile = hostile.to_string_lossy().to_string();

        let res = execute("printf '%s\\n' {arg}", &[("{arg}", hostile.as_str())]);
        assert!(res.is_ok());
        assert_eq!(res.output_lines, vec![hostile.clone()]);

        let res = execute("cd {arg} && pwd", &[("{arg}", hostile.as_str())]);
        assert!(res.is_ok(), "{}", res.trace());
        assert!(!dir.path().join("pwned").exists());
        assert!(!std::path::Path::new("pwned").exists());
    }

    #[test]
    fn test_build_option_string() {
        let cases: Vec<(Vec<ShellOption>, &str)> = vec![
            (
                vec!["--verbose".into(), "--no-interactive".into()],
                "--verbose --no-interactive",
            ),
            (
                vec!["--verbose".into(), ShellOption::value("--username", "root")],
                "--verbose --username='root'",
            ),
            (
                vec!["verbose".into(), "no-interactive".into()],
                "--verbose --no-interactive",
            ),
            (vec!["-v".into(), "no-interactive".into()], "-v --no-interactive"),
            (
                vec!["verbose".into(), ShellOption::value("username", "root")],
                "--verbose --username='root'",
            ),
        ];

        for (options, expected) in cases {
            assert_eq!(build_option_string(&options), expected);
        }
        assert_eq!(build_option_string(&[]), "");
    }

    #[test]
    fn test_shell_option_name() {
        assert_eq!(ShellOption::flag("no-dev").name(), "no-dev");
        assert_eq!(ShellOption::value("working-dir", "/x").name(), "working-dir");
    }
}
