//! End-of-run email reports.

use crate::error::MailError;
use base64::Engine;
use std::{
    collections::BTreeSet,
    io::Write,
    process::{Command, Stdio},
};
use tracing::{debug, error, warn};

pub const SUCCESS_PREFIX: &str = "Update success";
pub const FAILURE_PREFIX: &str = "UPDATE FAILED";

pub const DEFAULT_SENDMAIL_COMMAND: &str = "sendmail -t -i";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportMessage {
    pub from: String,
    pub to: BTreeSet<String>,
    pub subject: String,
    pub body: String,
}

impl ReportMessage {
    /// Plain-text message with an RFC 2047 encoded subject
    pub fn to_rfc5322(&self) -> String {
        let subject = base64::engine::general_purpose::STANDARD.encode(self.subject.as_bytes());
        let to = self.to.iter().cloned().collect::<Vec<_>>().join(", ");
        format!(
            "MIME-Version: 1.0\r\n\
             Content-Type: text/plain; charset=UTF-8\r\n\
             From: {from}\r\n\
             Reply-To: {from}\r\n\
             To: {to}\r\n\
             Subject: =?UTF-8?B?{subject}?=\r\n\
             \r\n\
             {body}\r\n",
            from = self.from,
            body = self.body,
        )
    }
}

pub trait Mailer {
    fn send(&self, message: &ReportMessage) -> Result<(), MailError>;
}

/// Pipes the message into a sendmail-compatible command (`sendmail -t`, `msmtp -t`, ...)
#[derive(Debug, Clone)]
pub struct SendmailMailer {
    command: String,
}

impl SendmailMailer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Default for SendmailMailer {
    fn default() -> Self {
        Self::new(DEFAULT_SENDMAIL_COMMAND)
    }
}

impl Mailer for SendmailMailer {
    fn send(&self, message: &ReportMessage) -> Result<(), MailError> {
        let argv = shlex::split(&self.command)
            .filter(|argv| !argv.is_empty())
            .ok_or_else(|| MailError::InvalidCommand(self.command.clone()))?;

        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // a transport that exits early is judged by its exit status below
            if let Err(err) = stdin.write_all(message.to_rfc5322().as_bytes()) {
                if err.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(err.into());
                }
            }
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(MailError::CommandFailed {
                command: self.command.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        debug!(command = %self.command, recipients = message.to.len(), "report mailed");
        Ok(())
    }
}

/// Composes and delivers run reports.
///
/// The primary transport is optional; when it is missing or fails, the
/// fallback transport is used.
pub struct Reporter {
    emails: BTreeSet<String>,
    from: Option<String>,
    primary: Option<Box<dyn Mailer>>,
    fallback: Box<dyn Mailer>,
}

impl Reporter {
    pub fn new(emails: impl IntoIterator<Item = String>) -> Self {
        Self {
            emails: emails.into_iter().collect(),
            from: None,
            primary: None,
            fallback: Box::new(SendmailMailer::default()),
        }
    }

    /// A reporter that never sends mail
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_mailer(mut self, mailer: Box<dyn Mailer>) -> Self {
        self.primary = Some(mailer);
        self
    }

    pub fn with_fallback(mut self, mailer: Box<dyn Mailer>) -> Self {
        self.fallback = mailer;
        self
    }

    pub fn emails(&self) -> &BTreeSet<String> {
        &self.emails
    }

    /// Build the report for a finished run. `None` when no recipients are configured.
    pub fn compose(&self, subject_prefix: &str, lines: &[String]) -> Option<ReportMessage> {
        if self.emails.is_empty() {
            return None;
        }
        let host = host_name();
        let from = self
            .from
            .clone()
            .unwrap_or_else(|| format!("{}@{host}", user_name()));
        Some(ReportMessage {
            from,
            to: self.emails.clone(),
            subject: format!("{subject_prefix}: {host} at {}", current_date()),
            body: lines.join("\n"),
        })
    }

    /// Compose and deliver. Delivery problems are logged, never returned.
    pub fn report(&self, subject_prefix: &str, lines: &[String]) -> Option<ReportMessage> {
        let message = self.compose(subject_prefix, lines)?;

        if let Some(primary) = &self.primary {
            match primary.send(&message) {
                Ok(()) => return Some(message),
                Err(err) => warn!(error = %err, "primary mailer failed, using fallback"),
            }
        }
        if let Err(err) = self.fallback.send(&message) {
            error!(error = %err, "unable to send update report");
        }
        Some(message)
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("emails", &self.emails)
            .field("from", &self.from)
            .field("primary", &self.primary.is_some())
            .finish()
    }
}

/// Hostname for report subjects and the default sender address
pub fn host_name() -> String {
    let name = gethostname::gethostname().to_string_lossy().trim().to_string();
    if name.is_empty() {
        "localhost".to_string()
    } else {
        name
    }
}

fn user_name() -> String {
    ["USER", "USERNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| "selfupdate".to_string())
}

fn current_date() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[derive(Clone, Default)]
    struct Outbox {
        sent: Rc<RefCell<Vec<ReportMessage>>>,
        fail: bool,
    }

    impl Mailer for Outbox {
        fn send(&self, message: &ReportMessage) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Transport("smtp down".into()));
            }
            self.sent.borrow_mut().push(message.clone());
            Ok(())
        }
    }

    fn lines() -> Vec<String> {
        vec!["Remote changes detected:".into(), "Cache 'app' flushed.".into()]
    }

    #[test]
    fn test_no_recipients_sends_nothing() {
        let outbox = Outbox::default();
        let reporter = Reporter::silent().with_fallback(Box::new(outbox.clone()));
        assert!(reporter.report(SUCCESS_PREFIX, &lines()).is_none());
        assert!(outbox.sent.borrow().is_empty());
    }

    #[test]
    fn test_compose_subject_and_body() {
        let reporter = Reporter::new(vec!["ops@example.com".to_string(), "dev@example.com".to_string()])
            .with_from("deploy@web1");
        let message = reporter.compose(FAILURE_PREFIX, &lines()).unwrap();

        assert_eq!(message.from, "deploy@web1");
        assert_eq!(message.to.len(), 2);
        assert!(message.subject.starts_with("UPDATE FAILED: "));
        assert!(message.subject.contains(&format!("{} at ", host_name())));
        assert_eq!(message.body, "Remote changes detected:\nCache 'app' flushed.");
    }

    #[test]
    fn test_default_sender_uses_host() {
        let reporter = Reporter::new(vec!["ops@example.com".to_string()]);
        let message = reporter.compose(SUCCESS_PREFIX, &[]).unwrap();
        assert!(message.from.ends_with(&format!("@{}", host_name())));
    }

    #[test]
    fn test_primary_mailer_used_first() {
        let primary = Outbox::default();
        let fallback = Outbox::default();
        let reporter = Reporter::new(vec!["ops@example.com".to_string()])
            .with_mailer(Box::new(primary.clone()))
            .with_fallback(Box::new(fallback.clone()));

        reporter.report(SUCCESS_PREFIX, &lines()).unwrap();
        assert_eq!(primary.sent.borrow().len(), 1);
        assert!(fallback.sent.borrow().is_empty());
    }

    #[test]
    fn test_failing_primary_falls_back() {
        let primary = Outbox {
            fail: true,
            ..Outbox::default()
        };
        let fallback = Outbox::default();
        let reporter = Reporter::new(vec!["ops@example.com".to_string()])
            .with_mailer(Box::new(primary))
            .with_fallback(Box::new(fallback.clone()));

        let message = reporter.report(FAILURE_PREFIX, &lines()).unwrap();
        assert_eq!(fallback.sent.borrow().as_slice(), &[message]);
    }

    #[test]
    fn test_rfc5322_rendering() {
        let message = ReportMessage {
            from: "deploy@web1".into(),
            to: ["a@example.com".to_string(), "b@example.com".to_string()].into(),
            subject: "Update success: web1".into(),
            body: "line1\nline2".into(),
        };
        let rendered = message.to_rfc5322();
        let encoded = base64::engine::general_purpose::STANDARD.encode("Update success: web1");

        assert!(rendered.contains("From: deploy@web1\r\n"));
        assert!(rendered.contains("Reply-To: deploy@web1\r\n"));
        assert!(rendered.contains("To: a@example.com, b@example.com\r\n"));
        assert!(rendered.contains(&format!("Subject: =?UTF-8?B?{encoded}?=\r\n")));
        assert!(rendered.ends_with("\r\n\r\nline1\nline2\r\n"));
    }

    #[test]
    fn test_sendmail_mailer_pipes_message() {
        let temp = tempfile::TempDir::new().unwrap();
        let spool = temp.path().join("spool.eml");
        let mailer = SendmailMailer::new(format!(
            "sh -c 'cat > \"$0\"' {}",
            utils::shell::quote(&spool.to_string_lossy())
        ));
        let message = Reporter::new(vec!["ops@example.com".to_string()])
            .with_from("deploy@web1")
            .compose(SUCCESS_PREFIX, &lines())
            .unwrap();

        mailer.send(&message).unwrap();
        assert_eq!(std::fs::read_to_string(&spool).unwrap(), message.to_rfc5322());
    }

    #[test]
    fn test_sendmail_mailer_reports_failures() {
        let message = Reporter::new(vec!["ops@example.com".to_string()])
            .compose(SUCCESS_PREFIX, &[])
            .unwrap();

        let err = SendmailMailer::new("sh -c 'exit 75'").send(&message).unwrap_err();
        assert!(matches!(err, MailError::CommandFailed { .. }), "{err}");

        let err = SendmailMailer::new("   ").send(&message).unwrap_err();
        assert!(matches!(err, MailError::InvalidCommand(_)));

        let err = SendmailMailer::new("/nonexistent/sendmail").send(&message).unwrap_err();
        assert!(matches!(err, MailError::Io(_)));
    }
}
