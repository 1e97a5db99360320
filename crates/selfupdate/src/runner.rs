//! Shell execution for update steps.
//!
//! Unlike the VCS backends, which interpret exit codes themselves, update
//! steps treat a non-zero exit or an error keyword in the output as failure.

use crate::error::SelfUpdateError;
use crate::log::UpdateLog;
use utils::shell;

/// Keywords whose presence in command output marks the command as failed
pub fn default_error_keywords() -> Vec<String> {
    vec!["error".into(), "exception".into(), "ошибка".into()]
}

#[derive(Debug, Clone)]
pub struct CheckedShell {
    error_keywords: Vec<String>,
}

impl CheckedShell {
    pub fn new(error_keywords: Vec<String>) -> Self {
        Self {
            error_keywords: error_keywords
                .into_iter()
                .filter(|keyword| !keyword.is_empty())
                .collect(),
        }
    }

    pub fn error_keywords(&self) -> &[String] {
        &self.error_keywords
    }

    /// Run a command, logging it before execution and its output after success
    pub fn run(
        &self,
        log: &UpdateLog,
        template: &str,
        placeholders: &[(&str, &str)],
    ) -> Result<String, SelfUpdateError> {
        let command = shell::substitute(template, placeholders);
        log.log(command.as_str());

        let result = shell::execute(&command, &[]);
        let output = result.output();
        if !result.is_ok() {
            return Err(SelfUpdateError::CommandExecution(format!(
                "Execution of '{command}' failed: exit code = {}:\nOutput:\n{output}",
                result.exit_code
            )));
        }
        if let Some(keyword) = self
            .error_keywords
            .iter()
            .find(|keyword| result.output_contains(keyword))
        {
            return Err(SelfUpdateError::CommandExecution(format!(
                "Execution of '{command}' failed: output contains '{keyword}':\nOutput:\n{output}"
            )));
        }

        log.log(output.as_str());
        Ok(output)
    }
}

impl Default for CheckedShell {
    fn default() -> Self {
        Self::new(default_error_keywords())
    }
}
