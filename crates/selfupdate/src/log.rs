use std::cell::RefCell;

/// Append-only log of a single run.
///
/// Lines are echoed to stdout as they arrive and handed to the reporter when
/// the run ends.
#[derive(Debug, Default)]
pub struct UpdateLog {
    lines: RefCell<Vec<String>>,
    echo: bool,
}

impl UpdateLog {
    pub fn new(echo: bool) -> Self {
        Self {
            lines: RefCell::new(Vec::new()),
            echo,
        }
    }

    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        if self.echo {
            println!("{message}\n");
        }
        self.lines.borrow_mut().push(message);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.borrow().iter().any(|line| line.contains(needle))
    }

    /// Take every recorded line, leaving the log empty
    pub fn flush(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.borrow_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_clears_lines() {
        let log = UpdateLog::new(false);
        log.log("first");
        log.log(String::from("second"));
        assert!(log.contains("sec"));
        assert_eq!(log.flush(), vec!["first", "second"]);
        assert!(log.lines().is_empty());
        assert!(log.flush().is_empty());
    }
}
