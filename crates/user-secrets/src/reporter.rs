//! Reporting boundary between commands and whoever shows their outcomes
//!
//! Commands describe what happened with a severity and a message; they
//! never decide colors, streams, or verbosity themselves.

use std::cell::RefCell;
use std::io::Write;

/// How much an outcome matters to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Diagnostics shown only when asked for
    Verbose,
    /// Normal command output
    Output,
    /// Something odd that did not stop the command
    Warning,
    /// The command failed
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verbose => "verbose",
            Self::Output => "output",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub trait Reporter {
    fn report(&self, severity: Severity, message: &str);

    fn verbose(&self, message: &str) {
        self.report(Severity::Verbose, message);
    }

    fn output(&self, message: &str) {
        self.report(Severity::Output, message);
    }

    fn warn(&self, message: &str) {
        self.report(Severity::Warning, message);
    }

    fn error(&self, message: &str) {
        self.report(Severity::Error, message);
    }
}

/// Writes output to stdout and everything else to stderr
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, severity: Severity, message: &str) {
        // A closed pipe is not worth failing the command over
        let _ = match severity {
            Severity::Verbose if !self.verbose => Ok(()),
            Severity::Output => writeln!(std::io::stdout(), "{}", message),
            Severity::Verbose => writeln!(std::io::stderr(), "{}", message),
            Severity::Warning | Severity::Error => {
                writeln!(std::io::stderr(), "{}: {}", severity, message)
            }
        };
    }
}

/// Keeps every report in memory, in order
#[derive(Default)]
pub struct MemoryReporter {
    entries: RefCell<Vec<(Severity, String)>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.entries.borrow().clone()
    }

    /// Messages reported at `severity`
    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, severity: Severity, message: &str) {
        self.entries.borrow_mut().push((severity, message.to_string()));
    }
}
