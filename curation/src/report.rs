//! Console progress reporting.
//!
//! Progress lines go to standard output and are silenced by `--quiet`.
//! Warnings and errors always go to standard error. Progress lines are
//! also emitted as `trace` events.

/// Level of a report line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl ReportLevel {
    fn prefix(self) -> &'static str {
        match self {
            ReportLevel::Info => "  ",
            ReportLevel::Success => "✓",
            ReportLevel::Warning => "⚠️",
            ReportLevel::Error => "❌",
        }
    }
}

/// Prints progress for one tool run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    quiet: bool,
}

impl Reporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Print a line at the given level and indentation.
    pub fn log(&self, level: ReportLevel, message: impl AsRef<str>, indent: u8) {
        let message = message.as_ref();
        let indent = "   ".repeat(indent as usize);
        match level {
            ReportLevel::Info | ReportLevel::Success => {
                tracing::trace!("{}", message);
                if !self.quiet {
                    println!("{}{} {}", indent, level.prefix(), message);
                }
            }
            ReportLevel::Warning | ReportLevel::Error => {
                eprintln!("{}{} {}", indent, level.prefix(), message);
            }
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.log(ReportLevel::Info, msg, 0);
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        self.log(ReportLevel::Success, msg, 0);
    }

    pub fn warning(&self, msg: impl AsRef<str>) {
        self.log(ReportLevel::Warning, msg, 0);
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        self.log(ReportLevel::Error, msg, 0);
    }

    pub fn info_indent(&self, msg: impl AsRef<str>, indent: u8) {
        self.log(ReportLevel::Info, msg, indent);
    }
}
