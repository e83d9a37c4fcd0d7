use std::io::{self, Write};

/// User-facing progress text, written to stderr so stdout stays free for the report.
#[derive(Debug, Clone, Copy, Default)]
pub struct Progress {
    quiet: bool,
}

impl Progress {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn quiet() -> Self {
        Self { quiet: true }
    }

    /// Print a full status line.
    pub fn status(&self, message: impl AsRef<str>) {
        if !self.quiet {
            eprintln!("{}", message.as_ref());
        }
    }

    /// Print an inline `[tool]` marker while streaming.
    pub fn tool(&self, name: &str) {
        if !self.quiet {
            let mut stderr = io::stderr().lock();
            let _ = write!(stderr, "[{name}] ");
            let _ = stderr.flush();
        }
    }

    /// Terminate a run of inline markers.
    pub fn end_line(&self) {
        if !self.quiet {
            eprintln!();
        }
    }
}
