//! Colored terminal output for the interactive flows.
//!
//! Everything goes to stderr so that tokens and identities printed with
//! [`Output::field`] stay readable when stdout is redirected.

use console::{Style, Term};

const SECTION_WIDTH: usize = 70;

/// Outcome shown in front of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Ok,
    Warn,
    Fail,
}

impl Status {
    fn badge(self) -> &'static str {
        match self {
            Self::Ok => "[  OK  ]",
            Self::Warn => "[ WARN ]",
            Self::Fail => "[ FAIL ]",
        }
    }
}

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
    green: Style,
    yellow: Style,
    red: Style,
    cyan_bold: Style,
    dim: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            cyan_bold: Style::new().cyan().bold(),
            dim: Style::new().dim(),
        }
    }

    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    /// Numbered step of a handshake, e.g. `Step 2: ...`.
    pub(crate) fn step(&self, number: u8, msg: &str) {
        let _ = self
            .term
            .write_line(&format!("{} {msg}", self.dim.apply_to(format!("Step {number}:"))));
    }

    /// Print a warning message (yellow).
    pub(crate) fn warning(&self, msg: &str) {
        let _ = self.term.write_line(&self.yellow.apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Print a highlighted message (cyan bold).
    pub(crate) fn highlight(&self, msg: &str) {
        let _ = self
            .term
            .write_line(&self.cyan_bold.apply_to(msg).to_string());
    }

    /// Title framed by separator lines.
    pub(crate) fn section(&self, title: &str) {
        let rule = "=".repeat(SECTION_WIDTH);
        let _ = self.term.write_line(&rule);
        self.highlight(title);
        let _ = self.term.write_line(&rule);
    }

    /// Verification or expiry result with a colored badge.
    pub(crate) fn status(&self, status: Status, msg: &str) {
        let style = match status {
            Status::Ok => &self.green,
            Status::Warn => &self.yellow,
            Status::Fail => &self.red,
        };
        let _ = self
            .term
            .write_line(&format!("{} {msg}", style.apply_to(status.badge())));
    }

    /// `name = "value"` line, the shape used in `passage.toml`.
    pub(crate) fn field(&self, name: &str, value: &str) {
        let _ = self.term.write_line(&format_field(name, value));
    }

    /// Read one trimmed line after showing `prompt`.
    pub(crate) fn prompt(&self, prompt: &str) -> std::io::Result<String> {
        self.term.write_str(&self.cyan_bold.apply_to(prompt).to_string())?;
        let line = self.term.read_line()?;
        Ok(line.trim().to_owned())
    }
}

fn format_field(name: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{name} = \"{escaped}\"")
}
