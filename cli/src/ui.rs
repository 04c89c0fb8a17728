//! Terminal output (simplified): stdout/stderr writers with TTY-aware
//! color, no pager. A smaller cousin of the teacher's `Ui` — this crate
//! never spawns a pager or a diff/merge editor, so there is no
//! `UiOutput` enum of terminal/paged/builtin-paged variants to manage.

use std::io;
use std::io::IsTerminal as _;
use std::io::Write as _;

use crossterm::style::Color;
use crossterm::style::ResetColor;
use crossterm::style::SetForegroundColor;

pub struct Ui {
    color: bool,
}

impl Ui {
    pub fn new() -> Self {
        Self {
            color: io::stdout().is_terminal(),
        }
    }

    fn write_colored(&self, mut out: impl io::Write, color: Color, text: &str) {
        if self.color {
            let _ = write!(out, "{}", SetForegroundColor(color));
            let _ = write!(out, "{text}");
            let _ = write!(out, "{ResetColor}");
        } else {
            let _ = write!(out, "{text}");
        }
    }

    pub fn println(&self, text: &str) {
        println!("{text}");
    }

    /// A neutral status line, e.g. `add`'s staged-file list.
    pub fn hint(&self, text: &str) {
        self.write_colored(io::stdout(), Color::Cyan, text);
        println!();
    }

    /// A positive outcome, e.g. a successful commit or push.
    pub fn success(&self, text: &str) {
        self.write_colored(io::stdout(), Color::Green, text);
        println!();
    }

    /// A recoverable problem that does not abort the command.
    pub fn warning(&self, text: &str) {
        self.write_colored(io::stderr(), Color::Yellow, &format!("warning: {text}"));
        eprintln!();
    }

    /// A fatal error, printed right before the process exits non-zero.
    pub fn error(&self, text: &str) {
        self.write_colored(io::stderr(), Color::Red, &format!("error: {text}"));
        eprintln!();
    }
}

impl Default for Ui {
    fn default() -> Self {
        Self::new()
    }
}
