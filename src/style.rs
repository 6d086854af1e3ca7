//! ANSI styling for terminal diagnostics.

use std::io::IsTerminal;

pub struct Style;

impl Style {
    fn wrap(code: &str, text: &str) -> String {
        if std::io::stderr().is_terminal() {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    pub fn bold_red(text: &str) -> String {
        Self::wrap("1;31", text)
    }

    pub fn bold_yellow(text: &str) -> String {
        Self::wrap("1;33", text)
    }

    pub fn bold_cyan(text: &str) -> String {
        Self::wrap("1;36", text)
    }

    pub fn red(text: &str) -> String {
        Self::wrap("31", text)
    }

    pub fn blue(text: &str) -> String {
        Self::wrap("34", text)
    }

    pub fn cyan(text: &str) -> String {
        Self::wrap("36", text)
    }

    pub fn green(text: &str) -> String {
        Self::wrap("32", text)
    }
}
