use crate::intern::Interner;
use crate::style::Style;
use crate::token::Loc;

pub type CompileResult<T> = Result<T, Diagnostic>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    fn label(self) -> String {
        match self {
            Severity::Info => Style::bold_cyan("info"),
            Severity::Warning => Style::bold_yellow("warning"),
            Severity::Error => Style::bold_red("error"),
        }
    }
}

/// A single attributed message. Fatal errors travel as `Err(Diagnostic)`
/// through the pipeline and are rendered and exited on by the driver, so the
/// observable behavior is one multi-line report and a non-zero status.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub loc: Loc,
    pub message: String,
    /// Secondary lines printed after the primary message, e.g. the
    /// circular-dependency chain or the template instantiation trace.
    pub notes: Vec<(Loc, String)>,
}

impl Diagnostic {
    pub fn error(loc: Loc, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            loc,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    pub fn warning(loc: Loc, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            loc,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    pub fn info(loc: Loc, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Info,
            loc,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    pub fn note(mut self, loc: Loc, message: impl Into<String>) -> Self {
        self.notes.push((loc, message.into()));
        self
    }

    /// Header line: `[path:line] severity: message`, or `severity: message`
    /// when the diagnostic carries no location.
    pub fn header(&self, interner: &Interner) -> String {
        let path = interner.resolve(self.loc.path);
        if path.is_empty() || self.loc.line == 0 {
            format!("{}: {}", self.severity.label(), self.message)
        } else {
            format!(
                "[{}:{}] {}: {}",
                path,
                self.loc.line,
                self.severity.label(),
                self.message
            )
        }
    }

    /// Full rendering: header, optional source-line excerpt with a caret
    /// underline, then any notes.
    pub fn display_with_source(&self, interner: &Interner, source: Option<&str>) -> String {
        let mut result = self.header(interner);

        if let Some(source) = source {
            if self.loc.line != 0 && self.loc.span.start < source.len() {
                let (line_start, line_content) = line_of(source, self.loc.span.start);
                let col = self.loc.span.start - line_start;
                let len = (self.loc.span.end.saturating_sub(self.loc.span.start)).max(1);
                let len = len.min(line_content.len().saturating_sub(col).max(1));
                let underline = format!("{}{}", " ".repeat(col), "^".repeat(len));
                result.push_str(&format!(
                    "\n{}\n{}",
                    line_content,
                    Style::red(&underline)
                ));
            }
        }

        for (loc, note) in &self.notes {
            let path = interner.resolve(loc.path);
            if path.is_empty() || loc.line == 0 {
                result.push_str(&format!("\n{}: {}", Style::bold_cyan("info"), note));
            } else {
                result.push_str(&format!(
                    "\n[{}:{}] {}: {}",
                    path,
                    loc.line,
                    Style::bold_cyan("info"),
                    note
                ));
            }
        }

        result
    }
}

/// Print a non-fatal diagnostic immediately.
pub fn emit(interner: &Interner, diagnostic: &Diagnostic) {
    eprintln!("{}", diagnostic.header(interner));
}

fn line_of(source: &str, offset: usize) -> (usize, &str) {
    let line_start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = source[line_start..]
        .find('\n')
        .map(|off| line_start + off)
        .unwrap_or(source.len());
    (line_start, &source[line_start..line_end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Span;

    #[test]
    fn header_includes_path_and_line() {
        let mut interner = Interner::new();
        let path = interner.intern("foo.sunder");
        let loc = Loc::new(path, 3, Span::new(0, 1));
        let diagnostic = Diagnostic::error(loc, "invalid token");
        let header = diagnostic.header(&interner);
        assert!(header.contains("[foo.sunder:3]"), "{}", header);
        assert!(header.contains("invalid token"), "{}", header);
    }

    #[test]
    fn header_without_location_omits_brackets() {
        let interner = Interner::new();
        let diagnostic = Diagnostic::error(Loc::NONE, "missing environment variable");
        let header = diagnostic.header(&interner);
        assert!(!header.contains('['), "{}", header);
    }

    #[test]
    fn display_with_source_shows_line_and_caret() {
        let mut interner = Interner::new();
        let path = interner.intern("m.sunder");
        let source = "var foo: usize = 123u;\n";
        let offset = source.find("123u").unwrap();
        let loc = Loc::new(path, 1, Span::new(offset, offset + 4));
        let diagnostic = Diagnostic::error(loc, "unknown suffix");
        let display = diagnostic.display_with_source(&interner, Some(source));
        assert!(display.contains("var foo: usize = 123u;"), "{}", display);
        assert!(display.contains("^^^^"), "{}", display);
    }

    #[test]
    fn notes_render_after_primary_message() {
        let mut interner = Interner::new();
        let path = interner.intern("m.sunder");
        let loc = Loc::new(path, 1, Span::new(0, 1));
        let diagnostic = Diagnostic::error(loc, "circular dependency created by declaration of `A`")
            .note(Loc::NONE, "declaration of `A` (line 1) depends on `B` (line 2)");
        let display = diagnostic.display_with_source(&interner, None);
        assert!(display.contains("depends on"), "{}", display);
    }
}
