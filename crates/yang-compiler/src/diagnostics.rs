//! Compile-time diagnostics: collected messages with source-context
//! rendering via `annotate-snippets`.

use rowan::TextRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct RelatedInfo {
    pub range: TextRange,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DiagnosticMessage {
    pub severity: Severity,
    pub range: TextRange,
    pub message: String,
    pub related: Vec<RelatedInfo>,
}

impl DiagnosticMessage {
    fn error(range: TextRange, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            range,
            message: message.into(),
            related: Vec::new(),
        }
    }

    fn warning(range: TextRange, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            range,
            message: message.into(),
            related: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Collection of diagnostic messages from parsing and schema compilation.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<DiagnosticMessage>,
}

#[must_use = "diagnostic not emitted, call .emit()"]
pub struct DiagnosticBuilder<'a> {
    diagnostics: &'a mut Diagnostics,
    message: DiagnosticMessage,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, msg: impl Into<String>, range: TextRange) -> DiagnosticBuilder<'_> {
        DiagnosticBuilder {
            diagnostics: self,
            message: DiagnosticMessage::error(range, msg),
        }
    }

    pub fn warning(&mut self, msg: impl Into<String>, range: TextRange) -> DiagnosticBuilder<'_> {
        DiagnosticBuilder {
            diagnostics: self,
            message: DiagnosticMessage::warning(range, msg),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|d| d.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|d| d.is_error()).count()
    }

    pub fn messages(&self) -> &[DiagnosticMessage] {
        &self.messages
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.messages.extend(other.messages);
    }

    /// Render every message with `annotate-snippets`, one rendered snippet
    /// per line, joined by blank lines.
    pub fn render(&self, source: &str) -> String {
        use annotate_snippets::{Level, Renderer, Snippet};

        let renderer = Renderer::styled();
        let mut out = String::new();
        for msg in &self.messages {
            let level = match msg.severity {
                Severity::Error => Level::Error,
                Severity::Warning => Level::Warning,
            };
            let start: usize = msg.range.start().into();
            let end: usize = msg.range.end().into();
            let snippet = Snippet::source(source)
                .fold(true)
                .annotation(level.span(start..end).label(&msg.message));
            let message = level.title(&msg.message).snippet(snippet);
            out.push_str(&renderer.render(message).to_string());
            out.push('\n');
        }
        out
    }
}

impl DiagnosticBuilder<'_> {
    pub fn related_to(mut self, msg: impl Into<String>, range: TextRange) -> Self {
        self.message.related.push(RelatedInfo {
            range,
            message: msg.into(),
        });
        self
    }

    pub fn emit(self) {
        self.diagnostics.messages.push(self.message);
    }
}
