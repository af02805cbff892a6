//! Diagnostic types and message lookup for the binding resolver.
//!
//! The message table lives in `data.rs`. Templates use `{0}`, `{1}`, ...
//! placeholders that are filled by [`format_message`].

use serde::Serialize;

mod data;
pub use data::{DIAGNOSTIC_MESSAGES, diagnostic_codes};

// =============================================================================
// Diagnostic Types
// =============================================================================

/// Diagnostic category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticCategory {
    Warning = 0,
    Error = 1,
    Suggestion = 2,
    Message = 3,
}

/// Related information for a diagnostic (a candidate origin, a chain hop).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiagnosticRelatedInformation {
    /// Origin of the declaration or request this entry points at.
    pub origin: String,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
}

/// A resolution diagnostic with optional related information.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Origin of the failing request or declaration (fully qualified name,
    /// or `"unknown origin"`).
    pub origin: String,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_information: Vec<DiagnosticRelatedInformation>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    #[must_use]
    pub const fn error(origin: String, message: String, code: u32) -> Self {
        Self {
            origin,
            message_text: message,
            category: DiagnosticCategory::Error,
            code,
            related_information: Vec::new(),
        }
    }

    /// Add related information to this diagnostic.
    #[must_use]
    pub fn with_related(mut self, origin: String, message: String) -> Self {
        self.related_information.push(DiagnosticRelatedInformation {
            origin,
            message_text: message,
            category: DiagnosticCategory::Message,
            code: 0,
        });
        self
    }

    /// Render the diagnostic the way a human-facing reporter prints it:
    /// the main message followed by one indented line per related entry.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("error G{}: {}", self.code, self.message_text);
        for related in &self.related_information {
            out.push_str("\n    ");
            out.push_str(&related.message_text);
            if !related.origin.is_empty() {
                out.push_str(" (");
                out.push_str(&related.origin);
                out.push(')');
            }
        }
        out
    }
}

/// Format a diagnostic message by replacing {0}, {1}, etc. with arguments.
#[must_use]
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

/// A diagnostic message definition with code, category, and message template.
#[derive(Clone, Copy, Debug)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub category: DiagnosticCategory,
    pub message: &'static str,
}

/// Look up a diagnostic message definition by code.
#[must_use]
pub fn get_diagnostic_message(code: u32) -> Option<&'static DiagnosticMessage> {
    DIAGNOSTIC_MESSAGES.iter().find(|m| m.code == code)
}

/// Get the message template for a diagnostic code.
#[must_use]
pub fn get_message_template(code: u32) -> Option<&'static str> {
    get_diagnostic_message(code).map(|m| m.message)
}

/// Format the message registered for `code`, or an empty string for an
/// unknown code.
#[must_use]
pub fn format_code(code: u32, args: &[&str]) -> String {
    get_message_template(code)
        .map(|template| format_message(template, args))
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "../../tests/diagnostics_tests.rs"]
mod tests;
