//! Diagnostics reported by editing operations.
//!
//! Editing operations never write to a log destination. Conditions that are resolved by a
//! documented default rather than an error (an exception handler dropped because it covers
//! code that was not copied, a member renamed to avoid a collision, a stack map table that
//! had to be discarded) are reported to a shared [`Diagnostics`] sink instead, which the
//! invoking pass can inspect, filter and print.
//!
//! # Key Components
//!
//! - [`Diagnostics`] - Thread-safe container for diagnostic entries
//! - [`Diagnostic`] - Individual entry with severity, category and location context
//! - [`DiagnosticSeverity`] - Severity level (Info, Warning, Error)
//! - [`DiagnosticCategory`] - The editing component that reported the entry
//!
//! # Usage Examples
//!
//! ```rust
//! use classforge::diagnostics::{DiagnosticCategory, Diagnostics};
//! use std::sync::Arc;
//!
//! let diagnostics = Arc::new(Diagnostics::new());
//!
//! diagnostics.warning(
//!     DiagnosticCategory::ExceptionTable,
//!     "Dropped handler [4, 12) -> 20: range not covered by the fragment",
//! );
//!
//! assert!(diagnostics.has_warnings());
//! for entry in diagnostics.by_category(DiagnosticCategory::ExceptionTable) {
//!     println!("{entry}");
//! }
//! ```
//!
//! # Thread Safety
//!
//! [`Diagnostics`] uses `boxcar::Vec` internally, which supports lock-free concurrent
//! appends. Passes that process classes in parallel can share one `Arc<Diagnostics>`.

use std::fmt::{self, Write};

/// Severity level of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticSeverity {
    /// Informational message, not indicating a problem.
    ///
    /// Used for expected losses such as discarded stack map frames.
    Info,

    /// A policy decision the invoking pass may want to review.
    ///
    /// The operation completed, but content was dropped or renamed.
    Warning,

    /// An operation failed and its error was recorded for later review.
    Error,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Info => write!(f, "INFO"),
            DiagnosticSeverity::Warning => write!(f, "WARN"),
            DiagnosticSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// The component or concern a diagnostic originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum DiagnosticCategory {
    /// Constant pool editing and transplanting.
    ConstantPool,

    /// Instruction stream composition.
    ///
    /// Examples: discarded stack map tables, dropped line numbers.
    Code,

    /// Exception table translation.
    ///
    /// Examples: handlers whose range falls outside a copied fragment.
    ExceptionTable,

    /// Member copying and renaming.
    ///
    /// Examples: attributes that could not be copied.
    Member,

    /// Name collisions and their resolution.
    Naming,

    /// Resolved reference population.
    Linking,

    /// Invariant checks.
    Validation,

    /// Anything not fitting another category.
    General,
}

/// A single diagnostic entry with context information.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level of this diagnostic.
    pub severity: DiagnosticSeverity,

    /// Category indicating the source of this diagnostic.
    pub category: DiagnosticCategory,

    /// Human-readable description of the issue.
    pub message: String,

    /// Optional class the diagnostic concerns.
    pub class: Option<String>,

    /// Optional code offset where the issue was found.
    pub offset: Option<u32>,

    /// Optional constant pool index related to the issue.
    pub index: Option<u16>,
}

impl Diagnostic {
    /// Creates a new diagnostic entry.
    pub fn new(
        severity: DiagnosticSeverity,
        category: DiagnosticCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            class: None,
            offset: None,
            index: None,
        }
    }

    /// Adds the name of the class concerned.
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Adds code offset information to the diagnostic.
    #[must_use]
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Adds constant pool index information to the diagnostic.
    #[must_use]
    pub fn with_index(mut self, index: u16) -> Self {
        self.index = Some(index);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.category, self.message)?;

        if let Some(class) = &self.class {
            write!(f, " (class: {class})")?;
        }

        if let Some(offset) = self.offset {
            write!(f, " (offset: {offset})")?;
        }

        if let Some(index) = self.index {
            write!(f, " (constant: #{index})")?;
        }

        Ok(())
    }
}

/// Thread-safe container for collecting diagnostic entries.
#[derive(Debug)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Creates a new empty diagnostics container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: boxcar::Vec::new(),
        }
    }

    /// Adds an informational diagnostic.
    pub fn info(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(DiagnosticSeverity::Info, category, message));
    }

    /// Adds a warning diagnostic.
    pub fn warning(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Warning,
            category,
            message,
        ));
    }

    /// Adds an error diagnostic.
    pub fn error(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Error,
            category,
            message,
        ));
    }

    /// Adds a diagnostic entry directly.
    ///
    /// Use this for diagnostics that carry class, offset or constant context.
    pub fn push(&self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Returns true if any diagnostics have been collected.
    pub fn has_any(&self) -> bool {
        self.entries.count() > 0
    }

    /// Returns true if any error-level diagnostics have been collected.
    pub fn has_errors(&self) -> bool {
        self.iter().any(|d| d.severity == DiagnosticSeverity::Error)
    }

    /// Returns true if any warning-level diagnostics have been collected.
    pub fn has_warnings(&self) -> bool {
        self.iter().any(|d| d.severity == DiagnosticSeverity::Warning)
    }

    /// Returns the total number of diagnostics.
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Returns the number of diagnostics of the given severity.
    pub fn count_of(&self, severity: DiagnosticSeverity) -> usize {
        self.iter().filter(|d| d.severity == severity).count()
    }

    /// Returns an iterator over all diagnostics in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, d)| d)
    }

    /// Returns all warnings.
    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.with_severity(DiagnosticSeverity::Warning)
    }

    /// Returns all diagnostics of the given severity.
    pub fn with_severity(&self, severity: DiagnosticSeverity) -> Vec<&Diagnostic> {
        self.iter().filter(|d| d.severity == severity).collect()
    }

    /// Returns diagnostics filtered by category.
    pub fn by_category(&self, category: DiagnosticCategory) -> Vec<&Diagnostic> {
        self.iter().filter(|d| d.category == category).collect()
    }

    /// Formats a summary of all diagnostics for display.
    pub fn summary(&self) -> String {
        let mut output = String::new();

        let error_count = self.count_of(DiagnosticSeverity::Error);
        let warning_count = self.count_of(DiagnosticSeverity::Warning);
        let info_count = self.count_of(DiagnosticSeverity::Info);

        let _ = writeln!(
            output,
            "Diagnostics: {error_count} error(s), {warning_count} warning(s), {info_count} info(s)"
        );

        for (title, severity) in [
            ("Errors", DiagnosticSeverity::Error),
            ("Warnings", DiagnosticSeverity::Warning),
        ] {
            let entries = self.with_severity(severity);
            if !entries.is_empty() {
                let _ = writeln!(output, "\n{title}:");
                for diag in entries {
                    let _ = writeln!(output, "  {diag}");
                }
            }
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_diagnostic_with_context() {
        let diag = Diagnostic::new(
            DiagnosticSeverity::Warning,
            DiagnosticCategory::ExceptionTable,
            "Dropped handler",
        )
        .with_class("demo/Target")
        .with_offset(12)
        .with_index(7);

        assert_eq!(diag.class.as_deref(), Some("demo/Target"));
        assert_eq!(diag.offset, Some(12));
        assert_eq!(diag.index, Some(7));

        let display = diag.to_string();
        assert!(display.contains("WARN"));
        assert!(display.contains("ExceptionTable"));
        assert!(display.contains("offset: 12"));
        assert!(display.contains("#7"));
    }

    #[test]
    fn test_diagnostics_counts() {
        let diagnostics = Diagnostics::new();

        diagnostics.info(DiagnosticCategory::Code, "StackMapTable discarded");
        diagnostics.warning(DiagnosticCategory::Naming, "Renamed value to value$1");
        diagnostics.error(DiagnosticCategory::Code, "Unencodable branch");

        assert_eq!(diagnostics.count(), 3);
        assert_eq!(diagnostics.count_of(DiagnosticSeverity::Error), 1);
        assert_eq!(diagnostics.count_of(DiagnosticSeverity::Warning), 1);
        assert_eq!(diagnostics.count_of(DiagnosticSeverity::Info), 1);
        assert!(diagnostics.has_errors());
        assert!(diagnostics.has_warnings());
        assert_eq!(diagnostics.by_category(DiagnosticCategory::Code).len(), 2);

        let summary = diagnostics.summary();
        assert!(summary.contains("1 error(s), 1 warning(s), 1 info(s)"));
        assert!(summary.contains("Renamed value to value$1"));
    }

    #[test]
    fn test_diagnostics_thread_safety() {
        let diagnostics = Arc::new(Diagnostics::new());
        let mut handles = vec![];

        for i in 0..8 {
            let diag_clone = Arc::clone(&diagnostics);
            handles.push(thread::spawn(move || {
                diag_clone.warning(DiagnosticCategory::Member, format!("Copy {i} renamed"));
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(diagnostics.count(), 8);
    }
}
