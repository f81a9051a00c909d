//! Thread-safe accumulation of loader diagnostics.
//!
//! This module provides the diagnostic collaborator consumed by the loading
//! subsystem: an append-only bag that many worker threads can add to without
//! coordination, with severities that may be computed lazily and a dedicated
//! suppression level that hides entries from consumers.
//!
//! # Architecture
//!
//! The [`DiagnosticBag`] uses `boxcar::Vec` for lock-free append operations,
//! so diagnostics can be collected from parallel load operations without
//! synchronization overhead. Adding concurrently from multiple threads is
//! supported; adding concurrently with [`DiagnosticBag::clear`] or
//! [`DiagnosticBag::drain`] is not, which the API enforces by taking those
//! two by `&mut self`.
//!
//! # Lazy severity
//!
//! A diagnostic's severity is either known at construction or computed by a
//! thunk the first time it is needed. Resolution happens at most once, forced
//! by [`Diagnostic::severity`], [`DiagnosticBag::has_any_errors`], and
//! [`DiagnosticBag::drain`]. The [`DiagnosticSeverity::Void`] level marks
//! suppressed diagnostics: they are filtered out of every consumer-facing
//! enumeration but remain visible to
//! [`DiagnosticBag::iter_without_resolution`].
//!
//! # Usage Examples
//!
//! ```rust
//! use loadscope::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCategory, DiagnosticSeverity};
//!
//! let bag = DiagnosticBag::new();
//! assert!(!bag.has_any_errors());
//!
//! bag.add(Diagnostic::new(
//!     DiagnosticSeverity::Warning,
//!     DiagnosticCategory::Resolution,
//!     "Reference 'Lib, Version=1.0.0.0' left unresolved",
//! ));
//! assert!(!bag.has_any_errors());
//!
//! bag.add(Diagnostic::new(
//!     DiagnosticSeverity::Error,
//!     DiagnosticCategory::Image,
//!     "Optional header magic unknown",
//! ));
//! assert!(bag.has_any_errors());
//! ```

use std::{
    fmt::{self, Write as _},
    sync::{Arc, OnceLock},
};

use crate::pool::ObjectPool;

/// Resolved severity level of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    /// Suppressed diagnostic.
    ///
    /// Void entries stay in the bag but are filtered from every
    /// consumer-facing enumeration.
    Void,

    /// Informational message, not indicating a problem.
    Info,

    /// Warning about a potentially problematic load.
    ///
    /// The load continues; some data may be missing or replaced with
    /// placeholders (e.g. an unparseable documentation companion).
    Warning,

    /// Error indicating a failed operation.
    Error,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Void => write!(f, "VOID"),
            DiagnosticSeverity::Info => write!(f, "INFO"),
            DiagnosticSeverity::Warning => write!(f, "WARN"),
            DiagnosticSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// Category indicating the source of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    /// Issues during shadow-copy creation or cleanup.
    ShadowCopy,

    /// Issues with module image bytes.
    Image,

    /// Issues during dependency resolution.
    Resolution,

    /// Issues with documentation companion files.
    Documentation,

    /// General loading issues not fitting other categories.
    General,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCategory::ShadowCopy => write!(f, "ShadowCopy"),
            DiagnosticCategory::Image => write!(f, "Image"),
            DiagnosticCategory::Resolution => write!(f, "Resolution"),
            DiagnosticCategory::Documentation => write!(f, "Documentation"),
            DiagnosticCategory::General => write!(f, "General"),
        }
    }
}

/// Thunk producing a severity on first demand.
type SeverityThunk = Arc<dyn Fn() -> DiagnosticSeverity + Send + Sync>;

/// A single diagnostic entry.
///
/// The severity is resolved at most once: eagerly for entries built with
/// [`Diagnostic::new`], on first access for entries built with
/// [`Diagnostic::lazy`].
#[derive(Clone)]
pub struct Diagnostic {
    resolved: OnceLock<DiagnosticSeverity>,
    thunk: Option<SeverityThunk>,
    category: DiagnosticCategory,
    message: String,
}

impl Diagnostic {
    /// Create a diagnostic with a known severity.
    pub fn new(
        severity: DiagnosticSeverity,
        category: DiagnosticCategory,
        message: impl Into<String>,
    ) -> Self {
        let resolved = OnceLock::new();
        let _ = resolved.set(severity);
        Self {
            resolved,
            thunk: None,
            category,
            message: message.into(),
        }
    }

    /// Create a diagnostic whose severity is computed on first access.
    ///
    /// The thunk runs at most once, forced by [`Diagnostic::severity`]; until
    /// then [`Diagnostic::peek_severity`] returns `None`.
    pub fn lazy(
        category: DiagnosticCategory,
        message: impl Into<String>,
        thunk: impl Fn() -> DiagnosticSeverity + Send + Sync + 'static,
    ) -> Self {
        Self {
            resolved: OnceLock::new(),
            thunk: Some(Arc::new(thunk)),
            category,
            message: message.into(),
        }
    }

    /// The severity, forcing resolution if it is still pending.
    pub fn severity(&self) -> DiagnosticSeverity {
        *self.resolved.get_or_init(|| {
            self.thunk
                .as_ref()
                .map_or(DiagnosticSeverity::Void, |thunk| thunk())
        })
    }

    /// The severity if already resolved, without forcing resolution.
    #[must_use]
    pub fn peek_severity(&self) -> Option<DiagnosticSeverity> {
        self.resolved.get().copied()
    }

    /// Category indicating the source of this diagnostic.
    #[must_use]
    pub fn category(&self) -> DiagnosticCategory {
        self.category
    }

    /// Human-readable description of the issue.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostic")
            .field("severity", &self.resolved.get())
            .field("category", &self.category)
            .field("message", &self.message)
            .finish()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display never forces resolution
        match self.peek_severity() {
            Some(severity) => write!(f, "[{}]", severity)?,
            None => write!(f, "[UNRESOLVED]")?,
        }
        write!(f, " {}: {}", self.category, self.message)
    }
}

/// Append-only bag of diagnostics.
///
/// Insertion order is not guaranteed to be preserved by any enumeration.
/// Concurrent [`DiagnosticBag::add`] from multiple threads is supported;
/// concurrent `add` racing [`DiagnosticBag::clear`] or
/// [`DiagnosticBag::drain`] is forbidden, which the `&mut self` receivers
/// enforce at compile time.
///
/// A freshly created bag holds no backing storage; `boxcar::Vec` allocates
/// its first bucket on first push.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    entries: boxcar::Vec<Diagnostic>,
}

/// Pool of recycled bags; incidental plumbing, see [`crate::pool`].
static BAG_POOL: ObjectPool<DiagnosticBag> = ObjectPool::new(DiagnosticBag::new, 128);

impl DiagnosticBag {
    /// Create a new empty bag. Allocation-free until the first `add`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: boxcar::Vec::new(),
        }
    }

    /// Take a recycled bag from the pool, or a fresh one if none is free.
    #[must_use]
    pub fn acquire() -> Self {
        BAG_POOL.acquire()
    }

    /// Clear this bag and return it to the pool.
    pub fn free(mut self) {
        self.clear();
        BAG_POOL.release(self);
    }

    /// Add a diagnostic to the bag.
    pub fn add(&self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Add multiple diagnostics to the bag.
    pub fn add_range(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.entries.push(diagnostic);
        }
    }

    /// Copy every entry of another bag into this one, resolved or not.
    pub fn add_bag(&self, other: &DiagnosticBag) {
        for (_, diagnostic) in other.entries.iter() {
            self.entries.push(diagnostic.clone());
        }
    }

    /// True if the bag holds no entries at all, void entries included.
    ///
    /// Exists for short-circuiting; never forces severity resolution.
    #[must_use]
    pub fn is_empty_without_resolution(&self) -> bool {
        self.entries.count() == 0
    }

    /// Number of entries, void entries included. Never forces resolution.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// True if any entry resolves to [`DiagnosticSeverity::Error`].
    ///
    /// Returns `false` on a fresh bag without touching storage. Forces
    /// resolution of every lazily-severitied entry.
    #[must_use]
    pub fn has_any_errors(&self) -> bool {
        if self.is_empty_without_resolution() {
            return false;
        }

        self.entries
            .iter()
            .any(|(_, d)| d.severity() == DiagnosticSeverity::Error)
    }

    /// Consumer-facing enumeration: forces resolution and filters void
    /// entries.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .map(|(_, d)| d)
            .filter(|d| d.severity() != DiagnosticSeverity::Void)
    }

    /// Internal-facing enumeration: every entry, no resolution forced.
    pub fn iter_without_resolution(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, d)| d)
    }

    /// Move all entries out of the bag, forcing resolution and dropping void
    /// entries. The bag is empty afterwards and remains usable.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        let entries = std::mem::replace(&mut self.entries, boxcar::Vec::new());
        entries
            .into_iter()
            .filter(|d| d.severity() != DiagnosticSeverity::Void)
            .collect()
    }

    /// Discard all entries.
    pub fn clear(&mut self) {
        self.entries = boxcar::Vec::new();
    }
}

impl fmt::Display for DiagnosticBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty_without_resolution() {
            return write!(f, "<no diagnostics>");
        }

        let mut output = String::new();
        for (_, diagnostic) in self.entries.iter() {
            let _ = writeln!(output, "{diagnostic}");
        }
        write!(f, "{}", output)
    }
}
