//! # loadscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types
//! and traits from the loadscope library. Import this module to get quick
//! access to the essential types for shadow-copied module loading.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all loadscope operations
pub use crate::Error;

/// The result type used throughout loadscope
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Loader facade, load contexts, and resolution
pub use crate::loader::{
    LoadContext, LoadedModule, ModuleAndLocation, ModuleLoader, ModuleResolver, SiblingResolver,
};

// ================================================================================================
// Shadow Copies
// ================================================================================================

/// Shadow-copy cache and its entries
pub use crate::shadow::{CachedModuleImage, ShadowCopy, ShadowCopyCache, ShadowDirectory};

// ================================================================================================
// Identities and Images
// ================================================================================================

/// Module identity and its components
pub use crate::identity::{ContentKind, ModuleIdentity, ModuleVersion};

/// Validated module images
pub use crate::image::ModuleImage;

// ================================================================================================
// Diagnostics
// ================================================================================================

/// Diagnostic accumulation
pub use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCategory, DiagnosticSeverity};
