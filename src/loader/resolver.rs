//! Host-pluggable resolution of module references to file paths.

use std::path::{Path, PathBuf};

use crate::identity::ModuleIdentity;

/// Maps a module identity to a file path on disk.
///
/// A loader consults its resolver only after the ambient registry failed to
/// satisfy a reference. Returning `None` leaves the reference unresolved;
/// the referencing module stays loaded and every later attempt to walk that
/// reference fails with [`crate::Error::UnresolvedReference`].
///
/// Implementations must be safe to call from multiple threads at once.
pub trait ModuleResolver: Send + Sync {
    /// Resolve `identity` to the path of a module file.
    ///
    /// `base_dir` is the directory of the referencing module when known,
    /// given so resolvers can probe for siblings before searching elsewhere.
    fn resolve(&self, identity: &ModuleIdentity, base_dir: Option<&Path>) -> Option<PathBuf>;
}

/// Resolver probing the referencing module's directory for a sibling file.
///
/// Looks for `{simple_name}.dll` next to the referencing module and returns
/// it if present. Useful as a default policy for build outputs where
/// dependencies land in the same directory.
#[derive(Debug, Default)]
pub struct SiblingResolver;

impl ModuleResolver for SiblingResolver {
    fn resolve(&self, identity: &ModuleIdentity, base_dir: Option<&Path>) -> Option<PathBuf> {
        let dir = base_dir?;
        let candidate = dir.join(format!("{}.dll", identity.simple_name()));
        candidate.is_file().then_some(candidate)
    }
}
