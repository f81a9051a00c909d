//! A module loaded into an isolated context.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Weak},
};

use crate::{
    identity::ModuleIdentity,
    image::ModuleImage,
    loader::context::LoadContext,
    Error, Result,
};

/// A module image bound to the [`LoadContext`] it was loaded into.
///
/// Stream-loaded modules have neither identity nor location. Modules loaded
/// by a resolver carry the identity under which they were requested and the
/// path the resolver produced.
pub struct LoadedModule {
    identity: Option<ModuleIdentity>,
    location: Option<PathBuf>,
    image: Arc<ModuleImage>,
    debug_info: Option<Vec<u8>>,
    context: Weak<LoadContext>,
}

impl LoadedModule {
    pub(crate) fn new(
        image: Arc<ModuleImage>,
        identity: Option<ModuleIdentity>,
        location: Option<PathBuf>,
        debug_info: Option<Vec<u8>>,
        context: &Arc<LoadContext>,
    ) -> Self {
        Self {
            identity,
            location,
            image,
            debug_info,
            context: Arc::downgrade(context),
        }
    }

    /// Identity under which this module was resolved, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&ModuleIdentity> {
        self.identity.as_ref()
    }

    /// Path of the original file this module came from, if any.
    #[must_use]
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// The raw module image.
    #[must_use]
    pub fn image(&self) -> &Arc<ModuleImage> {
        &self.image
    }

    /// Debug information supplied alongside the image, if any.
    #[must_use]
    pub fn debug_info(&self) -> Option<&[u8]> {
        self.debug_info.as_deref()
    }

    /// The context this module was loaded into, `None` after it was dropped.
    #[must_use]
    pub fn context(&self) -> Option<Arc<LoadContext>> {
        self.context.upgrade()
    }

    /// Resolve a reference of this module to another loaded module.
    ///
    /// Resolution consults the loader's ambient registry first, then its
    /// resolver, passing this module's directory as the probing hint. A
    /// reference that neither source satisfies fails with
    /// [`Error::UnresolvedReference`] on this and every later attempt; the
    /// module itself stays loaded and usable.
    pub fn resolve_dependency(&self, identity: &ModuleIdentity) -> Result<Arc<LoadedModule>> {
        let context = self.context.upgrade().ok_or(Error::Disposed)?;
        let base_dir = self.location.as_deref().and_then(Path::parent);
        context.resolve(identity, base_dir)
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("identity", &self.identity)
            .field("location", &self.location)
            .field("image_len", &self.image.len())
            .field("has_debug_info", &self.debug_info.is_some())
            .finish()
    }
}
