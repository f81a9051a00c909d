//! Module loading with shadow-copy isolation.
//!
//! The [`ModuleLoader`] is the facade over the whole subsystem: it owns the
//! shadow-copy cache, the ambient registry of identity-to-module mappings,
//! and the load contexts that module groups live in.
//!
//! # Architecture
//!
//! Every file load goes through the [`crate::shadow::ShadowCopyCache`], so the
//! original file never stays pinned. Stream loads share one collectible
//! context; each path load gets a fresh context whose load directory is the
//! file's parent, so resolution can probe next to the loaded file.
//!
//! Dependency resolution is two-stage: the ambient registry (fed by
//! [`ModuleLoader::register_dependency`] and by earlier resolver hits) is
//! consulted first, then the host's [`ModuleResolver`]. A reference neither
//! satisfies stays loaded but fails with
//! [`crate::Error::UnresolvedReference`] on every use.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use loadscope::loader::ModuleLoader;
//! use std::path::Path;
//!
//! # fn main() -> loadscope::Result<()> {
//! let loader = ModuleLoader::new()?;
//!
//! let loaded = loader.load_from_path(Path::new("build/mylib.dll"))?;
//! println!("loaded from {}", loaded.location.display());
//!
//! // build/mylib.dll can now be rebuilt while the module stays usable.
//! # Ok(())
//! # }
//! ```

mod context;
mod module;
mod resolver;

pub use context::LoadContext;
pub use module::LoadedModule;
pub use resolver::{ModuleResolver, SiblingResolver};

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use dashmap::DashMap;

use crate::{
    diagnostics::DiagnosticBag,
    identity::ModuleIdentity,
    image::ModuleImage,
    shadow::ShadowCopyCache,
    Error, Result,
};

/// State shared between the loader and all of its contexts.
pub(crate) struct LoaderState {
    pub(crate) cache: ShadowCopyCache,
    pub(crate) resolver: Option<Arc<dyn ModuleResolver>>,
    pub(crate) registry: DashMap<ModuleIdentity, Arc<LoadedModule>>,
}

/// A loaded module together with the path it was actually read from.
///
/// Returned by [`ModuleLoader::load_from_path`]. The location is the shadow
/// copy the image bytes came from, not the original path the caller passed.
#[derive(Debug)]
pub struct ModuleAndLocation {
    /// The loaded module.
    pub module: Arc<LoadedModule>,

    /// Path the image was read from.
    pub location: PathBuf,

    /// Whether the module came from a machine-wide cache.
    ///
    /// Always `false`: this loader reads every module from its own shadow
    /// copies and never consults a machine-wide store.
    pub from_global_cache: bool,
}

/// Loads module images from streams and paths into isolated contexts.
///
/// Dropping the loader disposes it: contexts are unloaded, shadow-copy
/// handles released, and the scratch directory purged.
pub struct ModuleLoader {
    state: Arc<LoaderState>,
    stream_context: Arc<LoadContext>,
    path_contexts: Mutex<Vec<Arc<LoadContext>>>,
    disposed: AtomicBool,
}

impl ModuleLoader {
    /// Create a loader with no resolver.
    ///
    /// References not covered by [`ModuleLoader::register_dependency`] will
    /// stay unresolved.
    pub fn new() -> Result<Self> {
        Self::build(None)
    }

    /// Create a loader that consults `resolver` for unregistered references.
    pub fn with_resolver(resolver: Arc<dyn ModuleResolver>) -> Result<Self> {
        Self::build(Some(resolver))
    }

    fn build(resolver: Option<Arc<dyn ModuleResolver>>) -> Result<Self> {
        let state = Arc::new(LoaderState {
            cache: ShadowCopyCache::new()?,
            resolver,
            registry: DashMap::new(),
        });
        let stream_context = LoadContext::new(Arc::clone(&state), None, true);
        Ok(Self {
            state,
            stream_context,
            path_contexts: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        })
    }

    /// Load a module from in-memory bytes.
    ///
    /// The image is validated before anything else happens; invalid bytes
    /// fail without creating a module. All stream loads share one context,
    /// so they can resolve references to each other through the registry.
    pub fn load_from_stream(
        &self,
        image: Vec<u8>,
        debug_info: Option<Vec<u8>>,
    ) -> Result<Arc<LoadedModule>> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }

        let image = Arc::new(ModuleImage::from_vec(image)?);
        self.stream_context.load_image(image, None, None, debug_info)
    }

    /// Load a module from a file through the shadow-copy cache.
    ///
    /// The original file is readable, writable, and deletable the moment
    /// this returns. Each call gets a fresh collectible context whose load
    /// directory is the file's parent.
    pub fn load_from_path(&self, path: &Path) -> Result<ModuleAndLocation> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }

        let entry = self.state.cache.get_or_create(path)?;
        let location = entry.shadow().primary().copy_path().to_path_buf();

        let load_directory = path.parent().map(Path::to_path_buf);
        let context = LoadContext::new(Arc::clone(&self.state), load_directory, true);
        let module = context.load_image(entry.image(), None, Some(path.to_path_buf()), None)?;

        self.path_contexts
            .lock()
            .map_err(|_| Error::LockError)?
            .push(context);

        Ok(ModuleAndLocation {
            module,
            location,
            from_global_cache: false,
        })
    }

    /// Register an already-loaded module under an identity.
    ///
    /// Registered modules win over the resolver: every later resolution of
    /// `identity`, from any context, returns `module` without invoking the
    /// resolver. Re-registering an identity replaces the previous mapping.
    pub fn register_dependency(&self, identity: ModuleIdentity, module: Arc<LoadedModule>) {
        self.state.registry.insert(identity, module);
    }

    /// Diagnostics accumulated across all loads.
    #[must_use]
    pub fn diagnostics(&self) -> &Arc<DiagnosticBag> {
        self.state.cache.diagnostics()
    }

    /// Number of shadow copies created so far.
    #[must_use]
    pub fn copy_count(&self) -> usize {
        self.state.cache.copy_count()
    }

    /// Whether [`ModuleLoader::dispose`] has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Release everything the loader holds.
    ///
    /// Unloads all contexts, clears the registry, and disposes the
    /// shadow-copy cache, purging its scratch directory. Idempotent; later
    /// load calls fail with [`Error::Disposed`].
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let _ = self.stream_context.unload();
        if let Ok(mut contexts) = self.path_contexts.lock() {
            for context in contexts.drain(..) {
                let _ = context.unload();
            }
        }
        self.state.registry.clear();
        self.state.cache.dispose();
    }
}

impl Drop for ModuleLoader {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("disposed", &self.is_disposed())
            .field("registered", &self.state.registry.len())
            .finish()
    }
}
