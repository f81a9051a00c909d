//! Isolated contexts that modules are loaded into.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use crate::{
    diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity},
    identity::ModuleIdentity,
    image::ModuleImage,
    loader::{LoadedModule, LoaderState},
    Error, Result,
};

/// An isolated load context.
///
/// Modules in different contexts never observe each other except through the
/// loader's ambient registry. A context keeps every module loaded into it
/// alive until [`LoadContext::unload`]; the modules hold their context weakly,
/// so dropping the last external reference to an unloaded context releases
/// the whole group.
pub struct LoadContext {
    state: Arc<LoaderState>,
    load_directory: Option<PathBuf>,
    collectible: bool,
    loaded: Mutex<Vec<Arc<LoadedModule>>>,
    unloaded: AtomicBool,
}

impl LoadContext {
    pub(crate) fn new(
        state: Arc<LoaderState>,
        load_directory: Option<PathBuf>,
        collectible: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            state,
            load_directory,
            collectible,
            loaded: Mutex::new(Vec::new()),
            unloaded: AtomicBool::new(false),
        })
    }

    /// Directory used as the default probing hint for resolution, if any.
    #[must_use]
    pub fn load_directory(&self) -> Option<&Path> {
        self.load_directory.as_deref()
    }

    /// Whether this context supports unloading.
    #[must_use]
    pub fn is_collectible(&self) -> bool {
        self.collectible
    }

    /// Whether [`LoadContext::unload`] has run.
    #[must_use]
    pub fn is_unloaded(&self) -> bool {
        self.unloaded.load(Ordering::Acquire)
    }

    /// Snapshot of the modules currently loaded into this context.
    #[must_use]
    pub fn loaded_modules(&self) -> Vec<Arc<LoadedModule>> {
        match self.loaded.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Construct a module from an image and track it in this context.
    pub(crate) fn load_image(
        self: &Arc<Self>,
        image: Arc<ModuleImage>,
        identity: Option<ModuleIdentity>,
        location: Option<PathBuf>,
        debug_info: Option<Vec<u8>>,
    ) -> Result<Arc<LoadedModule>> {
        if self.is_unloaded() {
            return Err(Error::Disposed);
        }

        let module = Arc::new(LoadedModule::new(image, identity, location, debug_info, self));
        self.loaded
            .lock()
            .map_err(|_| Error::LockError)?
            .push(Arc::clone(&module));
        Ok(module)
    }

    /// Resolve `identity` to a loaded module.
    ///
    /// Lookup order is fixed: the loader's ambient registry first, then the
    /// host resolver with `base_dir` (falling back to this context's load
    /// directory) as the probing hint. A resolver-supplied path is loaded
    /// through the shadow-copy cache into this context and registered under
    /// the requested identity, so later requests anywhere in the loader hit
    /// the registry.
    pub(crate) fn resolve(
        self: &Arc<Self>,
        identity: &ModuleIdentity,
        base_dir: Option<&Path>,
    ) -> Result<Arc<LoadedModule>> {
        if self.is_unloaded() {
            return Err(Error::Disposed);
        }

        if let Some(existing) = self.state.registry.get(identity) {
            return Ok(Arc::clone(existing.value()));
        }

        let hint = base_dir.or(self.load_directory.as_deref());
        let resolved = self
            .state
            .resolver
            .as_ref()
            .and_then(|resolver| resolver.resolve(identity, hint));

        let Some(path) = resolved else {
            self.state.cache.diagnostics().add(Diagnostic::new(
                DiagnosticSeverity::Warning,
                DiagnosticCategory::Resolution,
                format!("Reference '{}' left unresolved", identity),
            ));
            return Err(Error::UnresolvedReference(identity.display_name()));
        };

        let entry = self.state.cache.get_or_create(&path)?;
        let module = self.load_image(entry.image(), Some(identity.clone()), Some(path), None)?;

        // First registration wins if two threads resolved the same
        // reference concurrently.
        let registered = self
            .state
            .registry
            .entry(identity.clone())
            .or_insert_with(|| Arc::clone(&module));
        Ok(Arc::clone(registered.value()))
    }

    /// Unload every module in this context.
    ///
    /// Fails with [`Error::NotSupported`] on a non-collectible context.
    /// Idempotent otherwise: the second and later calls do nothing. Modules
    /// the caller still holds remain readable; only the context's own
    /// references are dropped.
    pub fn unload(&self) -> Result<()> {
        if !self.collectible {
            return Err(Error::NotSupported);
        }

        if self.unloaded.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.loaded.lock().map_err(|_| Error::LockError)?.clear();
        Ok(())
    }
}

impl std::fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadContext")
            .field("load_directory", &self.load_directory)
            .field("collectible", &self.collectible)
            .field("unloaded", &self.is_unloaded())
            .finish()
    }
}
