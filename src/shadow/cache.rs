//! Idempotent per-path caching of shadow copies and parsed images.
//!
//! The cache guarantees the central invariant of the subsystem: **at most one
//! shadow copy and one parsed image per distinct on-disk path, for the
//! lifetime of the cache**. A second request for an already cached path
//! returns the existing entry without copying or re-parsing anything.
//!
//! # Concurrency
//!
//! Entries are keyed by canonicalized path in a [`DashMap`]. Each key owns a
//! dedicated mutex that serializes the check-copy-parse-insert step, so two
//! threads racing on the same path perform exactly one copy while requests
//! for different paths only contend on map-shard acquisition. The loser of a
//! same-path race blocks until the winner has inserted, then observes the
//! winner's entry.
//!
//! # Handle discipline
//!
//! Shadow-copy file handles are opened by the copy step and closed by the
//! cache as soon as the image (and documentation, when present) has been
//! fully read. The copy files themselves stay on disk for the cache's
//! lifetime and are removed, best effort, by [`ShadowCopyCache::dispose`].

use std::{
    fs,
    io::Read as _,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use dashmap::DashMap;

use crate::{
    diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCategory, DiagnosticSeverity},
    image::ModuleImage,
    shadow::{DocImage, ShadowCopy, ShadowDirectory},
    Error, Result,
};

/// A cached module: its shadow copy, parsed image, and optional documentation.
///
/// Owned exclusively by the [`ShadowCopyCache`]; callers receive shared
/// references. The entry never owns the original on-disk file.
#[derive(Debug)]
pub struct CachedModuleImage {
    shadow: ShadowCopy,
    image: Arc<ModuleImage>,
    documentation: Option<DocImage>,
}

impl CachedModuleImage {
    /// The shadow copy backing this entry.
    #[must_use]
    pub fn shadow(&self) -> &ShadowCopy {
        &self.shadow
    }

    /// Shared handle to the parsed in-memory image.
    #[must_use]
    pub fn image(&self) -> Arc<ModuleImage> {
        Arc::clone(&self.image)
    }

    /// Parsed documentation companion, if one existed and parsed cleanly.
    #[must_use]
    pub fn documentation(&self) -> Option<&DocImage> {
        self.documentation.as_ref()
    }

    /// Close the underlying file handle(s), keeping the entry and the copy
    /// files alive for reuse. Idempotent; the cache has usually done this
    /// already by the time a caller sees the entry.
    pub fn release_handles(&self) {
        self.shadow.release_handles();
    }
}

/// Per-path slot; the mutex serializes creation for one path.
type EntrySlot = Arc<Mutex<Option<Arc<CachedModuleImage>>>>;

/// Cache of shadow copies and parsed module images, keyed by source path.
///
/// # Examples
///
/// ```rust,no_run
/// use loadscope::shadow::ShadowCopyCache;
/// use std::path::Path;
///
/// let cache = ShadowCopyCache::new()?;
///
/// let first = cache.get_or_create(Path::new("plugin.dll"))?;
/// let second = cache.get_or_create(Path::new("plugin.dll"))?;
///
/// // Same entry, one copy performed
/// assert_eq!(cache.copy_count(), 1);
/// cache.dispose();
/// # Ok::<(), loadscope::Error>(())
/// ```
#[derive(Debug)]
pub struct ShadowCopyCache {
    directory: ShadowDirectory,
    entries: DashMap<PathBuf, EntrySlot>,
    copies: AtomicUsize,
    disposed: AtomicBool,
    diagnostics: Arc<DiagnosticBag>,
}

impl ShadowCopyCache {
    /// Create a cache whose scratch directory lives under the OS temp directory.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the scratch directory cannot be created.
    pub fn new() -> Result<ShadowCopyCache> {
        Ok(Self::with_directory(ShadowDirectory::new()?))
    }

    /// Create a cache whose scratch directory lives under `root`.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the scratch directory cannot be created.
    pub fn with_scratch_root(root: impl AsRef<Path>) -> Result<ShadowCopyCache> {
        Ok(Self::with_directory(ShadowDirectory::at_root(root)?))
    }

    fn with_directory(directory: ShadowDirectory) -> ShadowCopyCache {
        ShadowCopyCache {
            directory,
            entries: DashMap::new(),
            copies: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
            diagnostics: Arc::new(DiagnosticBag::new()),
        }
    }

    /// Location of the scratch directory copies are created in.
    #[must_use]
    pub fn scratch_root(&self) -> &Path {
        self.directory.root()
    }

    /// Diagnostics collected during cache operations (e.g. malformed
    /// documentation companions). Shared with the owning loader.
    #[must_use]
    pub fn diagnostics(&self) -> &Arc<DiagnosticBag> {
        &self.diagnostics
    }

    /// Number of shadow-copy operations performed since creation.
    #[must_use]
    pub fn copy_count(&self) -> usize {
        self.copies.load(Ordering::Relaxed)
    }

    /// Get the cached entry for `path`, creating it on first request.
    ///
    /// Idempotent by normalized absolute path: repeated calls return the same
    /// entry and perform no further copies. Safe to call concurrently; racing
    /// calls for one path are serialized and produce a single copy. A failed
    /// attempt leaves no entry behind, so a later call may try again.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the path cannot be resolved, read, or
    /// copied, a validation error if the copied bytes are not a module image,
    /// or [`Error::Disposed`] after [`ShadowCopyCache::dispose`].
    pub fn get_or_create(&self, path: &Path) -> Result<Arc<CachedModuleImage>> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }

        let key = fs::canonicalize(path)?;
        let slot = self.entries.entry(key.clone()).or_default().clone();

        let mut guard = slot.lock().map_err(|_| Error::LockError)?;
        if let Some(entry) = guard.as_ref() {
            return Ok(Arc::clone(entry));
        }

        // Disposal may have run between the entry check and taking the slot
        // lock; copying now would resurrect the purged scratch directory.
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }

        let entry = Arc::new(self.create_entry(path)?);
        *guard = Some(Arc::clone(&entry));

        // A dispose that started mid-copy has swept the map and the scratch
        // directory behind our back. The slot vanishing from the map means
        // dispose's clear has run (the map's shard locks order that check),
        // so this entry's files are ours to clean up; if the slot is still
        // present, dispose has not purged yet and will remove the files
        // itself.
        if self.disposed.load(Ordering::Acquire) || !self.entries.contains_key(&key) {
            entry.release_handles();
            *guard = None;
            drop(guard);
            self.directory.purge();
            return Err(Error::Disposed);
        }

        Ok(entry)
    }

    /// Copy, read, and parse: runs under the per-path lock.
    fn create_entry(&self, path: &Path) -> Result<CachedModuleImage> {
        let shadow = self.directory.copy_module(path)?;
        self.copies.fetch_add(1, Ordering::Relaxed);

        let image = shadow
            .primary()
            .with_handle(|file| ModuleImage::from_open_file(file))?;

        let documentation = match shadow.documentation() {
            Some(copy) => {
                let bytes = copy.with_handle(|file| {
                    let mut reader = file;
                    let mut bytes = Vec::new();
                    reader.read_to_end(&mut bytes)?;
                    Ok(bytes)
                })?;

                match DocImage::parse(&bytes) {
                    Ok(doc) => Some(doc),
                    Err(error) => {
                        self.diagnostics.add(Diagnostic::new(
                            DiagnosticSeverity::Warning,
                            DiagnosticCategory::Documentation,
                            format!(
                                "Ignoring malformed documentation for {}: {}",
                                path.display(),
                                error
                            ),
                        ));
                        None
                    }
                }
            }
            None => None,
        };

        // Image and documentation are fully in memory now
        shadow.release_handles();

        Ok(CachedModuleImage {
            shadow,
            image: Arc::new(image),
            documentation,
        })
    }

    /// Release all handles, evict all entries, and remove the scratch
    /// directory (best effort). Idempotent; entries already handed out stay
    /// usable because their images are fully in memory.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        for slot in self.entries.iter() {
            if let Ok(guard) = slot.value().lock() {
                if let Some(entry) = guard.as_ref() {
                    entry.release_handles();
                }
            }
        }

        self.entries.clear();
        self.directory.purge();
    }
}

impl Drop for ShadowCopyCache {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_module(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&crate::test::minimal_image()).unwrap();
        path
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let source = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let module = write_module(source.path(), "plugin.dll");

        let cache = ShadowCopyCache::with_scratch_root(scratch.path()).unwrap();

        let first = cache.get_or_create(&module).unwrap();
        let second = cache.get_or_create(&module).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first.image(), &second.image()));
        assert_eq!(cache.copy_count(), 1);
    }

    #[test]
    fn test_handles_released_after_read() {
        let source = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let module = write_module(source.path(), "plugin.dll");

        let cache = ShadowCopyCache::with_scratch_root(scratch.path()).unwrap();
        let entry = cache.get_or_create(&module).unwrap();

        assert!(!entry.shadow().primary().has_open_handle());
        // Releasing again is a no-op
        entry.release_handles();
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let scratch = tempfile::tempdir().unwrap();
        let cache = ShadowCopyCache::with_scratch_root(scratch.path()).unwrap();

        let result = cache.get_or_create(Path::new("/nonexistent/plugin.dll"));
        assert!(matches!(result, Err(Error::FileError(_))));
        assert_eq!(cache.copy_count(), 0);
    }

    #[test]
    fn test_invalid_image_leaves_no_entry() {
        let source = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let path = source.path().join("broken.dll");
        fs::write(&path, b"not a module").unwrap();

        let cache = ShadowCopyCache::with_scratch_root(scratch.path()).unwrap();
        assert!(cache.get_or_create(&path).is_err());

        // A later call attempts a fresh copy rather than returning a poisoned entry
        assert!(cache.get_or_create(&path).is_err());
        assert_eq!(cache.copy_count(), 2);
    }

    #[test]
    fn test_documentation_companion_is_parsed() {
        let source = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let module = write_module(source.path(), "plugin.dll");

        fs::write(
            source.path().join("plugin.xml"),
            br#"<doc><assembly><name>plugin</name></assembly>
                <members><member name="T:Widget"><summary>w</summary></member></members></doc>"#,
        )
        .unwrap();

        let cache = ShadowCopyCache::with_scratch_root(scratch.path()).unwrap();
        let entry = cache.get_or_create(&module).unwrap();

        let docs = entry.documentation().unwrap();
        assert_eq!(docs.module_name(), Some("plugin"));
        assert_eq!(docs.member("T:Widget"), Some("w"));
    }

    #[test]
    fn test_malformed_documentation_degrades_to_warning() {
        let source = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let module = write_module(source.path(), "plugin.dll");

        fs::write(source.path().join("plugin.xml"), b"<doc><members></doc>").unwrap();

        let cache = ShadowCopyCache::with_scratch_root(scratch.path()).unwrap();
        let entry = cache.get_or_create(&module).unwrap();

        assert!(entry.documentation().is_none());
        assert!(!cache.diagnostics().is_empty_without_resolution());
        assert!(!cache.diagnostics().has_any_errors());
    }

    #[test]
    fn test_dispose_racing_loads_leaves_no_scratch() {
        let source = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let module = write_module(source.path(), "plugin.dll");

        let cache = Arc::new(ShadowCopyCache::with_scratch_root(scratch.path()).unwrap());
        let root = cache.scratch_root().to_path_buf();

        let mut workers = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let module = module.clone();
            workers.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    // Succeeds or reports Disposed; never resurrects scratch
                    let _ = cache.get_or_create(&module);
                }
            }));
        }

        cache.dispose();
        for worker in workers {
            worker.join().unwrap();
        }

        assert!(!root.exists());
        assert!(matches!(cache.get_or_create(&module), Err(Error::Disposed)));
    }

    #[test]
    fn test_dispose_is_idempotent_and_purges() {
        let source = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let module = write_module(source.path(), "plugin.dll");

        let cache = ShadowCopyCache::with_scratch_root(scratch.path()).unwrap();
        let entry = cache.get_or_create(&module).unwrap();
        let scratch_root = cache.scratch_root().to_path_buf();

        cache.dispose();
        assert!(!scratch_root.exists());

        // Second dispose is a no-op, the entry's in-memory image stays readable
        cache.dispose();
        assert_eq!(&entry.image().data()[0..2], b"MZ");

        assert!(matches!(cache.get_or_create(&module), Err(Error::Disposed)));
    }
}
