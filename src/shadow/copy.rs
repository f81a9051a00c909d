//! Shadow-copy creation and file-handle ownership.
//!
//! A shadow copy is a private, byte-identical duplicate of an on-disk module
//! made in a scratch location so the original file is never locked by the
//! loader and can be replaced or deleted by the host's environment while the
//! loaded image stays intact. If a documentation companion (`.xml` next to the
//! module, same base name) exists, it is copied under the same rules; its
//! absence is not an error.
//!
//! Copy files are named `{scratch root}/{seq}/{file name}` where the scratch
//! root is unique per [`ShadowDirectory`] (process id plus a creation nonce)
//! and `seq` is a per-directory counter, so concurrent copies never collide.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{Error, Result};

/// Extension of the documentation companion file.
pub const DOCUMENTATION_EXTENSION: &str = "xml";

/// A shadow copy of a single file, together with the open handle to the copy.
///
/// The handle is opened once, when the copy is made, and is exclusively owned
/// by this instance until [`FileShadowCopy::release_handle`] is called. The
/// copy path stays valid after release; only the handle goes away.
#[derive(Debug)]
pub struct FileShadowCopy {
    original_path: PathBuf,
    copy_path: PathBuf,
    handle: Mutex<Option<fs::File>>,
}

impl FileShadowCopy {
    fn new(original_path: PathBuf, copy_path: PathBuf, handle: fs::File) -> Self {
        Self {
            original_path,
            copy_path,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Path of the file the copy was made from.
    #[must_use]
    pub fn original_path(&self) -> &Path {
        &self.original_path
    }

    /// Path of the copy inside the scratch directory.
    #[must_use]
    pub fn copy_path(&self) -> &Path {
        &self.copy_path
    }

    /// Run `f` with the open handle to the copy.
    ///
    /// # Errors
    /// Returns [`Error::Disposed`] if the handle was already released, or
    /// [`Error::LockError`] if the handle lock is poisoned.
    pub fn with_handle<T>(&self, f: impl FnOnce(&fs::File) -> Result<T>) -> Result<T> {
        let guard = self.handle.lock().map_err(|_| Error::LockError)?;
        match guard.as_ref() {
            Some(file) => f(file),
            None => Err(Error::Disposed),
        }
    }

    /// Close the handle to the copy. Idempotent; the copy file itself is kept.
    pub fn release_handle(&self) {
        if let Ok(mut guard) = self.handle.lock() {
            guard.take();
        }
    }

    /// Whether the handle is still open.
    #[must_use]
    pub fn has_open_handle(&self) -> bool {
        self.handle
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}

/// Shadow copy of a module together with its optional documentation companion.
#[derive(Debug)]
pub struct ShadowCopy {
    primary: FileShadowCopy,
    documentation: Option<FileShadowCopy>,
}

impl ShadowCopy {
    /// The module copy.
    #[must_use]
    pub fn primary(&self) -> &FileShadowCopy {
        &self.primary
    }

    /// The documentation-file copy, if a companion existed at copy time.
    #[must_use]
    pub fn documentation(&self) -> Option<&FileShadowCopy> {
        self.documentation.as_ref()
    }

    /// Close all file handles owned by this copy. Idempotent.
    pub fn release_handles(&self) {
        self.primary.release_handle();
        if let Some(documentation) = &self.documentation {
            documentation.release_handle();
        }
    }
}

/// Process-unique scratch directory that shadow copies are created in.
///
/// The directory lives under the OS temp directory (or a caller-supplied
/// root) and is removed, best effort, by [`ShadowDirectory::purge`]. Each
/// copy request gets its own numbered subdirectory so names derived from the
/// originals never collide across concurrent copies.
#[derive(Debug)]
pub struct ShadowDirectory {
    root: PathBuf,
    sequence: AtomicU64,
}

impl ShadowDirectory {
    /// Create a scratch directory under the OS temp directory.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the directory cannot be created.
    pub fn new() -> Result<ShadowDirectory> {
        Self::at_root(std::env::temp_dir())
    }

    /// Create a scratch directory under `root`.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the directory cannot be created.
    pub fn at_root(root: impl AsRef<Path>) -> Result<ShadowDirectory> {
        // pid separates processes; the nonce and counter separate directories
        // created within one process.
        static DIRECTORY_SEQUENCE: AtomicU64 = AtomicU64::new(0);

        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        let root = root.as_ref().join(format!(
            "loadscope-{}-{:x}-{}",
            std::process::id(),
            nonce,
            DIRECTORY_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&root)?;

        Ok(ShadowDirectory {
            root,
            sequence: AtomicU64::new(0),
        })
    }

    /// Location of the scratch directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Shadow-copy the module at `original` and its documentation companion.
    ///
    /// The copy is byte-identical to the original at the moment of the copy
    /// and lands outside the original's directory. Both copies are opened
    /// read-only before this returns; the handles are owned by the returned
    /// [`ShadowCopy`]. A missing companion is simply omitted.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the original cannot be read or the
    /// copy cannot be written. Failures are not retried.
    pub fn copy_module(&self, original: &Path) -> Result<ShadowCopy> {
        let slot = self.sequence.fetch_add(1, Ordering::Relaxed);
        let slot_dir = self.root.join(slot.to_string());
        fs::create_dir_all(&slot_dir)?;

        let primary = self.copy_file(original, &slot_dir)?;

        let documentation_path = original.with_extension(DOCUMENTATION_EXTENSION);
        let documentation = if documentation_path.is_file() {
            Some(self.copy_file(&documentation_path, &slot_dir)?)
        } else {
            None
        };

        Ok(ShadowCopy {
            primary,
            documentation,
        })
    }

    fn copy_file(&self, original: &Path, slot_dir: &Path) -> Result<FileShadowCopy> {
        let file_name = original
            .file_name()
            .ok_or_else(|| Error::Error(format!("No file name in {}", original.display())))?;
        let copy_path = slot_dir.join(file_name);

        fs::copy(original, &copy_path)?;
        let handle = fs::File::open(&copy_path)?;

        Ok(FileShadowCopy::new(
            original.to_path_buf(),
            copy_path,
            handle,
        ))
    }

    /// Remove the scratch directory and everything beneath it, best effort.
    ///
    /// Deletion failure is swallowed: cleanup is a convenience, not a
    /// correctness requirement, and a mapped image may legitimately still
    /// reference pages of a copy file.
    pub fn purge(&self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_file(path: &Path, contents: &[u8]) {
        let mut file = fs::File::create(path).unwrap();
        file.write_all(contents).unwrap();
    }

    #[test]
    fn test_copy_module_without_companion() {
        let source = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let original = source.path().join("plugin.dll");
        write_file(&original, b"module bytes");

        let directory = ShadowDirectory::at_root(scratch.path()).unwrap();
        let copy = directory.copy_module(&original).unwrap();

        assert_eq!(copy.primary().original_path(), original.as_path());
        assert_ne!(copy.primary().copy_path(), original.as_path());
        assert!(!copy.primary().copy_path().starts_with(source.path()));
        assert_eq!(
            fs::read(copy.primary().copy_path()).unwrap(),
            b"module bytes"
        );
        assert!(copy.documentation().is_none());
    }

    #[test]
    fn test_copy_module_with_companion() {
        let source = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let original = source.path().join("plugin.dll");
        write_file(&original, b"module bytes");
        write_file(&source.path().join("plugin.xml"), b"<doc></doc>");

        let directory = ShadowDirectory::at_root(scratch.path()).unwrap();
        let copy = directory.copy_module(&original).unwrap();

        let documentation = copy.documentation().unwrap();
        assert_eq!(
            fs::read(documentation.copy_path()).unwrap(),
            b"<doc></doc>"
        );
    }

    #[test]
    fn test_release_handle_is_idempotent() {
        let source = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let original = source.path().join("plugin.dll");
        write_file(&original, b"module bytes");

        let directory = ShadowDirectory::at_root(scratch.path()).unwrap();
        let copy = directory.copy_module(&original).unwrap();

        assert!(copy.primary().has_open_handle());
        copy.release_handles();
        assert!(!copy.primary().has_open_handle());
        copy.release_handles();

        assert!(matches!(
            copy.primary().with_handle(|_| Ok(())),
            Err(Error::Disposed)
        ));

        // The copy file survives handle release
        assert!(copy.primary().copy_path().is_file());
    }

    #[test]
    fn test_copy_missing_original() {
        let scratch = tempfile::tempdir().unwrap();
        let directory = ShadowDirectory::at_root(scratch.path()).unwrap();

        let result = directory.copy_module(Path::new("/nonexistent/plugin.dll"));
        assert!(matches!(result, Err(Error::FileError(_))));
    }

    #[test]
    fn test_concurrent_copies_do_not_collide() {
        let source = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let original = source.path().join("plugin.dll");
        write_file(&original, b"module bytes");

        let directory = ShadowDirectory::at_root(scratch.path()).unwrap();
        let first = directory.copy_module(&original).unwrap();
        let second = directory.copy_module(&original).unwrap();

        assert_ne!(first.primary().copy_path(), second.primary().copy_path());
    }

    #[test]
    fn test_purge_removes_scratch_root() {
        let scratch = tempfile::tempdir().unwrap();
        let directory = ShadowDirectory::at_root(scratch.path()).unwrap();
        let root = directory.root().to_path_buf();
        assert!(root.is_dir());

        directory.purge();
        assert!(!root.exists());

        // Purging twice is harmless
        directory.purge();
    }
}
