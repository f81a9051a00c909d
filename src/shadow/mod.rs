//! Shadow-copy management for loaded module files.
//!
//! Loading a module file directly pins it on disk for the lifetime of the
//! process, which blocks rebuilds of the very file that was just loaded. The
//! shadow-copy layer breaks that pin: each requested file is copied into a
//! private scratch directory, all reads go through the copy, and the open
//! handle on the copy is released as soon as the image bytes are mapped. The
//! original file stays writable and deletable throughout.
//!
//! # Components
//!
//! - [`ShadowDirectory`] owns one scratch directory and hands out uniquely
//!   numbered slots for copies.
//! - [`FileShadowCopy`] and [`ShadowCopy`] track a single copied file (plus
//!   its optional documentation companion) and its releasable handle.
//! - [`ShadowCopyCache`] guarantees at most one copy per distinct original
//!   path, no matter how many threads request it.
//! - [`DocImage`] is the parsed form of an XML documentation companion.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use loadscope::shadow::ShadowCopyCache;
//! use std::path::Path;
//!
//! # fn main() -> loadscope::Result<()> {
//! let cache = ShadowCopyCache::new()?;
//! let entry = cache.get_or_create(Path::new("build/output/mylib.dll"))?;
//!
//! // The original file can now be rebuilt or deleted; the image
//! // stays valid because it reads from the shadow copy.
//! println!("image size: {}", entry.image().len());
//! # Ok(())
//! # }
//! ```

mod cache;
mod copy;
mod docs;

pub use cache::{CachedModuleImage, ShadowCopyCache};
pub use copy::{FileShadowCopy, ShadowCopy, ShadowDirectory, DOCUMENTATION_EXTENSION};
pub use docs::DocImage;
