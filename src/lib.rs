// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'image.rs' uses mmap to map a shadow copy into memory

//! # loadscope
//!
//! Dynamic module loading with shadow-copy isolation, built for interactive
//! code-execution hosts. `loadscope` loads module images without pinning the
//! original file on disk: every file load goes through a private shadow copy,
//! so the file a host just loaded can immediately be rebuilt, overwritten, or
//! deleted.
//!
//! ## Features
//!
//! - **Shadow-copy isolation** - Originals stay writable and deletable the
//!   moment a load returns
//! - **One copy per path** - A concurrent-safe cache guarantees at most one
//!   copy per distinct file, no matter how many threads ask
//! - **Memory-mapped images** - Copies are mapped, handles released early,
//!   and the mapping stays valid for the life of the image
//! - **Isolated load contexts** - Module groups that only see each other
//!   through an explicit registry, unloadable as a unit
//! - **Pluggable resolution** - Ambient registry first, host resolver second,
//!   with unresolved references degrading to use-time errors
//! - **Documentation companions** - XML documentation next to a module is
//!   copied and parsed alongside it
//!
//! ## Quick Start
//!
//! Add `loadscope` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! loadscope = "0.1"
//! ```
//!
//! ### Using the Prelude
//!
//! For convenient access to the most commonly used types, import the prelude:
//!
//! ```rust,no_run
//! use loadscope::prelude::*;
//!
//! let loader = ModuleLoader::new()?;
//! let loaded = loader.load_from_path("build/mylib.dll".as_ref())?;
//! println!("loaded from {}", loaded.location.display());
//! # Ok::<(), loadscope::Error>(())
//! ```
//!
//! ### Basic Usage
//!
//! ```rust,no_run
//! use loadscope::loader::ModuleLoader;
//! use std::path::Path;
//!
//! let loader = ModuleLoader::new()?;
//!
//! // Load a freshly built module; the build output stays unlocked.
//! let loaded = loader.load_from_path(Path::new("build/mylib.dll"))?;
//! println!("image is {} bytes", loaded.module.image().len());
//!
//! // Rebuild and load again: same path, same shadow copy, no second copy.
//! let again = loader.load_from_path(Path::new("build/mylib.dll"))?;
//! assert_eq!(loader.copy_count(), 1);
//! # Ok::<(), loadscope::Error>(())
//! ```
//!
//! ### Dependency Resolution
//!
//! ```rust,no_run
//! use loadscope::loader::{ModuleLoader, SiblingResolver};
//! use std::sync::Arc;
//!
//! // Probe next to the referencing module for unregistered references.
//! let loader = ModuleLoader::with_resolver(Arc::new(SiblingResolver))?;
//!
//! let loaded = loader.load_from_path("build/app.dll".as_ref())?;
//! # Ok::<(), loadscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `loadscope` is organized into several key modules:
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`loader`] - The [`loader::ModuleLoader`] facade, load contexts, and
//!   resolution
//! - [`shadow`] - Shadow-copy directories, the per-path copy cache, and
//!   documentation companions
//! - [`identity`] - Module identities and their textual display-name form
//! - [`image`] - Validated, memory-mapped or in-memory module images
//! - [`diagnostics`] - Thread-safe accumulation of load diagnostics with
//!   lazily computed severities
//! - [`Error`] and [`Result`] - Comprehensive error handling
//!
//! ### Shadow Copies
//!
//! The [`shadow::ShadowCopyCache`] is the heart of the subsystem. Each
//! distinct original path is copied exactly once into a scratch directory
//! unique to the cache instance; the copy is memory-mapped, its handle
//! released, and the resulting [`image::ModuleImage`] shared by every load of
//! that path. Disposing the cache purges the scratch directory.
//!
//! ### Load Contexts
//!
//! Modules live in [`loader::LoadContext`] groups. Stream loads share one
//! context; each path load gets its own, with the file's directory as the
//! resolution probing hint. Contexts are collectible: unloading drops the
//! context's references while modules the host still holds stay readable.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result) with detailed error
//! information:
//!
//! ```rust,no_run
//! use loadscope::{Error, loader::ModuleLoader};
//!
//! let loader = ModuleLoader::new()?;
//! match loader.load_from_path(std::path::Path::new("plugin.dll")) {
//!     Ok(loaded) => println!("loaded from {}", loaded.location.display()),
//!     Err(Error::NotSupported) => println!("not a module image"),
//!     Err(Error::Malformed { message, .. }) => println!("malformed: {}", message),
//!     Err(e) => println!("error: {}", e),
//! }
//! # Ok::<(), loadscope::Error>(())
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test
//! ```

#[macro_use]
pub(crate) mod error;
pub(crate) mod pool;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// This module provides a curated selection of the most frequently used types
/// from across the loadscope library, allowing for convenient glob imports.
///
/// # Example
///
/// ```rust,no_run
/// use loadscope::prelude::*;
///
/// let loader = ModuleLoader::new()?;
/// let loaded = loader.load_from_path("build/mylib.dll".as_ref())?;
/// # Ok::<(), loadscope::Error>(())
/// ```
pub mod prelude;

pub mod diagnostics;
pub mod identity;
pub mod image;
pub mod loader;
pub mod shadow;

/// `loadscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is
/// always [`Error`]. This is used consistently throughout the crate for all
/// fallible operations.
///
/// # Examples
///
/// ```rust,no_run
/// use loadscope::{loader::ModuleLoader, Result};
///
/// fn make_loader() -> Result<ModuleLoader> {
///     ModuleLoader::new()
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `loadscope` Error type
///
/// The main error type for all operations in this crate. Provides detailed
/// error information for shadow copying, image validation, and module
/// resolution.
///
/// # Examples
///
/// ```rust,no_run
/// use loadscope::{Error, loader::ModuleLoader};
///
/// let loader = ModuleLoader::new()?;
/// match loader.load_from_stream(Vec::new(), None) {
///     Ok(_) => println!("loaded"),
///     Err(Error::Empty) => println!("empty input"),
///     Err(e) => println!("error: {}", e),
/// }
/// # Ok::<(), loadscope::Error>(())
/// ```
pub use error::Error;
