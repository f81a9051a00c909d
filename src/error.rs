use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers all failure modes of the shadow-copy and loading subsystem: file I/O
/// during shadow copies, malformed module images, unresolved dependency references, and
/// use of an already disposed cache or loader. Each variant carries enough context for
/// the host to decide whether to abort the current evaluation step or keep going.
///
/// # Error Categories
///
/// ## Image Validation Errors
/// - [`Error::Malformed`] - Corrupted or structurally invalid module image
/// - [`Error::OutOfBounds`] - Attempted to read beyond the image boundaries
/// - [`Error::NotSupported`] - Input is not a module image at all
/// - [`Error::Empty`] - Empty input provided
///
/// ## I/O Errors
/// - [`Error::FileError`] - Filesystem I/O failure during copy or open
///
/// ## Loading Errors
/// - [`Error::UnresolvedReference`] - A dependency reference no resolver could satisfy
/// - [`Error::Disposed`] - Operation on a disposed cache or loader
/// - [`Error::LockError`] - Thread synchronization failure
///
/// # Examples
///
/// ```rust,no_run
/// use loadscope::{Error, loader::ModuleLoader};
/// use std::path::Path;
///
/// let loader = ModuleLoader::new()?;
/// match loader.load_from_path(Path::new("plugin.dll")) {
///     Ok(loaded) => println!("Loaded from {}", loaded.location.display()),
///     Err(Error::NotSupported) => eprintln!("Not a module image"),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed image: {} ({}:{})", message, file, line);
///     }
///     Err(Error::FileError(io_err)) => eprintln!("I/O error: {}", io_err),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok::<(), loadscope::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The module image is damaged and could not be validated.
    ///
    /// The error includes the source location where the malformation was
    /// detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while validating a module image.
    ///
    /// This error occurs when a header field points beyond the end of the
    /// image. It's a safety check to prevent buffer overruns during validation.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This input is not a supported module image.
    ///
    /// Indicates that the input bytes do not carry the module image magic,
    /// or use a format variant this library does not implement.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that occur while creating a shadow copy or
    /// opening a copy for reading. Shadow-copy I/O failures are fatal to the
    /// specific load request and are never retried internally.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// A dependency reference could not be satisfied.
    ///
    /// Neither the host's ambient registry nor the identity resolver produced
    /// a module for the reference. This surfaces at the point of use, not at
    /// load time, and recurs on every attempt to use the missing reference.
    ///
    /// The associated string is the display name of the requested identity.
    #[error("Unresolved module reference - {0}")]
    UnresolvedReference(String),

    /// Operation attempted on a disposed cache, context, or loader.
    ///
    /// Disposal itself is idempotent and never raises this; only operations
    /// that would need the released resources do.
    #[error("Target has already been disposed")]
    Disposed,

    /// Failed to lock target.
    ///
    /// This error occurs when thread synchronization fails, typically when
    /// trying to acquire a mutex that is in an invalid state.
    #[error("Failed to lock target")]
    LockError,

    /// Generic error for miscellaneous failures.
    ///
    /// Used for errors that don't fit into other categories or for wrapping
    /// external failures with additional context.
    #[error("{0}")]
    Error(String),
}
