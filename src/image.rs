//! Validated in-memory module images.
//!
//! A [`ModuleImage`] is the parsed representation of a module's bytes, held
//! entirely in process memory so the on-disk file (or its shadow copy) can be
//! closed, replaced, or deleted without affecting the loaded image.
//!
//! # Backends
//!
//! Two backings exist, mirroring the two load entry points:
//!
//! - **Memory** - an owned buffer, used for modules supplied as raw bytes
//! - **Mapped** - a memory-mapped view of an opened shadow-copy handle; the
//!   mapping stays valid after the handle itself is closed, which is what lets
//!   the cache release file handles once an image has been read
//!
//! # Validation
//!
//! Construction validates the image header: the DOS `MZ` magic, the `PE\0\0`
//! signature reachable through `e_lfanew`, a complete COFF header, and a PE32
//! or PE32+ optional-header magic. Invalid input fails the load call with
//! [`Error::NotSupported`], [`Error::Malformed`] or [`Error::OutOfBounds`];
//! nothing is loaded partially.
//!
//! # Examples
//!
//! ```rust,no_run
//! use loadscope::image::ModuleImage;
//!
//! let bytes = std::fs::read("plugin.dll")?;
//! let image = ModuleImage::from_vec(bytes)?;
//! println!("Image is {} bytes", image.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;

use memmap2::Mmap;

use crate::{Error, Result};

/// Offset of `e_lfanew` within the DOS header.
const DOS_LFANEW_OFFSET: usize = 0x3C;
/// Minimum size of the DOS header.
const DOS_HEADER_SIZE: usize = 0x40;
/// Size of the COFF file header following the PE signature.
const COFF_HEADER_SIZE: usize = 20;
/// Optional-header magic for PE32 images.
const MAGIC_PE32: u16 = 0x10B;
/// Optional-header magic for PE32+ images.
const MAGIC_PE32_PLUS: u16 = 0x20B;

/// Backing storage of a module image.
#[derive(Debug)]
enum ImageData {
    /// Owned buffer, used for in-memory module loads.
    Memory(Vec<u8>),
    /// Memory-mapped shadow-copy data.
    ///
    /// The mapping keeps the underlying pages alive independently of the file
    /// handle it was created from, so the handle can be released immediately
    /// after the map is established.
    Mapped(Mmap),
}

/// A validated, fully in-memory module image.
///
/// Once constructed, the image's bytes are independent of any on-disk state:
/// the original file can be overwritten or deleted and the bytes returned by
/// [`ModuleImage::data`] do not change.
#[derive(Debug)]
pub struct ModuleImage {
    data: ImageData,
}

impl ModuleImage {
    /// Create an image from an owned byte buffer.
    ///
    /// This is the entry point for modules supplied as raw bytes; no file is
    /// involved and no shadow copy is made.
    ///
    /// # Errors
    /// Returns [`Error::Empty`] for empty input, [`Error::NotSupported`] if
    /// the bytes are not a module image, or [`Error::Malformed`] /
    /// [`Error::OutOfBounds`] for structurally broken headers.
    pub fn from_vec(bytes: Vec<u8>) -> Result<ModuleImage> {
        validate_image(&bytes)?;
        Ok(ModuleImage {
            data: ImageData::Memory(bytes),
        })
    }

    /// Create an image by memory-mapping an already opened file handle.
    ///
    /// The handle only needs to stay open for the duration of this call; the
    /// mapping remains valid after the caller closes it. This is how shadow
    /// copies are read without pinning their file handles.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the mapping cannot be established, or
    /// a validation error if the mapped bytes are not a module image.
    pub fn from_open_file(file: &fs::File) -> Result<ModuleImage> {
        let mmap = unsafe { Mmap::map(file) }?;
        validate_image(&mmap)?;

        Ok(ModuleImage {
            data: ImageData::Mapped(mmap),
        })
    }

    /// The raw bytes of the image.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        match &self.data {
            ImageData::Memory(vec) => vec,
            ImageData::Mapped(mmap) => mmap,
        }
    }

    /// Total size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Whether the image holds no bytes. Always `false` for a constructed
    /// image, present for API completeness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }
}

/// Safely read a `u16` in little-endian byte order at `offset`.
fn read_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    let end = offset.checked_add(2).ok_or(Error::OutOfBounds)?;
    let bytes = data.get(offset..end).ok_or(Error::OutOfBounds)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Safely read a `u32` in little-endian byte order at `offset`.
fn read_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    let end = offset.checked_add(4).ok_or(Error::OutOfBounds)?;
    let bytes = data.get(offset..end).ok_or(Error::OutOfBounds)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Validate that `data` carries a structurally sound module image header.
fn validate_image(data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(Error::Empty);
    }

    if data.len() < DOS_HEADER_SIZE || &data[0..2] != b"MZ" {
        return Err(Error::NotSupported);
    }

    let lfanew = read_u32_le(data, DOS_LFANEW_OFFSET)? as usize;
    if lfanew < DOS_HEADER_SIZE {
        return Err(malformed_error!(
            "e_lfanew 0x{:X} points into the DOS header",
            lfanew
        ));
    }

    let signature_end = lfanew.checked_add(4).ok_or(Error::OutOfBounds)?;
    let signature = data.get(lfanew..signature_end).ok_or(Error::OutOfBounds)?;
    if signature != b"PE\0\0" {
        return Err(Error::NotSupported);
    }

    let coff_offset = signature_end;
    let coff_end = coff_offset
        .checked_add(COFF_HEADER_SIZE)
        .ok_or(Error::OutOfBounds)?;
    if coff_end > data.len() {
        return Err(Error::OutOfBounds);
    }

    let size_of_optional_header = read_u16_le(data, coff_offset + 16)? as usize;
    if size_of_optional_header < 2 {
        return Err(malformed_error!(
            "Optional header too small ({} bytes)",
            size_of_optional_header
        ));
    }

    let optional_offset = coff_end;
    let optional_end = optional_offset
        .checked_add(size_of_optional_header)
        .ok_or(Error::OutOfBounds)?;
    if optional_end > data.len() {
        return Err(Error::OutOfBounds);
    }

    let magic = read_u16_le(data, optional_offset)?;
    if magic != MAGIC_PE32 && magic != MAGIC_PE32_PLUS {
        return Err(malformed_error!(
            "Unknown optional header magic 0x{:04X}",
            magic
        ));
    }

    Ok(())
}
