//! Shared helpers for integration tests.

use std::fs;
use std::path::PathBuf;

/// Build the smallest module image the validator accepts: DOS header with
/// `MZ` magic, `PE\0\0` signature at 0x40, a COFF header advertising a
/// two-byte optional header, and the PE32 optional-header magic.
pub fn minimal_image() -> Vec<u8> {
    let lfanew = 0x40usize;
    let coff = lfanew + 4;
    let optional = coff + 20;
    let total = optional + 2;

    let mut data = vec![0u8; total];
    data[0] = b'M';
    data[1] = b'Z';
    data[0x3C..0x40].copy_from_slice(&(lfanew as u32).to_le_bytes());
    data[lfanew..coff].copy_from_slice(b"PE\0\0");

    data[coff..coff + 2].copy_from_slice(&0x14Cu16.to_le_bytes());
    data[coff + 16..coff + 18].copy_from_slice(&2u16.to_le_bytes());

    data[optional..optional + 2].copy_from_slice(&0x10Bu16.to_le_bytes());

    data
}

/// Write a minimal module image into `dir` under `name` and return its path.
pub fn write_module(dir: &std::path::Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, minimal_image()).unwrap();
    path
}
