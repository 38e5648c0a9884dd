//! Minimal ELF detection (§6): only the magic bytes and the entry point
//! are ever inspected. Sections, program headers, and relocations are
//! ignored -- `execute` copies the whole file image verbatim to the
//! fixed load address and trusts the entry point alone.

use crate::error::{ElfError, KernelResult};

const MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const ENTRY_POINT_OFFSET: usize = 24;

/// Reject anything whose first four bytes aren't the ELF magic (§4.E
/// step 2, §7).
pub fn check_magic(image: &[u8]) -> KernelResult<()> {
    if image.len() < 4 || image[0..4] != MAGIC {
        return Err(ElfError::BadMagic.into());
    }
    Ok(())
}

/// Extract the little-endian 32-bit entry point at bytes 24..28 (§4.E
/// step 5, §6).
pub fn entry_point(image: &[u8]) -> KernelResult<u32> {
    if image.len() < ENTRY_POINT_OFFSET + 4 {
        return Err(ElfError::BadMagic.into());
    }
    let bytes: [u8; 4] = image[ENTRY_POINT_OFFSET..ENTRY_POINT_OFFSET + 4]
        .try_into()
        .unwrap();
    Ok(u32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn rejects_bad_magic() {
        let image = [0u8; 32];
        assert!(check_magic(&image).is_err());
    }

    #[test_case]
    fn accepts_elf_magic() {
        let mut image = [0u8; 32];
        image[0..4].copy_from_slice(&MAGIC);
        assert!(check_magic(&image).is_ok());
    }

    #[test_case]
    fn reads_entry_point_little_endian() {
        let mut image = [0u8; 32];
        image[0..4].copy_from_slice(&MAGIC);
        image[24..28].copy_from_slice(&0x0804_8000u32.to_le_bytes());
        assert_eq!(entry_point(&image).unwrap(), 0x0804_8000);
    }
}
