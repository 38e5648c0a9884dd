//! Read-only flat/indexed file system (§3, §4.B).
//!
//! The image is a flat byte blob handed to the kernel by the boot
//! loader as a multiboot module (see `arch::x86::multiboot` and
//! `main::boot_main`), never copied: every accessor reads straight out
//! of it. Block 0 is the boot block (directory), blocks
//! `1..=n_inodes` are inodes, the remainder are data blocks.
//!
//! Grounded on original_source's `filesys.c`/`filesys.h` for the exact
//! boot-block/inode/data-block byte layout; the `GlobalState`-wrapped
//! raw pointer follows this crate's no-heap singleton idiom
//! ([`crate::sync::GlobalState`]).

use crate::error::{FsError, KernelResult};
use crate::sync::GlobalState;

pub const BLOCK_SIZE: usize = 4096;
pub const MAX_DIR_ENTRIES: usize = 63;
pub const MAX_DATA_BLOCKS_PER_INODE: usize = 1023;
pub const NAME_MAX: usize = 32;

const DIR_ENTRY_SIZE: usize = 64;
const BOOT_BLOCK_HEADER_SIZE: usize = 12;

/// File type tag stored in a directory entry (§3).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FileType {
    Rtc,
    Directory,
    Regular,
}

impl FileType {
    fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(FileType::Rtc),
            1 => Some(FileType::Directory),
            2 => Some(FileType::Regular),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            FileType::Rtc => 0,
            FileType::Directory => 1,
            FileType::Regular => 2,
        }
    }
}

/// One directory entry (§3), name kept exactly as stored (not
/// null-terminated when it fills all 32 bytes).
#[derive(Clone, Copy)]
pub struct DirEntry {
    pub name: [u8; NAME_MAX],
    pub file_type: FileType,
    pub inode_index: u32,
}

struct FsImage {
    ptr: *const u8,
    len: usize,
}

// SAFETY: the image is a read-only blob handed over once at boot and
// never mutated afterward; sharing the pointer across contexts is safe
// because nothing ever writes through it.
unsafe impl Send for FsImage {}
unsafe impl Sync for FsImage {}

static IMAGE: GlobalState<FsImage> = GlobalState::new();

/// Install the file system image. Called once during boot with the
/// multiboot module's address and length.
///
/// # Safety
/// `ptr` must point at `len` bytes of a valid file system image that
/// remain mapped and unmodified for the rest of the kernel's lifetime.
pub unsafe fn init(ptr: *const u8, len: usize) {
    let _ = IMAGE.init(FsImage { ptr, len });
}

fn image_bytes() -> &'static [u8] {
    IMAGE
        .with(|img| {
            // SAFETY: `init`'s caller guaranteed `ptr`/`len` describe a
            // live, stable region for 'static.
            unsafe { core::slice::from_raw_parts(img.ptr, img.len) }
        })
        .expect("fs::init must run before any file system access")
}

fn header_counts(bytes: &[u8]) -> (u32, u32, u32) {
    let n_dir = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let n_inodes = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    let n_data_blocks = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    (n_dir, n_inodes, n_data_blocks)
}

fn parse_dentry_at(bytes: &[u8], index: usize) -> Option<DirEntry> {
    let (n_dir, _, _) = header_counts(bytes);
    if index >= n_dir as usize || index >= MAX_DIR_ENTRIES {
        return None;
    }
    let start = BOOT_BLOCK_HEADER_SIZE + index * DIR_ENTRY_SIZE;
    let raw = &bytes[start..start + DIR_ENTRY_SIZE];
    let mut name = [0u8; NAME_MAX];
    name.copy_from_slice(&raw[0..NAME_MAX]);
    let file_type_raw = u32::from_le_bytes(raw[32..36].try_into().unwrap());
    let inode_index = u32::from_le_bytes(raw[36..40].try_into().unwrap());
    let file_type = FileType::from_raw(file_type_raw)?;
    Some(DirEntry {
        name,
        file_type,
        inode_index,
    })
}

fn name_matches(entry_name: &[u8; NAME_MAX], query: &str) -> bool {
    if query.len() > NAME_MAX {
        return false;
    }
    let mut padded = [0u8; NAME_MAX];
    padded[..query.len()].copy_from_slice(query.as_bytes());
    entry_name == &padded
}

/// Look up a directory entry by name (§4.B). Fails if `name` is longer
/// than 32 bytes or no entry matches (§8 boundary).
pub fn read_dentry_by_name(name: &str) -> KernelResult<DirEntry> {
    if name.len() > NAME_MAX {
        return Err(FsError::NotFound.into());
    }
    let bytes = image_bytes();
    let (n_dir, _, _) = header_counts(bytes);
    for i in 0..(n_dir as usize).min(MAX_DIR_ENTRIES) {
        if let Some(entry) = parse_dentry_at(bytes, i) {
            if name_matches(&entry.name, name) {
                return Ok(entry);
            }
        }
    }
    Err(FsError::NotFound.into())
}

/// Look up a directory entry by index (§4.B). Succeeds for
/// `0 <= i < n_dir_entries` (§6).
pub fn read_dentry_by_index(index: usize) -> KernelResult<DirEntry> {
    parse_dentry_at(image_bytes(), index).ok_or(FsError::IndexOutOfRange.into())
}

/// Number of directory entries in the boot block (§4.B `directory_count`).
pub fn directory_count() -> usize {
    header_counts(image_bytes()).0 as usize
}

/// Logical length in bytes of the file named by `inode_index` (§4.B
/// `file_size`).
pub fn file_size(inode_index: u32) -> KernelResult<u32> {
    let bytes = image_bytes();
    let (_, n_inodes, _) = header_counts(bytes);
    if inode_index >= n_inodes {
        return Err(FsError::BadInode.into());
    }
    let inode_block = 1 + inode_index as usize;
    let start = inode_block * BLOCK_SIZE;
    Ok(u32::from_le_bytes(bytes[start..start + 4].try_into().unwrap()))
}

/// Copy up to `n` bytes starting at `offset` within the inode's logical
/// file into `buf`, stopping at end-of-file; returns the number of
/// bytes copied (§4.B, §8 boundary: `offset == file_size` returns 0,
/// §9 Open Questions resolves `read_data` to this straightforward
/// walk-the-blocks-in-order semantics, not the source's fall-through
/// quirk).
pub fn read_data(inode_index: u32, offset: u32, buf: &mut [u8]) -> KernelResult<usize> {
    let bytes = image_bytes();
    let (_, n_inodes, n_data_blocks) = header_counts(bytes);
    if inode_index >= n_inodes {
        return Err(FsError::BadInode.into());
    }
    let inode_block = 1 + inode_index as usize;
    let inode_start = inode_block * BLOCK_SIZE;
    let length = u32::from_le_bytes(bytes[inode_start..inode_start + 4].try_into().unwrap());

    if offset >= length {
        return Ok(0);
    }

    let n = buf.len().min((length - offset) as usize);
    let data_blocks_start = 1 + n_inodes as usize;
    let mut copied = 0usize;
    let mut pos = offset;

    while copied < n {
        let block_in_file = (pos / BLOCK_SIZE as u32) as usize;
        let intra_offset = (pos % BLOCK_SIZE as u32) as usize;
        if block_in_file >= MAX_DATA_BLOCKS_PER_INODE {
            break;
        }
        let index_offset = inode_start + 4 + block_in_file * 4;
        let data_block_index =
            u32::from_le_bytes(bytes[index_offset..index_offset + 4].try_into().unwrap());
        if data_block_index >= n_data_blocks {
            return Err(FsError::BadInode.into());
        }
        let block_start = (data_blocks_start + data_block_index as usize) * BLOCK_SIZE;
        let available_in_block = BLOCK_SIZE - intra_offset;
        let want = (n - copied).min(available_in_block);
        let src = &bytes[block_start + intra_offset..block_start + intra_offset + want];
        buf[copied..copied + want].copy_from_slice(src);
        copied += want;
        pos += want as u32;
    }

    Ok(copied)
}

/// Ops for a regular file fd (§4.B "A per-fd `file.read` wraps
/// `read_data`, advancing `file_position`").
pub fn file_read(pcb: &mut crate::process::Pcb, fd_idx: usize, buf: &mut [u8]) -> KernelResult<usize> {
    let entry = &mut pcb.fdt[fd_idx];
    let n = read_data(entry.inode_index, entry.file_position, buf)?;
    entry.file_position += n as u32;
    Ok(n)
}

/// Writes to regular files always fail (§4.B, Non-goal: writable FS).
pub fn file_write(_buf: &[u8]) -> KernelResult<usize> {
    Err(FsError::ReadOnly.into())
}

/// Directory `read` yields one entry's name per call, advancing
/// `file_position` by one; returns 0 past the end (§4.B).
pub fn directory_read(pcb: &mut crate::process::Pcb, fd_idx: usize, buf: &mut [u8]) -> KernelResult<usize> {
    let entry = &mut pcb.fdt[fd_idx];
    let index = entry.file_position as usize;
    if index >= directory_count() {
        return Ok(0);
    }
    let dentry = read_dentry_by_index(index)?;
    let n = buf.len().min(NAME_MAX);
    buf[..n].copy_from_slice(&dentry.name[..n]);
    entry.file_position += 1;
    Ok(n)
}

/// Writes to directories always fail (§4.B).
pub fn directory_write(_buf: &[u8]) -> KernelResult<usize> {
    Err(FsError::ReadOnly.into())
}
