//! mkfs-triterm -- build a TriTerm OS filesystem image from a host
//! directory.
//!
//! The image is a flat blob GRUB loads as a multiboot module and the
//! kernel reads directly out of (see `kernel::fs`), laid out as:
//!
//! ```text
//! Block 0:            boot block -- counts header + up to 63 directory entries
//! Blocks 1..=n_inodes: one inode per block (length + data block index list)
//! Blocks after that:   raw file data, BLOCK_SIZE bytes each
//! ```
//!
//! Usage:
//!   mkfs-triterm --output <path> [--populate <dir>]

use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

const BLOCK_SIZE: usize = 4096;
const NAME_MAX: usize = 32;
const DIR_ENTRY_SIZE: usize = 64;
const BOOT_BLOCK_HEADER_SIZE: usize = 12;
const MAX_DIR_ENTRIES: usize = 63;
const MAX_DATA_BLOCKS_PER_INODE: usize = 1023;

const FT_RTC: u32 = 0;
const FT_DIR: u32 = 1;
const FT_REG: u32 = 2;

struct Args {
    output: PathBuf,
    populate: Option<PathBuf>,
}

fn parse_args() -> Args {
    let mut output = None;
    let mut populate = None;
    let mut it = env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--output" => output = it.next().map(PathBuf::from),
            "--populate" => populate = it.next().map(PathBuf::from),
            other => {
                eprintln!("unrecognized argument: {other}");
                std::process::exit(1);
            }
        }
    }
    let Some(output) = output else {
        eprintln!("usage: mkfs-triterm --output <path> [--populate <dir>]");
        std::process::exit(1);
    };
    Args { output, populate }
}

struct SourceFile {
    name: String,
    data: Vec<u8>,
}

fn collect_sources(populate: &Option<PathBuf>) -> Vec<SourceFile> {
    let Some(dir) = populate else { return Vec::new() };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).expect("reading --populate directory") {
        let entry = entry.expect("reading directory entry");
        if !entry.file_type().expect("stat").is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.len() > NAME_MAX {
            eprintln!("skipping {name}: longer than {NAME_MAX} bytes");
            continue;
        }
        let data = fs::read(entry.path()).expect("reading source file");
        files.push(SourceFile { name, data });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    files
}

fn padded_name(name: &str) -> [u8; NAME_MAX] {
    let mut buf = [0u8; NAME_MAX];
    let bytes = name.as_bytes();
    buf[..bytes.len()].copy_from_slice(bytes);
    buf
}

fn write_dir_entry(boot_block: &mut [u8], index: usize, name: &str, file_type: u32, inode: u32) {
    let start = BOOT_BLOCK_HEADER_SIZE + index * DIR_ENTRY_SIZE;
    boot_block[start..start + NAME_MAX].copy_from_slice(&padded_name(name));
    boot_block[start + 32..start + 36].copy_from_slice(&file_type.to_le_bytes());
    boot_block[start + 36..start + 40].copy_from_slice(&inode.to_le_bytes());
}

fn main() {
    let args = parse_args();
    let sources = collect_sources(&args.populate);

    if sources.len() + 2 > MAX_DIR_ENTRIES {
        eprintln!(
            "too many files: {} plus `.` and `rtc` exceeds {MAX_DIR_ENTRIES} directory entries",
            sources.len()
        );
        std::process::exit(1);
    }

    let n_inodes = sources.len() as u32;
    let mut inode_blocks = vec![vec![0u8; BLOCK_SIZE]; sources.len()];
    let mut data_blocks: Vec<Vec<u8>> = Vec::new();

    for (i, file) in sources.iter().enumerate() {
        let inode = &mut inode_blocks[i];
        inode[0..4].copy_from_slice(&(file.data.len() as u32).to_le_bytes());

        let n_blocks = if file.data.is_empty() {
            0
        } else {
            (file.data.len() + BLOCK_SIZE - 1) / BLOCK_SIZE
        };
        if n_blocks > MAX_DATA_BLOCKS_PER_INODE {
            eprintln!("{}: too large ({} blocks)", file.name, n_blocks);
            std::process::exit(1);
        }
        for b in 0..n_blocks {
            let start = b * BLOCK_SIZE;
            let end = (start + BLOCK_SIZE).min(file.data.len());
            let mut block = vec![0u8; BLOCK_SIZE];
            block[..end - start].copy_from_slice(&file.data[start..end]);
            let data_block_index = data_blocks.len() as u32;
            inode[4 + b * 4..4 + b * 4 + 4].copy_from_slice(&data_block_index.to_le_bytes());
            data_blocks.push(block);
        }
    }

    let n_dir = sources.len() as u32 + 2; // `.` and `rtc` are always present
    let mut boot_block = vec![0u8; BLOCK_SIZE];
    boot_block[0..4].copy_from_slice(&n_dir.to_le_bytes());
    boot_block[4..8].copy_from_slice(&n_inodes.to_le_bytes());
    boot_block[8..12].copy_from_slice(&(data_blocks.len() as u32).to_le_bytes());

    write_dir_entry(&mut boot_block, 0, ".", FT_DIR, 0);
    write_dir_entry(&mut boot_block, 1, "rtc", FT_RTC, 0);
    for (i, file) in sources.iter().enumerate() {
        write_dir_entry(&mut boot_block, 2 + i, &file.name, FT_REG, i as u32);
    }

    let mut out = fs::File::create(&args.output).expect("creating output image");
    out.write_all(&boot_block).expect("writing boot block");
    for inode in &inode_blocks {
        out.write_all(inode).expect("writing inode block");
    }
    for block in &data_blocks {
        out.write_all(block).expect("writing data block");
    }

    println!(
        "wrote {} ({} dir entries, {} inodes, {} data blocks)",
        args.output.display(),
        n_dir,
        n_inodes,
        data_blocks.len()
    );
}
