//! Exercises PCB allocation/stack addressing, the RTC divisor-sharing
//! algorithm, and the read-only filesystem's dentry/inode walk against
//! a small synthetic image built in memory -- no real multiboot module
//! is loaded for this binary.

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(triterm_kernel::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;
use triterm_kernel::arch;
use triterm_kernel::fs;
use triterm_kernel::process;
use triterm_kernel::rtc;

const BLOCK_SIZE: usize = 4096;

/// One boot block + one inode block + one data block, holding a single
/// regular file "hello" with 4 bytes of content, laid out exactly the
/// way `mkfs-triterm` would write it.
static mut FS_IMAGE: [u8; 3 * BLOCK_SIZE] = [0u8; 3 * BLOCK_SIZE];

fn build_fs_image(buf: &mut [u8; 3 * BLOCK_SIZE]) {
    buf[0..4].copy_from_slice(&2u32.to_le_bytes()); // n_dir: "." and "hello"
    buf[4..8].copy_from_slice(&1u32.to_le_bytes()); // n_inodes
    buf[8..12].copy_from_slice(&1u32.to_le_bytes()); // n_data_blocks

    // dentry 0: "."
    buf[12 + 32..12 + 36].copy_from_slice(&1u32.to_le_bytes()); // FileType::Directory
    // dentry 1: "hello", inode 0
    let d1 = 12 + 64;
    buf[d1..d1 + 5].copy_from_slice(b"hello");
    buf[d1 + 32..d1 + 36].copy_from_slice(&2u32.to_le_bytes()); // FileType::Regular
    buf[d1 + 36..d1 + 40].copy_from_slice(&0u32.to_le_bytes()); // inode 0

    // inode block 1: length 4, data block 0
    let inode_start = BLOCK_SIZE;
    buf[inode_start..inode_start + 4].copy_from_slice(&4u32.to_le_bytes());
    buf[inode_start + 4..inode_start + 8].copy_from_slice(&0u32.to_le_bytes());

    // data block 2: "hi!!"
    let data_start = 2 * BLOCK_SIZE;
    buf[data_start..data_start + 4].copy_from_slice(b"hi!!");
}

#[no_mangle]
pub extern "C" fn kernel_main(_multiboot_magic: u32, _multiboot_info_ptr: *const u8) -> ! {
    arch::x86::vga::clear();
    // SAFETY: this static is only ever touched from this single-threaded
    // boot path, before any test runs.
    unsafe {
        build_fs_image(&mut *core::ptr::addr_of_mut!(FS_IMAGE));
        fs::init(FS_IMAGE.as_ptr(), FS_IMAGE.len());
    }
    test_main();
    arch::x86::halt_loop()
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    triterm_kernel::println!("[failed]\n{}", info);
    arch::x86::qemu_exit(arch::x86::QemuExitCode::Failed)
}

#[test_case]
fn pid_zero_stack_top_is_eight_mebibytes() {
    assert_eq!(process::stack_top(0), 8 * 1024 * 1024);
    assert_eq!(process::stack_top(1), 8 * 1024 * 1024 - process::KERNEL_STACK_SIZE);
}

#[test_case]
fn fd_table_starts_with_stdin_and_stdout_open() {
    let pid = process::allocate(-1).expect("free slot");
    process::with_pcb(pid, |pcb| {
        assert!(pcb.fdt[0].enabled);
        assert!(pcb.fdt[1].enabled);
        for entry in pcb.fdt[2..].iter() {
            assert!(!entry.enabled);
        }
    })
    .expect("just-allocated pid is live");
    process::free(pid);
}

#[test_case]
fn rtc_write_raises_the_shared_rate_and_lowers_it_back_on_close() {
    let pid = process::allocate(-1).expect("free slot");
    process::with_pcb(pid, |pcb| {
        rtc::write(pcb, 32).unwrap();
        assert_eq!(rtc::highest_rtc_hz(), 32);
        rtc::close(pcb);
    });
    assert_eq!(rtc::highest_rtc_hz(), 2);
    process::free(pid);
}

#[test_case]
fn rtc_write_rejects_non_power_of_two_frequencies() {
    let pid = process::allocate(-1).expect("free slot");
    process::with_pcb(pid, |pcb| {
        assert!(rtc::write(pcb, 100).is_err());
        assert!(rtc::write(pcb, 2048).is_err());
    });
    process::free(pid);
}

#[test_case]
fn directory_listing_finds_the_populated_file() {
    assert_eq!(fs::directory_count(), 2);
    let dentry = fs::read_dentry_by_name("hello").expect("populated file is findable");
    assert_eq!(dentry.file_type, fs::FileType::Regular);
    assert_eq!(fs::file_size(dentry.inode_index).unwrap(), 4);
}

#[test_case]
fn read_data_returns_the_populated_bytes() {
    let dentry = fs::read_dentry_by_name("hello").unwrap();
    let mut buf = [0u8; 8];
    let n = fs::read_data(dentry.inode_index, 0, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"hi!!");
}

#[test_case]
fn read_data_past_end_of_file_returns_zero() {
    let dentry = fs::read_dentry_by_name("hello").unwrap();
    let mut buf = [0u8; 8];
    let n = fs::read_data(dentry.inode_index, 4, &mut buf).unwrap();
    assert_eq!(n, 0);
}
