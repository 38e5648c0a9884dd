//! TriTerm OS kernel library.
//!
//! Exists so `main.rs` and the integration test binaries under `tests/`
//! (`harness = false`, see `Cargo.toml`) can link against the same
//! code, and so `cargo test --lib` can run in-kernel unit tests under
//! QEMU via `custom_test_frameworks` -- there is no host build of this
//! crate to fall back to; `.cargo/config.toml` pins the target to the
//! freestanding `i686-triterm_os.json` spec unconditionally.
//!
//! [`test_runner`] and [`arch::x86::qemu_exit`] are also exported under
//! the `test-kernel` feature so the `tests/` binaries -- each its own
//! tiny `#![no_main]` crate with its own `kernel_main`/panic handler --
//! can reuse them instead of redefining the QEMU hand-off twice.
//!
//! No heap: every component here uses fixed-size arrays and
//! `spin::Mutex`/atomic statics instead of `Vec`/`Box`, so there is no
//! global allocator to wire up.

#![no_std]
#![cfg_attr(test, feature(custom_test_frameworks))]
#![cfg_attr(test, test_runner(crate::test_runner))]
#![cfg_attr(test, reexport_test_harness_main = "test_main")]

#[macro_use]
pub mod print;

pub mod arch;
pub mod elf;
pub mod error;
pub mod fs;
pub mod log_service;
pub mod process;
pub mod rtc;
pub mod sched;
pub mod sync;
pub mod syscall;
pub mod terminal;

/// Runs every `#[test_case]` fn in order, then shuts QEMU down with the
/// success exit code -- there's no host process to return a status to.
#[cfg(any(test, feature = "test-kernel"))]
pub fn test_runner(tests: &[&dyn Fn()]) {
    println!("running {} tests", tests.len());
    for test in tests {
        test();
    }
    arch::x86::qemu_exit(arch::x86::QemuExitCode::Success);
}

/// Entry point for `cargo test --lib`: GRUB's `_start` jumps here
/// exactly as it would into `main::kernel_main`, but the body just runs
/// the generated `test_main` instead of booting the real kernel. Not
/// compiled when another crate depends on this one with the
/// `test-kernel` feature -- those crates define their own `kernel_main`.
#[cfg(test)]
#[no_mangle]
pub extern "C" fn kernel_main(_multiboot_magic: u32, _multiboot_info_ptr: *const u8) -> ! {
    arch::x86::vga::clear();
    test_main();
    arch::x86::halt_loop();
}

#[cfg(test)]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("[failed]\n{}", info);
    arch::x86::qemu_exit(arch::x86::QemuExitCode::Failed);
}
