//! Shared panic behavior: print the message to stdout, then exit with a
//! fixed status so a parent shell's `execute` can tell panics apart from
//! clean exits. Each binary still needs its own `#[panic_handler]` (the
//! attribute can't live in a library), so it just calls this.

use core::panic::PanicInfo;

pub const PANIC_EXIT_STATUS: i32 = 255;

pub fn handle(info: &PanicInfo) -> ! {
    crate::println!("panic: {}", info);
    crate::syscall::halt(PANIC_EXIT_STATUS)
}
