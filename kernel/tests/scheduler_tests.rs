//! Boots the real kernel bring-up path under QEMU, then exercises the
//! scheduler's process-pool bookkeeping and terminal ownership. A
//! separate binary from the `triterm_kernel` lib (`harness = false`,
//! see `Cargo.toml`) so it can define its own `kernel_main` without
//! colliding with `lib.rs`'s own `cargo test --lib` entry.
//!
//! `sched::tick` itself isn't exercised directly here: it performs a
//! real context switch (or diverges into `execute_from_scheduler`) and
//! expects to be called from the IRQ0 gate with a live scheduler slot
//! already running, not from an ordinary test body.

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(triterm_kernel::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;
use triterm_kernel::arch;
use triterm_kernel::process;
use triterm_kernel::sched;
use triterm_kernel::terminal;

#[no_mangle]
pub extern "C" fn kernel_main(_multiboot_magic: u32, _multiboot_info_ptr: *const u8) -> ! {
    arch::x86::vga::clear();
    test_main();
    arch::x86::halt_loop()
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    triterm_kernel::println!("[failed]\n{}", info);
    arch::x86::qemu_exit(arch::x86::QemuExitCode::Failed)
}

#[test_case]
fn scheduler_starts_on_slot_zero_and_on_screen() {
    assert_eq!(sched::scheduler_slot(), 0);
    assert!(sched::on_screen());
}

#[test_case]
fn root_shells_self_parent_and_occupy_the_first_three_slots() {
    let mut pids = [0i32; process::ROOT_SHELL_COUNT];
    for (terminal, slot) in pids.iter_mut().enumerate() {
        let pid = process::allocate(-1).expect("root shell slot free at boot");
        assert_eq!(pid as usize, terminal);
        assert!(process::is_used(pid));
        process::with_pcb(pid, |pcb| assert_eq!(pcb.parent_pid, pid))
            .expect("just-allocated pid is live");
        *slot = pid;
    }
    for pid in pids {
        process::free(pid);
    }
}

#[test_case]
fn execute_fails_once_the_process_pool_is_full() {
    let mut pids = [0i32; process::MAX_PROCESSES];
    for (i, slot) in pids.iter_mut().enumerate() {
        *slot = process::allocate(0).unwrap_or_else(|_| panic!("slot {i} should still be free"));
    }
    assert!(process::allocate(0).is_err());
    for pid in pids {
        process::free(pid);
    }
}

#[test_case]
fn terminal_ownership_round_trips_through_set_active_pid() {
    terminal::set_active_pid(0, 5, 5);
    assert_eq!(terminal::active_pid(0), 5);
    terminal::set_active_pid(0, -1, -1);
    assert_eq!(terminal::active_pid(0), -1);
}
