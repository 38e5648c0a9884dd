#![no_std]
#![no_main]

use core::panic::PanicInfo;

#[macro_use]
mod print;

mod arch;
mod elf;
mod error;
mod fs;
mod log_service;
mod process;
mod rtc;
mod sched;
mod sync;
mod syscall;
mod terminal;

const MULTIBOOT_MAGIC: u32 = 0x2BADB002;
const FLAG_MODS: u32 = 1 << 3;

/// Just the multiboot v1 info fields this kernel reads: whether a module
/// list is present, and where it is.
#[repr(C)]
struct MultibootInfo {
    flags: u32,
    mem_lower: u32,
    mem_upper: u32,
    boot_device: u32,
    cmdline: u32,
    mods_count: u32,
    mods_addr: u32,
}

#[repr(C)]
struct MultibootModule {
    mod_start: u32,
    mod_end: u32,
    string: u32,
    reserved: u32,
}

/// Locate the filesystem image GRUB loaded as the kernel's one multiboot
/// module. There is exactly one module in this kernel's boot setup, so
/// only `mods_addr[0]` is ever consulted.
///
/// # Safety
/// `info_ptr` must be the multiboot info pointer GRUB left in EBX.
unsafe fn find_fs_module(info_ptr: *const u8) -> Option<(*const u8, usize)> {
    // SAFETY: forwarded from this function's own safety obligation.
    let info = unsafe { &*(info_ptr as *const MultibootInfo) };
    if info.flags & FLAG_MODS == 0 || info.mods_count == 0 {
        return None;
    }
    // SAFETY: `mods_addr` names a valid array of `mods_count` module
    // entries per the multiboot v1 spec; this kernel only ever reads
    // the first one.
    let module = unsafe { &*(info.mods_addr as *const MultibootModule) };
    let len = (module.mod_end - module.mod_start) as usize;
    Some((module.mod_start as *const u8, len))
}

/// Entry point reached from [`arch::x86::multiboot`]'s `_start` trampoline
/// once a stack exists. Brings up every primitive service and core
/// component (§5 boot sequence), then idles -- from here on, the timer,
/// keyboard, and RTC interrupt handlers drive everything.
#[no_mangle]
pub extern "C" fn kernel_main(multiboot_magic: u32, multiboot_info_ptr: *const u8) -> ! {
    if multiboot_magic != MULTIBOOT_MAGIC {
        // No VGA writer is guaranteed usable yet if GRUB's handoff was
        // this wrong; halting is the only safe response.
        arch::x86::halt_loop();
    }

    arch::x86::vga::clear();
    println!("TriTerm OS booting...");

    // SAFETY: `multiboot_info_ptr` is GRUB's info structure per the
    // multiboot v1 contract `_start` relies on.
    let (fs_ptr, fs_len) = match unsafe { find_fs_module(multiboot_info_ptr) } {
        Some(module) => module,
        None => {
            println!("no filesystem module passed by the boot loader");
            arch::x86::halt_loop();
        }
    };
    // SAFETY: the module GRUB loaded stays mapped and unmodified for the
    // kernel's lifetime; nothing else claims this memory region.
    unsafe { fs::init(fs_ptr, fs_len) };

    log_service::log_init();
    arch::x86::init();
    syscall::init();
    arch::x86::enable_devices();

    arch::x86::halt_loop();
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    println!("[KERNEL PANIC] {}", info);
    arch::x86::halt_loop();
}
