//! Primitive services for 32-bit protected-mode x86.
//!
//! Every submodule here is a thin wrapper over one piece of hardware
//! (ports, the PIC, the PIT, the CMOS RTC, VGA text memory, the PS/2
//! keyboard, paging, segmentation) or over the one piece of raw assembly
//! a context switch needs. None of it knows about processes, terminals,
//! or the filesystem -- those live in the core modules one level up and
//! call down into this layer, never the other way around.

pub mod context;
pub mod gdt;
pub mod idt;
pub mod io;
pub mod keyboard;
pub mod multiboot;
pub mod paging;
pub mod pic;
pub mod pit;
pub mod rtc_hw;
pub mod vga;

/// Bring up every primitive service in the order the rest of boot
/// depends on: segmentation before interrupts, interrupts before the
/// devices that raise them, paging last so the kernel's own code and
/// data are mapped before anything else can page-fault against it.
pub fn init() {
    gdt::init();
    idt::init();
    pic::init();
    pit::init();
    rtc_hw::init();
    paging::init();
}

/// Unmask the three IRQ lines this kernel cares about and enable
/// interrupts. Split from [`init`] so callers can finish wiring the
/// syscall gate and scheduler state first.
pub fn enable_devices() {
    pic::enable_irq(0); // PIT
    pic::enable_irq(1); // keyboard
    pic::enable_irq(8); // RTC
    // SAFETY: IDT and PIC are fully programmed by this point.
    unsafe { io::sti() };
}

/// Halt forever, used by the idle loop and as a last resort if `main`
/// ever returns.
pub fn halt_loop() -> ! {
    loop {
        io::hlt();
    }
}

/// Exit code written to QEMU's isa-debug-exit device (`-device
/// isa-debug-exit,iobase=0xf4,iosize=0x04`), used only by the
/// integration test binaries to report pass/fail to the host.
#[cfg(any(test, feature = "test-kernel"))]
#[derive(Clone, Copy)]
pub enum QemuExitCode {
    Success = 0x10,
    Failed = 0x11,
}

/// Shut the emulator down with `code`. QEMU reports `(code << 1) | 1` as
/// its own process exit status.
#[cfg(any(test, feature = "test-kernel"))]
pub fn qemu_exit(code: QemuExitCode) -> ! {
    // SAFETY: port 0xf4 only exists, and only has this effect, under the
    // isa-debug-exit device this kernel's test runner configures QEMU
    // with; writing any other value there would be unsound in general
    // but is exactly what that device expects.
    unsafe { io::out32(0xf4, code as u32) };
    halt_loop()
}
