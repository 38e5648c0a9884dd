//! Programmable Interval Timer, channel 0, driving the ~80 Hz scheduler
//! tick (§4.F) and the kernel's coarse wall-clock for [`ticks_ms`].
//!
//! Grounded on the teacher's PIT/APIC timer setup idiom (`arch/timer.rs`,
//! now trimmed) for the mode-3 programming sequence; the target frequency
//! and its consumer are new to this spec.

use core::sync::atomic::{AtomicU64, Ordering};

use super::io::{out8, io_wait};

const PIT_CHANNEL0_DATA: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;
const PIT_INPUT_HZ: u32 = 1_193_182;

/// Scheduler tick rate named in SPEC_FULL.md §4.F.
pub const TARGET_HZ: u32 = 80;

static TICKS: AtomicU64 = AtomicU64::new(0);

/// Program channel 0 for mode 3 (square wave), rate generator at
/// [`TARGET_HZ`].
pub fn init() {
    let divisor = (PIT_INPUT_HZ / TARGET_HZ) as u16;
    // SAFETY: standard PIT channel-0 mode-3 programming sequence: select
    // channel/mode via the command port, then write the 16-bit divisor
    // low byte then high byte to the channel's data port.
    unsafe {
        out8(PIT_COMMAND, 0x36); // channel 0, lobyte/hibyte, mode 3, binary
        io_wait();
        out8(PIT_CHANNEL0_DATA, (divisor & 0xFF) as u8);
        io_wait();
        out8(PIT_CHANNEL0_DATA, ((divisor >> 8) & 0xFF) as u8);
    }
}

/// Called once per IRQ0 from the timer's interrupt handler.
pub fn on_tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Milliseconds elapsed since boot, accurate to one tick period
/// (`1000 / TARGET_HZ` ms, i.e. 12ms at 80 Hz).
pub fn ticks_ms() -> u64 {
    TICKS.load(Ordering::Relaxed) * 1000 / TARGET_HZ as u64
}
