//! Virtualised periodic RTC (§3, §4.D): one hardware periodic source
//! multiplexed across processes by a shared `highest_rtc_hz` and
//! per-process divisor/count downcounters.
//!
//! `arch::x86::rtc_hw` owns the three CMOS registers; this module owns
//! none of them directly and only ever asks `rtc_hw::set_rate_hz` to
//! reprogram the hardware rate.
//!
//! Grounded on original_source's `rtc.c` for the divisor-gating
//! algorithm; the frequency-validation and max-recompute logic mirror
//! its `rtc_write`/`rtc_close` behaviour exactly (§4.D).

use core::sync::atomic::{AtomicU32, Ordering};

use crate::arch::x86::{io, rtc_hw};
use crate::error::{KernelResult, RtcError};
use crate::process::{self, Pcb};
use crate::terminal;

const DEFAULT_HZ: u32 = 2;
const MIN_HZ: u32 = 2;
const MAX_HZ: u32 = 1024;

/// `highest_rtc_hz` (§3 global kernel state): the actual hardware
/// programmed rate.
static HIGHEST_RTC_HZ: AtomicU32 = AtomicU32::new(DEFAULT_HZ);

fn is_valid_hz(hz: u32) -> bool {
    (MIN_HZ..=MAX_HZ).contains(&hz) && hz.is_power_of_two()
}

pub fn highest_rtc_hz() -> u32 {
    HIGHEST_RTC_HZ.load(Ordering::SeqCst)
}

/// `rtc.write(hz)` (§4.D). Validates `hz`, records it as the caller's
/// `requested_clock_hz`, and either raises the hardware rate (and
/// every live process's divisor) or just updates the caller's own
/// divisor against the unchanged hardware rate.
pub fn write(pcb: &mut Pcb, hz: u32) -> KernelResult<()> {
    if !is_valid_hz(hz) {
        return Err(RtcError::InvalidFrequency { hz }.into());
    }
    pcb.requested_clock_hz = hz;

    let highest = HIGHEST_RTC_HZ.load(Ordering::SeqCst);
    if hz > highest {
        HIGHEST_RTC_HZ.store(hz, Ordering::SeqCst);
        rtc_hw::set_rate_hz(hz);
        recompute_all_divisors(hz);
    } else {
        pcb.divisor = highest / hz;
    }
    Ok(())
}

/// `rtc.close` (§4.D): recompute the maximum requested rate across
/// every still-live process and lower the hardware rate if possible.
pub fn close(pcb: &mut Pcb) {
    pcb.requested_clock_hz = 0;
    let closing_pid = pcb.pid;

    let mut new_max = DEFAULT_HZ;
    for pid in 0..process::MAX_PROCESSES as i32 {
        if pid == closing_pid {
            continue;
        }
        process::with_pcb(pid, |other| {
            if other.requested_clock_hz > new_max {
                new_max = other.requested_clock_hz;
            }
        });
    }

    if new_max < HIGHEST_RTC_HZ.load(Ordering::SeqCst) {
        HIGHEST_RTC_HZ.store(new_max, Ordering::SeqCst);
        rtc_hw::set_rate_hz(new_max);
        recompute_all_divisors(new_max);
    }
}

fn recompute_all_divisors(highest: u32) {
    for pid in 0..process::MAX_PROCESSES as i32 {
        process::with_pcb(pid, |pcb| {
            if pcb.requested_clock_hz > 0 {
                pcb.divisor = highest / pcb.requested_clock_hz;
            }
        });
    }
}

/// `rtc.read` (§4.D): arm `count = divisor`, enable interrupts, busy-wait
/// for that many hardware ticks observed through this process's own
/// terminal's `pending` flag, then return 0.
pub fn read(pcb: &mut Pcb) -> KernelResult<usize> {
    pcb.count = pcb.divisor.max(1);
    // SAFETY: the scheduler and RTC ISR must keep running while this
    // busy-waits (§5 suspension point 2).
    unsafe { io::sti() };
    while pcb.count > 0 {
        if terminal::take_pending(pcb.terminal) {
            pcb.count -= 1;
        } else {
            io::hlt();
        }
    }
    Ok(0)
}

/// Called from the IRQ8 handler after register C has been read: fan the
/// tick out to every terminal (§4.D).
pub fn handle_interrupt() {
    terminal::mark_all_pending();
}
