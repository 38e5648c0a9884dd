//! CMOS Real-Time Clock register access.
//!
//! There is exactly one hardware periodic-interrupt source here; the
//! `rtc` module (§4.D) multiplexes it across every process's requested
//! rate via a shared `highest_rtc_hz` and per-process divisor/count
//! downcounters. This module only knows about the three CMOS registers
//! involved -- it has no notion of "process" or "divisor".
//!
//! Grounded on the teacher's CMOS/RTC port access idiom; register bit
//! layout is supplemented from original_source's `rtc.c` (registers A/B/C,
//! rate divider in register A bits 0-3, periodic-interrupt-enable in
//! register B bit 6, register C must be read to re-arm -- SPEC_FULL.md
//! §1.2).

use super::io::{in8, out8};

const CMOS_INDEX_PORT: u16 = 0x70;
const CMOS_DATA_PORT: u16 = 0x71;
const NMI_DISABLE_BIT: u8 = 0x80;

const REG_A: u8 = 0x0A;
const REG_B: u8 = 0x0B;
const REG_C: u8 = 0x0C;

/// Lowest rate divider code yielding the highest supported frequency
/// (1024 Hz): `32768 >> (6 - 1) == 1024`.
const RATE_CODE_MAX_HZ: u8 = 6;
/// Highest rate divider code yielding the lowest supported frequency
/// (2 Hz): `32768 >> (15 - 1) == 2`.
const RATE_CODE_MIN_HZ: u8 = 15;

fn read_register(reg: u8) -> u8 {
    // SAFETY: CMOS register access is always index-then-data; NMI is
    // masked for the duration via the index byte's top bit.
    unsafe {
        out8(CMOS_INDEX_PORT, reg | NMI_DISABLE_BIT);
        in8(CMOS_DATA_PORT)
    }
}

fn write_register(reg: u8, value: u8) {
    // SAFETY: same index-then-data CMOS access pattern as read_register.
    unsafe {
        out8(CMOS_INDEX_PORT, reg | NMI_DISABLE_BIT);
        out8(CMOS_DATA_PORT, value);
    }
}

/// Enable the periodic-interrupt bit in register B and set the hardware
/// rate to the lowest supported frequency (2 Hz). The `rtc` module raises
/// it via [`set_rate_hz`] as processes request faster rates.
pub fn init() {
    let prev_b = read_register(REG_B);
    write_register(REG_B, prev_b | 0x40); // bit 6: enable periodic interrupt
    set_rate_hz(2);
    acknowledge();
}

/// Program register A's rate divider to the CMOS code producing `hz`.
/// `hz` must be a power of two in `[2, 1024]` (validated by the `rtc`
/// module before calling this).
pub fn set_rate_hz(hz: u32) {
    let mut rate = RATE_CODE_MIN_HZ;
    let mut freq = 2u32;
    while freq < hz && rate > RATE_CODE_MAX_HZ {
        rate -= 1;
        freq <<= 1;
    }
    let prev_a = read_register(REG_A);
    write_register(REG_A, (prev_a & 0xF0) | rate);
}

/// Read register C to re-arm the periodic interrupt. The CMOS RTC
/// delivers no further IRQ8 until this happens, regardless of register
/// A/B state.
///
/// # Safety
/// Must be called from the IRQ8 handler after every delivered interrupt.
pub unsafe fn acknowledge() -> u8 {
    read_register(REG_C)
}
