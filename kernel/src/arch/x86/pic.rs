//! 8259 Programmable Interrupt Controller, hand-rolled against
//! [`super::io`] port primitives.
//!
//! The teacher's equivalent drivers a `pic8259`-crate `ChainedPics` value,
//! but that crate's `Port` type is sourced from the `x86_64` crate and
//! can't target i686 (see DESIGN.md). The remap sequence below is the
//! same four-ICW dance that crate performs internally, written directly
//! against `in8`/`out8`.

use super::io::{in8, io_wait, out8};

const PIC1_CMD: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_CMD: u16 = 0xA0;
const PIC2_DATA: u16 = 0xA1;

const ICW1_INIT: u8 = 0x10;
const ICW1_ICW4: u8 = 0x01;
const ICW4_8086: u8 = 0x01;
const PIC_EOI: u8 = 0x20;

/// Vector offset for the master PIC (IRQ0-7 -> 0x20-0x27).
pub const PIC1_OFFSET: u8 = 0x20;
/// Vector offset for the slave PIC (IRQ8-15 -> 0x28-0x2F).
pub const PIC2_OFFSET: u8 = 0x28;

/// Remap both PICs so IRQs land outside the CPU exception range, then
/// mask every line. Callers unmask individual IRQs with [`enable_irq`]
/// once their handler is ready.
pub fn init() {
    // SAFETY: standard ICW1-ICW4 PIC remap sequence; each out8 targets a
    // PIC command/data port and io_wait gives the (real or emulated)
    // hardware time to latch between writes.
    unsafe {
        let mask1 = in8(PIC1_DATA);
        let mask2 = in8(PIC2_DATA);

        out8(PIC1_CMD, ICW1_INIT | ICW1_ICW4);
        io_wait();
        out8(PIC2_CMD, ICW1_INIT | ICW1_ICW4);
        io_wait();

        out8(PIC1_DATA, PIC1_OFFSET);
        io_wait();
        out8(PIC2_DATA, PIC2_OFFSET);
        io_wait();

        out8(PIC1_DATA, 4); // tell master PIC: slave sits on IRQ2
        io_wait();
        out8(PIC2_DATA, 2); // tell slave PIC its cascade identity
        io_wait();

        out8(PIC1_DATA, ICW4_8086);
        io_wait();
        out8(PIC2_DATA, ICW4_8086);
        io_wait();

        out8(PIC1_DATA, mask1);
        out8(PIC2_DATA, mask2);
    }
}

/// Unmask a single IRQ line (0-15).
pub fn enable_irq(irq: u8) {
    let (port, bit) = if irq < 8 {
        (PIC1_DATA, irq)
    } else {
        (PIC2_DATA, irq - 8)
    };
    // SAFETY: clearing one mask bit on the PIC's data port.
    unsafe {
        let mask = in8(port);
        out8(port, mask & !(1 << bit));
    }
}

/// Mask a single IRQ line (0-15).
pub fn disable_irq(irq: u8) {
    let (port, bit) = if irq < 8 {
        (PIC1_DATA, irq)
    } else {
        (PIC2_DATA, irq - 8)
    };
    // SAFETY: setting one mask bit on the PIC's data port.
    unsafe {
        let mask = in8(port);
        out8(port, mask | (1 << bit));
    }
}

/// Signal end-of-interrupt for `irq` (0-15). Must be sent to both PICs
/// when the IRQ came from the slave (irq >= 8).
pub fn send_eoi(irq: u8) {
    // SAFETY: writing the EOI command byte to the command port(s).
    unsafe {
        if irq >= 8 {
            out8(PIC2_CMD, PIC_EOI);
        }
        out8(PIC1_CMD, PIC_EOI);
    }
}
