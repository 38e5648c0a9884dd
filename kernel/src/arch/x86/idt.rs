//! 32-bit Interrupt Descriptor Table.
//!
//! Wires CPU exceptions, the remapped PIC IRQ lines (timer, keyboard, RTC),
//! and the `int 0x80` syscall gate into one 256-entry table. Exception and
//! IRQ handlers are fixed at build time; `register_handler` exists for the
//! one case that needs a late binding -- the syscall gate, installed once
//! `syscall::dispatch` exists.
//!
//! Grounded on the teacher's `idt.rs` `lazy_static!` table + `extern
//! "x86-interrupt"` handler idiom, adapted from 64-bit to 32-bit gate
//! descriptors (8 bytes, not 16; no IST).

use lazy_static::lazy_static;
use spin::Mutex;

use super::pic;

const IDT_ENTRIES: usize = 256;

const VEC_DIVIDE_ERROR: usize = 0;
const VEC_INVALID_OPCODE: usize = 6;
const VEC_GENERAL_PROTECTION: usize = 13;
const VEC_PAGE_FAULT: usize = 14;
const VEC_IRQ0_TIMER: usize = 32;
const VEC_IRQ1_KEYBOARD: usize = 33;
const VEC_IRQ8_RTC: usize = 40;
const VEC_SYSCALL: usize = 0x80;

const GATE_PRESENT_RING0: u8 = 0x8E; // present, ring 0, 32-bit interrupt gate
const GATE_PRESENT_RING3: u8 = 0xEE; // present, ring 3, 32-bit interrupt gate (callable via `int`)

#[repr(C)]
pub struct InterruptStackFrame {
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub esp: u32,
    pub ss: u32,
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            zero: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    fn new(handler: u32, type_attr: u8) -> Self {
        Self {
            offset_low: (handler & 0xFFFF) as u16,
            selector: super::gdt::KERNEL_CS,
            zero: 0,
            type_attr,
            offset_high: ((handler >> 16) & 0xFFFF) as u16,
        }
    }
}

#[repr(C, packed)]
struct DescriptorTablePointer {
    limit: u16,
    base: u32,
}

extern "x86-interrupt" fn divide_error(_frame: InterruptStackFrame) {
    crate::process::exit_current_on_exception();
}

extern "x86-interrupt" fn invalid_opcode(_frame: InterruptStackFrame) {
    crate::process::exit_current_on_exception();
}

extern "x86-interrupt" fn general_protection_fault(_frame: InterruptStackFrame, _err: u32) {
    crate::process::exit_current_on_exception();
}

extern "x86-interrupt" fn page_fault(_frame: InterruptStackFrame, _err: u32) {
    crate::process::exit_current_on_exception();
}

extern "x86-interrupt" fn irq0_timer(_frame: InterruptStackFrame) {
    super::pit::on_tick();
    crate::sched::tick();
    pic::send_eoi(0);
}

extern "x86-interrupt" fn irq1_keyboard(_frame: InterruptStackFrame) {
    super::keyboard::handle_interrupt();
    pic::send_eoi(1);
}

extern "x86-interrupt" fn irq8_rtc(_frame: InterruptStackFrame) {
    // SAFETY: register C must be read to re-arm the periodic interrupt
    // before the next one can fire; the value itself is unused.
    unsafe { super::rtc_hw::acknowledge() };
    crate::rtc::handle_interrupt();
    pic::send_eoi(8);
}

lazy_static! {
    static ref IDT: Mutex<[IdtEntry; IDT_ENTRIES]> = {
        let mut table = [IdtEntry::missing(); IDT_ENTRIES];
        table[VEC_DIVIDE_ERROR] = IdtEntry::new(divide_error as u32, GATE_PRESENT_RING0);
        table[VEC_INVALID_OPCODE] = IdtEntry::new(invalid_opcode as u32, GATE_PRESENT_RING0);
        table[VEC_GENERAL_PROTECTION] =
            IdtEntry::new(general_protection_fault as u32, GATE_PRESENT_RING0);
        table[VEC_PAGE_FAULT] = IdtEntry::new(page_fault as u32, GATE_PRESENT_RING0);
        table[VEC_IRQ0_TIMER] = IdtEntry::new(irq0_timer as u32, GATE_PRESENT_RING0);
        table[VEC_IRQ1_KEYBOARD] = IdtEntry::new(irq1_keyboard as u32, GATE_PRESENT_RING0);
        table[VEC_IRQ8_RTC] = IdtEntry::new(irq8_rtc as u32, GATE_PRESENT_RING0);
        Mutex::new(table)
    };
}

/// Patch one IDT entry to point at the function living at `handler_addr`,
/// usable from ring 3 if `callable_from_userspace` is set. Used to
/// install the `int 0x80` gate once `syscall::init` builds its naked
/// entry trampoline -- that trampoline isn't an `extern "x86-interrupt"`
/// function (it needs full control over every general-purpose register
/// to implement the syscall ABI), so this takes a raw address rather
/// than a typed handler fn.
pub fn register_handler(vector: u8, handler_addr: u32, callable_from_userspace: bool) {
    let attr = if callable_from_userspace {
        GATE_PRESENT_RING3
    } else {
        GATE_PRESENT_RING0
    };
    let mut table = IDT.lock();
    table[vector as usize] = IdtEntry::new(handler_addr, attr);
}

/// Build the IDT and load it with `lidt`. Exception/IRQ gates are fixed;
/// the syscall gate is filled in separately by `syscall::init`, which
/// calls [`register_handler`] for vector [`VEC_SYSCALL`].
pub fn init() {
    let idtr = {
        let table = IDT.lock();
        DescriptorTablePointer {
            limit: (core::mem::size_of::<[IdtEntry; IDT_ENTRIES]>() - 1) as u16,
            base: table.as_ptr() as u32,
        }
    };
    // SAFETY: `idtr` points at a table that outlives this function (it is
    // a lazy_static held for 'static); `lidt` only loads IDTR.
    unsafe {
        core::arch::asm!("lidt [{0}]", in(reg) &idtr, options(readonly, nostack));
    }
}

/// Vector used for the syscall gate, exported so `syscall::init` doesn't
/// need to duplicate the constant.
pub const SYSCALL_VECTOR: u8 = VEC_SYSCALL as u8;
