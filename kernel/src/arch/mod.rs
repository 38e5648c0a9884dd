//! Architecture support.
//!
//! This kernel targets 32-bit protected-mode x86 only (see DESIGN.md for
//! why the teacher's multi-architecture long-mode stack doesn't apply
//! here). `arch::x86` is the primitive-service layer: port I/O, PIC/PIT/RTC
//! register programming, GDT/IDT/page-table layout, VGA character output,
//! and keyboard scancode decoding. None of it is "the core" -- the six
//! components in SPEC_FULL.md call into it but do not re-derive it.

pub mod x86;

pub use x86::*;
