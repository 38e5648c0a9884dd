//! Runtime support shared by every TriTerm OS user program: the raw
//! syscall wrappers, `_start`/`entry_point!`, `print!`/`println!`, and a
//! shared panic path.
//!
//! No heap -- programs built against this crate use fixed-size stack
//! buffers the same way the kernel itself avoids `Vec`/`Box`.

#![no_std]

#[macro_use]
pub mod print;

pub mod entry;
pub mod panic;
pub mod syscall;
