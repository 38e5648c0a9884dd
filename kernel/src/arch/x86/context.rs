//! The context switch trampoline.
//!
//! Each process's saved state is nothing more than a (stack pointer,
//! frame pointer) pair (§3 PCB fields `sched_sp`/`sched_fp`); everything
//! else -- the other callee-saved registers, the return address -- lives
//! on the stack itself, pushed by the previous call into `switch_to` and
//! popped by the next one. This is the same trick as a cooperative
//! coroutine switch; it works here because every transfer of control
//! between processes' kernel stacks goes through this one function.
//!
//! Grounded on the teacher's naked `context_switch` idiom (callee-saved
//! push/pop around a stack-pointer swap); the exact register set pushed
//! (ebp, ebx, esi, edi) matches the cdecl callee-saved set for i686.

use core::arch::asm;

/// Save the currently running stack/frame pointer into `*save_sp`/`*save_fp`,
/// then switch onto `new_sp`/`new_fp` and resume wherever that stack last
/// left off.
///
/// # Safety
/// `new_sp`/`new_fp` must be a (stack pointer, frame pointer) pair
/// previously produced by this same function (or a hand-built initial
/// stack frame with the matching callee-saved layout), pointing at a
/// live, correctly-sized kernel stack for the target process.
#[naked]
pub unsafe extern "C" fn switch_to(save_sp: *mut u32, save_fp: *mut u32, new_sp: u32, new_fp: u32) {
    // SAFETY: this is the entire body of a #[naked] function; it must
    // not touch the stack before saving callee-saved registers, and must
    // end in a control-transfer instruction.
    //
    // Stack layout right after the four pushes, relative to esp:
    // [edi][esi][ebx][ebp][retaddr][save_sp][save_fp][new_sp][new_fp]
    // so the four cdecl args sit at esp+20, esp+24, esp+28, esp+32.
    unsafe {
        asm!(
            "push ebp",
            "push ebx",
            "push esi",
            "push edi",
            "mov eax, [esp + 20]", // save_sp
            "mov [eax], esp",
            "mov eax, [esp + 24]", // save_fp
            "mov [eax], ebp",
            "mov ecx, [esp + 28]", // new_sp (value, read before esp moves)
            "mov edx, [esp + 32]", // new_fp (value, read before esp moves)
            "mov esp, ecx",
            "mov ebp, edx",
            "pop edi",
            "pop esi",
            "pop ebx",
            "add esp, 4", // skip the target's saved-ebp slot; ebp already set above
            "ret",
            options(noreturn)
        )
    }
}
