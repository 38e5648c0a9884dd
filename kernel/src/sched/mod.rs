//! Timer-driven round-robin scheduler (§3, §4.F).
//!
//! Runs entirely inside the IRQ0 handler: `tick()` is called with
//! interrupts effectively disabled (the CPU doesn't re-enable IF on
//! entry to an interrupt gate) and either hands off to the next
//! terminal's process via [`context::switch_to`] or spawns a fresh root
//! shell on an idle terminal slot. Either way it does not return to its
//! caller in the usual sense: a context switch resumes *some* previously
//! preempted call to `tick`, possibly much later.
//!
//! Grounded on the teacher's scheduler module for the overall "ISR picks
//! next task and swaps stacks" shape; the exact three-terminal
//! round-robin algorithm and idle-slot bootstrap are this spec's own
//! (§4.F).

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::arch::x86::{context, gdt, paging, pic, vga};
use crate::process;
use crate::terminal;

/// `scheduler_slot` (§3): which terminal's process is running *now*.
static SCHEDULER_SLOT: AtomicUsize = AtomicUsize::new(0);
/// `on_screen` (§3): `scheduler_slot == current_terminal`.
static ON_SCREEN: AtomicBool = AtomicBool::new(true);

pub fn scheduler_slot() -> usize {
    SCHEDULER_SLOT.load(Ordering::SeqCst)
}

pub fn on_screen() -> bool {
    ON_SCREEN.load(Ordering::SeqCst)
}

/// Physical frame to map into the incoming process's vidmap page: the
/// live VGA frame if its terminal is visible, else that terminal's
/// backing store. The backing store lives inside this kernel image
/// (identity-mapped low memory), so its own address already *is* its
/// physical address.
fn video_phys_for_slot(slot: usize, on_screen: bool) -> u32 {
    if on_screen {
        paging::VGA_PHYS_ADDR
    } else {
        terminal::backing_store_phys_addr(slot)
    }
}

/// Called from the IRQ0 handler at ~80 Hz (§4.F).
pub fn tick() {
    let s = SCHEDULER_SLOT.load(Ordering::SeqCst);
    let s_next = (s + 1) % terminal::TERMINAL_COUNT;
    let current_terminal = terminal::current_terminal();

    // Step 1: only the visible terminal accepts typing.
    pic::disable_irq(1);
    if s_next == current_terminal {
        pic::enable_irq(1);
    }

    // Step 2.
    let next_on_screen = s_next == current_terminal;
    ON_SCREEN.store(next_on_screen, Ordering::SeqCst);
    let video_phys = video_phys_for_slot(s_next, next_on_screen);

    let next_pid = terminal::active_pid(s_next);

    if next_pid < 0 {
        // Step 3: nothing has ever run on this terminal's slot yet.
        pic::send_eoi(0);
        paging::map_user_vidmem(video_phys);
        SCHEDULER_SLOT.store(s_next, Ordering::SeqCst);
        vga::set_cursor(0, 0);
        vga::set_logical_cursor(0, 0);
        // `execute` never returns here directly; the root-shell bootstrap
        // in `halt` guarantees this path runs at most once per terminal.
        crate::syscall::execute_from_scheduler(s_next);
    }

    // Step 4: hand off to an already-running process.
    // SAFETY: `get_curr_pcb` is valid because `tick` only ever runs
    // after at least one process exists on the current scheduler slot.
    let current_pcb = unsafe { process::get_curr_pcb() };

    paging::map_user_program(next_pid as u32);
    paging::map_user_vidmem(video_phys);
    gdt::set_kernel_stack(process::stack_top(next_pid) - 4);
    SCHEDULER_SLOT.store(s_next, Ordering::SeqCst);

    let (row, col) = terminal::cursor_for(s_next);
    vga::set_cursor(row, col);
    vga::set_logical_cursor(row, col);

    let (new_sp, new_fp) = process::with_pcb(next_pid, |pcb| (pcb.sched_sp, pcb.sched_fp))
        .expect("scheduler slot names a live pid");

    // SAFETY: `new_sp`/`new_fp` were saved by a prior call to this same
    // function (or by `execute`'s initial-frame setup) for `next_pid`,
    // which is confirmed live above.
    unsafe {
        context::switch_to(
            &mut current_pcb.sched_sp,
            &mut current_pcb.sched_fp,
            new_sp,
            new_fp,
        );
    }
}
