//! Multi-terminal abstraction (§3, §4.C): three logical terminals
//! sharing one physical VGA screen, each with its own line-buffered
//! input, cursor, and off-screen backing store.
//!
//! Keyboard IRQ -> [`handle_char`]/[`clear_current`]/[`switch_to`]/
//! [`recall_history`]; syscall `read`/`write` on fd 0/1 -> [`read`]/
//! [`write`] below. The scheduler (§4.F) is the only other module that
//! touches terminal state, via [`set_active_pid`] and the cursor/video
//! accessors it needs each tick.
//!
//! Grounded on the teacher's terminal/line-discipline module for the
//! overall shape (buffered input, hotkey dispatch); the exact buffer
//! semantics (typing/typed/history, `bytes_ready`, `buffer_updated`) are
//! this spec's own (§3/§4.C).

use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Mutex;

use crate::arch::x86::vga;
use crate::error::KernelResult;
use crate::process::Pcb;

pub const TERMINAL_COUNT: usize = 3;
pub const LINE_BUF_SIZE: usize = 128;

/// The literal prompt string a user-space shell writes, rewritten on the
/// way out to a decorated banner (§6 "Terminal output of the kernel").
const PROMPT_LITERAL: &str = "391OS> ";
const PROMPT_BANNER: &str = "\n== TriTerm ==\n$ ";

pub struct Terminal {
    pub typing: [u8; LINE_BUF_SIZE],
    pub typing_len: usize,
    pub typed: [u8; LINE_BUF_SIZE],
    pub typed_len: usize,
    pub history: [u8; LINE_BUF_SIZE],
    pub history_len: usize,
    pub bytes_ready: usize,
    pub buffer_updated: bool,
    pub cursor_x: usize,
    pub cursor_y: usize,
    pub active_pid: i32,
    pub active_parent_pid: i32,
    /// Virtual-RTC tick flag (§4.D); one per terminal, set by every
    /// hardware RTC tick and cleared when that terminal's running
    /// process observes it in `rtc.read`.
    pub pending: bool,
    /// Off-screen copy of this terminal's video memory, swapped with
    /// the live VGA buffer on an Alt+Fn switch.
    screen: [u16; vga::BUFFER_SIZE],
}

impl Terminal {
    const fn new() -> Self {
        Self {
            typing: [0; LINE_BUF_SIZE],
            typing_len: 0,
            typed: [0; LINE_BUF_SIZE],
            typed_len: 0,
            history: [0; LINE_BUF_SIZE],
            history_len: 0,
            bytes_ready: 0,
            buffer_updated: false,
            cursor_x: 0,
            cursor_y: 0,
            active_pid: -1,
            active_parent_pid: -1,
            pending: false,
            screen: [0x0720; vga::BUFFER_SIZE], // light-grey-on-black space
        }
    }
}

static TERMINALS: Mutex<[Terminal; TERMINAL_COUNT]> = Mutex::new([
    Terminal::new(),
    Terminal::new(),
    Terminal::new(),
]);

/// Which terminal is visible right now (§3 global kernel state).
static CURRENT_TERMINAL: AtomicUsize = AtomicUsize::new(0);

pub fn current_terminal() -> usize {
    CURRENT_TERMINAL.load(Ordering::SeqCst)
}

/// Append one decoded character from the keyboard to the visible
/// terminal's `typing` buffer (§4.C line discipline).
pub fn handle_char(ch: char) {
    let slot = current_terminal();
    let mut terms = TERMINALS.lock();
    let term = &mut terms[slot];
    match ch {
        '\u{8}' => backspace(term), // backspace
        '\n' | '\r' => commit_line(term),
        c if c.is_ascii() && !c.is_control() => {
            if term.typing_len < LINE_BUF_SIZE {
                term.typing[term.typing_len] = c as u8;
                term.typing_len += 1;
                vga::putc(c as u8);
            }
        }
        _ => {}
    }
}

fn backspace(term: &mut Terminal) {
    if term.typing_len == 0 {
        return;
    }
    term.typing_len -= 1;
    term.typing[term.typing_len] = 0;
    // Move left, blank the cell, move left again.
    let (row, col) = vga::cursor_position();
    if col > 0 {
        vga::set_logical_cursor(row, col - 1);
        vga::set_cursor(row, col - 1);
        vga::putc(b' ');
        vga::set_logical_cursor(row, col - 1);
        vga::set_cursor(row, col - 1);
    }
}

fn commit_line(term: &mut Terminal) {
    vga::putc(b'\n');
    term.typed[..term.typing_len].copy_from_slice(&term.typing[..term.typing_len]);
    term.typed_len = term.typing_len;
    term.history[..term.typing_len].copy_from_slice(&term.typing[..term.typing_len]);
    term.history_len = term.typing_len;
    // +1 to include the newline that was just echoed (§4.C).
    term.bytes_ready = term.typing_len + 1;
    term.typing_len = 0;
    term.typing = [0; LINE_BUF_SIZE];
    term.buffer_updated = true;
}

/// Ctrl+L (§4.C): clear the visible terminal's screen, re-echo its
/// current `typing` buffer.
pub fn clear_current() {
    let slot = current_terminal();
    vga::clear();
    let terms = TERMINALS.lock();
    let term = &terms[slot];
    for i in 0..term.typing_len {
        vga::putc(term.typing[i]);
    }
}

/// Up-arrow (§4.C): replace `typing` with `history`, re-echo.
pub fn recall_history() {
    let slot = current_terminal();
    let mut terms = TERMINALS.lock();
    let term = &mut terms[slot];
    term.typing[..term.history_len].copy_from_slice(&term.history[..term.history_len]);
    term.typing_len = term.history_len;
    for i in 0..term.typing_len {
        vga::putc(term.typing[i]);
    }
}

/// Alt+F{1,2,3} (§4.C): swap the live VGA frame with `target`'s backing
/// store, restore its cursor, and make it the visible terminal.
pub fn switch_to(target: usize) {
    if target >= TERMINAL_COUNT {
        return;
    }
    let current = current_terminal();
    if target == current {
        return;
    }
    let mut terms = TERMINALS.lock();
    let (row, col) = vga::cursor_position();
    terms[current].cursor_y = row;
    terms[current].cursor_x = col;
    vga::save_screen(&mut terms[current].screen);

    vga::restore_screen(&terms[target].screen);
    vga::set_cursor(terms[target].cursor_y, terms[target].cursor_x);
    vga::set_logical_cursor(terms[target].cursor_y, terms[target].cursor_x);

    CURRENT_TERMINAL.store(target, Ordering::SeqCst);
}

/// Update a terminal's owning process (§4.E step 9, §4.E `halt` step 2).
pub fn set_active_pid(slot: usize, pid: i32, parent_pid: i32) {
    if slot < TERMINAL_COUNT {
        let mut terms = TERMINALS.lock();
        terms[slot].active_pid = pid;
        terms[slot].active_parent_pid = parent_pid;
    }
}

pub fn active_pid(slot: usize) -> i32 {
    TERMINALS.lock()[slot].active_pid
}

/// `slot`'s saved cursor coordinates as `(row, col)`, for the scheduler
/// to restore via `vga::set_cursor`/`vga::set_logical_cursor` on a
/// non-idle hand-off (§4.F step 4).
pub fn cursor_for(slot: usize) -> (usize, usize) {
    let term = &TERMINALS.lock()[slot];
    (term.cursor_y, term.cursor_x)
}

/// Address of `slot`'s off-screen backing store. The backing store is
/// ordinary kernel static data inside the identity-mapped low-memory
/// region, so this doubles as its physical address for
/// `paging::map_user_vidmem` (§4.A).
pub fn backing_store_phys_addr(slot: usize) -> u32 {
    let terms = TERMINALS.lock();
    &terms[slot].screen as *const _ as u32
}

/// Set every terminal's RTC `pending` flag (§4.D: one hardware tick
/// fans out to all three terminals).
pub fn mark_all_pending() {
    let mut terms = TERMINALS.lock();
    for term in terms.iter_mut() {
        term.pending = true;
    }
}

/// Test-and-clear a terminal's pending flag; used by `rtc.read`'s
/// busy-wait.
pub fn take_pending(slot: usize) -> bool {
    let mut terms = TERMINALS.lock();
    if terms[slot].pending {
        terms[slot].pending = false;
        true
    } else {
        false
    }
}

/// Terminal `read` (§4.E, §4.C): block until the calling process's own
/// terminal's `buffer_updated` flag is raised, then copy out `typed`.
pub fn read(pcb: &mut Pcb, buf: &mut [u8]) -> KernelResult<usize> {
    let slot = pcb.terminal;
    loop {
        {
            let mut terms = TERMINALS.lock();
            if terms[slot].buffer_updated {
                let term = &mut terms[slot];
                let n = buf.len().min(LINE_BUF_SIZE).min(term.typed_len + 1);
                let copy_len = n.saturating_sub(1).min(term.typed_len);
                buf[..copy_len].copy_from_slice(&term.typed[..copy_len]);
                if n > 0 {
                    buf[n - 1] = b'\n';
                }
                let bytes_ready = term.bytes_ready;
                term.typed = [0; LINE_BUF_SIZE];
                term.typed_len = 0;
                term.buffer_updated = false;
                return Ok(bytes_ready);
            }
        }
        // SAFETY: interrupts must be enabled here so the scheduler and
        // keyboard ISR keep running while this busy-waits (§5).
        unsafe { crate::arch::x86::io::sti() };
        crate::arch::x86::io::hlt();
    }
}

/// Terminal `write` (§4.E, §6): echo `buf` verbatim, except the literal
/// shell prompt, which is rewritten to a decorated banner.
pub fn write(pcb: &Pcb, buf: &[u8]) -> KernelResult<usize> {
    let slot = pcb.terminal;
    let on_screen = slot == current_terminal();

    if buf == PROMPT_LITERAL.as_bytes() {
        echo_bytes(slot, on_screen, PROMPT_BANNER.as_bytes());
    } else {
        echo_bytes(slot, on_screen, buf);
    }
    Ok(buf.len())
}

fn echo_bytes(slot: usize, on_screen: bool, bytes: &[u8]) {
    if on_screen {
        for &b in bytes {
            vga::putc(b);
        }
        let (row, col) = vga::cursor_position();
        let mut terms = TERMINALS.lock();
        terms[slot].cursor_y = row;
        terms[slot].cursor_x = col;
    } else {
        let mut terms = TERMINALS.lock();
        for &b in bytes {
            put_into_backing_store(&mut terms[slot], b);
        }
    }
}

fn put_into_backing_store(term: &mut Terminal, byte: u8) {
    match byte {
        b'\n' => {
            term.cursor_x = 0;
            if term.cursor_y + 1 >= vga::HEIGHT {
                scroll_backing_store(term);
            } else {
                term.cursor_y += 1;
            }
        }
        byte => {
            if term.cursor_x >= vga::WIDTH {
                term.cursor_x = 0;
                if term.cursor_y + 1 >= vga::HEIGHT {
                    scroll_backing_store(term);
                } else {
                    term.cursor_y += 1;
                }
            }
            let idx = term.cursor_y * vga::WIDTH + term.cursor_x;
            term.screen[idx] = 0x0700 | byte as u16;
            term.cursor_x += 1;
        }
    }
}

fn scroll_backing_store(term: &mut Terminal) {
    for row in 1..vga::HEIGHT {
        for col in 0..vga::WIDTH {
            term.screen[(row - 1) * vga::WIDTH + col] = term.screen[row * vga::WIDTH + col];
        }
    }
    for col in 0..vga::WIDTH {
        term.screen[(vga::HEIGHT - 1) * vga::WIDTH + col] = 0x0720;
    }
}

/// `open`/`close` on stdin/stdout are no-ops returning success (§4.C).
pub fn open_noop() -> KernelResult<()> {
    Ok(())
}

pub fn close_noop() -> KernelResult<()> {
    Ok(())
}
