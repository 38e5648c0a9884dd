//! Process control blocks, the fixed six-process pool, and the
//! self-locating PCB trick (§3, §9 "Self-locating PCB via stack
//! alignment").
//!
//! Each PCB lives at the low end of its own 8 KiB, 8 KiB-aligned kernel
//! stack; masking the current ESP with `!(8 KiB - 1)` (within the
//! reserved 0..8 MiB region) recovers a pointer to it without a
//! CPU-local "current process" variable. [`linker.ld`] places the
//! `.kstacks` section so stack `pid`'s top sits at exactly
//! `8 MiB - pid * 8 KiB`.
//!
//! Grounded on original_source's PCB struct for field layout; the
//! `FdKind` tagged-variant dispatch follows SPEC_FULL.md §9's "Operation
//! tables as polymorphism" decision (a `match` over a closed enum
//! instead of a trait-object/vtable, since the five kinds are fixed and
//! known at compile time).

use spin::Mutex;

use crate::error::{KernelError, KernelResult};

/// `MAX_PROCESSES` (§3): fixed pool size, identifiers `[0, 6)`.
pub const MAX_PROCESSES: usize = 6;
/// Size of each process's kernel stack and its alignment.
pub const KERNEL_STACK_SIZE: u32 = 8 * 1024;
/// Top of the stack region; stack `pid`'s top is `KERNEL_STACK_REGION_TOP
/// - pid * KERNEL_STACK_SIZE`.
pub const KERNEL_STACK_REGION_TOP: u32 = 8 * 1024 * 1024;
/// Reserved FDT entries (stdin, stdout).
pub const FDT_SIZE: usize = 8;
/// Max length of the `args` string captured at `execute` (§3).
pub const ARGS_MAX: usize = 128;

/// Root shells occupy pids `[0, 3)`, one per terminal (§3).
pub const ROOT_SHELL_COUNT: usize = 3;

/// The five kinds of object a file descriptor can name (§9 "Operation
/// tables as polymorphism").
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FdKind {
    Stdin,
    Stdout,
    File,
    Directory,
    Rtc,
}

impl FdKind {
    /// Select the FDT ops kind for a file system entry of `file_type`
    /// (§4.E `open`: `0 -> rtc, 1 -> directory, 2 -> regular file`).
    pub fn from_file_type(file_type: u32) -> Option<Self> {
        match file_type {
            0 => Some(FdKind::Rtc),
            1 => Some(FdKind::Directory),
            2 => Some(FdKind::File),
            _ => None,
        }
    }
}

/// One file-descriptor table entry (§3).
#[derive(Clone, Copy)]
pub struct FdEntry {
    pub kind: FdKind,
    pub inode_index: u32,
    pub file_position: u32,
    pub enabled: bool,
}

impl FdEntry {
    const fn disabled() -> Self {
        Self {
            kind: FdKind::File,
            inode_index: 0,
            file_position: 0,
            enabled: false,
        }
    }
}

/// Process control block (§3). Lives at the base of the process's own
/// kernel stack; see module docs.
#[repr(C)]
pub struct Pcb {
    pub pid: i32,
    pub parent_pid: i32,
    pub fdt: [FdEntry; FDT_SIZE],
    pub args: [u8; ARGS_MAX],
    pub args_len: usize,
    pub parent_kernel_sp: u32,
    pub parent_kernel_fp: u32,
    pub sched_sp: u32,
    pub sched_fp: u32,
    pub requested_clock_hz: u32,
    pub divisor: u32,
    pub count: u32,
    /// Which terminal slot owns this process; needed by `rtc` and
    /// `sched` to update `terminals[owner].active_pid` without a reverse
    /// lookup.
    pub terminal: usize,
}

impl Pcb {
    const fn empty() -> Self {
        Self {
            pid: -1,
            parent_pid: -1,
            fdt: [FdEntry::disabled(); FDT_SIZE],
            args: [0; ARGS_MAX],
            args_len: 0,
            parent_kernel_sp: 0,
            parent_kernel_fp: 0,
            sched_sp: 0,
            sched_fp: 0,
            requested_clock_hz: 0,
            divisor: 1,
            count: 0,
            terminal: 0,
        }
    }
}

struct ProcessTable {
    used: [bool; MAX_PROCESSES],
    pcbs: [Pcb; MAX_PROCESSES],
}

impl ProcessTable {
    const fn new() -> Self {
        const EMPTY: Pcb = Pcb::empty();
        Self {
            used: [false; MAX_PROCESSES],
            pcbs: [EMPTY; MAX_PROCESSES],
        }
    }
}

static PROCESS_TABLE: Mutex<ProcessTable> = Mutex::new(ProcessTable::new());

/// Top-of-stack address for `pid`'s 8 KiB kernel stack (§3).
pub fn stack_top(pid: i32) -> u32 {
    KERNEL_STACK_REGION_TOP - (pid as u32) * KERNEL_STACK_SIZE
}

/// Base (lowest) address of `pid`'s kernel stack, i.e. where its PCB
/// lives.
fn stack_base(pid: i32) -> u32 {
    stack_top(pid) - KERNEL_STACK_SIZE
}

/// Recover the running PCB from the current stack pointer by masking it
/// to its enclosing 8 KiB-aligned block (§9).
///
/// # Safety
/// Must only be called once at least one process has been `execute`d on
/// the calling terminal; before that, the masked address names
/// uninitialized stack-base memory (§9 Open Questions). Root shells
/// avoid this by self-parenting instead of calling `get_curr_pcb`
/// before any PCB exists.
pub unsafe fn get_curr_pcb() -> &'static mut Pcb {
    let esp: u32;
    // SAFETY: reads ESP only; no memory access.
    unsafe {
        core::arch::asm!("mov {0}, esp", out(reg) esp, options(nomem, nostack, preserves_flags));
    }
    let base = esp & !(KERNEL_STACK_SIZE - 1);
    // SAFETY: caller's obligation: `base` names a live PCB's stack base.
    unsafe { &mut *(base as *mut Pcb) }
}

/// Look up a live PCB by pid via the id-based link (§9 "Parent
/// back-reference as non-owning link").
pub fn with_pcb<R>(pid: i32, f: impl FnOnce(&mut Pcb) -> R) -> Option<R> {
    if pid < 0 || pid as usize >= MAX_PROCESSES {
        return None;
    }
    let table = PROCESS_TABLE.lock();
    if !table.used[pid as usize] {
        return None;
    }
    drop(table);
    // SAFETY: `used[pid]` confirmed true above under the lock; the PCB
    // at this pid's stack base is therefore live. The table lock does
    // not need to stay held across the mutation since only the owning
    // process's own kernel context or the scheduler touches a given
    // PCB, never two contexts concurrently (§5).
    let pcb = unsafe { &mut *(stack_base(pid) as *mut Pcb) };
    Some(f(pcb))
}

/// Allocate the lowest free pid, initialize its PCB, and mark it used.
/// Returns `Err(NoFreeProcessSlot)` if the pool is full (§8 boundary:
/// `execute` at `MAX_PROCESSES` live fails).
pub fn allocate(parent_pid: i32) -> KernelResult<i32> {
    let mut table = PROCESS_TABLE.lock();
    let pid = table
        .used
        .iter()
        .position(|&used| !used)
        .ok_or(KernelError::NoFreeProcessSlot)? as i32;
    table.used[pid as usize] = true;
    drop(table);

    // SAFETY: this pid was just marked used and no other context can
    // reference its stack base yet.
    let pcb = unsafe { &mut *(stack_base(pid) as *mut Pcb) };
    *pcb = Pcb::empty();
    pcb.pid = pid;
    // Root shells self-parent (§4.E step 6; §9 Open Questions).
    pcb.parent_pid = if (pid as usize) < ROOT_SHELL_COUNT {
        pid
    } else {
        parent_pid
    };
    pcb.fdt[0] = FdEntry {
        kind: FdKind::Stdin,
        inode_index: 0,
        file_position: 0,
        enabled: true,
    };
    pcb.fdt[1] = FdEntry {
        kind: FdKind::Stdout,
        inode_index: 0,
        file_position: 0,
        enabled: true,
    };
    Ok(pid)
}

/// Free `pid`'s slot. The PCB memory itself is left in place (and
/// zeroed by the caller once it is done reading saved fields out of it)
/// since it's addressed by the stack it physically lives on top of.
pub fn free(pid: i32) {
    let mut table = PROCESS_TABLE.lock();
    if pid >= 0 && (pid as usize) < MAX_PROCESSES {
        table.used[pid as usize] = false;
    }
}

pub fn is_used(pid: i32) -> bool {
    if pid < 0 || pid as usize >= MAX_PROCESSES {
        return false;
    }
    PROCESS_TABLE.lock().used[pid as usize]
}

/// Allocate the lowest free FDT index `>= 2` in the current process
/// (§4.E `open`).
pub fn allocate_fd(pcb: &mut Pcb) -> KernelResult<usize> {
    (2..FDT_SIZE)
        .find(|&i| !pcb.fdt[i].enabled)
        .ok_or(KernelError::NoFreeFdSlot)
}

/// Validate `fd` is in range, `>= 0`, and enabled; return its index.
pub fn validate_fd(pcb: &Pcb, fd: i32) -> KernelResult<usize> {
    if fd < 0 || fd as usize >= FDT_SIZE {
        return Err(KernelError::BadFileDescriptor { fd });
    }
    let idx = fd as usize;
    if !pcb.fdt[idx].enabled {
        return Err(KernelError::BadFileDescriptor { fd });
    }
    Ok(idx)
}

/// Called from the divide-by-zero / invalid-opcode / GPF / page-fault
/// exception handlers (§7, §8 scenario 4): the running process is torn
/// down exactly as `halt(0x04)` would, which `execute` observes as the
/// CPU-exception exit code (collapsed to 256 at the ABI boundary).
pub fn exit_current_on_exception() -> ! {
    crate::syscall::halt_from_exception()
}

/// Surface `FsError::NotFound`-shaped failures uniformly for callers
/// that only have a pid, not a live PCB reference (kept small; most
/// process errors are plain `KernelError` variants already).
pub fn require_pcb(pid: i32) -> KernelResult<()> {
    if is_used(pid) {
        Ok(())
    } else {
        Err(KernelError::ProcessNotFound { pid })
    }
}
