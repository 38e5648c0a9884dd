//! System call dispatch and the process lifecycle operations that don't
//! fit cleanly in `process` alone: `execute`/`halt`'s kernel<->user
//! transfer, and the ten-entry `int 0x80` ABI (§4.E, §6).
//!
//! Only seven of the ten call numbers are implemented; `set_handler`
//! and `sigreturn` always fail (§4.E, Non-goal: signal delivery).
//!
//! Grounded on the teacher's syscall dispatch module for the overall
//! "naked entry trampoline calls a Rust dispatch fn" shape; the
//! `execute`/`halt` stack-swap mechanics are supplemented from
//! original_source's `syscalls.c`/`x86_desc.S` (§1.2), generalized to
//! this crate's `Result`-based internals per SPEC_FULL.md §7.

use core::arch::asm;

use crate::arch::x86::{gdt, idt, paging};
use crate::elf;
use crate::error::{KernelError, KernelResult, SYSCALL_FAIL};
use crate::fs;
use crate::log_service::{klog, LogLevel};
use crate::process::{self, FdKind, Pcb};
use crate::rtc;
use crate::terminal;

const SYS_HALT: u32 = 1;
const SYS_EXECUTE: u32 = 2;
const SYS_READ: u32 = 3;
const SYS_WRITE: u32 = 4;
const SYS_OPEN: u32 = 5;
const SYS_CLOSE: u32 = 6;
const SYS_GETARGS: u32 = 7;
const SYS_VIDMAP: u32 = 8;
const SYS_SET_HANDLER: u32 = 9;
const SYS_SIGRETURN: u32 = 10;

/// Status a root-shell-spawning `execute` can never itself produce;
/// used by `halt` to mark "child died to a CPU exception" (§7, §8
/// scenario 4). `execute` translates this to 256 before returning it to
/// its caller.
const EXCEPTION_EXIT_STATUS: i32 = 0x04;

const USER_STACK_TOP_OFFSET: u32 = 4; // `0x08400000 - 4 bytes` (§6)
const EFLAGS_IF: u32 = 1 << 9;
const MAX_COMMAND_LEN: usize = process::ARGS_MAX + 32;

/// Install the `int 0x80` gate. Called once from `main::boot_main`
/// after `process`/`fs`/`terminal` are all initialized.
pub fn init() {
    idt::register_handler(idt::SYSCALL_VECTOR, syscall_entry as u32, true);
}

/// The naked `int 0x80` entry trampoline. Unlike the exception/IRQ
/// handlers in `arch::x86::idt`, this can't use `extern "x86-interrupt"`:
/// the syscall ABI needs every general-purpose register, not just the
/// CPU-pushed frame, so the save/restore and the `iretd` are written out
/// by hand.
///
/// # Safety
/// Must only ever be reached via the `int 0x80` gate, with the calling
/// convention described in SPEC_FULL.md §6 (call number in EAX, args in
/// EBX/ECX/EDX).
#[naked]
unsafe extern "C" fn syscall_entry() {
    // SAFETY: entire body of a #[naked] function reached only via the
    // `int 0x80` gate; see the struct-level doc comment.
    unsafe {
        asm!(
            "push ebp",
            "push edi",
            "push esi",
            "push edx",
            "push ecx",
            "push ebx",
            "push eax",
            // Registers are untouched by the pushes above, so the
            // original call-number/arg values are still live here.
            "push edx", // c
            "push ecx", // b
            "push ebx", // a
            "push eax", // nr
            "call {dispatch}",
            "add esp, 16",
            "mov [esp], eax", // overwrite the saved EAX slot with the return value
            "pop eax",
            "pop ebx",
            "pop ecx",
            "pop edx",
            "pop esi",
            "pop edi",
            "pop ebp",
            "iretd",
            dispatch = sym dispatch_from_asm,
            options(noreturn)
        )
    }
}

extern "C" fn dispatch_from_asm(nr: u32, a: u32, b: u32, c: u32) -> i32 {
    // SAFETY: called only from `syscall_entry`, which only runs on a
    // trap from a live user process.
    let pcb = unsafe { process::get_curr_pcb() };
    match nr {
        SYS_HALT => halt(a as i32),
        SYS_EXECUTE => execute_from_user_ptr(pcb, a),
        SYS_READ => sys_read(pcb, a as i32, b, c),
        SYS_WRITE => sys_write(pcb, a as i32, b, c),
        SYS_OPEN => sys_open(pcb, a),
        SYS_CLOSE => sys_close(pcb, a as i32),
        SYS_GETARGS => sys_getargs(pcb, a, b),
        SYS_VIDMAP => sys_vidmap(pcb, a),
        SYS_SET_HANDLER | SYS_SIGRETURN => SYSCALL_FAIL,
        _ => {
            klog(LogLevel::Warn, "syscall", "unknown syscall number");
            SYSCALL_FAIL
        }
    }
}

fn user_str<'a>(ptr: u32, max_len: usize) -> &'a str {
    // SAFETY: `ptr` is a user virtual address within the currently
    // mapped program's 4 MiB page; the kernel runs with the same CR3
    // during a syscall, so it is directly dereferenceable.
    let bytes = unsafe { core::slice::from_raw_parts(ptr as *const u8, max_len) };
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(max_len);
    core::str::from_utf8(&bytes[..len]).unwrap_or("")
}

fn user_slice_mut<'a>(ptr: u32, len: usize) -> &'a mut [u8] {
    // SAFETY: see `user_str`.
    unsafe { core::slice::from_raw_parts_mut(ptr as *mut u8, len) }
}

fn split_command(command: &str) -> (&str, &str) {
    match command.find(' ') {
        Some(i) => (&command[..i], command[i + 1..].trim_start()),
        None => (command, ""),
    }
}

fn execute_from_user_ptr(pcb: &mut Pcb, cmd_ptr: u32) -> i32 {
    let command = user_str(cmd_ptr, MAX_COMMAND_LEN);
    execute_inner(command, pcb.pid, None)
}

/// `execute("shell")` on behalf of a terminal rather than a live process:
/// used both by `sched::tick`'s idle-slot bootstrap (the terminal has
/// never run anything) and by `halt`'s root-shell respawn (§4.E step 4).
/// Self-parents regardless of the caller, so no live PCB is required.
pub fn execute_from_scheduler(terminal: usize) -> ! {
    execute_inner("shell", -1, Some(terminal));
    unreachable!("execute_inner never returns on the bootstrap path")
}

/// §4.E `execute`.
fn execute_inner(command: &str, caller_pid: i32, terminal_hint: Option<usize>) -> i32 {
    let (name, args) = split_command(command);
    if name.len() > fs::NAME_MAX || args.len() > process::ARGS_MAX {
        return SYSCALL_FAIL;
    }

    let dentry = match fs::read_dentry_by_name(name) {
        Ok(d) => d,
        Err(_) => return SYSCALL_FAIL,
    };
    if dentry.file_type != fs::FileType::Regular {
        return SYSCALL_FAIL;
    }

    let file_len = match fs::file_size(dentry.inode_index) {
        Ok(len) => len as usize,
        Err(_) => return SYSCALL_FAIL,
    };
    if file_len < 28 || file_len > 4 * 1024 * 1024 {
        return SYSCALL_FAIL;
    }

    let pid = match process::allocate(caller_pid) {
        Ok(pid) => pid,
        Err(_) => return SYSCALL_FAIL,
    };

    paging::map_user_program(pid as u32);

    let load_base = 0x0804_8000usize;
    let dest = user_slice_mut(load_base as u32, file_len);
    if fs::read_data(dentry.inode_index, 0, dest).is_err() {
        process::free(pid);
        return SYSCALL_FAIL;
    }
    if elf::check_magic(dest).is_err() {
        process::free(pid);
        klog(LogLevel::Warn, "execute", "rejected non-ELF image");
        return SYSCALL_FAIL;
    }
    let entry = match elf::entry_point(dest) {
        Ok(e) => e,
        Err(_) => {
            process::free(pid);
            return SYSCALL_FAIL;
        }
    };

    let terminal = if (pid as usize) < process::ROOT_SHELL_COUNT {
        terminal_hint.unwrap_or(pid as usize)
    } else {
        terminal_hint
            .or_else(|| process::with_pcb(caller_pid, |p| p.terminal))
            .unwrap_or(0)
    };

    let parent_pid = process::with_pcb(pid, |pcb| {
        pcb.args[..args.len()].copy_from_slice(args.as_bytes());
        pcb.args_len = args.len();
        pcb.terminal = terminal;
        pcb.parent_pid
    })
    .expect("pid was just allocated");

    terminal::set_active_pid(terminal, pid, parent_pid);

    let user_stack = paging::USER_PROGRAM_VA + 4 * 1024 * 1024 - USER_STACK_TOP_OFFSET;
    gdt::set_kernel_stack(process::stack_top(pid) - 4);

    // Write the resume point straight into the child's own PCB fields --
    // `halt` reads them back whenever (and however much later) this
    // child exits, to know where to hand control back.
    let (parent_sp_ptr, parent_fp_ptr) = process::with_pcb(pid, |pcb| {
        (
            &mut pcb.parent_kernel_sp as *mut u32,
            &mut pcb.parent_kernel_fp as *mut u32,
        )
    })
    .expect("pid was just allocated");

    // SAFETY: captures execute_inner's own (esp, ebp) through the two
    // pointers above immediately before transferring to ring 3, and
    // resumes here (via `resume_parent`, not a normal return) whenever
    // the child halts.
    let raw_status = unsafe {
        transfer_to_user_and_wait(
            gdt::USER_DS as u32,
            user_stack,
            EFLAGS_IF,
            gdt::USER_CS as u32,
            entry,
            parent_sp_ptr,
            parent_fp_ptr,
        )
    };

    if raw_status == EXCEPTION_EXIT_STATUS {
        256
    } else {
        raw_status
    }
}

/// Push an `iret` frame for `(user_ds, user_esp, eflags, user_cs, entry)`
/// and transfer to ring 3. Saves the caller's (esp, ebp) into
/// `*parent_sp`/`*parent_fp` first -- this is the pair `halt` restores,
/// via [`resume_parent`], to resume the caller of `execute` (§4.E steps
/// 8 and 12, §9 "Context switches as stack swaps").
///
/// # Safety
/// `entry` must be a valid entry point inside the page just installed
/// by `map_user_program`; `user_esp` must be a valid, writable address
/// inside that same page.
#[naked]
unsafe extern "C" fn transfer_to_user_and_wait(
    user_ds: u32,
    user_esp: u32,
    eflags: u32,
    user_cs: u32,
    entry: u32,
    parent_sp: *mut u32,
    parent_fp: *mut u32,
) -> i32 {
    // SAFETY: entire body of a #[naked] function; see the doc comment.
    unsafe {
        asm!(
            "mov eax, [esp + 24]", // parent_sp
            "mov [eax], esp",
            "mov eax, [esp + 28]", // parent_fp
            "mov [eax], ebp",
            "mov eax, [esp + 4]",  // user_ds
            "mov ebx, [esp + 8]",  // user_esp
            "mov ecx, [esp + 12]", // eflags
            "mov edx, [esp + 16]", // user_cs
            "mov esi, [esp + 20]", // entry
            "push eax",
            "push ebx",
            "push ecx",
            "push edx",
            "push esi",
            "iretd",
            options(noreturn)
        )
    }
}

/// Restore `parent_sp`/`parent_fp` and resume wherever `execute`'s call
/// to [`transfer_to_user_and_wait`] saved them, with `status` as that
/// call's apparent return value (§4.E step 12). Never returns in the
/// normal sense -- control resumes inside `execute_inner`.
///
/// # Safety
/// `parent_sp`/`parent_fp` must be a pair previously captured by
/// `transfer_to_user_and_wait` for a still-valid kernel stack.
unsafe fn resume_parent(parent_sp: u32, parent_fp: u32, status: i32) -> ! {
    // SAFETY: forwarded from this function's own safety obligation.
    unsafe {
        asm!(
            "mov esp, {sp}",
            "mov ebp, {fp}",
            "mov eax, {status}",
            "ret",
            sp = in(reg) parent_sp,
            fp = in(reg) parent_fp,
            status = in(reg) status,
            options(noreturn)
        )
    }
}

fn close_fd(pcb: &mut Pcb, idx: usize) {
    match pcb.fdt[idx].kind {
        FdKind::Stdin | FdKind::Stdout => {
            let _ = terminal::close_noop();
        }
        FdKind::Rtc => rtc::close(pcb),
        FdKind::File | FdKind::Directory => {}
    }
    pcb.fdt[idx].enabled = false;
}

/// §4.E `halt`. Never returns: either it respawns a root shell (never
/// returning control at all) or it resumes `execute`'s caller via
/// [`resume_parent`] (which also never returns in the normal sense).
pub fn halt(status: i32) -> ! {
    // SAFETY: `halt` always runs on a live process's own kernel stack.
    let pcb = unsafe { process::get_curr_pcb() };

    for i in 0..process::FDT_SIZE {
        if pcb.fdt[i].enabled {
            close_fd(pcb, i);
        }
    }

    let pid = pcb.pid;
    let parent_pid = pcb.parent_pid;
    let terminal = pcb.terminal;
    let parent_sp = pcb.parent_kernel_sp;
    let parent_fp = pcb.parent_kernel_fp;

    process::free(pid);
    terminal::set_active_pid(terminal, parent_pid, parent_pid);

    paging::map_user_program(parent_pid.max(0) as u32);
    gdt::set_kernel_stack(process::stack_top(parent_pid.max(0)) - 4);

    if (pid as usize) < process::ROOT_SHELL_COUNT {
        execute_from_scheduler(terminal)
    } else {
        // SAFETY: `parent_sp`/`parent_fp` were saved by this exact
        // process's `execute` call into `transfer_to_user_and_wait`.
        unsafe { resume_parent(parent_sp, parent_fp, status) }
    }
}

/// Called from the exception handlers in `arch::x86::idt` (§7, §8
/// scenario 4): equivalent to the user process itself calling
/// `halt(0x04)`.
pub fn halt_from_exception() -> ! {
    halt(EXCEPTION_EXIT_STATUS)
}

fn sys_read(pcb: &mut Pcb, fd: i32, buf_ptr: u32, n: u32) -> i32 {
    let idx = match process::validate_fd(pcb, fd) {
        Ok(i) => i,
        Err(_) => return SYSCALL_FAIL,
    };
    let buf = user_slice_mut(buf_ptr, n as usize);
    let result: KernelResult<usize> = match pcb.fdt[idx].kind {
        FdKind::Stdin => terminal::read(pcb, buf),
        FdKind::File => fs::file_read(pcb, idx, buf),
        FdKind::Directory => fs::directory_read(pcb, idx, buf),
        FdKind::Rtc => rtc::read(pcb),
        FdKind::Stdout => Err(KernelError::BadFileDescriptor { fd }),
    };
    result.map(|n| n as i32).unwrap_or(SYSCALL_FAIL)
}

fn sys_write(pcb: &mut Pcb, fd: i32, buf_ptr: u32, n: u32) -> i32 {
    let idx = match process::validate_fd(pcb, fd) {
        Ok(i) => i,
        Err(_) => return SYSCALL_FAIL,
    };
    let buf = user_slice_mut(buf_ptr, n as usize);
    let result: KernelResult<usize> = match pcb.fdt[idx].kind {
        FdKind::Stdout => terminal::write(pcb, buf),
        FdKind::File => fs::file_write(buf),
        FdKind::Directory => fs::directory_write(buf),
        FdKind::Rtc => {
            if buf.len() < 4 {
                Err(KernelError::InvalidArgument { name: "hz" })
            } else {
                let hz = u32::from_le_bytes(buf[0..4].try_into().unwrap());
                rtc::write(pcb, hz).map(|_| 4)
            }
        }
        FdKind::Stdin => Err(KernelError::BadFileDescriptor { fd }),
    };
    result.map(|n| n as i32).unwrap_or(SYSCALL_FAIL)
}

fn sys_open(pcb: &mut Pcb, name_ptr: u32) -> i32 {
    let name = user_str(name_ptr, fs::NAME_MAX);
    let dentry = match fs::read_dentry_by_name(name) {
        Ok(d) => d,
        Err(_) => return SYSCALL_FAIL,
    };
    let kind = match FdKind::from_file_type(dentry.file_type.as_raw()) {
        Some(k) => k,
        None => return SYSCALL_FAIL,
    };
    let idx = match process::allocate_fd(pcb) {
        Ok(i) => i,
        Err(_) => return SYSCALL_FAIL,
    };
    pcb.fdt[idx] = process_fd_entry(kind, dentry.inode_index);
    idx as i32
}

fn process_fd_entry(kind: FdKind, inode_index: u32) -> crate::process::FdEntry {
    crate::process::FdEntry {
        kind,
        inode_index,
        file_position: 0,
        enabled: true,
    }
}

fn sys_close(pcb: &mut Pcb, fd: i32) -> i32 {
    if fd < 2 || fd as usize >= process::FDT_SIZE || !pcb.fdt[fd as usize].enabled {
        return SYSCALL_FAIL;
    }
    close_fd(pcb, fd as usize);
    0
}

fn sys_getargs(pcb: &mut Pcb, buf_ptr: u32, n: u32) -> i32 {
    if buf_ptr == 0 || pcb.args_len == 0 || (n as usize) < pcb.args_len {
        return SYSCALL_FAIL;
    }
    let buf = user_slice_mut(buf_ptr, n as usize);
    buf[..pcb.args_len].copy_from_slice(&pcb.args[..pcb.args_len]);
    if (n as usize) > pcb.args_len {
        buf[pcb.args_len] = 0;
    }
    0
}

fn sys_vidmap(pcb: &mut Pcb, slot_ptr: u32) -> i32 {
    if slot_ptr < paging::USER_PROGRAM_VA || slot_ptr >= paging::VIDMEM_VA {
        return SYSCALL_FAIL;
    }
    let on_screen = pcb.terminal == terminal::current_terminal();
    let video_phys = if on_screen {
        paging::VGA_PHYS_ADDR
    } else {
        terminal::backing_store_phys_addr(pcb.terminal)
    };
    paging::map_user_vidmem(video_phys);
    let out = user_slice_mut(slot_ptr, 4);
    out.copy_from_slice(&paging::VIDMEM_VA.to_le_bytes());
    0
}
