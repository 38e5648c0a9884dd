//! 32-bit Global Descriptor Table and Task State Segment.
//!
//! Lays out five flat descriptors (null, kernel code, kernel data, user
//! code, user data) plus one TSS descriptor. The TSS is used only for its
//! `ss0`/`esp0` fields -- this kernel never performs a hardware task
//! switch, only software `iret`/`int 0x80` transitions, so every other
//! TSS field stays zeroed.
//!
//! Grounded on `gdt.rs`'s `lazy_static!` table-construction idiom from the
//! teacher's long-mode build; the descriptor layout itself is 32-bit flat
//! segmentation per `original_source`'s `x86_desc.h` usage (`tss.ss0`,
//! `tss.esp0`).

use lazy_static::lazy_static;
use spin::Mutex;

/// Selector for the kernel code segment (ring 0).
pub const KERNEL_CS: u16 = 0x08;
/// Selector for the kernel data segment (ring 0).
pub const KERNEL_DS: u16 = 0x10;
/// Selector for the user code segment (ring 3, RPL 3).
pub const USER_CS: u16 = 0x18 | 3;
/// Selector for the user data segment (ring 3, RPL 3).
pub const USER_DS: u16 = 0x20 | 3;
/// Selector for the TSS descriptor.
const TSS_SEL: u16 = 0x28;

const GDT_ENTRIES: usize = 6;

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    granularity: u8,
    base_high: u8,
}

impl GdtEntry {
    const fn null() -> Self {
        Self {
            limit_low: 0,
            base_low: 0,
            base_mid: 0,
            access: 0,
            granularity: 0,
            base_high: 0,
        }
    }

    /// A flat (base 0, limit 4 GiB) segment descriptor.
    const fn flat(access: u8, granularity_flags: u8) -> Self {
        Self {
            limit_low: 0xFFFF,
            base_low: 0,
            base_mid: 0,
            access,
            // 0xC0 = 4 KiB granularity + 32-bit default operand size,
            // OR'd with the top nibble of the 20-bit limit (0xF).
            granularity: 0xC0 | granularity_flags,
            base_high: 0,
        }
    }

    fn system(base: u32, limit: u32, access: u8) -> Self {
        Self {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_mid: ((base >> 16) & 0xFF) as u8,
            access,
            granularity: ((limit >> 16) & 0x0F) as u8,
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }
}

/// 32-bit Task State Segment. Only `ss0`/`esp0` are load-bearing: they are
/// what the CPU consults on a ring 3 -> ring 0 transition (an `int`
/// instruction or exception) to find the kernel stack to switch to.
#[repr(C, packed)]
struct Tss {
    link: u32,
    esp0: u32,
    ss0: u32,
    esp1: u32,
    ss1: u32,
    esp2: u32,
    ss2: u32,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u32,
    cs: u32,
    ss: u32,
    ds: u32,
    fs: u32,
    gs: u32,
    ldt: u32,
    trap: u16,
    iomap_base: u16,
}

impl Tss {
    const fn new() -> Self {
        Self {
            link: 0,
            esp0: 0,
            ss0: 0,
            esp1: 0,
            ss1: 0,
            esp2: 0,
            ss2: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            cs: 0,
            ss: 0,
            ds: 0,
            fs: 0,
            gs: 0,
            ldt: 0,
            trap: 0,
            iomap_base: core::mem::size_of::<Tss>() as u16,
        }
    }
}

lazy_static! {
    static ref TSS: Mutex<Tss> = Mutex::new(Tss::new());
}

lazy_static! {
    static ref GDT: [GdtEntry; GDT_ENTRIES] = {
        // Access byte bits: present(0x80) | privilege<<5 | desc_type(0x10) | type
        const KERNEL_CODE_ACCESS: u8 = 0x9A; // present, ring0, code, exec/read
        const KERNEL_DATA_ACCESS: u8 = 0x92; // present, ring0, data, read/write
        const USER_CODE_ACCESS: u8 = 0xFA; // present, ring3, code, exec/read
        const USER_DATA_ACCESS: u8 = 0xF2; // present, ring3, data, read/write
        const TSS_ACCESS: u8 = 0x89; // present, ring0, 32-bit TSS (available)

        [
            GdtEntry::null(),
            GdtEntry::flat(KERNEL_CODE_ACCESS, 0x0F),
            GdtEntry::flat(KERNEL_DATA_ACCESS, 0x0F),
            GdtEntry::flat(USER_CODE_ACCESS, 0x0F),
            GdtEntry::flat(USER_DATA_ACCESS, 0x0F),
            // Patched to point at TSS below once its address is known;
            // size/limit filled in `init()`.
            GdtEntry::system(0, core::mem::size_of::<Tss>() as u32 - 1, TSS_ACCESS),
        ]
    };
}

#[repr(C, packed)]
struct DescriptorTablePointer {
    limit: u16,
    base: u32,
}

/// Build and load the GDT, TSS, and segment registers.
pub fn init() {
    let tss_addr = {
        let guard = TSS.lock();
        &*guard as *const Tss as u32
    };

    // SAFETY: GDT is a lazy_static behind no further synchronization, but
    // this patch happens once during single-threaded boot before any
    // other code reads GDT[5].
    unsafe {
        let gdt_ptr = &GDT[5] as *const GdtEntry as *mut GdtEntry;
        *gdt_ptr = GdtEntry::system(tss_addr, core::mem::size_of::<Tss>() as u32 - 1, 0x89);
    }

    let gdtr = DescriptorTablePointer {
        limit: (core::mem::size_of::<[GdtEntry; GDT_ENTRIES]>() - 1) as u16,
        base: GDT.as_ptr() as u32,
    };

    // SAFETY: `gdtr` points at a GDT that is fully populated above and
    // remains alive for 'static. Reloading CS via a far jump and the data
    // segment registers directly is the standard 32-bit protected-mode
    // GDT-install sequence; `ltr` then loads the TSS selector into TR.
    unsafe {
        core::arch::asm!("lgdt [{0}]", in(reg) &gdtr, options(readonly, nostack));
        core::arch::asm!(
            "push {cs}",
            "lea {tmp}, [2f]",
            "push {tmp}",
            "retf",
            "2:",
            "mov ax, {ds}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov ss, ax",
            cs = const KERNEL_CS as u32,
            ds = const KERNEL_DS as u32,
            tmp = out(reg) _,
            out("ax") _,
        );
        core::arch::asm!("ltr {0:x}", in(reg) TSS_SEL, options(nostack, nomem));
    }
}

/// Program the kernel stack pointer used on the next ring 3 -> ring 0
/// transition (the TSS's `esp0`/`ss0`).
///
/// Called by the scheduler (§4.F) and by `execute`/`halt` (§4.E) whenever
/// control is about to hand off to a different process's kernel stack.
pub fn set_kernel_stack(esp0: u32) {
    let mut tss = TSS.lock();
    tss.esp0 = esp0;
    tss.ss0 = KERNEL_DS as u32;
}
