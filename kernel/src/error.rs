//! Structured kernel error types
//!
//! Internal kernel code threads `Result<T, KernelError>` so call sites can
//! match on a specific failure kind. `syscall::dispatch` is the only place
//! that discards the detail and collapses every `Err` to the ABI's `-1`
//! sentinel.

use core::fmt;

/// Main kernel error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// Process-related errors.
    ProcessNotFound { pid: i32 },
    NoFreeProcessSlot,
    NotARootShell,

    /// File-descriptor-table errors.
    BadFileDescriptor { fd: i32 },
    NoFreeFdSlot,

    /// Filesystem-related errors.
    FsError(FsError),

    /// System call errors.
    SyscallError(SyscallError),

    /// Virtual RTC errors.
    RtcError(RtcError),

    /// ELF loading errors.
    ElfError(ElfError),

    /// Paging / address validation errors.
    InvalidAddress { addr: usize },

    /// Generic argument error.
    InvalidArgument { name: &'static str },
}

/// Filesystem-specific errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// Name lookup failed (not found, or name longer than 32 bytes).
    NotFound,
    /// Directory index out of range.
    IndexOutOfRange,
    /// Inode index out of range.
    BadInode,
    /// Filesystem is read-only.
    ReadOnly,
}

/// System call dispatch errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    InvalidSyscall { nr: u32 },
    NotImplemented,
}

/// Virtual RTC errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcError {
    /// Requested frequency is not a power of two in `[2, 1024]`.
    InvalidFrequency { hz: u32 },
}

/// ELF detection errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    BadMagic,
    TooLarge { size: usize, max: usize },
}

/// Result type alias for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessNotFound { pid } => write!(f, "process {} not found", pid),
            Self::NoFreeProcessSlot => write!(f, "no free process slot"),
            Self::NotARootShell => write!(f, "process is not a root shell"),
            Self::BadFileDescriptor { fd } => write!(f, "bad file descriptor {}", fd),
            Self::NoFreeFdSlot => write!(f, "no free file descriptor slot"),
            Self::FsError(e) => write!(f, "filesystem error: {:?}", e),
            Self::SyscallError(e) => write!(f, "syscall error: {:?}", e),
            Self::RtcError(e) => write!(f, "rtc error: {:?}", e),
            Self::ElfError(e) => write!(f, "elf error: {:?}", e),
            Self::InvalidAddress { addr } => write!(f, "invalid address: 0x{:x}", addr),
            Self::InvalidArgument { name } => write!(f, "invalid argument: {}", name),
        }
    }
}

impl From<FsError> for KernelError {
    fn from(e: FsError) -> Self {
        Self::FsError(e)
    }
}

impl From<SyscallError> for KernelError {
    fn from(e: SyscallError) -> Self {
        Self::SyscallError(e)
    }
}

impl From<RtcError> for KernelError {
    fn from(e: RtcError) -> Self {
        Self::RtcError(e)
    }
}

impl From<ElfError> for KernelError {
    fn from(e: ElfError) -> Self {
        Self::ElfError(e)
    }
}

/// The single failure sentinel returned across the syscall ABI.
pub const SYSCALL_FAIL: i32 = -1;
