// Print macros for kernel output, routed through the VGA text-mode writer.
// This crate only ever builds for the i686 freestanding target (see
// `.cargo/config.toml`), so there's no separate host-target branch to
// fall back to.

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::arch::x86::vga::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}
