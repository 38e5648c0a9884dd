//! Program entry point glue. The kernel jumps straight to the ELF entry
//! point in ring 3 with no argv/envp on the stack -- arguments are
//! retrieved separately via [`crate::syscall::getargs`] -- so `_start`
//! takes nothing and simply calls into `main`.

/// Defines `_start` and wires its return value into `halt`. `$main`
/// must be an `fn() -> i32`.
#[macro_export]
macro_rules! entry_point {
    ($main:path) => {
        #[no_mangle]
        pub extern "C" fn _start() -> ! {
            let status: i32 = $main();
            $crate::syscall::halt(status);
        }
    };
}
