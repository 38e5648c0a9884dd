//! Prints the file named by its argument string. Reads the whole file
//! in fixed chunks and writes each straight through to stdout.

#![no_std]
#![no_main]

use triterm_rt::{entry_point, println, syscall};

const ARGS_MAX: usize = 128;
const CHUNK: usize = 256;

entry_point!(main);

fn main() -> i32 {
    let mut args = [0u8; ARGS_MAX];
    let n = syscall::getargs(&mut args);
    if n <= 0 {
        println!("cat: missing filename");
        return 1;
    }
    let Ok(name) = core::str::from_utf8(&args[..n as usize]) else {
        println!("cat: bad argument");
        return 1;
    };
    let name = name.trim_end_matches('\0').trim();

    let fd = syscall::open(name);
    if fd < 0 {
        println!("cat: {}: no such file", name);
        return 1;
    }

    loop {
        let mut chunk = [0u8; CHUNK];
        let n = syscall::read(fd, &mut chunk);
        if n <= 0 {
            break;
        }
        syscall::write(1, &chunk[..n as usize]);
    }

    syscall::close(fd);
    0
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    triterm_rt::panic::handle(info)
}
