//! Lists every entry in the root directory by opening `.` and reading
//! one name per `read` call until it returns 0 (§4.B `directory_read`).

#![no_std]
#![no_main]

use triterm_rt::{entry_point, println, syscall};

const NAME_MAX: usize = 32;

entry_point!(main);

fn main() -> i32 {
    let fd = syscall::open(".");
    if fd < 0 {
        println!("ls: cannot open root directory");
        return 1;
    }

    loop {
        let mut name = [0u8; NAME_MAX];
        let n = syscall::read(fd, &mut name);
        if n <= 0 {
            break;
        }
        match core::str::from_utf8(&name[..n as usize]) {
            Ok(s) => println!("{}", s.trim_end_matches('\0')),
            Err(_) => println!("<invalid name>"),
        }
    }

    syscall::close(fd);
    0
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    triterm_rt::panic::handle(info)
}
