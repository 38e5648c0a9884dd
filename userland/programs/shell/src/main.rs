//! Root shell: prompts, reads one line per command, hands it straight
//! to `execute`. Terminal `read` is line-buffered (one call returns one
//! full typed line), so there's no need to assemble a line byte by byte
//! here.

#![no_std]
#![no_main]

use triterm_rt::{entry_point, print, println, syscall};

const LINE_BUF: usize = 128;

entry_point!(main);

fn main() -> i32 {
    loop {
        print!("391OS> ");

        let mut buf = [0u8; LINE_BUF];
        let n = syscall::read(0, &mut buf);
        if n <= 0 {
            continue;
        }
        let line = trim_newline(&buf[..n as usize]);
        if line.is_empty() {
            continue;
        }

        let Ok(command) = core::str::from_utf8(line) else {
            println!("unreadable command");
            continue;
        };

        let status = syscall::execute(command);
        if status < 0 {
            println!("{}: command not found", command);
        }
    }
}

fn trim_newline(buf: &[u8]) -> &[u8] {
    match buf.last() {
        Some(b'\n') => &buf[..buf.len() - 1],
        _ => buf,
    }
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    triterm_rt::panic::handle(info)
}
