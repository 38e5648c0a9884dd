//! VGA text-mode (0xB8000) character primitives.
//!
//! Owns exactly one hardware resource -- the 80x25 text buffer -- and
//! exposes it as a flat `[u16; BUFFER_SIZE]` so the three terminals
//! (§4.C) can swap their own backing stores in and out on an Alt+Fn
//! switch without this module knowing anything about terminals.
//!
//! Grounded on the teacher's VGA writer (`print!`/`println!` backing
//! module) for the `Writer`/color-code/cursor idiom; the save/restore
//! swap is this spec's own requirement (§4.C).

use core::fmt;
use lazy_static::lazy_static;
use spin::Mutex;

use super::io::{in8, out8};

pub const WIDTH: usize = 80;
pub const HEIGHT: usize = 25;
pub const BUFFER_SIZE: usize = WIDTH * HEIGHT;

const VGA_BUFFER_ADDR: usize = 0xB8000;
const CRTC_INDEX_PORT: u16 = 0x3D4;
const CRTC_DATA_PORT: u16 = 0x3D5;

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
struct ColorCode(u8);

impl ColorCode {
    const fn new(foreground: u8, background: u8) -> Self {
        ColorCode((background << 4) | foreground)
    }
}

const LIGHT_GREY: u8 = 0x7;
const BLACK: u8 = 0x0;

#[derive(Clone, Copy)]
#[repr(transparent)]
struct ScreenChar(u16);

impl ScreenChar {
    fn new(ascii: u8, color: ColorCode) -> Self {
        ScreenChar((color.0 as u16) << 8 | ascii as u16)
    }
}

struct Writer {
    col: usize,
    row: usize,
    color: ColorCode,
    buffer: *mut u16,
}

// SAFETY: the VGA buffer is a fixed-address MMIO region, not
// thread-local state; all access is serialized through WRITER's Mutex.
unsafe impl Send for Writer {}

impl Writer {
    fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.newline(),
            byte => {
                if self.col >= WIDTH {
                    self.newline();
                }
                let idx = self.row * WIDTH + self.col;
                // SAFETY: idx < BUFFER_SIZE by construction (col < WIDTH,
                // row < HEIGHT maintained by newline()/scroll()).
                unsafe {
                    self.buffer
                        .add(idx)
                        .write_volatile(ScreenChar::new(byte, self.color).0);
                }
                self.col += 1;
            }
        }
    }

    fn newline(&mut self) {
        self.col = 0;
        if self.row + 1 >= HEIGHT {
            self.scroll();
        } else {
            self.row += 1;
        }
    }

    fn scroll(&mut self) {
        // SAFETY: copies within the bounds of the BUFFER_SIZE-element
        // VGA buffer; rows [1, HEIGHT) move to [0, HEIGHT - 1).
        unsafe {
            for row in 1..HEIGHT {
                for col in 0..WIDTH {
                    let ch = self.buffer.add(row * WIDTH + col).read_volatile();
                    self.buffer.add((row - 1) * WIDTH + col).write_volatile(ch);
                }
            }
            let blank = ScreenChar::new(b' ', self.color).0;
            for col in 0..WIDTH {
                self.buffer
                    .add((HEIGHT - 1) * WIDTH + col)
                    .write_volatile(blank);
            }
        }
    }

    fn clear(&mut self) {
        let blank = ScreenChar::new(b' ', self.color).0;
        // SAFETY: writes exactly BUFFER_SIZE cells of the VGA buffer.
        unsafe {
            for i in 0..BUFFER_SIZE {
                self.buffer.add(i).write_volatile(blank);
            }
        }
        self.col = 0;
        self.row = 0;
    }
}

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            match byte {
                0x20..=0x7e | b'\n' => self.write_byte(byte),
                _ => self.write_byte(0xfe),
            }
        }
        Ok(())
    }
}

lazy_static! {
    static ref WRITER: Mutex<Writer> = Mutex::new(Writer {
        col: 0,
        row: 0,
        color: ColorCode::new(LIGHT_GREY, BLACK),
        buffer: VGA_BUFFER_ADDR as *mut u16,
    });
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use fmt::Write;
    let _guard = crate::arch::x86::io::InterruptGuard::new();
    WRITER.lock().write_fmt(args).unwrap();
}

/// Clear the visible screen (Ctrl+L, §4.C).
pub fn clear() {
    WRITER.lock().clear();
    set_cursor(0, 0);
}

/// Write one character at the cursor, advancing it (newline-aware).
pub fn putc(byte: u8) {
    WRITER.lock().write_byte(byte);
}

/// Move the hardware text cursor to `(row, col)`.
pub fn set_cursor(row: usize, col: usize) {
    let pos = (row * WIDTH + col) as u16;
    // SAFETY: programs the CRTC cursor-location registers (0x0E/0x0F) via
    // their index/data port pair; standard VGA cursor-positioning idiom.
    unsafe {
        out8(CRTC_INDEX_PORT, 0x0E);
        out8(CRTC_DATA_PORT, (pos >> 8) as u8);
        out8(CRTC_INDEX_PORT, 0x0F);
        out8(CRTC_DATA_PORT, (pos & 0xFF) as u8);
    }
}

/// Read the hardware text cursor position as `(row, col)`.
pub fn get_cursor() -> (usize, usize) {
    // SAFETY: reads the same CRTC registers set_cursor programs.
    let pos = unsafe {
        out8(CRTC_INDEX_PORT, 0x0E);
        let high = in8(CRTC_DATA_PORT) as u16;
        out8(CRTC_INDEX_PORT, 0x0F);
        let low = in8(CRTC_DATA_PORT) as u16;
        (high << 8) | low
    };
    (pos as usize / WIDTH, pos as usize % WIDTH)
}

/// Copy the live VGA buffer out into `dest` (used when switching a
/// terminal off-screen, §4.C).
pub fn save_screen(dest: &mut [u16; BUFFER_SIZE]) {
    let writer = WRITER.lock();
    // SAFETY: reads exactly BUFFER_SIZE cells of the VGA buffer.
    unsafe {
        for i in 0..BUFFER_SIZE {
            dest[i] = writer.buffer.add(i).read_volatile();
        }
    }
}

/// Copy `src` into the live VGA buffer (used when switching a terminal
/// on-screen, §4.C).
pub fn restore_screen(src: &[u16; BUFFER_SIZE]) {
    let writer = WRITER.lock();
    // SAFETY: writes exactly BUFFER_SIZE cells of the VGA buffer.
    unsafe {
        for i in 0..BUFFER_SIZE {
            writer.buffer.add(i).write_volatile(src[i]);
        }
    }
}

/// Current cursor column/row, exposed so `terminal` can save/restore it
/// alongside the screen contents.
pub fn cursor_position() -> (usize, usize) {
    let writer = WRITER.lock();
    (writer.row, writer.col)
}

/// Directly set the writer's logical cursor (row, col) without touching
/// the hardware cursor register; paired with [`set_cursor`] by callers
/// that need both updated together.
pub fn set_logical_cursor(row: usize, col: usize) {
    let mut writer = WRITER.lock();
    writer.row = row.min(HEIGHT - 1);
    writer.col = col.min(WIDTH);
}
