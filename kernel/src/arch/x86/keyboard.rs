//! PS/2 keyboard scancode decoding and modifier tracking.
//!
//! Feeds raw scancodes from port 0x60 through the `pc-keyboard` crate's
//! decoder and dispatches the result into `terminal` (§4.C): printable
//! characters, Ctrl+L (clear), Up-arrow (history recall), and Alt+F1/F2/F3
//! (terminal switch). The Alt+Fn combo is detected here, before
//! `pc-keyboard`'s own unicode decoding, because function keys never
//! decode to a unicode character.
//!
//! Grounded on the teacher's keyboard driver for the `pc-keyboard`
//! `Keyboard`/`add_byte`/`process_keyevent` idiom; the modifier bitmask is
//! supplemented from original_source's keyboard handler, which tracks
//! ctrl/alt/shift state explicitly rather than relying solely on the
//! decoder (SPEC_FULL.md §1.2).

use bitflags::bitflags;
use core::sync::atomic::{AtomicU8, Ordering};
use lazy_static::lazy_static;
use pc_keyboard::{
    layouts, DecodedKey, HandleControl, KeyCode, KeyEvent, KeyState, Keyboard, ScancodeSet1,
};
use spin::Mutex;

use super::io::in8;

const KEYBOARD_DATA_PORT: u16 = 0x60;

bitflags! {
    #[derive(Clone, Copy)]
    struct Modifiers: u8 {
        const CTRL = 0b001;
        const ALT = 0b010;
        const SHIFT = 0b100;
    }
}

static MODIFIERS: AtomicU8 = AtomicU8::new(0);

lazy_static! {
    static ref KEYBOARD: Mutex<Keyboard<layouts::Us104Key, ScancodeSet1>> = Mutex::new(
        Keyboard::new(
            layouts::Us104Key,
            ScancodeSet1,
            HandleControl::MapLettersToUnicode
        )
    );
}

/// Read one scancode and push it through the decoder. Called from the
/// IRQ1 handler.
pub fn handle_interrupt() {
    // SAFETY: port 0x60 is the PS/2 controller's data port; reading it
    // from within the IRQ1 handler is the standard acknowledge sequence.
    let scancode = unsafe { in8(KEYBOARD_DATA_PORT) };
    let mut kb = KEYBOARD.lock();
    let event = match kb.add_byte(scancode) {
        Ok(Some(event)) => event,
        _ => return,
    };
    track_modifiers_and_hotkeys(&event);
    if let Some(key) = kb.process_keyevent(event) {
        dispatch(key);
    }
}

fn track_modifiers_and_hotkeys(event: &KeyEvent) {
    let bit = match event.code {
        KeyCode::ControlLeft | KeyCode::ControlRight => Some(Modifiers::CTRL),
        KeyCode::AltLeft | KeyCode::AltRight => Some(Modifiers::ALT),
        KeyCode::ShiftLeft | KeyCode::ShiftRight => Some(Modifiers::SHIFT),
        _ => None,
    };
    if let Some(bit) = bit {
        let mut cur = current_modifiers();
        match event.state {
            KeyState::Down => cur.insert(bit),
            KeyState::Up => cur.remove(bit),
            KeyState::UpUp => cur.remove(bit),
        }
        MODIFIERS.store(cur.bits(), Ordering::Relaxed);
        return;
    }

    if event.state == KeyState::Down && current_modifiers().contains(Modifiers::ALT) {
        match event.code {
            KeyCode::F1 => crate::terminal::switch_to(0),
            KeyCode::F2 => crate::terminal::switch_to(1),
            KeyCode::F3 => crate::terminal::switch_to(2),
            _ => {}
        }
    }
}

fn current_modifiers() -> Modifiers {
    Modifiers::from_bits_truncate(MODIFIERS.load(Ordering::Relaxed))
}

fn dispatch(key: DecodedKey) {
    match key {
        // Ctrl+L, under MapLettersToUnicode, decodes to the form-feed
        // control character rather than the literal 'l'.
        DecodedKey::Unicode('\u{0C}') => crate::terminal::clear_current(),
        DecodedKey::Unicode(ch) => crate::terminal::handle_char(ch),
        DecodedKey::RawKey(KeyCode::ArrowUp) => crate::terminal::recall_history(),
        DecodedKey::RawKey(_) => {}
    }
}
