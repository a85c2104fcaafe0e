//! Keyboard report record and the protocol dependent scancode codec
//!
//! The same storage carries either a boot protocol array of six scancodes or a report protocol
//! bitfield. The record never remembers which, the caller always supplies the [`HidProtocol`] the
//! report is being built for.

use log::trace;
use packed_struct::prelude::*;

use crate::hid_class::descriptor::HidProtocol;

pub const BOOT_KEYBOARD_MAX_KEYS: usize = 6;
pub const BOOT_KEYBOARD_REPORT_LENGTH: usize = 8;

pub const MIN_MODIFIERS_SCANCODE: u8 = 0xE0; //Left Control
pub const MAX_MODIFIERS_SCANCODE: u8 = 0xE7; //Right GUI
pub const MIN_BITFIELD_SCANCODE: u8 = 0x04; //A
pub const MAX_BITFIELD_SCANCODE: u8 = 0xDD; //Keypad Hexadecimal

pub const BITFIELD_LENGTH: usize =
    ((MAX_BITFIELD_SCANCODE - MIN_BITFIELD_SCANCODE) / 8 + 1) as usize;
pub const BASIC_KEYBOARD_REPORT_LENGTH: usize = 2 + BITFIELD_LENGTH;

/// Length of the LED output report accepted by Set_Report
pub const SET_REPORT_LENGTH: usize = 1;

/// Keyboard ErrorRollOver usage, fills every boot slot when too many keys are pressed
pub const ERROR_ROLLOVER: u8 = 0x01;

//the boot array lives in the first bytes of the bitfield storage
const _: () = assert!(BITFIELD_LENGTH >= BOOT_KEYBOARD_MAX_KEYS);
const _: () = assert!(BITFIELD_LENGTH == 28);

#[must_use]
pub fn is_in_bitfield(scancode: u8) -> bool {
    (MIN_BITFIELD_SCANCODE..=MAX_BITFIELD_SCANCODE).contains(&scancode)
}

#[must_use]
pub fn is_in_modifiers(scancode: u8) -> bool {
    (MIN_MODIFIERS_SCANCODE..=MAX_MODIFIERS_SCANCODE).contains(&scancode)
}

fn test_bit(bits: &[u8], n: usize) -> bool {
    bits[n >> 3] & (1 << (n & 7)) != 0
}

fn set_bit(bits: &mut [u8], n: usize) {
    bits[n >> 3] |= 1 << (n & 7);
}

fn clear_bit(bits: &mut [u8], n: usize) {
    bits[n >> 3] &= !(1 << (n & 7));
}

/// Keyboard input report, byte for byte the data sent to the host
///
/// In boot protocol only the first [`BOOT_KEYBOARD_REPORT_LENGTH`] bytes are sent and the
/// payload holds up to six scancodes. In report protocol the payload is a bitfield with one bit
/// per scancode from [`MIN_BITFIELD_SCANCODE`] to [`MAX_BITFIELD_SCANCODE`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default, PackedStruct)]
#[packed_struct(endian = "lsb", bit_numbering = "msb0", size_bytes = "30")]
pub struct KeyboardReport {
    /// Modifier bitmask, bit n is scancode `0xE0 + n`
    #[packed_field(bytes = "0")]
    pub modifiers: u8,
    #[packed_field(bytes = "1")]
    reserved: u8,
    #[packed_field(bytes = "2..30", element_size_bits = "8")]
    payload: [u8; 28],
}

impl KeyboardReport {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            modifiers: 0,
            reserved: 0,
            payload: [0; BITFIELD_LENGTH],
        }
    }

    /// Always 0
    #[must_use]
    pub fn reserved(&self) -> u8 {
        self.reserved
    }

    /// Boot protocol view of the payload
    #[must_use]
    pub fn boot_keys(&self) -> &[u8] {
        &self.payload[..BOOT_KEYBOARD_MAX_KEYS]
    }

    fn boot_keys_mut(&mut self) -> &mut [u8] {
        &mut self.payload[..BOOT_KEYBOARD_MAX_KEYS]
    }

    /// Report protocol view of the payload
    #[must_use]
    pub fn bitfield(&self) -> &[u8; BITFIELD_LENGTH] {
        &self.payload
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    #[must_use]
    pub fn is_rollover_error(&self) -> bool {
        self.boot_keys().iter().all(|&k| k == ERROR_ROLLOVER)
    }

    fn set_rollover_error(&mut self) {
        if self.payload[0] != ERROR_ROLLOVER {
            trace!("Boot report full, setting rollover error");
            self.boot_keys_mut().fill(ERROR_ROLLOVER);
        }
    }

    /// Place a scancode in the boot array, at the cursor if one is given, otherwise in the first
    /// free slot. Returns false if there was no room.
    fn push_boot_key(&mut self, scancode: u8, cursor: Option<&mut u8>) -> bool {
        match cursor {
            Some(index) => {
                let i = usize::from(*index);
                if i < BOOT_KEYBOARD_MAX_KEYS {
                    self.payload[i] = scancode;
                    *index += 1;
                    true
                } else {
                    false
                }
            }
            None => match self.boot_keys_mut().iter_mut().find(|k| **k == 0) {
                Some(slot) => {
                    *slot = scancode;
                    true
                }
                None => false,
            },
        }
    }

    /// Mark `scancode` as pressed
    ///
    /// In boot protocol `cursor` lets several key sources fill one report in order, each call
    /// stores at `*cursor` and advances it. Without a cursor the first empty slot is used. When
    /// the array is full the report is switched to the rollover error encoding.
    ///
    /// In report protocol scancodes outside the modifier and bitfield ranges are ignored.
    pub fn add_scancode(&mut self, protocol: HidProtocol, scancode: u8, cursor: Option<&mut u8>) {
        match protocol {
            HidProtocol::Boot => {
                if !self.push_boot_key(scancode, cursor) {
                    self.set_rollover_error();
                }
            }
            HidProtocol::Report => {
                if is_in_bitfield(scancode) {
                    set_bit(
                        &mut self.payload,
                        usize::from(scancode - MIN_BITFIELD_SCANCODE),
                    );
                } else if is_in_modifiers(scancode) {
                    self.modifiers |= 1 << (scancode - MIN_MODIFIERS_SCANCODE);
                }
            }
        }
    }

    /// Mark `scancode` as released. Only the first matching boot slot is cleared.
    pub fn remove_scancode(&mut self, protocol: HidProtocol, scancode: u8) {
        match protocol {
            HidProtocol::Boot => {
                if let Some(slot) = self.boot_keys_mut().iter_mut().find(|k| **k == scancode) {
                    *slot = 0;
                }
            }
            HidProtocol::Report => {
                if is_in_bitfield(scancode) {
                    clear_bit(
                        &mut self.payload,
                        usize::from(scancode - MIN_BITFIELD_SCANCODE),
                    );
                } else if is_in_modifiers(scancode) {
                    self.modifiers &= !(1 << (scancode - MIN_MODIFIERS_SCANCODE));
                }
            }
        }
    }

    #[must_use]
    pub fn contains_scancode(&self, protocol: HidProtocol, scancode: u8) -> bool {
        match protocol {
            HidProtocol::Boot => self.boot_keys().contains(&scancode),
            HidProtocol::Report => {
                if is_in_bitfield(scancode) {
                    test_bit(&self.payload, usize::from(scancode - MIN_BITFIELD_SCANCODE))
                } else if is_in_modifiers(scancode) {
                    self.modifiers & (1 << (scancode - MIN_MODIFIERS_SCANCODE)) != 0
                } else {
                    false
                }
            }
        }
    }

    /// Number of non-modifier keys held in the report
    #[must_use]
    pub fn scancode_count(&self, protocol: HidProtocol) -> u8 {
        let count = match protocol {
            HidProtocol::Boot => self.boot_keys().iter().filter(|&&k| k != 0).count(),
            HidProtocol::Report => self.payload.iter().map(|b| b.count_ones() as usize).sum(),
        };
        //at most BITFIELD_LENGTH * 8 = 224
        count as u8
    }

    /// Combine `source` into this report
    ///
    /// Both reports must have been built for `protocol`. In boot protocol the scancodes of
    /// `source` are appended using the same cursor rules as [`KeyboardReport::add_scancode`];
    /// the merge stops as soon as the array overflows and the rollover error is set.
    pub fn merge(&mut self, protocol: HidProtocol, source: &KeyboardReport, cursor: Option<&mut u8>) {
        self.modifiers |= source.modifiers;

        match protocol {
            HidProtocol::Boot => {
                let mut cursor = cursor;
                for &scancode in source.boot_keys().iter().filter(|&&k| k != 0) {
                    if !self.push_boot_key(scancode, cursor.as_deref_mut()) {
                        self.set_rollover_error();
                        return;
                    }
                }
            }
            HidProtocol::Report => {
                for (target, source) in self.payload.iter_mut().zip(source.payload.iter()) {
                    *target |= *source;
                }
            }
        }
    }
}

/// Report indicating the currently lit keyboard LEDs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, PackedStruct)]
#[packed_struct(endian = "lsb", bit_numbering = "lsb0", size_bytes = "1")]
pub struct KeyboardLedsReport {
    #[packed_field(bits = "0")]
    pub num_lock: bool,
    #[packed_field(bits = "1")]
    pub caps_lock: bool,
    #[packed_field(bits = "2")]
    pub scroll_lock: bool,
    #[packed_field(bits = "3")]
    pub compose: bool,
    #[packed_field(bits = "4")]
    pub kana: bool,
}
