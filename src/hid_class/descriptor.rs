use num_enum::{IntoPrimitive, TryFromPrimitive};
use packed_struct::prelude::*;

use crate::keyboard::report::{MAX_BITFIELD_SCANCODE, MIN_BITFIELD_SCANCODE};

pub const USB_CLASS_HID: u8 = 0x03;
pub const SPEC_VERSION_1_11: u16 = 0x0111; //1.11 in BCD
pub const COUNTRY_CODE_NOT_SUPPORTED: u8 = 0x0;

/// Interface protocol for boot subclass interfaces - HID spec 4.3
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
pub enum InterfaceProtocol {
    Keyboard = 0x01,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PrimitiveEnum, IntoPrimitive)]
#[repr(u8)]
pub enum DescriptorType {
    Hid = 0x21,
    Report = 0x22,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
pub enum InterfaceSubClass {
    Boot = 0x01,
}

/// Protocol negotiated by the host with Set_Protocol - HID spec 7.2.6
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PrimitiveEnum, IntoPrimitive)]
#[repr(u8)]
pub enum HidProtocol {
    Boot = 0x00,
    Report = 0x01,
}

/// Report type carried in the high byte of wValue of Get_Report and Set_Report - HID spec 7.2.1
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ReportType {
    Input = 0x01,
    Output = 0x02,
    Feature = 0x03,
}

const BITFIELD_USAGE_COUNT: u8 = MAX_BITFIELD_SCANCODE - MIN_BITFIELD_SCANCODE + 1;

/// Report protocol descriptor matching [`KeyboardReport`](crate::keyboard::report::KeyboardReport)
///
/// byte 0 - modifiers
/// byte 1 - reserved 0s
/// byte 2-29 - bit array of pressed keys, usages 0x04 to 0xDD, padded to a whole byte
///
/// The interface is boot capable, boot protocol hosts ignore this descriptor and read the first
/// 8 bytes as a boot keyboard report.
#[rustfmt::skip]
pub const BASIC_KEYBOARD_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01,                     // Usage Page (Generic Desktop),
    0x09, 0x06,                     // Usage (Keyboard),
    0xA1, 0x01,                     // Collection (Application),
    // bitmap of modifiers
    0x75, 0x01,                     //   Report Size (1),
    0x95, 0x08,                     //   Report Count (8),
    0x05, 0x07,                     //   Usage Page (Key Codes),
    0x19, 0xE0,                     //   Usage Minimum (224),
    0x29, 0xE7,                     //   Usage Maximum (231),
    0x15, 0x00,                     //   Logical Minimum (0),
    0x25, 0x01,                     //   Logical Maximum (1),
    0x81, 0x02,                     //   Input (Data, Variable, Absolute), ;Modifier byte
    // reserved byte
    0x75, 0x08,                     //   Report Size (8),
    0x95, 0x01,                     //   Report Count (1),
    0x81, 0x01,                     //   Input (Constant), ;Reserved byte
    // LED output report
    0x95, 0x05,                     //   Report Count (5),
    0x75, 0x01,                     //   Report Size (1),
    0x05, 0x08,                     //   Usage Page (LEDs),
    0x19, 0x01,                     //   Usage Minimum (1),
    0x29, 0x05,                     //   Usage Maximum (5),
    0x91, 0x02,                     //   Output (Data, Variable, Absolute),
    0x95, 0x01,                     //   Report Count (1),
    0x75, 0x03,                     //   Report Size (3),
    0x91, 0x01,                     //   Output (Constant),
    // bitmap of keys
    0x95, BITFIELD_USAGE_COUNT,     //   Report Count (218),
    0x75, 0x01,                     //   Report Size (1),
    0x15, 0x00,                     //   Logical Minimum (0),
    0x25, 0x01,                     //   Logical Maximum (1),
    0x05, 0x07,                     //   Usage Page (Key Codes),
    0x19, MIN_BITFIELD_SCANCODE,    //   Usage Minimum (4),
    0x29, MAX_BITFIELD_SCANCODE,    //   Usage Maximum (221),
    0x81, 0x02,                     //   Input (Data, Variable, Absolute),
    // bitmap padding
    0x95, 0x01,                     //   Report Count (1),
    0x75, 0x06,                     //   Report Size (6),
    0x81, 0x01,                     //   Input (Constant),
    0xC0,                           // End Collection
];
