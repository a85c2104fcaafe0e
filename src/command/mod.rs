//! Commands received over the generic HID interface

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub mod write_config;

/// Size of the generic HID report buffers commands arrive in and respond through
pub const GENERIC_HID_BUFFER_LENGTH: usize = 64;

/// Status written to byte 0 of the response buffer
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum UsbStatusCode {
    Success = 0,
    InvalidCommand = 1,
    TransferConfigLengthTooLarge = 2,
    TransferConfigBufferOutOfBounds = 3,
}
