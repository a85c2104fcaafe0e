//! Write a chunk of a configuration blob into one of the device's config buffers
//!
//! Request layout:
//!
//! | byte | content |
//! |------|---------|
//! | 0 | command id |
//! | 1 | payload length |
//! | 2-3 | offset into the target buffer, little endian |
//! | 4.. | payload |

use log::{trace, warn};
use packed_struct::prelude::*;

use super::{UsbStatusCode, GENERIC_HID_BUFFER_LENGTH};

pub const HARDWARE_CONFIG_SIZE: usize = 64;
pub const USER_CONFIG_SIZE: usize = 2048;

const HEADER_LENGTH: usize = 4;
const MAX_PAYLOAD_LENGTH: usize = GENERIC_HID_BUFFER_LENGTH - HEADER_LENGTH;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "lsb", bit_numbering = "msb0", size_bytes = "4")]
pub struct WriteConfigHeader {
    #[packed_field(bytes = "0")]
    pub command: u8,
    #[packed_field(bytes = "1")]
    pub length: u8,
    #[packed_field(bytes = "2..=3")]
    pub offset: u16,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigBufferId {
    Hardware,
    StagingUser,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferConfigError {
    LengthTooLarge,
    BufferOutOfBounds,
}

impl From<TransferConfigError> for UsbStatusCode {
    fn from(e: TransferConfigError) -> Self {
        match e {
            TransferConfigError::LengthTooLarge => UsbStatusCode::TransferConfigLengthTooLarge,
            TransferConfigError::BufferOutOfBounds => {
                UsbStatusCode::TransferConfigBufferOutOfBounds
            }
        }
    }
}

pub struct ConfigBuffers {
    pub hardware: [u8; HARDWARE_CONFIG_SIZE],
    pub staging_user: [u8; USER_CONFIG_SIZE],
}

impl Default for ConfigBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuffers {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hardware: [0; HARDWARE_CONFIG_SIZE],
            staging_user: [0; USER_CONFIG_SIZE],
        }
    }

    fn buffer_mut(&mut self, id: ConfigBufferId) -> &mut [u8] {
        match id {
            ConfigBufferId::Hardware => &mut self.hardware,
            ConfigBufferId::StagingUser => &mut self.staging_user,
        }
    }
}

/// Copy the payload of `request` into the target buffer. Nothing is written unless the whole
/// payload fits.
pub fn write_config(
    buffers: &mut ConfigBuffers,
    target: ConfigBufferId,
    request: &[u8; GENERIC_HID_BUFFER_LENGTH],
) -> Result<(), TransferConfigError> {
    let mut header = [0_u8; HEADER_LENGTH];
    header.copy_from_slice(&request[..HEADER_LENGTH]);
    //cannot fail, every bit pattern is a valid header
    let header =
        WriteConfigHeader::unpack(&header).map_err(|_| TransferConfigError::LengthTooLarge)?;

    let length = usize::from(header.length);
    let offset = usize::from(header.offset);

    if length > MAX_PAYLOAD_LENGTH {
        warn!("Config write of {} bytes, expected <={}", length, MAX_PAYLOAD_LENGTH);
        return Err(TransferConfigError::LengthTooLarge);
    }

    let buffer = buffers.buffer_mut(target);
    if offset + length > buffer.len() {
        warn!(
            "Config write to {:?} at {:X}+{:X} outside {:X} bytes",
            target,
            offset,
            length,
            buffer.len()
        );
        return Err(TransferConfigError::BufferOutOfBounds);
    }

    buffer[offset..offset + length]
        .copy_from_slice(&request[HEADER_LENGTH..HEADER_LENGTH + length]);
    trace!("Wrote {} config bytes to {:?} at {:X}", length, target, offset);
    Ok(())
}

/// Run the command and write its status to byte 0 of `response`
pub fn handle_write_config(
    buffers: &mut ConfigBuffers,
    target: ConfigBufferId,
    request: &[u8; GENERIC_HID_BUFFER_LENGTH],
    response: &mut [u8; GENERIC_HID_BUFFER_LENGTH],
) {
    let status = write_config(buffers, target, request)
        .map_or_else(UsbStatusCode::from, |()| UsbStatusCode::Success);
    response[0] = status.into();
}
