use core::sync::atomic::{AtomicU8, Ordering};

use log::info;
use packed_struct::PrimitiveEnum;

use crate::hid_class::descriptor::HidProtocol;

/// Protocol the scancode codec encodes for
///
/// Written by class events and by the transmit path re-latch, read by every codec call. Stored
/// as a single byte so both execution contexts see whole values.
pub struct ProtocolMode(AtomicU8);

impl Default for ProtocolMode {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolMode {
    /// When initialized, all devices default to report protocol - Hid spec 7.2.6 Set_Protocol Request
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU8::new(HidProtocol::Report as u8))
    }

    #[must_use]
    pub fn current(&self) -> HidProtocol {
        HidProtocol::from_primitive(self.0.load(Ordering::Acquire)).unwrap_or(HidProtocol::Report)
    }

    pub fn set(&self, protocol: HidProtocol) {
        //load then store, thumbv6m has no atomic swap
        let previous = self.0.load(Ordering::Acquire);
        self.0.store(protocol.into(), Ordering::Release);
        if previous != u8::from(protocol) {
            info!("Protocol mode {:?}", protocol);
        }
    }
}
