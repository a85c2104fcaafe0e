//! Seams between the keyboard engine and the code that drives it
//!
//! [`DeviceStack`] is the part of a USB device stack the engine needs, it is implemented for
//! usb-device by [`KeyboardInterface`](crate::hid_class::interface::KeyboardInterface).
//! [`LedOutput`] receives the host's Caps Lock state.

use crate::hid_class::descriptor::HidProtocol;
use crate::UsbHidError;

pub trait DeviceStack {
    /// True once the host has configured the device and the interface can transmit
    fn is_attached(&self) -> bool;

    /// Queue a report on the interrupt IN endpoint
    ///
    /// Returns [`UsbHidError::WouldBlock`] while a previous report is still in flight.
    fn send(&mut self, report: &[u8]) -> Result<(), UsbHidError>;

    /// The stack's own record of the protocol negotiated by the host
    fn protocol(&self) -> HidProtocol;

    fn set_protocol(&mut self, protocol: HidProtocol);
}

pub trait LedOutput {
    fn set_caps_lock(&mut self, on: bool);
}

impl<F: FnMut(bool)> LedOutput for F {
    fn set_caps_lock(&mut self, on: bool) {
        self(on);
    }
}
