//! Keyboard report engine
//!
//! [`BasicKeyboard`] owns the double buffered reports, the protocol mode the codec encodes for
//! and the bookkeeping of deliveries. Application code edits the staging report, the periodic
//! [`BasicKeyboard::action`] sends the active report and swaps on success, and
//! [`BasicKeyboard::handle_event`] answers the host's class requests.

use log::{error, trace};
use packed_struct::prelude::*;

use crate::hid_class::descriptor::HidProtocol;
use crate::interface::DeviceStack;
use crate::UsbHidError;
use protocol::ProtocolMode;
use report::{
    KeyboardReport, BASIC_KEYBOARD_REPORT_LENGTH, BOOT_KEYBOARD_REPORT_LENGTH, SET_REPORT_LENGTH,
};
use store::ReportStore;

pub mod event;
pub mod protocol;
pub mod report;
pub mod store;

pub struct BasicKeyboard {
    store: ReportStore,
    protocol: ProtocolMode,
    action_counter: u32,
    send_pending: bool,
    out_buffer: [u8; SET_REPORT_LENGTH],
}

impl Default for BasicKeyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl BasicKeyboard {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            store: ReportStore::new(),
            protocol: ProtocolMode::new(),
            action_counter: 0,
            send_pending: false,
            out_buffer: [0; SET_REPORT_LENGTH],
        }
    }

    /// Protocol the codec currently encodes for
    #[must_use]
    pub fn protocol(&self) -> HidProtocol {
        self.protocol.current()
    }

    /// Latch the protocol the codec encodes for
    ///
    /// The mode is a single atomic byte, a shared reference to the engine is enough.
    pub fn latch_protocol(&self, protocol: HidProtocol) {
        self.protocol.set(protocol);
    }

    #[must_use]
    pub fn active_report(&self) -> &KeyboardReport {
        self.store.active()
    }

    pub fn staging_report_mut(&mut self) -> &mut KeyboardReport {
        self.store.staging_mut()
    }

    #[must_use]
    pub fn staging_report(&self) -> &KeyboardReport {
        self.store.staging()
    }

    pub fn reset_active_report(&mut self) {
        self.store.reset_active();
    }

    /// Clear both reports and pending state, used on bus reset
    pub fn reset(&mut self) {
        self.store.reset();
        self.protocol.set(HidProtocol::Report);
        self.send_pending = false;
    }

    pub fn add_scancode(&mut self, scancode: u8) {
        let protocol = self.protocol.current();
        self.store
            .staging_mut()
            .add_scancode(protocol, scancode, None);
    }

    pub fn remove_scancode(&mut self, scancode: u8) {
        let protocol = self.protocol.current();
        self.store.staging_mut().remove_scancode(protocol, scancode);
    }

    #[must_use]
    pub fn contains_scancode(&self, scancode: u8) -> bool {
        self.store
            .staging()
            .contains_scancode(self.protocol.current(), scancode)
    }

    /// Merge a partial report, e.g. from another keymap layer, into the staging report
    pub fn merge(&mut self, source: &KeyboardReport, cursor: Option<&mut u8>) {
        let protocol = self.protocol.current();
        self.store.staging_mut().merge(protocol, source, cursor);
    }

    /// Number of reports delivered to the host, by transmit or by Get_Report
    #[must_use]
    pub fn action_counter(&self) -> u32 {
        self.action_counter
    }

    /// True between a successful transmit and the host's acknowledgement of it
    #[must_use]
    pub fn is_send_pending(&self) -> bool {
        self.send_pending
    }

    /// Idle rate timing is done by the caller, so the idle period never elapses here
    pub fn check_idle_elapsed(&self) -> Result<(), UsbHidError> {
        Err(UsbHidError::WouldBlock)
    }

    /// `Ok` when the staging report holds changes the host has not seen
    pub fn check_report_ready(&self) -> Result<(), UsbHidError> {
        if self.store.is_changed() {
            Ok(())
        } else {
            self.check_idle_elapsed()
        }
    }

    /// Transmit the active report
    ///
    /// Sends the first 8 bytes of the active report in boot protocol and all of it in report
    /// protocol. On success the reports are swapped, so the host sees the current staging
    /// report on the next call. Whatever the outcome, the protocol mode is refreshed from the
    /// device stack afterwards.
    pub fn action<S: DeviceStack>(&mut self, stack: &mut S) -> Result<(), UsbHidError> {
        if !stack.is_attached() {
            return Err(UsbHidError::NotAttached);
        }

        let length = match self.protocol.current() {
            HidProtocol::Boot => BOOT_KEYBOARD_REPORT_LENGTH,
            HidProtocol::Report => BASIC_KEYBOARD_REPORT_LENGTH,
        };

        let result = self
            .store
            .active()
            .pack()
            .map_err(|_| UsbHidError::SerializationError)
            .and_then(|data| stack.send(&data[..length]));

        match &result {
            Ok(()) => {
                trace!("Sent report, {} bytes", length);
                self.action_counter = self.action_counter.wrapping_add(1);
                self.store.swap();
                self.send_pending = true;
            }
            Err(UsbHidError::WouldBlock) => {
                trace!("Report send would block");
            }
            Err(e) => {
                error!("Failed to send report - {:?}", e);
            }
        }

        self.latch_protocol(stack.protocol());

        result
    }
}
