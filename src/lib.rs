//! Double buffered USB HID keyboard report engine for [usb-device](https://crates.io/crates/usb-device).
//!
//! The keyboard state lives in two reports. Key handling code writes the staging report, the
//! periodic transmit sends the active one and swaps the two once the device stack has accepted
//! it, so the host never sees a half built report. Reports are encoded either as a boot protocol
//! keyboard (six scancodes) or as a report protocol bitfield covering every scancode from `A` to
//! `Keypad Hexadecimal`, following whichever protocol the host selected.
//!
//! ```rust, no_run
//! # use core::todo;
//! # use usb_device::bus::PollResult;
//! # use usb_device::class_prelude::*;
//! # use usb_device::UsbDirection;
//! use usb_device::prelude::*;
//! use usbd_basic_keyboard::prelude::*;
//! #
//! # struct DummyUsbBus;
//! # impl UsbBus for DummyUsbBus {
//! #     fn alloc_ep(&mut self, ep_dir: UsbDirection, ep_addr: Option<EndpointAddress>, ep_type: EndpointType, max_packet_size: u16, interval: u8) -> usb_device::Result<EndpointAddress> {
//! #         todo!()
//! #     }
//! #     fn enable(&mut self) { todo!() }
//! #     fn reset(&self) { todo!() }
//! #     fn set_device_address(&self, addr: u8) { todo!() }
//! #     fn write(&self, ep_addr: EndpointAddress, buf: &[u8]) -> usb_device::Result<usize> { todo!() }
//! #     fn read(&self, ep_addr: EndpointAddress, buf: &mut [u8]) -> usb_device::Result<usize> { todo!() }
//! #     fn set_stalled(&self, ep_addr: EndpointAddress, stalled: bool) { todo!() }
//! #     fn is_stalled(&self, ep_addr: EndpointAddress) -> bool { todo!() }
//! #     fn suspend(&self) { todo!() }
//! #     fn resume(&self) { todo!() }
//! #     fn poll(&self) -> PollResult { todo!() }
//! # }
//! #
//! # let usb_bus = DummyUsbBus;
//! # let key_a_pressed = || true;
//! # let set_caps_lock_led = |_on: bool| {};
//! #
//! let usb_alloc = UsbBusAllocator::new(usb_bus);
//!
//! let mut keyboard = BasicKeyboardClass::new(
//!     &usb_alloc,
//!     KeyboardInterfaceConfig::default_config(),
//!     set_caps_lock_led,
//! );
//!
//! let mut usb_dev = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
//!     .manufacturer("usbd-basic-keyboard")
//!     .product("Keyboard")
//!     .build();
//!
//! loop {
//!     if key_a_pressed() {
//!         keyboard.keyboard_mut().add_scancode(0x04);
//!     } else {
//!         keyboard.keyboard_mut().remove_scancode(0x04);
//!     }
//!
//!     usb_dev.poll(&mut [&mut keyboard]);
//!
//!     if keyboard.keyboard().check_report_ready().is_ok() {
//!         keyboard.action().ok();
//!     }
//! }
//! ```
//!
//! Without usb-device, drive [`keyboard::BasicKeyboard`] directly through the
//! [`interface::DeviceStack`] and [`interface::LedOutput`] traits.

#![no_std]

//Allow the use of std in tests
#[cfg(test)]
#[macro_use]
extern crate std;

use usb_device::UsbError;

pub mod command;
pub mod hid_class;
pub mod interface;
pub mod keyboard;
pub mod prelude;

#[derive(Debug)]
pub enum UsbHidError {
    /// The device stack is busy with the previous report
    WouldBlock,
    /// A host request was malformed or is not supported
    InvalidRequest,
    /// A requested report buffer is larger than the report it would hold
    AllocFail,
    NotAttached,
    SerializationError,
    UsbError(UsbError),
}

impl From<UsbError> for UsbHidError {
    fn from(e: UsbError) -> Self {
        match e {
            UsbError::WouldBlock => UsbHidError::WouldBlock,
            _ => UsbHidError::UsbError(e),
        }
    }
}

//UsbError only implements Debug, wrapped errors compare by variant
impl PartialEq for UsbHidError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (UsbHidError::UsbError(a), UsbHidError::UsbError(b)) => {
                core::mem::discriminant(a) == core::mem::discriminant(b)
            }
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl Eq for UsbHidError {}
