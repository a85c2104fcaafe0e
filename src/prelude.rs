//! The USB HID Prelude.
//!
//! The purpose of this module is to alleviate imports of structs and enums
//! required to instance the keyboard class and drive its engine:
//!
//! ```
//! # #![allow(unused_imports)]
//! use usbd_basic_keyboard::prelude::*;
//! ```

pub use crate::hid_class::descriptor::HidProtocol;
pub use crate::hid_class::interface::{KeyboardInterfaceBuilder, KeyboardInterfaceConfig};
pub use crate::hid_class::BasicKeyboardClass;
pub use crate::interface::{DeviceStack, LedOutput};
pub use crate::keyboard::event::{HidEvent, HidResponse, ReportRequest};
pub use crate::keyboard::report::KeyboardReport;
pub use crate::keyboard::BasicKeyboard;
pub use crate::UsbHidError;
