//! The Usb Hid Class Prelude.
//!
//! The purpose of this module is to alleviate imports of structs and enums
//! required to build and instance a [`BasicKeyboardClass`]:
//!
//! ```
//! # #![allow(unused_imports)]
//! use usbd_basic_keyboard::hid_class::prelude::*;
//! ```

pub use super::interface::{KeyboardInterface, KeyboardInterfaceBuilder, KeyboardInterfaceConfig};
pub use super::{descriptor::HidProtocol, BasicKeyboardClass, UsbPacketSize};
