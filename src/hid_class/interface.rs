//! Keyboard interface on top of usb-device: interrupt IN endpoint, descriptors and the
//! per interface HID state the host negotiates

use embedded_time::duration::Milliseconds;
use embedded_time::fixed_point::FixedPoint;
use log::{info, warn};
use packed_struct::prelude::*;
use usb_device::bus::{InterfaceNumber, StringIndex, UsbBus, UsbBusAllocator};
use usb_device::class_prelude::{DescriptorWriter, EndpointAddress, EndpointIn};
use usb_device::UsbError;

use super::descriptor::{
    DescriptorType, HidProtocol, InterfaceProtocol, InterfaceSubClass,
    BASIC_KEYBOARD_REPORT_DESCRIPTOR, COUNTRY_CODE_NOT_SUPPORTED, SPEC_VERSION_1_11,
    USB_CLASS_HID,
};
use super::{BuilderResult, UsbHidBuilderError, UsbPacketSize};
use crate::interface::DeviceStack;
use crate::UsbHidError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "lsb", size_bytes = 7)]
pub struct HidDescriptorBody {
    bcd_hid: u16,
    country_code: u8,
    num_descriptors: u8,
    #[packed_field(ty = "enum", size_bytes = "1")]
    descriptor_type: DescriptorType,
    descriptor_length: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig {
    pub poll_interval: u8,
    pub max_packet_size: UsbPacketSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardInterfaceConfig {
    pub description: Option<&'static str>,
    /// Idle rate in units of 4ms
    pub idle_default: u8,
    pub in_endpoint: EndpointConfig,
}

impl KeyboardInterfaceConfig {
    /// Boot keyboard with a 32 byte IN endpoint polled every 1ms and a 500ms idle default
    #[must_use]
    pub const fn default_config() -> KeyboardInterfaceConfig {
        KeyboardInterfaceConfig {
            description: Some("Keyboard"),
            idle_default: 125,
            in_endpoint: EndpointConfig {
                poll_interval: 1,
                max_packet_size: UsbPacketSize::Bytes32,
            },
        }
    }

    pub fn allocate<B: UsbBus>(self, usb_alloc: &UsbBusAllocator<B>) -> KeyboardInterface<'_, B> {
        KeyboardInterface {
            config: self,
            id: usb_alloc.interface(),
            in_endpoint: usb_alloc.interrupt(
                u16::from(u8::from(self.in_endpoint.max_packet_size)),
                self.in_endpoint.poll_interval,
            ),
            description_index: self.description.map(|_| usb_alloc.string()),
            //When initialized, all devices default to report protocol - Hid spec 7.2.6 Set_Protocol Request
            protocol: HidProtocol::Report,
            idle: self.idle_default,
            attached: false,
        }
    }
}

pub struct KeyboardInterface<'a, B: UsbBus> {
    id: InterfaceNumber,
    config: KeyboardInterfaceConfig,
    in_endpoint: EndpointIn<'a, B>,
    description_index: Option<StringIndex>,
    protocol: HidProtocol,
    idle: u8,
    attached: bool,
}

impl<'a, B: UsbBus> KeyboardInterface<'a, B> {
    pub fn id(&self) -> InterfaceNumber {
        self.id
    }

    pub fn in_endpoint_address(&self) -> EndpointAddress {
        self.in_endpoint.address()
    }

    pub fn report_descriptor(&self) -> &'static [u8] {
        BASIC_KEYBOARD_REPORT_DESCRIPTOR
    }

    pub fn hid_descriptor_body(&self) -> usb_device::Result<[u8; 7]> {
        let descriptor_length = u16::try_from(self.report_descriptor().len())
            .map_err(|_| UsbError::BufferOverflow)?;
        HidDescriptorBody {
            bcd_hid: SPEC_VERSION_1_11,
            country_code: COUNTRY_CODE_NOT_SUPPORTED,
            num_descriptors: 1,
            descriptor_type: DescriptorType::Report,
            descriptor_length,
        }
        .pack()
        .map_err(|_| UsbError::ParseError)
    }

    pub fn write_descriptors(&self, writer: &mut DescriptorWriter) -> usb_device::Result<()> {
        writer.interface_alt(
            self.id,
            usb_device::device::DEFAULT_ALTERNATE_SETTING,
            USB_CLASS_HID,
            InterfaceSubClass::Boot.into(),
            InterfaceProtocol::Keyboard.into(),
            self.description_index,
        )?;

        //Hid descriptor
        writer.write(DescriptorType::Hid.into(), &self.hid_descriptor_body()?)?;

        //Endpoint descriptor
        writer.endpoint(&self.in_endpoint)?;

        Ok(())
    }

    pub fn get_string(&self, index: StringIndex) -> Option<&'static str> {
        self.description_index
            .filter(|&i| i == index)
            .and(self.config.description)
    }

    pub fn reset(&mut self) {
        self.protocol = HidProtocol::Report;
        self.idle = self.config.idle_default;
        self.attached = false;
    }

    pub fn set_attached(&mut self, attached: bool) {
        if self.attached != attached {
            info!("Interface {} attached: {}", u8::from(self.id), attached);
        }
        self.attached = attached;
    }

    /// Set_Idle - only the global idle rate is kept as the keyboard has no report ids
    pub fn set_idle(&mut self, report_id: u8, value: u8) {
        if report_id == 0 {
            self.idle = value;
            info!("Set global idle to {:X}", value);
        } else {
            warn!("Ignoring idle for unknown report id {:X}", report_id);
        }
    }

    pub fn get_idle(&self) -> u8 {
        self.idle
    }
}

impl<B: UsbBus> DeviceStack for KeyboardInterface<'_, B> {
    fn is_attached(&self) -> bool {
        self.attached
    }

    fn send(&mut self, report: &[u8]) -> Result<(), UsbHidError> {
        self.in_endpoint.write(report)?;
        Ok(())
    }

    fn protocol(&self) -> HidProtocol {
        self.protocol
    }

    fn set_protocol(&mut self, protocol: HidProtocol) {
        self.protocol = protocol;
        info!("Set protocol to {:?}", protocol);
    }
}

#[must_use = "this `KeyboardInterfaceBuilder` must be assigned or consumed by `::build()`"]
#[derive(Clone, Debug)]
pub struct KeyboardInterfaceBuilder {
    config: KeyboardInterfaceConfig,
}

impl Default for KeyboardInterfaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardInterfaceBuilder {
    pub fn new() -> Self {
        KeyboardInterfaceBuilder {
            config: KeyboardInterfaceConfig {
                description: None,
                idle_default: 0,
                in_endpoint: EndpointConfig {
                    max_packet_size: UsbPacketSize::Bytes32,
                    poll_interval: 10,
                },
            },
        }
    }

    pub fn idle_default<D: Into<Milliseconds>>(mut self, duration: D) -> BuilderResult<Self> {
        let d_ms = duration.into();

        if d_ms == Milliseconds(0_u32) {
            self.config.idle_default = 0;
        } else {
            let scaled_duration = d_ms.integer() / 4;

            if scaled_duration == 0 {
                //round up for 1-3ms
                self.config.idle_default = 1;
            } else {
                self.config.idle_default =
                    u8::try_from(scaled_duration).map_err(|_| UsbHidBuilderError::ValueOverflow)?;
            }
        }
        Ok(self)
    }

    pub fn description(mut self, s: &'static str) -> Self {
        self.config.description = Some(s);
        self
    }

    /// The endpoint must hold a full report protocol report in one packet
    pub fn in_endpoint(
        mut self,
        max_packet_size: UsbPacketSize,
        poll_interval: Milliseconds,
    ) -> BuilderResult<Self> {
        if max_packet_size < UsbPacketSize::Bytes32 {
            return Err(UsbHidBuilderError::ValueOverflow);
        }
        self.config.in_endpoint = EndpointConfig {
            max_packet_size,
            poll_interval: u8::try_from(poll_interval.integer())
                .map_err(|_| UsbHidBuilderError::ValueOverflow)?,
        };
        Ok(self)
    }

    pub fn build(self) -> KeyboardInterfaceConfig {
        self.config
    }
}
