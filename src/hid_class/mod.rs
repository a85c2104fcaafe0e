//! usb-device class for the basic keyboard
//!
//! [`BasicKeyboardClass`] owns a [`KeyboardInterface`] and a [`BasicKeyboard`] engine. Control
//! requests addressed to the interface are turned into [`HidEvent`]s, standard requests the
//! device handles itself (Set_Configuration, Set_Interface) are observed on the way past.

use interface::{KeyboardInterface, KeyboardInterfaceConfig};
use log::{error, info, trace, warn};
use num_enum::IntoPrimitive;
use packed_struct::prelude::*;
#[allow(clippy::wildcard_imports)]
use usb_device::class_prelude::*;
use usb_device::control::{Recipient, Request, RequestType};
use usb_device::Result;

use crate::interface::{DeviceStack, LedOutput};
use crate::keyboard::event::{HidEvent, HidResponse, ReportRequest};
use crate::keyboard::BasicKeyboard;
use crate::UsbHidError;
use descriptor::{DescriptorType, ReportType};

pub mod descriptor;
pub mod interface;
pub mod prelude;
#[cfg(test)]
mod test;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PrimitiveEnum, IntoPrimitive)]
#[repr(u8)]
pub enum HidRequest {
    GetReport = 0x01,
    GetIdle = 0x02,
    GetProtocol = 0x03,
    SetReport = 0x09,
    SetIdle = 0x0A,
    SetProtocol = 0x0B,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, PrimitiveEnum, IntoPrimitive)]
#[repr(u8)]
pub enum UsbPacketSize {
    Bytes8 = 8,
    Bytes16 = 16,
    Bytes32 = 32,
    Bytes64 = 64,
}

/// [`KeyboardInterfaceBuilder`](interface::KeyboardInterfaceBuilder) error
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbHidBuilderError {
    /// A value is greater than the acceptable range of input values
    ValueOverflow,
}

pub type BuilderResult<B> = core::result::Result<B, UsbHidBuilderError>;

/// USB HID class for a single boot capable keyboard interface
pub struct BasicKeyboardClass<'a, B: UsbBus, L> {
    interface: KeyboardInterface<'a, B>,
    keyboard: BasicKeyboard,
    leds: L,
}

impl<'a, B: UsbBus, L: LedOutput> BasicKeyboardClass<'a, B, L> {
    pub fn new(
        usb_alloc: &'a UsbBusAllocator<B>,
        config: KeyboardInterfaceConfig,
        leds: L,
    ) -> Self {
        Self {
            interface: config.allocate(usb_alloc),
            keyboard: BasicKeyboard::new(),
            leds,
        }
    }

    pub fn keyboard(&self) -> &BasicKeyboard {
        &self.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut BasicKeyboard {
        &mut self.keyboard
    }

    pub fn interface(&self) -> &KeyboardInterface<'a, B> {
        &self.interface
    }

    pub fn leds(&self) -> &L {
        &self.leds
    }

    /// Send the active report on the interrupt endpoint, call once per poll interval
    pub fn action(&mut self) -> core::result::Result<(), UsbHidError> {
        self.keyboard.action(&mut self.interface)
    }

    fn is_own_interface(&self, request: &Request) -> bool {
        request.recipient == Recipient::Interface
            && request.index == u16::from(u8::from(self.interface.id()))
    }

    fn get_descriptor(&self, transfer: ControlIn<B>) {
        let request: &Request = transfer.request();
        match DescriptorType::from_primitive((request.value >> 8) as u8) {
            Some(DescriptorType::Report) => {
                match transfer.accept_with_static(self.interface.report_descriptor()) {
                    Err(e) => error!("Failed to send report descriptor - {:?}", e),
                    Ok(_) => {
                        trace!("Sent report descriptor");
                    }
                }
            }
            Some(DescriptorType::Hid) => {
                const LEN: u8 = 9;
                let body = match self.interface.hid_descriptor_body() {
                    Ok(body) => body,
                    Err(e) => {
                        error!("Failed to build Hid descriptor - {:?}", e);
                        return;
                    }
                };
                let mut buffer = [0; LEN as usize];
                buffer[0] = LEN;
                buffer[1] = u8::from(DescriptorType::Hid);
                buffer[2..].copy_from_slice(&body);
                match transfer.accept_with(&buffer) {
                    Err(e) => {
                        error!("Failed to send Hid descriptor - {:?}", e);
                    }
                    Ok(_) => {
                        trace!("Sent hid descriptor");
                    }
                }
            }
            _ => {
                warn!(
                    "Unsupported descriptor type, request type:{:?}, request:{:X}, value:{:X}",
                    request.request_type, request.request, request.value
                );
            }
        }
    }

    fn observe_standard_out(&mut self, transfer: ControlOut<B>) {
        let request = *transfer.request();

        if request.recipient == Recipient::Device && request.request == Request::SET_CONFIGURATION
        {
            let value = (request.value & 0xFF) as u8;
            self.interface.set_attached(value != 0);
            if let Err(e) = self.keyboard.handle_event(
                &mut self.interface,
                &mut self.leds,
                HidEvent::SetConfiguration(value),
            ) {
                error!("Set configuration failed - {:?}", e);
            }
            //the device completes the request
        } else if self.is_own_interface(&request) && request.request == Request::SET_INTERFACE {
            let alternate_setting = (request.value & 0xFF) as u8;
            if self
                .keyboard
                .handle_event(
                    &mut self.interface,
                    &mut self.leds,
                    HidEvent::SetInterface { alternate_setting },
                )
                .is_err()
            {
                transfer.reject().ok();
            }
        }
    }

    fn set_report(&mut self, transfer: ControlOut<B>) {
        let request = *transfer.request();

        let Ok(report_type) = ReportType::try_from((request.value >> 8) as u8) else {
            warn!("SetReport with unknown report type {:X}", request.value);
            transfer.reject().ok();
            return;
        };
        let report_request = ReportRequest {
            report_type,
            report_id: (request.value & 0xFF) as u8,
            length: request.length,
        };

        let data = transfer.data();
        match self.keyboard.handle_event(
            &mut self.interface,
            &mut self.leds,
            HidEvent::RequestReportBuffer {
                length: request.length,
            },
        ) {
            Ok(HidResponse::ReportBuffer(buffer)) if buffer.len() == data.len() => {
                buffer.copy_from_slice(data);
            }
            Ok(_) => {
                warn!(
                    "SetReport data length {:X} does not match wLength {:X}",
                    data.len(),
                    request.length
                );
                transfer.reject().ok();
                return;
            }
            Err(e) => {
                warn!("No buffer for SetReport - {:?}", e);
                transfer.reject().ok();
                return;
            }
        }

        match self.keyboard.handle_event(
            &mut self.interface,
            &mut self.leds,
            HidEvent::SetReport(report_request),
        ) {
            Ok(_) => {
                trace!("Set report, {:X} bytes", request.length);
                transfer.accept().ok();
            }
            Err(_) => {
                transfer.reject().ok();
            }
        }
    }

    fn get_report(&mut self, transfer: ControlIn<B>) {
        let request = *transfer.request();

        let Ok(report_type) = ReportType::try_from((request.value >> 8) as u8) else {
            warn!("GetReport with unknown report type {:X}", request.value);
            transfer.reject().ok();
            return;
        };

        match self.keyboard.handle_event(
            &mut self.interface,
            &mut self.leds,
            HidEvent::GetReport(ReportRequest {
                report_type,
                report_id: (request.value & 0xFF) as u8,
                length: request.length,
            }),
        ) {
            Ok(HidResponse::Report(data)) => {
                if let Err(e) = transfer.accept_with(&data) {
                    error!("Failed to send report - {:?}", e);
                } else {
                    trace!("Sent report, {:X} bytes", data.len());
                }
            }
            _ => {
                transfer.reject().ok();
            }
        }
    }
}

impl<B, L> UsbClass<B> for BasicKeyboardClass<'_, B, L>
where
    B: UsbBus,
    L: LedOutput,
{
    fn get_configuration_descriptors(&self, writer: &mut DescriptorWriter) -> Result<()> {
        self.interface.write_descriptors(writer)?;
        info!("wrote class config descriptor");
        Ok(())
    }

    fn get_string(&self, index: StringIndex, _lang_id: u16) -> Option<&str> {
        self.interface.get_string(index)
    }

    fn reset(&mut self) {
        info!("Reset");
        self.interface.reset();
        self.keyboard.reset();
    }

    fn endpoint_in_complete(&mut self, addr: EndpointAddress) {
        if addr != self.interface.in_endpoint_address() {
            return;
        }

        if let Err(e) =
            self.keyboard
                .handle_event(&mut self.interface, &mut self.leds, HidEvent::SendResponse)
        {
            trace!("Report acknowledged while detached - {:?}", e);
        }
    }

    fn control_out(&mut self, transfer: ControlOut<B>) {
        let request: &Request = transfer.request();

        if request.request_type == RequestType::Standard {
            self.observe_standard_out(transfer);
            return;
        }

        //only respond to Class requests for this interface
        if !(request.request_type == RequestType::Class && self.is_own_interface(request)) {
            return;
        }

        trace!(
            "ctrl_out: request type: {:?}, request: {:X}, value: {:X}",
            request.request_type,
            request.request,
            request.value
        );

        match HidRequest::from_primitive(request.request) {
            Some(HidRequest::SetReport) => {
                self.set_report(transfer);
            }
            Some(HidRequest::SetIdle) => {
                if request.length != 0 {
                    warn!(
                        "Expected SetIdle to have length 0, received {:X}",
                        request.length
                    );
                }

                self.interface
                    .set_idle((request.value & 0xFF) as u8, (request.value >> 8) as u8);
                transfer.accept().ok();
            }
            Some(HidRequest::SetProtocol) => {
                if request.length != 0 {
                    warn!(
                        "Expected SetProtocol to have length 0, received {:X}",
                        request.length
                    );
                }
                let value = request.value;
                match self.keyboard.handle_event(
                    &mut self.interface,
                    &mut self.leds,
                    HidEvent::SetProtocol(value),
                ) {
                    Ok(_) => {
                        transfer.accept().ok();
                    }
                    Err(_) => {
                        error!("Unable to set protocol, unsupported value:{:X}", value);
                        transfer.reject().ok();
                    }
                }
            }
            _ => {
                warn!(
                    "Unsupported control_out request type: {:?}, request: {:X}, value: {:X}",
                    request.request_type, request.request, request.value
                );
            }
        }
    }

    fn control_in(&mut self, transfer: ControlIn<B>) {
        let request: &Request = transfer.request();
        //only respond to requests for this interface
        if !self.is_own_interface(request) {
            return;
        }

        trace!(
            "ctrl_in: request type: {:?}, request: {:X}, value: {:X}",
            request.request_type,
            request.request,
            request.value
        );

        match request.request_type {
            RequestType::Standard => {
                if request.request == Request::GET_DESCRIPTOR {
                    info!("Get descriptor");
                    self.get_descriptor(transfer);
                }
            }

            RequestType::Class => match HidRequest::from_primitive(request.request) {
                Some(HidRequest::GetReport) => {
                    self.get_report(transfer);
                }
                Some(HidRequest::GetIdle) => {
                    if request.length != 1 {
                        warn!(
                            "Expected GetIdle to have length 1, received {:X}",
                            request.length
                        );
                    }

                    let idle = self.interface.get_idle();
                    if let Err(e) = transfer.accept_with(&[idle]) {
                        error!("Failed to send idle data - {:?}", e);
                    } else {
                        info!("Get Idle: {:X}", idle);
                    }
                }
                Some(HidRequest::GetProtocol) => {
                    if request.length != 1 {
                        warn!(
                            "Expected GetProtocol to have length 1, received {:X}",
                            request.length
                        );
                    }

                    let protocol = self.interface.protocol();
                    if let Err(e) = transfer.accept_with(&[protocol.into()]) {
                        error!("Failed to send protocol data - {:?}", e);
                    } else {
                        info!("Get protocol: {:?}", protocol);
                    }
                }
                _ => {
                    warn!(
                        "Unsupported control_in request type: {:?}, request: {:X}, value: {:X}",
                        request.request_type, request.request, request.value
                    );
                }
            },
            _ => {}
        }
    }
}
