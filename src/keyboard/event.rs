//! Host driven class events
//!
//! The device stack reports each HID class request as a [`HidEvent`]. [`BasicKeyboard::handle_event`]
//! validates it against the report layout and updates the engine.

use heapless::Vec;
use log::{info, trace, warn};
use packed_struct::prelude::*;

use super::report::{KeyboardLedsReport, BASIC_KEYBOARD_REPORT_LENGTH, SET_REPORT_LENGTH};
use super::BasicKeyboard;
use crate::hid_class::descriptor::{HidProtocol, ReportType};
use crate::interface::{DeviceStack, LedOutput};
use crate::UsbHidError;

/// Parameters of a Get_Report or Set_Report request - HID spec 7.2.1 and 7.2.2
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRequest {
    pub report_type: ReportType,
    pub report_id: u8,
    pub length: u16,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HidEvent {
    /// The host selected a configuration
    SetConfiguration(u8),
    SetInterface { alternate_setting: u8 },
    /// The host acknowledged the last report sent on the IN endpoint
    SendResponse,
    GetReport(ReportRequest),
    /// An output report has been copied into the buffer handed out by
    /// [`HidEvent::RequestReportBuffer`]
    SetReport(ReportRequest),
    /// The stack needs somewhere to put an incoming output report of `length` bytes
    RequestReportBuffer { length: u16 },
    /// Raw wValue of Set_Protocol
    SetProtocol(u16),
}

#[derive(Debug, PartialEq, Eq)]
pub enum HidResponse<'a> {
    Accepted,
    /// Copy of the requested bytes of the active report
    Report(Vec<u8, BASIC_KEYBOARD_REPORT_LENGTH>),
    ReportBuffer(&'a mut [u8]),
}

impl BasicKeyboard {
    pub fn handle_event<S: DeviceStack, L: LedOutput>(
        &mut self,
        stack: &mut S,
        leds: &mut L,
        event: HidEvent,
    ) -> Result<HidResponse<'_>, UsbHidError> {
        trace!("Hid event {:?}", event);

        match event {
            HidEvent::SetConfiguration(value) => {
                //protocol reverts to report whenever the device is configured - Hid spec 7.2.6
                stack.set_protocol(HidProtocol::Report);
                self.latch_protocol(HidProtocol::Report);
                self.store.reset_active();
                info!("Set configuration {}", value);
                Ok(HidResponse::Accepted)
            }
            HidEvent::SetInterface { alternate_setting } => {
                if alternate_setting != 0 {
                    warn!("Unsupported alternate setting {}", alternate_setting);
                    return Err(UsbHidError::InvalidRequest);
                }
                self.store.reset_active();
                Ok(HidResponse::Accepted)
            }
            HidEvent::SendResponse => {
                self.send_pending = false;
                if stack.is_attached() {
                    Ok(HidResponse::Accepted)
                } else {
                    Err(UsbHidError::NotAttached)
                }
            }
            HidEvent::GetReport(request) => self.get_report(request).map(HidResponse::Report),
            HidEvent::SetReport(request) => {
                self.set_report(request, leds)?;
                Ok(HidResponse::Accepted)
            }
            HidEvent::RequestReportBuffer { length } => {
                let length = usize::from(length);
                if length > SET_REPORT_LENGTH {
                    warn!(
                        "Report buffer of {} bytes requested, expected <={}",
                        length, SET_REPORT_LENGTH
                    );
                    Err(UsbHidError::AllocFail)
                } else {
                    Ok(HidResponse::ReportBuffer(&mut self.out_buffer[..length]))
                }
            }
            HidEvent::SetProtocol(value) => {
                match u8::try_from(value)
                    .ok()
                    .and_then(HidProtocol::from_primitive)
                {
                    Some(protocol) => {
                        stack.set_protocol(protocol);
                        self.latch_protocol(protocol);
                        Ok(HidResponse::Accepted)
                    }
                    None => {
                        warn!("Unable to set protocol, unsupported value:{:X}", value);
                        Err(UsbHidError::InvalidRequest)
                    }
                }
            }
        }
    }

    /// Copies the active report and counts it as delivered, swapping the reports before the
    /// host has confirmed the control transfer
    fn get_report(
        &mut self,
        request: ReportRequest,
    ) -> Result<Vec<u8, BASIC_KEYBOARD_REPORT_LENGTH>, UsbHidError> {
        let length = usize::from(request.length);
        if request.report_type != ReportType::Input
            || request.report_id != 0
            || length > BASIC_KEYBOARD_REPORT_LENGTH
        {
            warn!("Rejected GetReport {:?}", request);
            return Err(UsbHidError::InvalidRequest);
        }

        let data = self
            .store
            .active()
            .pack()
            .map_err(|_| UsbHidError::SerializationError)?;
        let report =
            Vec::from_slice(&data[..length]).map_err(|()| UsbHidError::SerializationError)?;

        self.action_counter = self.action_counter.wrapping_add(1);
        self.store.swap();

        Ok(report)
    }

    fn set_report<L: LedOutput>(
        &mut self,
        request: ReportRequest,
        leds: &mut L,
    ) -> Result<(), UsbHidError> {
        if request.report_type != ReportType::Output
            || request.report_id != 0
            || usize::from(request.length) != SET_REPORT_LENGTH
        {
            warn!("Rejected SetReport {:?}", request);
            return Err(UsbHidError::InvalidRequest);
        }

        let report = KeyboardLedsReport::unpack(&self.out_buffer)
            .map_err(|_| UsbHidError::SerializationError)?;
        trace!("Leds {:?}", report);
        leds.set_caps_lock(report.caps_lock);
        Ok(())
    }
}
