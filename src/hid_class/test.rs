#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::cell::{Cell, RefCell};
use std::sync::Mutex;
use std::vec::Vec;

use env_logger::Env;
use log::SetLoggerError;
use usb_device::bus::PollResult;
use usb_device::prelude::*;
use usb_device::UsbDirection;

use super::descriptor::{HidProtocol, USB_CLASS_HID};
use super::interface::KeyboardInterfaceBuilder;
use super::*;
use crate::keyboard::report::BOOT_KEYBOARD_REPORT_LENGTH;

fn init_logging() {
    let _: core::result::Result<(), SetLoggerError> =
        env_logger::Builder::from_env(Env::default().default_filter_or("trace"))
            .is_test(true)
            .try_init();
}

#[derive(Default)]
struct UsbTestManager {
    in_buf: Mutex<RefCell<Vec<u8>>>,
    setup_buf: Mutex<RefCell<Vec<u8>>>,
    out_buf: Mutex<RefCell<Vec<u8>>>,
    stalled: Mutex<bool>,
}

impl UsbTestManager {
    fn host_write_setup(&self, data: &[u8]) -> Result<()> {
        let buf = self.setup_buf.lock().unwrap();
        if buf.borrow().is_empty() {
            buf.borrow_mut().extend_from_slice(data);
            Ok(())
        } else {
            Err(UsbError::WouldBlock)
        }
    }

    /// Queue the data stage of a control OUT transfer
    fn host_write_out(&self, data: &[u8]) -> Result<()> {
        let buf = self.out_buf.lock().unwrap();
        if buf.borrow().is_empty() {
            buf.borrow_mut().extend_from_slice(data);
            Ok(())
        } else {
            Err(UsbError::WouldBlock)
        }
    }

    fn is_stalled(&self) -> bool {
        *self.stalled.lock().unwrap()
    }

    fn host_read_in(&self) -> Vec<u8> {
        self.in_buf.lock().unwrap().take()
    }

    fn has_setup_data(&self) -> bool {
        !self.setup_buf.lock().unwrap().borrow().is_empty()
    }

    fn has_out_data(&self) -> bool {
        !self.out_buf.lock().unwrap().borrow().is_empty()
    }

    //setup packets are read before any pending data stage
    fn device_read(&self, data: &mut [u8]) -> Result<usize> {
        for buf in [&self.setup_buf, &self.out_buf] {
            let buf = buf.lock().unwrap();
            if !buf.borrow().is_empty() {
                let tmp = buf.take();
                data[..tmp.len()].copy_from_slice(&tmp);
                return Ok(tmp.len());
            }
        }
        Err(UsbError::WouldBlock)
    }

    fn device_write(&self, data: &[u8]) -> Result<usize> {
        let buf = self.in_buf.lock().unwrap();
        if buf.borrow().is_empty() {
            buf.borrow_mut().extend_from_slice(data);
            Ok(data.len())
        } else {
            Err(UsbError::WouldBlock)
        }
    }
}

struct TestUsbBus<'a> {
    next_ep_index: usize,
    manager: &'a UsbTestManager,
}

impl<'a> TestUsbBus<'a> {
    fn new(manager: &'a UsbTestManager) -> Self {
        TestUsbBus {
            next_ep_index: 0,
            manager,
        }
    }
}

impl UsbBus for TestUsbBus<'_> {
    fn alloc_ep(
        &mut self,
        ep_dir: UsbDirection,
        _ep_addr: Option<EndpointAddress>,
        _ep_type: EndpointType,
        _max_packet_size: u16,
        _interval: u8,
    ) -> Result<EndpointAddress> {
        let ep = EndpointAddress::from_parts(self.next_ep_index, ep_dir);
        self.next_ep_index += 1;
        Ok(ep)
    }

    fn enable(&mut self) {}
    fn reset(&self) {
        todo!()
    }
    fn set_device_address(&self, _addr: u8) {
        todo!()
    }
    fn write(&self, _ep_addr: EndpointAddress, buf: &[u8]) -> Result<usize> {
        self.manager.device_write(buf)
    }
    fn read(&self, _ep_addr: EndpointAddress, buf: &mut [u8]) -> Result<usize> {
        self.manager.device_read(buf)
    }
    fn set_stalled(&self, _ep_addr: EndpointAddress, stalled: bool) {
        *self.manager.stalled.lock().unwrap() = stalled;
    }
    fn is_stalled(&self, _ep_addr: EndpointAddress) -> bool {
        todo!()
    }
    fn suspend(&self) {
        todo!()
    }
    fn resume(&self) {
        todo!()
    }
    fn poll(&self) -> PollResult {
        let setup = self.manager.has_setup_data();
        let out = !setup && self.manager.has_out_data();
        PollResult::Data {
            ep_out: u16::from(out),
            //the control pipe treats an IN completion during a data OUT stage as an error
            ep_in_complete: u16::from(!out),
            ep_setup: u16::from(setup),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "lsb", bit_numbering = "msb0", size_bytes = "8")]
struct UsbRequest {
    #[packed_field(bits = "0")]
    direction: bool,
    #[packed_field(bits = "1:2")]
    request_type: u8,
    #[packed_field(bits = "4:7")]
    recipient: u8,
    request: u8,
    value: u16,
    index: u16,
    length: u16,
}

fn class_in(request: HidRequest, value: u16, length: u16) -> [u8; 8] {
    UsbRequest {
        direction: UsbDirection::In != UsbDirection::Out,
        request_type: RequestType::Class as u8,
        recipient: Recipient::Interface as u8,
        request: request.into(),
        value,
        index: 0x0,
        length,
    }
    .pack()
    .unwrap()
}

fn class_out(request: HidRequest, value: u16) -> [u8; 8] {
    UsbRequest {
        direction: UsbDirection::In != UsbDirection::In,
        request_type: RequestType::Class as u8,
        recipient: Recipient::Interface as u8,
        request: request.into(),
        value,
        index: 0x0,
        length: 0x0,
    }
    .pack()
    .unwrap()
}

fn set_output_report(length: u16) -> [u8; 8] {
    UsbRequest {
        direction: UsbDirection::In != UsbDirection::In,
        request_type: RequestType::Class as u8,
        recipient: Recipient::Interface as u8,
        request: HidRequest::SetReport.into(),
        value: u16::from(u8::from(ReportType::Output)) << 8,
        index: 0x0,
        length,
    }
    .pack()
    .unwrap()
}

fn set_interface(alternate_setting: u16) -> [u8; 8] {
    UsbRequest {
        direction: UsbDirection::In != UsbDirection::In,
        request_type: RequestType::Standard as u8,
        recipient: Recipient::Interface as u8,
        request: Request::SET_INTERFACE,
        value: alternate_setting,
        index: 0x0,
        length: 0x0,
    }
    .pack()
    .unwrap()
}

fn set_configuration(value: u16) -> [u8; 8] {
    UsbRequest {
        direction: UsbDirection::In != UsbDirection::In,
        request_type: RequestType::Standard as u8,
        recipient: Recipient::Device as u8,
        request: Request::SET_CONFIGURATION,
        value,
        index: 0x0,
        length: 0x0,
    }
    .pack()
    .unwrap()
}

fn no_leds(_: bool) {}

#[test]
fn descriptor_ordering_for_boot_hosts() {
    init_logging();

    let manager = UsbTestManager::default();
    let usb_alloc = UsbBusAllocator::new(TestUsbBus::new(&manager));

    let mut hid = BasicKeyboardClass::new(
        &usb_alloc,
        KeyboardInterfaceConfig::default_config(),
        no_leds,
    );

    let mut usb_dev = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
        .device_class(USB_CLASS_HID)
        .build();

    // Get Configuration
    manager
        .host_write_setup(
            &UsbRequest {
                direction: UsbDirection::In != UsbDirection::Out,
                request_type: RequestType::Standard as u8,
                recipient: Recipient::Device as u8,
                request: Request::GET_DESCRIPTOR,
                value: u16::from(usb_device::descriptor::descriptor_type::CONFIGURATION) << 8,
                index: 0,
                length: 0xFFFF,
            }
            .pack()
            .unwrap(),
        )
        .unwrap();

    assert!(usb_dev.poll(&mut [&mut hid]));

    // read multiple transfers then validate config
    let mut data = Vec::new();

    loop {
        let read = manager.host_read_in();
        if read.is_empty() {
            break;
        }
        data.extend_from_slice(&read);
        assert!(usb_dev.poll(&mut [&mut hid]));
    }

    /*
      Expected descriptor order (<https://www.usb.org/sites/default/files/hid1_11.pdf> Appendix F.3):
        Configuration descriptor (other Interface, Endpoint, and Vendor Specific descriptors if required)
        Interface descriptor (with Subclass and Protocol specifying Boot Keyboard)
            Hid descriptor (associated with this Interface)
            Endpoint descriptor (Hid Interrupt In Endpoint)
    */

    let mut it = data.iter();

    let len = *it.next().unwrap();
    assert_eq!(
        *(it.next().unwrap()),
        0x02,
        "Expected Configuration descriptor"
    );
    for _ in 0..(len - 2) {
        it.next().unwrap();
    }

    let len = *it.next().unwrap();
    assert_eq!(*it.next().unwrap(), 0x04, "Expected Interface descriptor");
    let interface: Vec<u8> = (0..(len - 2)).map(|_| *it.next().unwrap()).collect();
    // class, subclass, protocol
    assert_eq!(&interface[3..6], &[USB_CLASS_HID, 0x01, 0x01]);

    let len = *it.next().unwrap();
    assert_eq!(*(it.next().unwrap()), 0x21, "Expected Hid descriptor");
    let hid_body: Vec<u8> = (0..(len - 2)).map(|_| *it.next().unwrap()).collect();
    let report_length = u16::try_from(descriptor::BASIC_KEYBOARD_REPORT_DESCRIPTOR.len()).unwrap();
    assert_eq!(
        hid_body,
        [
            0x11,
            0x01,
            0x00,
            0x01,
            0x22,
            (report_length & 0xFF) as u8,
            (report_length >> 8) as u8
        ]
    );

    let len = *it.next().unwrap();
    assert_eq!(*(it.next().unwrap()), 0x05, "Expected Endpoint descriptor");
    for _ in 0..(len - 2) {
        it.next().unwrap();
    }

    // Check there isn't any more data
    assert!(it.next().is_none());
}

#[test]
fn get_protocol_default_to_report() {
    init_logging();

    let manager = UsbTestManager::default();
    let usb_alloc = UsbBusAllocator::new(TestUsbBus::new(&manager));

    let mut hid = BasicKeyboardClass::new(
        &usb_alloc,
        KeyboardInterfaceConfig::default_config(),
        no_leds,
    );

    let mut usb_dev = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
        .device_class(USB_CLASS_HID)
        .build();

    manager
        .host_write_setup(&class_in(HidRequest::GetProtocol, 0x0, 0x1))
        .unwrap();

    assert!(usb_dev.poll(&mut [&mut hid]));

    let data = manager.host_read_in();
    assert_eq!(
        data,
        [HidProtocol::Report.into()],
        "Expected protocol to be Report by default"
    );
}

#[test]
fn set_protocol() {
    init_logging();

    let manager = UsbTestManager::default();
    let usb_alloc = UsbBusAllocator::new(TestUsbBus::new(&manager));

    let mut hid = BasicKeyboardClass::new(
        &usb_alloc,
        KeyboardInterfaceConfig::default_config(),
        no_leds,
    );

    let mut usb_dev = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
        .device_class(USB_CLASS_HID)
        .build();

    // Set protocol to boot
    manager
        .host_write_setup(&class_out(
            HidRequest::SetProtocol,
            HidProtocol::Boot as u16,
        ))
        .unwrap();

    assert!(usb_dev.poll(&mut [&mut hid]));
    assert_eq!(hid.keyboard().protocol(), HidProtocol::Boot);

    // Get protocol
    manager
        .host_write_setup(&class_in(HidRequest::GetProtocol, 0x0, 0x1))
        .unwrap();

    assert!(usb_dev.poll(&mut [&mut hid]));

    let data = &manager.host_read_in();
    assert_eq!(
        data,
        &[HidProtocol::Boot.into()],
        "Expected protocol to be Boot"
    );
}

#[test]
fn set_protocol_rejects_unknown_value() {
    init_logging();

    let manager = UsbTestManager::default();
    let usb_alloc = UsbBusAllocator::new(TestUsbBus::new(&manager));

    let mut hid = BasicKeyboardClass::new(
        &usb_alloc,
        KeyboardInterfaceConfig::default_config(),
        no_leds,
    );

    let mut usb_dev = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
        .device_class(USB_CLASS_HID)
        .build();

    manager
        .host_write_setup(&class_out(HidRequest::SetProtocol, 0x0100))
        .unwrap();

    assert!(usb_dev.poll(&mut [&mut hid]));
    assert_eq!(hid.keyboard().protocol(), HidProtocol::Report);
    assert_eq!(hid.interface().protocol(), HidProtocol::Report);
}

#[test]
fn get_protocol_default_post_reset() {
    init_logging();

    let manager = UsbTestManager::default();
    let usb_alloc = UsbBusAllocator::new(TestUsbBus::new(&manager));

    let mut hid = BasicKeyboardClass::new(
        &usb_alloc,
        KeyboardInterfaceConfig::default_config(),
        no_leds,
    );

    let mut usb_dev = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
        .device_class(USB_CLASS_HID)
        .build();

    // Set protocol to boot
    manager
        .host_write_setup(&class_out(
            HidRequest::SetProtocol,
            HidProtocol::Boot as u16,
        ))
        .unwrap();

    assert!(usb_dev.poll(&mut [&mut hid]));

    // simulate a bus reset after setting protocol to boot
    hid.reset();
    assert_eq!(hid.keyboard().protocol(), HidProtocol::Report);

    // Get protocol
    manager
        .host_write_setup(&class_in(HidRequest::GetProtocol, 0x0, 0x1))
        .unwrap();

    assert!(usb_dev.poll(&mut [&mut hid]));

    let data = &manager.host_read_in();
    assert_eq!(
        data,
        &[HidProtocol::Report.into()],
        "Expected protocol to be Report post reset"
    );
}

#[test]
fn get_global_idle_default() {
    init_logging();

    let manager = UsbTestManager::default();
    let usb_alloc = UsbBusAllocator::new(TestUsbBus::new(&manager));

    let mut hid = BasicKeyboardClass::new(
        &usb_alloc,
        KeyboardInterfaceConfig::default_config(),
        no_leds,
    );

    let mut usb_dev = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
        .device_class(USB_CLASS_HID)
        .build();

    manager
        .host_write_setup(&class_in(HidRequest::GetIdle, 0x0, 0x1))
        .unwrap();

    assert!(usb_dev.poll(&mut [&mut hid]));

    let data = &manager.host_read_in();
    assert_eq!(data, &[125], "Expected idle to be 500ms / 4");
}

#[test]
fn set_global_idle() {
    const IDLE_NEW: u8 = 0x10;

    init_logging();

    let manager = UsbTestManager::default();
    let usb_alloc = UsbBusAllocator::new(TestUsbBus::new(&manager));

    let mut hid = BasicKeyboardClass::new(
        &usb_alloc,
        KeyboardInterfaceConfig::default_config(),
        no_leds,
    );

    let mut usb_dev = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
        .device_class(USB_CLASS_HID)
        .build();

    manager
        .host_write_setup(&class_out(HidRequest::SetIdle, u16::from(IDLE_NEW) << 8))
        .unwrap();

    assert!(usb_dev.poll(&mut [&mut hid]));

    manager
        .host_write_setup(&class_in(HidRequest::GetIdle, 0x0, 0x1))
        .unwrap();

    assert!(usb_dev.poll(&mut [&mut hid]));

    let data = &manager.host_read_in();
    assert_eq!(data, &[IDLE_NEW], "Expected idle to be updated");
    assert_eq!(hid.interface().get_idle(), IDLE_NEW);
}

#[test]
fn get_report_swaps_active_report() {
    init_logging();

    let manager = UsbTestManager::default();
    let usb_alloc = UsbBusAllocator::new(TestUsbBus::new(&manager));

    let mut hid = BasicKeyboardClass::new(
        &usb_alloc,
        KeyboardInterfaceConfig::default_config(),
        no_leds,
    );

    let mut usb_dev = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
        .device_class(USB_CLASS_HID)
        .build();

    hid.keyboard_mut().add_scancode(0x04);

    let get_input_report = class_in(
        HidRequest::GetReport,
        u16::from(u8::from(ReportType::Input)) << 8,
        BOOT_KEYBOARD_REPORT_LENGTH as u16,
    );

    manager.host_write_setup(&get_input_report).unwrap();
    assert!(usb_dev.poll(&mut [&mut hid]));
    assert_eq!(manager.host_read_in(), [0; BOOT_KEYBOARD_REPORT_LENGTH]);
    assert_eq!(hid.keyboard().action_counter(), 1);

    manager.host_write_setup(&get_input_report).unwrap();
    assert!(usb_dev.poll(&mut [&mut hid]));
    assert_eq!(
        manager.host_read_in(),
        [0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]
    );
}

#[test]
fn action_requires_configuration() {
    init_logging();

    let manager = UsbTestManager::default();
    let usb_alloc = UsbBusAllocator::new(TestUsbBus::new(&manager));

    let mut hid = BasicKeyboardClass::new(
        &usb_alloc,
        KeyboardInterfaceConfig::default_config(),
        no_leds,
    );

    let mut usb_dev = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
        .device_class(USB_CLASS_HID)
        .build();

    assert_eq!(hid.action(), Err(UsbHidError::NotAttached));

    manager.host_write_setup(&set_configuration(1)).unwrap();
    assert!(usb_dev.poll(&mut [&mut hid]));
    assert!(hid.interface().is_attached());

    hid.keyboard_mut().add_scancode(0x04);
    hid.action().unwrap();

    // the report active before the key was staged goes out first
    assert_eq!(manager.host_read_in(), [0; 30]);
    assert!(hid.keyboard().is_send_pending());

    hid.action().unwrap();
    let data = manager.host_read_in();
    assert_eq!(data.len(), 30);
    assert_eq!(data[2], 0x01);

    manager.host_write_setup(&set_configuration(0)).unwrap();
    assert!(usb_dev.poll(&mut [&mut hid]));
    assert!(!hid.interface().is_attached());
    assert_eq!(hid.action(), Err(UsbHidError::NotAttached));
}

#[test]
fn set_report_forwards_caps_lock() {
    init_logging();

    let manager = UsbTestManager::default();
    let usb_alloc = UsbBusAllocator::new(TestUsbBus::new(&manager));
    let caps_lock = Cell::new(false);

    let mut hid = BasicKeyboardClass::new(
        &usb_alloc,
        KeyboardInterfaceConfig::default_config(),
        |on: bool| caps_lock.set(on),
    );

    let mut usb_dev = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
        .device_class(USB_CLASS_HID)
        .build();

    manager.host_write_setup(&set_output_report(1)).unwrap();
    assert!(usb_dev.poll(&mut [&mut hid]));
    //nothing is forwarded before the data stage arrives
    assert!(!caps_lock.get());

    manager.host_write_out(&[0x02]).unwrap();
    assert!(usb_dev.poll(&mut [&mut hid]));

    assert!(caps_lock.get());
    assert!(!manager.is_stalled());
}

#[test]
fn set_report_rejects_length_mismatch() {
    init_logging();

    let manager = UsbTestManager::default();
    let usb_alloc = UsbBusAllocator::new(TestUsbBus::new(&manager));

    let mut hid = BasicKeyboardClass::new(
        &usb_alloc,
        KeyboardInterfaceConfig::default_config(),
        no_leds,
    );

    let mut usb_dev = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
        .device_class(USB_CLASS_HID)
        .build();

    manager.host_write_setup(&set_output_report(2)).unwrap();
    assert!(usb_dev.poll(&mut [&mut hid]));
    manager.host_write_out(&[0x02, 0x00]).unwrap();
    assert!(usb_dev.poll(&mut [&mut hid]));

    assert!(manager.is_stalled(), "Expected SetReport to be rejected");
}

#[test]
fn set_interface_rejects_alternate_setting() {
    init_logging();

    let manager = UsbTestManager::default();
    let usb_alloc = UsbBusAllocator::new(TestUsbBus::new(&manager));

    let mut hid = BasicKeyboardClass::new(
        &usb_alloc,
        KeyboardInterfaceConfig::default_config(),
        no_leds,
    );

    let mut usb_dev = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
        .device_class(USB_CLASS_HID)
        .build();

    manager.host_write_setup(&set_interface(0)).unwrap();
    assert!(usb_dev.poll(&mut [&mut hid]));
    assert!(!manager.is_stalled());

    manager.host_write_setup(&set_interface(1)).unwrap();
    assert!(usb_dev.poll(&mut [&mut hid]));
    assert!(manager.is_stalled(), "Expected alternate setting 1 to be rejected");
}

#[test]
fn builder_config_is_boot_keyboard() {
    init_logging();

    let manager = UsbTestManager::default();
    let usb_alloc = UsbBusAllocator::new(TestUsbBus::new(&manager));

    let config = KeyboardInterfaceBuilder::new()
        .description("Custom")
        .build();
    let mut hid = BasicKeyboardClass::new(&usb_alloc, config, no_leds);

    let mut usb_dev = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
        .device_class(USB_CLASS_HID)
        .build();

    manager
        .host_write_setup(
            &UsbRequest {
                direction: UsbDirection::In != UsbDirection::Out,
                request_type: RequestType::Standard as u8,
                recipient: Recipient::Device as u8,
                request: Request::GET_DESCRIPTOR,
                value: u16::from(usb_device::descriptor::descriptor_type::CONFIGURATION) << 8,
                index: 0,
                length: 0xFFFF,
            }
            .pack()
            .unwrap(),
        )
        .unwrap();
    assert!(usb_dev.poll(&mut [&mut hid]));

    let mut data = Vec::new();
    loop {
        let read = manager.host_read_in();
        if read.is_empty() {
            break;
        }
        data.extend_from_slice(&read);
        assert!(usb_dev.poll(&mut [&mut hid]));
    }

    // interface descriptor follows the 9 byte configuration descriptor
    assert_eq!(data[10], 0x04, "Expected Interface descriptor");
    // class, subclass, protocol
    assert_eq!(&data[14..17], &[USB_CLASS_HID, 0x01, 0x01]);
}
