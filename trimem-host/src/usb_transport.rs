// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! USB CDC console transport: raw bytes in, raw bytes out.
//!
//! The console here speaks two different wire shapes depending on what's
//! in flight — text command lines and `OK`/`ERR`/`READY` replies, or raw
//! framed-receiver bytes — so the transport itself stays byte-oriented and
//! lets `console::LineReader` and `trimem_core::receiver::ReceiverSession`
//! each interpret the stream their own way. It implements `ByteSource`
//! directly so a `ReceiverSession` can `pump` straight off it.

use rp2040_hal::usb::UsbBus;
use trimem_core::receiver::ByteSource;
use usb_device::class_prelude::UsbBusAllocator;
use usb_device::prelude::*;
use usbd_serial::SerialPort;

pub struct UsbTransport {
    serial: SerialPort<'static, UsbBus>,
    usb_dev: UsbDevice<'static, UsbBus>,
}

impl UsbTransport {
    pub fn new(usb_bus: &'static UsbBusAllocator<UsbBus>) -> Self {
        let serial = SerialPort::new(usb_bus);
        let usb_dev = UsbDeviceBuilder::new(usb_bus, UsbVidPid(0x2E8A, 0x000A))
            .strings(&[StringDescriptors::default()
                .manufacturer("ADNT")
                .product("trimem storage console")
                .serial_number("0001")])
            .unwrap()
            .device_class(usbd_serial::USB_CLASS_CDC)
            .build();

        Self { serial, usb_dev }
    }

    /// Poll the USB device. Must be called frequently from the main loop.
    pub fn poll(&mut self) -> bool {
        self.usb_dev.poll(&mut [&mut self.serial])
    }

    /// Write every byte of `data`, polling between partial writes so the
    /// device stays responsive while the host drains its RX buffer.
    pub fn write_all(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            match self.serial.write(data) {
                Ok(0) => {
                    self.poll();
                }
                Ok(n) => data = &data[n..],
                Err(UsbError::WouldBlock) => {
                    self.poll();
                }
                Err(_) => return,
            }
        }
    }

    /// Write `line` followed by a CRLF, matching the original's
    /// `Stream::println` convention for `READY`/`OK`/`ERR <token>`.
    pub fn write_line(&mut self, line: &str) {
        self.write_all(line.as_bytes());
        self.write_all(b"\r\n");
    }
}

impl ByteSource for UsbTransport {
    /// Non-blocking: returns whatever is already buffered, which may be
    /// zero bytes without that meaning end-of-stream.
    fn read(&mut self, buf: &mut [u8]) -> usize {
        self.poll();
        match self.serial.read(buf) {
            Ok(n) => n,
            Err(_) => 0,
        }
    }
}
