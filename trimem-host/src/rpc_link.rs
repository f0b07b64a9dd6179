// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Client side of the UART RPC link to the co-processor: COBS-framed
//! postcard messages, same framing discipline as `usb_transport.rs`'s
//! console channel, just one request in flight at a time over a
//! different wire.

use embedded_hal_nb::serial::{Read, Write};
use trimem_core::error::Error;
use trimem_core::rpcwire::{RpcCall, RpcResult};

const BUF_SIZE: usize = 64;

pub struct RpcLink<U> {
    uart: U,
}

impl<U> RpcLink<U>
where
    U: Read<u8> + Write<u8>,
{
    pub fn new(uart: U) -> Self {
        Self { uart }
    }

    /// Send `name(argv)` to the co-processor and block for its reply.
    pub fn call(&mut self, name: &str, argv: &[i32]) -> Result<i32, Error> {
        let call = RpcCall::new(name, argv).ok_or(Error::InvalidArgument)?;

        let mut tx = [0u8; BUF_SIZE];
        let encoded = postcard::to_slice_cobs(&call, &mut tx).map_err(|_| Error::IoError)?;
        for &byte in encoded.iter() {
            nb::block!(self.uart.write(byte)).map_err(|_| Error::IoError)?;
        }

        // `from_bytes_cobs` expects the trailing zero delimiter included in
        // the slice it decodes in place, matching `to_slice_cobs`'s output —
        // so the sentinel byte that ends the frame on the wire is kept, not
        // stripped, before being handed to the decoder.
        let mut rx = [0u8; BUF_SIZE];
        let mut pos = 0usize;
        loop {
            if pos >= BUF_SIZE {
                return Err(Error::IoError);
            }
            let byte = nb::block!(self.uart.read()).map_err(|_| Error::IoError)?;
            rx[pos] = byte;
            pos += 1;
            if byte == 0x00 {
                break;
            }
        }

        let result: RpcResult =
            postcard::from_bytes_cobs(&mut rx[..pos]).map_err(|_| Error::IoError)?;
        Ok(result.value)
    }
}
