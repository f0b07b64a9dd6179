// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial transport layer for the console line protocol and framed uploads.

use anyhow::{bail, Context, Result};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;

/// Default timeout for serial operations in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// USB CDC transport to the host MCU console.
///
/// The console speaks plain text command lines and `READY`/`OK`/
/// `ERR <token>` reply lines, plus raw framed-receiver bytes during an
/// upload — so this transport is line-oriented with a raw-byte escape
/// hatch rather than a typed codec.
pub struct Transport {
    port: Box<dyn SerialPort>,
}

impl Transport {
    /// Create a new transport connection to the specified serial port.
    pub fn new(port_name: &str) -> Result<Self> {
        Self::with_timeout(port_name, DEFAULT_TIMEOUT_MS)
    }

    /// Create a new transport connection with a custom timeout.
    pub fn with_timeout(port_name: &str, timeout_ms: u64) -> Result<Self> {
        let port = serialport::new(port_name, 115200)
            .timeout(Duration::from_millis(timeout_ms))
            .open()
            .with_context(|| format!("Failed to open serial port {}", port_name))?;

        Ok(Self { port })
    }

    /// Get the port name.
    pub fn port_name(&self) -> String {
        self.port.name().unwrap_or_else(|| "?".to_string())
    }

    /// Send a command line, appending the `\n` the console's line reader
    /// requires.
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        self.port
            .write_all(line.as_bytes())
            .with_context(|| "Failed to write command line")?;
        self.port
            .write_all(b"\n")
            .with_context(|| "Failed to write line terminator")?;
        self.port.flush()?;
        Ok(())
    }

    /// Write raw bytes (a framed-receiver data or commit frame) with no
    /// line framing of any kind.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.port
            .write_all(data)
            .with_context(|| "Failed to write frame bytes")?;
        self.port.flush()?;
        Ok(())
    }

    /// Read one `\r\n`- or `\n`-terminated reply line, stripping the
    /// terminator.
    pub fn read_line(&mut self) -> Result<String> {
        let mut line = Vec::with_capacity(64);
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(1) => {
                    if byte[0] == b'\n' {
                        break;
                    }
                    if byte[0] != b'\r' {
                        line.push(byte[0]);
                    }
                }
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    bail!("Timeout waiting for response line");
                }
                Err(e) => bail!("Serial read error: {}", e),
            }
        }
        String::from_utf8(line).context("Response line was not valid UTF-8")
    }

    /// Send a command line and wait for one reply line.
    pub fn send_recv_line(&mut self, line: &str) -> Result<String> {
        self.send_line(line)?;
        self.read_line()
    }

    /// Send a command line and wait for one reply line, under a custom
    /// timeout (e.g. a longer one for `selfupdate`'s flash erase).
    pub fn send_recv_line_timeout(&mut self, line: &str, timeout_ms: u64) -> Result<String> {
        let old_timeout = self.port.timeout();
        self.port
            .set_timeout(Duration::from_millis(timeout_ms))
            .map_err(|e| anyhow::anyhow!("Failed to set timeout: {}", e))?;
        let result = self.send_recv_line(line);
        let _ = self.port.set_timeout(old_timeout);
        result
    }
}
