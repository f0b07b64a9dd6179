// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Line-oriented console: the CLI command table, dispatched over
//! `usb_transport::UsbTransport`.
//!
//! `compile`/`putb64s`/`hash`/`termwidth` are named here because the CLI
//! grammar is part of this system's contract even though their backing
//! collaborators (the Tiny-C compiler, the base64 paste receiver, the
//! SHA-256 primitive, the terminal-width state) live outside this core —
//! each replies `ERR unsupported` rather than being silently absent from
//! the command table.

use core::fmt::Write as _;

use trimem_core::arbiter::{BusArbiter, GrantPin, RequestPin};
use trimem_core::copy::{copy_across, CopyReport};
use trimem_core::error::Error;
use trimem_core::fs::{require_file_info, FsBackend};
use trimem_core::pathspec::{basename, normalize_name, parse_backend_spec};
use trimem_core::receiver::{ByteSource, ReceiverOutcome, ReceiverSession, DEFAULT_MAX_FRAME};
use trimem_core::rpcwire::MAX_ARGV;
use trimem_core::selfupdate;
use trimem_core::slot::FileSlot;
use trimem_core::BackendId;

use crate::rpc_link::RpcLink;
use crate::usb_transport::UsbTransport;

/// Whole-file scratch buffer for `fscp` (buffer-the-whole-file, not
/// stream). Sized for this board's available SRAM rather than an
/// arbitrarily large firmware blob — a source larger than this fails
/// `fscp` with `OutOfSpace`, which is the documented, not silent,
/// failure mode.
pub const COPY_BUF_SIZE: usize = 16 * 1024;
const MAX_LINE: usize = 96;

/// Bus-acquisition timeout used around every command that touches a
/// storage backend (the shared bus the co-processor also needs).
const BUS_TIMEOUT_MS: u32 = 1000;

/// Internal flash region the self-update loop programs directly — not the
/// same region `Backends::flash`'s `FsBackend` reserves slots in. The
/// self-update target is the currently running firmware image at the
/// start of flash; the FS-on-flash backend is given a base offset past
/// the end of that image by `trimem-host::main`.
pub const SELFUPDATE_FLASH_OFFSET: u32 = 0;
pub const SELFUPDATE_FLASH_CAPACITY: u32 = 512 * 1024;

/// The three storage backends this board mounts, one field per `BackendId`.
pub struct Backends<F, N, P> {
    pub flash: F,
    pub nand: N,
    pub psram: P,
}

impl<F: FsBackend, N: FsBackend, P: FsBackend> Backends<F, N, P> {
    pub fn mount_all(&mut self) {
        self.flash.mount(true);
        self.nand.mount(true);
        self.psram.mount(false);
    }
}

/// Non-blocking accumulation of one newline-terminated command line.
pub struct LineReader {
    buf: heapless::String<MAX_LINE>,
}

impl LineReader {
    pub fn new() -> Self {
        Self {
            buf: heapless::String::new(),
        }
    }

    /// Drain whatever `src` currently has buffered. Returns a complete
    /// line (CR stripped, LF consumed) as soon as one is seen; returns
    /// `None` without blocking if the source has nothing more to offer.
    pub fn poll_line(&mut self, src: &mut impl ByteSource) -> Option<heapless::String<MAX_LINE>> {
        let mut byte = [0u8; 1];
        loop {
            if src.read(&mut byte) == 0 {
                return None;
            }
            match byte[0] {
                b'\n' => {
                    let line = self.buf.clone();
                    self.buf.clear();
                    return Some(line);
                }
                b'\r' => {}
                c if self.buf.len() < MAX_LINE => {
                    let _ = self.buf.push(c as char);
                }
                _ => {
                    // Overlong line: discard silently, wait for the terminator.
                }
            }
        }
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

enum Mode {
    Idle,
    Receiving,
}

/// Drives the CLI command table against a board's three backends.
pub struct Console {
    mode: Mode,
    lines: LineReader,
    receiver: ReceiverSession<DEFAULT_MAX_FRAME>,
    copy_buf: [u8; COPY_BUF_SIZE],
}

impl Console {
    pub fn new() -> Self {
        Self {
            mode: Mode::Idle,
            lines: LineReader::new(),
            receiver: ReceiverSession::new(),
            copy_buf: [0u8; COPY_BUF_SIZE],
        }
    }

    /// One non-blocking step: either pump an in-flight `rxbin` session, or
    /// try to read and dispatch one more command line.
    pub fn poll<F, N, P, R, G>(
        &mut self,
        transport: &mut UsbTransport,
        backends: &mut Backends<F, N, P>,
        arbiter: &mut BusArbiter<R, G>,
        now_ms: impl FnMut() -> u32,
        rpc: &mut RpcLink<crate::peripherals::RpcUart>,
    ) where
        F: FsBackend,
        N: FsBackend,
        P: FsBackend,
        R: RequestPin,
        G: GrantPin,
    {
        match self.mode {
            Mode::Receiving => {
                if let Some(outcome) = self.receiver.pump(transport, &mut backends.nand) {
                    match outcome {
                        ReceiverOutcome::Ready => {}
                        ReceiverOutcome::Ok => transport.write_line("OK"),
                        ReceiverOutcome::Err(e) => {
                            let mut msg: heapless::String<48> = heapless::String::new();
                            let _ = write!(msg, "ERR {}", e.token());
                            transport.write_line(&msg);
                        }
                    }
                    self.receiver.end();
                    self.mode = Mode::Idle;
                }
            }
            Mode::Idle => {
                if let Some(line) = self.lines.poll_line(transport) {
                    self.dispatch(&line, backends, arbiter, now_ms, transport, rpc);
                }
            }
        }
    }

    fn dispatch<F, N, P, R, G>(
        &mut self,
        line: &str,
        backends: &mut Backends<F, N, P>,
        arbiter: &mut BusArbiter<R, G>,
        mut now_ms: impl FnMut() -> u32,
        transport: &mut UsbTransport,
        rpc: &mut RpcLink<crate::peripherals::RpcUart>,
    ) where
        F: FsBackend,
        N: FsBackend,
        P: FsBackend,
        R: RequestPin,
        G: GrantPin,
    {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            return;
        };

        match cmd {
            "fscp" => {
                let (Some(src), Some(dst)) = (parts.next(), parts.next()) else {
                    transport.write_line("ERR usage: fscp <src> <dst> [-f]");
                    return;
                };
                let force = parts.next() == Some("-f");
                let guard = match arbiter.guard(BUS_TIMEOUT_MS, &mut now_ms, || {
                    cortex_m::asm::delay(1_000)
                }) {
                    Ok(g) => g,
                    Err(_) => {
                        transport.write_line("ERR timeout");
                        return;
                    }
                };
                let result = run_fscp(src, dst, force, backends, &mut self.copy_buf);
                drop(guard);
                match result {
                    Ok(report) => {
                        let mut msg: heapless::String<64> = heapless::String::new();
                        let _ = write!(
                            msg,
                            "OK {} {} {}",
                            report.backend.as_str(),
                            report.size,
                            report.capacity
                        );
                        transport.write_line(&msg);
                    }
                    Err(e) => write_err_line(transport, e),
                }
            }

            "rxbin" => {
                let (Some(name), Some(len_s)) = (parts.next(), parts.next()) else {
                    transport.write_line("ERR usage: rxbin <name> <len>");
                    return;
                };
                let Ok(total_size) = len_s.parse::<u32>() else {
                    transport.write_line("ERR bad-len");
                    return;
                };
                match self.receiver.begin(&mut backends.nand, name, total_size) {
                    Ok(ReceiverOutcome::Ready) => {
                        transport.write_line("READY");
                        self.mode = Mode::Receiving;
                    }
                    Ok(_) => unreachable!("begin only ever yields Ready"),
                    Err(_) => transport.write_line("ERR begin"),
                }
            }

            "selfupdate" => {
                let Some(name) = parts.next() else {
                    transport.write_line("ERR usage: selfupdate <name>");
                    return;
                };
                let guard = match arbiter.guard(BUS_TIMEOUT_MS, &mut now_ms, || {
                    cortex_m::asm::delay(1_000)
                }) {
                    Ok(g) => g,
                    Err(_) => {
                        transport.write_line("ERR timeout");
                        return;
                    }
                };
                let result = selfupdate::run(
                    &backends.nand,
                    name,
                    SELFUPDATE_FLASH_OFFSET,
                    SELFUPDATE_FLASH_CAPACITY,
                );
                drop(guard);
                // `run` reboots the board on success and never returns from
                // this call in that case; an `Err` here means it aborted
                // before the first sector erase.
                if let Err(e) = result {
                    write_err_line(transport, e);
                }
            }

            "rpc" => {
                let Some(name) = parts.next() else {
                    transport.write_line("ERR usage: rpc <name> [argv...]");
                    return;
                };
                let mut argv: heapless::Vec<i32, MAX_ARGV> = heapless::Vec::new();
                for tok in parts {
                    match tok.parse::<i32>() {
                        Ok(v) if argv.push(v).is_ok() => {}
                        _ => {
                            transport.write_line("ERR bad-argv");
                            return;
                        }
                    }
                }
                match rpc.call(name, &argv) {
                    Ok(v) => {
                        let mut msg: heapless::String<32> = heapless::String::new();
                        let _ = write!(msg, "OK {v}");
                        transport.write_line(&msg);
                    }
                    Err(_) => transport.write_line("ERR rpc"),
                }
            }

            "compile" | "putb64s" | "hash" | "termwidth" => {
                transport.write_line("ERR unsupported");
            }

            _ => transport.write_line("ERR unknown-command"),
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

fn write_err_line(transport: &mut UsbTransport, e: Error) {
    let mut msg: heapless::String<48> = heapless::String::new();
    let token = match e {
        Error::Protocol(p) => p.token(),
        Error::NotFound => "not-found",
        Error::InvalidArgument => "bad-arg",
        Error::OutOfSpace => "no-space",
        Error::AlreadyExists => "exists",
        Error::IoError => "io",
        Error::Timeout => "timeout",
    };
    let _ = write!(msg, "ERR {token}");
    transport.write_line(&msg);
}

fn run_fscp<F, N, P>(
    src: &str,
    dst: &str,
    force: bool,
    backends: &mut Backends<F, N, P>,
    buf: &mut [u8],
) -> Result<CopyReport, Error>
where
    F: FsBackend,
    N: FsBackend,
    P: FsBackend,
{
    let src_spec = parse_backend_spec(src)?;
    let dst_spec = parse_backend_spec(dst)?;

    use BackendId::*;
    match (src_spec.backend, dst_spec.backend) {
        (Flash, Flash) => copy_within(
            &mut backends.flash,
            &src_spec.path,
            &dst_spec.path,
            dst_spec.trailing_slash,
            force,
            buf,
        ),
        (Nand, Nand) => copy_within(
            &mut backends.nand,
            &src_spec.path,
            &dst_spec.path,
            dst_spec.trailing_slash,
            force,
            buf,
        ),
        (Psram, Psram) => copy_within(
            &mut backends.psram,
            &src_spec.path,
            &dst_spec.path,
            dst_spec.trailing_slash,
            force,
            buf,
        ),
        (Flash, Nand) => copy_across(
            &mut backends.flash,
            &src_spec.path,
            &mut backends.nand,
            &dst_spec.path,
            dst_spec.trailing_slash,
            force,
            buf,
            || {},
        ),
        (Flash, Psram) => copy_across(
            &mut backends.flash,
            &src_spec.path,
            &mut backends.psram,
            &dst_spec.path,
            dst_spec.trailing_slash,
            force,
            buf,
            || {},
        ),
        (Nand, Flash) => copy_across(
            &mut backends.nand,
            &src_spec.path,
            &mut backends.flash,
            &dst_spec.path,
            dst_spec.trailing_slash,
            force,
            buf,
            || {},
        ),
        (Nand, Psram) => copy_across(
            &mut backends.nand,
            &src_spec.path,
            &mut backends.psram,
            &dst_spec.path,
            dst_spec.trailing_slash,
            force,
            buf,
            || {},
        ),
        (Psram, Flash) => copy_across(
            &mut backends.psram,
            &src_spec.path,
            &mut backends.flash,
            &dst_spec.path,
            dst_spec.trailing_slash,
            force,
            buf,
            || {},
        ),
        (Psram, Nand) => copy_across(
            &mut backends.psram,
            &src_spec.path,
            &mut backends.nand,
            &dst_spec.path,
            dst_spec.trailing_slash,
            force,
            buf,
            || {},
        ),
    }
}

/// `copy_across`'s algorithm, specialized to a single mutable
/// backend handle: `copy_across` takes `&mut S` and `&mut D` as two
/// independent borrows, which a same-backend copy can't supply (both
/// would alias one field). The read phase completes and its borrow ends
/// before the write phase starts, so one `&mut B` used sequentially is
/// sufficient — no unsafe aliasing needed.
fn copy_within<B: FsBackend>(
    fs: &mut B,
    src_name: &str,
    dst_name: &str,
    dst_is_dir: bool,
    force: bool,
    buf: &mut [u8],
) -> Result<CopyReport, Error> {
    let resolved = if dst_is_dir { basename(src_name) } else { dst_name };
    let dst_name = normalize_name(resolved)?;

    let src_info = require_file_info(fs, src_name)?;
    if src_info.size as usize > buf.len() {
        return Err(Error::OutOfSpace);
    }

    let dst_exists = fs.exists(&dst_name);
    if dst_exists && !force {
        return Err(Error::AlreadyExists);
    }

    let mut read = 0u32;
    while read < src_info.size {
        let want = (src_info.size - read) as usize;
        let start = read as usize;
        let got = fs.read_file_range(src_name, read, &mut buf[start..start + want]);
        if got == 0 {
            return Err(Error::IoError);
        }
        read += got;
    }
    let data = &buf[..src_info.size as usize];

    let dst_align = fs.backend_id().params().erase_align;
    let reserve = src_info
        .capacity
        .max(FileSlot::capacity_for(src_info.size, dst_align))
        .max(dst_align);

    let ok = if !dst_exists {
        fs.create_file_slot(&dst_name, reserve, Some(data))
    } else {
        let dst_info = require_file_info(fs, &dst_name)?;
        if dst_info.capacity >= src_info.size {
            fs.write_file_in_place(&dst_name, data, false)
        } else {
            let mode = fs.native_replace_mode();
            fs.write_file(&dst_name, data, mode)
        }
    };
    if !ok {
        return Err(Error::IoError);
    }

    let final_info = require_file_info(fs, &dst_name)?;
    Ok(CopyReport {
        name: dst_name,
        backend: fs.backend_id(),
        size: final_info.size,
        capacity: final_info.capacity,
    })
}
