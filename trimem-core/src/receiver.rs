// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Framed binary receiver: a magic-tagged, offset-sequenced, CRC-validated
//! stream terminated by a commit frame, written into a backend file.
//!
//! Frame layout, 16-byte little-endian header:
//! `MAGIC(4) offset(4) length(4) crc32(4)` followed by `length` payload
//! bytes. A commit frame carries `offset = 0xFFFF_FFFF`, `length = 0`,
//! `crc = 0`. CRC32 uses the `crc` crate's `CRC_32_ISO_HDLC` table, the
//! same instance `crispy-bootloader::flash` already reaches for, so no
//! table is hand-rolled.

use crate::error::{Error, ProtocolError};
use crate::fs::FsBackend;
use crate::pathspec::{normalize_name, MAX_NAME_LEN};

pub const MAGIC: [u8; 4] = [0xA5, 0x5A, 0x4B, 0x52];
pub const HEADER_LEN: usize = 16;
pub const DEFAULT_MAX_FRAME: usize = 32 * 1024;

const CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Idle,
    AwaitHeader,
    AwaitPayload,
    Terminal,
}

struct FrameHeader {
    offset: u32,
    length: u32,
    crc: u32,
}

impl FrameHeader {
    fn is_commit(&self) -> bool {
        self.offset == 0xFFFF_FFFF && self.length == 0
    }

    fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self, ProtocolError> {
        if bytes[0..4] != MAGIC[..] {
            return Err(ProtocolError::BadMagic);
        }
        let offset = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let length = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let crc = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        Ok(FrameHeader {
            offset,
            length,
            crc,
        })
    }
}

/// A non-blocking byte source. `read` returns the number of bytes actually
/// available, which may be zero without that meaning end-of-stream.
pub trait ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> usize;
}

/// Final outcome of a session, reported on the wire as `OK` or `ERR <token>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverOutcome {
    Ready,
    Ok,
    Err(ProtocolError),
}

/// Receiver session state for one framed upload, bounded by `MAX_FRAME`.
pub struct ReceiverSession<const MAX_FRAME: usize> {
    state: ReceiverState,
    name: heapless::String<MAX_NAME_LEN>,
    total_size: u32,
    received: u32,
    base_addr: u32,
    capacity: u32,
    header_buf: [u8; HEADER_LEN],
    header_have: usize,
    payload_buf: [u8; MAX_FRAME],
    payload_have: usize,
    pending_offset: u32,
    pending_length: u32,
    pending_crc: u32,
}

impl<const MAX_FRAME: usize> ReceiverSession<MAX_FRAME> {
    pub fn new() -> Self {
        Self {
            state: ReceiverState::Idle,
            name: heapless::String::new(),
            total_size: 0,
            received: 0,
            base_addr: 0,
            capacity: 0,
            header_buf: [0; HEADER_LEN],
            header_have: 0,
            payload_buf: [0; MAX_FRAME],
            payload_have: 0,
            pending_offset: 0,
            pending_length: 0,
            pending_crc: 0,
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    /// Start a session against `name`/`total_size` on `fs`, creating the
    /// destination slot up front so the backend's reserved capacity is
    /// known before the first data frame arrives. Returns the `READY`
    /// outcome on success.
    pub fn begin(
        &mut self,
        fs: &mut impl FsBackend,
        name: &str,
        total_size: u32,
    ) -> Result<ReceiverOutcome, Error> {
        let name = normalize_name(name)?;
        if !fs.exists(&name) {
            let align = fs.backend_id().params().erase_align;
            let reserve = crate::slot::FileSlot::capacity_for(total_size, align);
            if !fs.create_file_slot(&name, reserve, None) {
                return Err(Error::OutOfSpace);
            }
        }
        let slot = crate::fs::require_file_info(fs, &name)?;

        self.state = ReceiverState::AwaitHeader;
        self.name = name;
        self.total_size = total_size;
        self.received = 0;
        self.base_addr = slot.address;
        self.capacity = slot.capacity;
        self.header_have = 0;
        self.payload_have = 0;
        Ok(ReceiverOutcome::Ready)
    }

    /// Drain whatever bytes `src` currently has available, advancing the
    /// state machine by as many frames as the input permits. Never blocks:
    /// a source with nothing ready simply returns `None` with the session
    /// left mid-frame.
    pub fn pump(
        &mut self,
        src: &mut impl ByteSource,
        fs: &mut impl FsBackend,
    ) -> Option<ReceiverOutcome> {
        loop {
            match self.state {
                ReceiverState::Idle | ReceiverState::Terminal => return None,
                ReceiverState::AwaitHeader => {
                    let want = HEADER_LEN - self.header_have;
                    let got = src.read(&mut self.header_buf[self.header_have..HEADER_LEN]);
                    if got == 0 {
                        return None;
                    }
                    self.header_have += got;
                    if self.header_have < HEADER_LEN {
                        if got < want {
                            return None;
                        }
                        continue;
                    }

                    let header = match FrameHeader::parse(&self.header_buf) {
                        Ok(h) => h,
                        Err(e) => return Some(self.fail(e)),
                    };
                    self.header_have = 0;

                    if header.is_commit() {
                        return Some(self.commit(fs, header));
                    }

                    if header.length == 0 || header.length as usize > MAX_FRAME {
                        return Some(self.fail(ProtocolError::BadLen));
                    }
                    if header.offset != self.received {
                        return Some(self.fail(ProtocolError::BadOffset));
                    }
                    if self.capacity > 0 && header.offset + header.length > self.capacity {
                        return Some(self.fail(ProtocolError::Cap));
                    }

                    self.payload_have = 0;
                    self.pending_offset = header.offset;
                    self.pending_length = header.length;
                    self.pending_crc = header.crc;
                    self.state = ReceiverState::AwaitPayload;
                }
                ReceiverState::AwaitPayload => {
                    let length = self.pending_length as usize;
                    let got = src.read(&mut self.payload_buf[self.payload_have..length]);
                    if got == 0 {
                        return None;
                    }
                    self.payload_have += got;
                    if self.payload_have < length {
                        continue;
                    }

                    let offset = self.pending_offset;
                    let crc = self.pending_crc;
                    let payload = &self.payload_buf[..length];
                    let digest = CRC.checksum(payload);
                    if digest != crc {
                        return Some(self.fail(ProtocolError::Crc));
                    }

                    let ok = fs.write_file_in_place(&self.name, payload, offset > 0);
                    if !ok {
                        return Some(self.fail(ProtocolError::Write));
                    }
                    self.received += length as u32;
                    self.state = ReceiverState::AwaitHeader;
                }
            }
        }
    }

    fn commit(&mut self, fs: &mut impl FsBackend, _header: FrameHeader) -> ReceiverOutcome {
        if self.received != self.total_size {
            return self.fail(ProtocolError::SizeMismatch);
        }
        if fs.get_file_size(&self.name) != Some(self.total_size) {
            return self.fail(ProtocolError::Finalize);
        }
        self.state = ReceiverState::Terminal;
        ReceiverOutcome::Ok
    }

    fn fail(&mut self, e: ProtocolError) -> ReceiverOutcome {
        self.state = ReceiverState::Terminal;
        ReceiverOutcome::Err(e)
    }

    /// Return the session to `Idle`, regardless of how it terminated.
    pub fn end(&mut self) {
        self.state = ReceiverState::Idle;
        self.header_have = 0;
        self.payload_have = 0;
    }
}

impl<const MAX_FRAME: usize> Default for ReceiverSession<MAX_FRAME> {
    fn default() -> Self {
        Self::new()
    }
}

/// A `ByteSource` over an in-memory slice, for host-side tests.
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> ByteSource for SliceSource<'a> {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }
}

/// Build a data frame's wire bytes (header + payload), for the host tool and
/// for tests. Returns `None` if `payload` exceeds the frame's capacity.
pub fn encode_data_frame(
    offset: u32,
    payload: &[u8],
) -> Option<heapless::Vec<u8, { DEFAULT_MAX_FRAME + HEADER_LEN }>> {
    let mut out = heapless::Vec::new();
    let crc = CRC.checksum(payload);
    out.extend_from_slice(&MAGIC).ok()?;
    out.extend_from_slice(&offset.to_le_bytes()).ok()?;
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes()).ok()?;
    out.extend_from_slice(&crc.to_le_bytes()).ok()?;
    out.extend_from_slice(payload).ok()?;
    Some(out)
}

/// Build the commit frame's wire bytes.
pub fn encode_commit_frame() -> [u8; HEADER_LEN] {
    let mut out = [0u8; HEADER_LEN];
    out[0..4].copy_from_slice(&MAGIC);
    out[4..8].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendId;
    use crate::fs::mock::MemBackend;

    fn new_mount() -> MemBackend<{ 1 << 20 }, 4> {
        let mut fs: MemBackend<{ 1 << 20 }, 4> = MemBackend::new(BackendId::Flash);
        fs.mount(true);
        fs
    }

    #[test]
    fn full_upload_round_trips_through_commit() {
        let mut fs = new_mount();
        let mut session: ReceiverSession<DEFAULT_MAX_FRAME> = ReceiverSession::new();
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(session.begin(&mut fs, "f", data.len() as u32).unwrap(), ReceiverOutcome::Ready);

        let mut wire = heapless::Vec::<u8, 4096>::new();
        wire.extend_from_slice(&encode_data_frame(0, &data).unwrap()).unwrap();
        wire.extend_from_slice(&encode_commit_frame()).unwrap();

        let mut src = SliceSource::new(&wire);
        let mut outcome = None;
        while outcome.is_none() {
            outcome = session.pump(&mut src, &mut fs);
        }
        assert_eq!(outcome, Some(ReceiverOutcome::Ok));
        assert_eq!(session.received(), 8);

        let mut out = [0u8; 8];
        assert_eq!(fs.read_file("f", &mut out), 8);
        assert_eq!(out, data);
    }

    #[test]
    fn bad_crc_ends_session_without_changing_file_size() {
        let mut fs = new_mount();
        let mut session: ReceiverSession<DEFAULT_MAX_FRAME> = ReceiverSession::new();
        session.begin(&mut fs, "f", 4).unwrap();

        let mut frame = encode_data_frame(0, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF; // corrupt the trailing CRC byte

        let mut src = SliceSource::new(&frame);
        let outcome = loop {
            if let Some(o) = session.pump(&mut src, &mut fs) {
                break o;
            }
        };
        assert_eq!(outcome, ReceiverOutcome::Err(ProtocolError::Crc));
        assert_eq!(fs.get_file_size("f"), Some(0));
    }

    #[test]
    fn out_of_order_offset_is_rejected() {
        let mut fs = new_mount();
        let mut session: ReceiverSession<DEFAULT_MAX_FRAME> = ReceiverSession::new();
        session.begin(&mut fs, "f", 8).unwrap();

        let frame = encode_data_frame(4, &[1, 2, 3, 4]).unwrap();
        let mut src = SliceSource::new(&frame);
        let outcome = loop {
            if let Some(o) = session.pump(&mut src, &mut fs) {
                break o;
            }
        };
        assert_eq!(outcome, ReceiverOutcome::Err(ProtocolError::BadOffset));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut fs = new_mount();
        let mut session: ReceiverSession<DEFAULT_MAX_FRAME> = ReceiverSession::new();
        session.begin(&mut fs, "f", 0).unwrap();

        let mut frame = encode_commit_frame();
        frame[0] = 0;
        let mut src = SliceSource::new(&frame);
        let outcome = loop {
            if let Some(o) = session.pump(&mut src, &mut fs) {
                break o;
            }
        };
        assert_eq!(outcome, ReceiverOutcome::Err(ProtocolError::BadMagic));
    }

    #[test]
    fn commit_with_size_mismatch_is_rejected() {
        let mut fs = new_mount();
        let mut session: ReceiverSession<DEFAULT_MAX_FRAME> = ReceiverSession::new();
        session.begin(&mut fs, "f", 99).unwrap();

        let frame = encode_commit_frame();
        let mut src = SliceSource::new(&frame);
        let outcome = loop {
            if let Some(o) = session.pump(&mut src, &mut fs) {
                break o;
            }
        };
        assert_eq!(outcome, ReceiverOutcome::Err(ProtocolError::SizeMismatch));
    }

    #[test]
    fn large_upload_splits_into_multiple_frames() {
        let mut fs = new_mount();
        let mut session: ReceiverSession<DEFAULT_MAX_FRAME> = ReceiverSession::new();
        let total = 70_000u32;
        session.begin(&mut fs, "big", total).unwrap();

        let chunks = [32768usize, 32768, 4464];
        let mut offset = 0u32;
        let mut wire: heapless::Vec<u8, 80_000> = heapless::Vec::new();
        for &len in &chunks {
            let payload = vec_of(len, (offset % 256) as u8);
            let frame = encode_data_frame(offset, &payload).unwrap();
            wire.extend_from_slice(&frame).unwrap();
            offset += len as u32;
        }
        wire.extend_from_slice(&encode_commit_frame()).unwrap();

        let mut src = SliceSource::new(&wire);
        let outcome = loop {
            if let Some(o) = session.pump(&mut src, &mut fs) {
                break o;
            }
        };
        assert_eq!(outcome, ReceiverOutcome::Ok);
        assert_eq!(session.received(), total);
    }

    fn vec_of(len: usize, fill: u8) -> heapless::Vec<u8, 32768> {
        let mut v = heapless::Vec::new();
        for _ in 0..len {
            v.push(fill).unwrap();
        }
        v
    }
}
