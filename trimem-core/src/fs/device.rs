// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! A real-hardware `FsBackend` built on top of a raw block-device trait.
//!
//! `MemBackend` proved the directory/slot bookkeeping against a byte arena;
//! `DeviceBackend` is the same bookkeeping against anything implementing
//! `RawDevice` — internal flash via ROM routines, an external NAND chip, or
//! a byte-addressable PSRAM chip all satisfy it with very different bodies.
//! Directory format is backend-specific and out of scope for this facade
//! (the directory here lives in RAM only, rebuilt at each `mount`, same as
//! the original firmware's unstated behavior around power loss); only the
//! data region is read from and written to the real device.

use super::FsBackend;
use crate::backend::{BackendId, ReplaceMode};
use crate::slot::FileSlot;
use core::cell::RefCell;

const MAX_NAME: usize = 32;

/// The operations a concrete storage chip must provide. `erase` and
/// `program` are separate because NOR/NAND require an erase before a
/// program can set bits; a byte-addressable device (PSRAM) can make both a
/// no-op/direct-write and still satisfy the trait.
pub trait RawDevice {
    /// Total addressable size in bytes.
    fn capacity_bytes(&self) -> u32;

    /// The device's native erase unit; `1` for byte-addressable devices.
    fn erase_align(&self) -> u32;

    /// Read `buf.len()` bytes starting at `addr`.
    fn read(&mut self, addr: u32, buf: &mut [u8]);

    /// Erase one erase-unit-aligned region. No-op (returns `true`) on
    /// byte-addressable devices.
    fn erase(&mut self, addr: u32, len: u32) -> bool;

    /// Program `data` at `addr`. The region must already be erased on
    /// devices where `erase_align() > 1`.
    fn program(&mut self, addr: u32, data: &[u8]) -> bool;
}

struct Entry {
    name: heapless::String<MAX_NAME>,
    slot: FileSlot,
}

/// An `FsBackend` backed by a real `RawDevice`. `MAX_FILES` bounds the
/// in-RAM directory the same way it bounds `MemBackend`'s.
pub struct DeviceBackend<D: RawDevice, const MAX_FILES: usize> {
    id: BackendId,
    // `RefCell`, not a plain field: `read_file_range` takes `&self` per the
    // `FsBackend` contract, but a real device read is naturally `&mut self`
    // (an SPI transaction, a ROM call). The facade is single-threaded
    // cooperative, so a borrow can never actually conflict; this makes
    // that safe without `unsafe`.
    device: RefCell<D>,
    mounted: bool,
    next_free: u32,
    files: heapless::Vec<Entry, MAX_FILES>,
}

impl<D: RawDevice, const MAX_FILES: usize> DeviceBackend<D, MAX_FILES> {
    pub fn new(id: BackendId, device: D) -> Self {
        Self {
            id,
            device: RefCell::new(device),
            mounted: false,
            next_free: 0,
            files: heapless::Vec::new(),
        }
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.files.iter().position(|e| e.name == name)
    }

    /// Erase every erase-unit covering `[addr, addr+len)`.
    fn erase_covering(&mut self, addr: u32, len: u32) -> bool {
        let align = self.device.get_mut().erase_align();
        if align <= 1 {
            return true;
        }
        let mut start = addr - (addr % align);
        let end = addr + len;
        while start < end {
            if !self.device.get_mut().erase(start, align) {
                return false;
            }
            start += align;
        }
        true
    }
}

impl<D: RawDevice, const MAX_FILES: usize> FsBackend for DeviceBackend<D, MAX_FILES> {
    fn backend_id(&self) -> BackendId {
        self.id
    }

    fn mount(&mut self, auto_format: bool) -> bool {
        if !self.mounted {
            self.files.clear();
            self.next_free = 0;
        }
        self.mounted = true;
        if auto_format && self.id.params().requires_auto_format_on_empty_mount {
            // The directory is already empty on first mount; auto-format
            // here only matters for backends that persist a real directory,
            // which this facade does not attempt (see module docs).
        }
        true
    }

    fn exists(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn get_file_info(&self, name: &str) -> Option<FileSlot> {
        self.find(name).map(|i| self.files[i].slot)
    }

    fn create_file_slot(&mut self, name: &str, reserve: u32, data: Option<&[u8]>) -> bool {
        if self.exists(name) || self.files.len() == MAX_FILES {
            return false;
        }
        let Ok(hname) = heapless::String::<MAX_NAME>::try_from(name) else {
            return false;
        };
        let data_len = data.map(|d| d.len() as u32).unwrap_or(0);
        let align = self.device.get_mut().erase_align();
        let capacity = FileSlot::capacity_for(reserve.max(data_len), align);
        let address = self.next_free;
        if address as u64 + capacity as u64 > self.device.get_mut().capacity_bytes() as u64 {
            return false;
        }
        if !self.erase_covering(address, capacity) {
            return false;
        }
        if let Some(d) = data {
            if !d.is_empty() && !self.device.get_mut().program(address, d) {
                return false;
            }
        }
        self.next_free += capacity;
        let slot = FileSlot {
            address,
            size: data_len,
            capacity,
        };
        let _ = self.files.push(Entry { name: hname, slot });
        true
    }

    fn write_file(&mut self, name: &str, data: &[u8], replace_mode: ReplaceMode) -> bool {
        let Some(idx) = self.find(name) else {
            return false;
        };
        let slot = self.files[idx].slot;
        let len = data.len() as u32;

        if len <= slot.capacity {
            if !self.erase_covering(slot.address, slot.capacity) {
                return false;
            }
            if !data.is_empty() && !self.device.get_mut().program(slot.address, data) {
                return false;
            }
            self.files[idx].slot.size = len;
            return true;
        }

        match replace_mode {
            ReplaceMode::InPlace => false,
            ReplaceMode::Relocate | ReplaceMode::EraseRewrite => {
                let new_cap = FileSlot::capacity_for(len, self.device.get_mut().erase_align());
                let new_addr = self.next_free;
                if new_addr as u64 + new_cap as u64 > self.device.get_mut().capacity_bytes() as u64 {
                    return false;
                }
                if !self.erase_covering(new_addr, new_cap) {
                    return false;
                }
                if !data.is_empty() && !self.device.get_mut().program(new_addr, data) {
                    return false;
                }
                self.next_free += new_cap;
                self.files[idx].slot = FileSlot {
                    address: new_addr,
                    size: len,
                    capacity: new_cap,
                };
                true
            }
        }
    }

    fn write_file_in_place(&mut self, name: &str, data: &[u8], append: bool) -> bool {
        let Some(idx) = self.find(name) else {
            return false;
        };
        let slot = self.files[idx].slot;
        let base = if append { slot.size } else { 0 };
        let needed = base + data.len() as u32;
        if needed > slot.capacity {
            return false;
        }
        // In-place rewrites (offset 0, non-append) on erase-granular media
        // would clobber neighboring bytes already written this session, so
        // only erase when this is the first write into the slot.
        let align = self.device.get_mut().erase_align();
        if !append && align > 1 && !self.erase_covering(slot.address, slot.capacity) {
            return false;
        }
        if !data.is_empty() && !self.device.get_mut().program(slot.address + base, data) {
            return false;
        }
        self.files[idx].slot.size = needed;
        true
    }

    fn read_file_range(&self, name: &str, offset: u32, buf: &mut [u8]) -> u32 {
        let Some(idx) = self.find(name) else {
            return 0;
        };
        let slot = self.files[idx].slot;
        if offset >= slot.size {
            return 0;
        }
        let avail = slot.size - offset;
        let n = avail.min(buf.len() as u32);
        self.device
            .borrow_mut()
            .read(slot.address + offset, &mut buf[..n as usize]);
        n
    }

    fn delete_file(&mut self, name: &str) -> bool {
        match self.find(name) {
            Some(idx) => {
                self.files.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    fn format(&mut self) -> bool {
        self.files.clear();
        self.next_free = 0;
        true
    }

    fn native_replace_mode(&self) -> ReplaceMode {
        match self.id {
            BackendId::Psram => ReplaceMode::InPlace,
            BackendId::Flash | BackendId::Nand => ReplaceMode::Relocate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockDevice {
        erase_align: u32,
        bytes: [u8; 1 << 16],
    }

    impl MockDevice {
        fn new(erase_align: u32) -> Self {
            Self {
                erase_align,
                bytes: [0xFFu8; 1 << 16],
            }
        }
    }

    impl RawDevice for MockDevice {
        fn capacity_bytes(&self) -> u32 {
            self.bytes.len() as u32
        }

        fn erase_align(&self) -> u32 {
            self.erase_align
        }

        fn read(&mut self, addr: u32, buf: &mut [u8]) {
            buf.copy_from_slice(&self.bytes[addr as usize..addr as usize + buf.len()]);
        }

        fn erase(&mut self, addr: u32, len: u32) -> bool {
            self.bytes[addr as usize..addr as usize + len as usize].fill(0xFF);
            true
        }

        fn program(&mut self, addr: u32, data: &[u8]) -> bool {
            self.bytes[addr as usize..addr as usize + data.len()].copy_from_slice(data);
            true
        }
    }

    #[test]
    fn create_then_read_round_trips_through_a_real_device() {
        let mut fs: DeviceBackend<MockDevice, 4> =
            DeviceBackend::new(BackendId::Flash, MockDevice::new(4096));
        fs.mount(true);
        assert!(fs.create_file_slot("a", 0, Some(&[1, 2, 3])));
        let mut buf = [0u8; 3];
        assert_eq!(fs.read_file("a", &mut buf), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(fs.get_file_info("a").unwrap().capacity, 4096);
    }

    #[test]
    fn byte_addressable_device_needs_no_erase_alignment() {
        let mut fs: DeviceBackend<MockDevice, 4> =
            DeviceBackend::new(BackendId::Psram, MockDevice::new(1));
        fs.mount(false);
        assert!(fs.create_file_slot("a", 0, Some(&[9, 9, 9])));
        assert_eq!(fs.get_file_info("a").unwrap().capacity, 3);
    }

    #[test]
    fn write_file_relocates_on_a_real_device_when_capacity_is_exceeded() {
        let mut fs: DeviceBackend<MockDevice, 4> =
            DeviceBackend::new(BackendId::Flash, MockDevice::new(4096));
        fs.mount(true);
        fs.create_file_slot("a", 1, Some(&[1u8; 10]));
        let big = [7u8; 5000];
        assert!(fs.write_file("a", &big, ReplaceMode::Relocate));
        assert_eq!(fs.get_file_size("a"), Some(5000));
        let mut out = [0u8; 5000];
        assert_eq!(fs.read_file("a", &mut out), 5000);
        assert!(out.iter().all(|&b| b == 7));
    }

    #[test]
    fn in_place_append_does_not_re_erase_earlier_bytes() {
        let mut fs: DeviceBackend<MockDevice, 4> =
            DeviceBackend::new(BackendId::Nand, MockDevice::new(2048));
        fs.mount(true);
        fs.create_file_slot("a", 4096, None);
        assert!(fs.write_file_in_place("a", &[1, 2, 3], false));
        assert!(fs.write_file_in_place("a", &[4, 5, 6], true));
        let mut out = [0u8; 6];
        assert_eq!(fs.read_file("a", &mut out), 6);
        assert_eq!(out, [1, 2, 3, 4, 5, 6]);
    }
}
