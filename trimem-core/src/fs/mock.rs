// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! An in-memory `FsBackend` for testing the facade, copy engine, and
//! receiver without real hardware.
//!
//! Grounded in `embedded-nand::test`'s RAM-backed mock device: a fixed-size
//! byte arena plus a small directory, both sized by const generics so the
//! mock stays `no_std` and allocator-free like the real backends.

use super::FsBackend;
use crate::backend::{BackendId, ReplaceMode};
use crate::slot::FileSlot;

const MAX_NAME: usize = 32;

struct Entry {
    name: heapless::String<MAX_NAME>,
    slot: FileSlot,
}

/// A byte-addressable (or erase-aligned, depending on construction) mock
/// backend. `CAP` is the total arena size in bytes; `MAX_FILES` bounds the
/// directory.
pub struct MemBackend<const CAP: usize, const MAX_FILES: usize> {
    id: BackendId,
    erase_align: u32,
    mounted: bool,
    next_free: u32,
    arena: [u8; CAP],
    files: heapless::Vec<Entry, MAX_FILES>,
}

impl<const CAP: usize, const MAX_FILES: usize> MemBackend<CAP, MAX_FILES> {
    /// Build a fresh, unmounted mock for `id`, using `id`'s default erase
    /// alignment.
    pub fn new(id: BackendId) -> Self {
        Self::with_erase_align(id, id.params().erase_align)
    }

    /// Build a fresh, unmounted mock with an explicit erase alignment
    /// (useful for exercising alignments other than the backend's default).
    pub fn with_erase_align(id: BackendId, erase_align: u32) -> Self {
        Self {
            id,
            erase_align,
            mounted: false,
            next_free: 0,
            arena: [0xFFu8; CAP],
            files: heapless::Vec::new(),
        }
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.files.iter().position(|e| e.name == name)
    }
}

impl<const CAP: usize, const MAX_FILES: usize> FsBackend for MemBackend<CAP, MAX_FILES> {
    fn backend_id(&self) -> BackendId {
        self.id
    }

    fn mount(&mut self, _auto_format: bool) -> bool {
        self.mounted = true;
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
        let Ok(name) = heapless::String::<MAX_NAME>::try_from(name) else {
            return false;
        };
        let data_len = data.map(|d| d.len() as u32).unwrap_or(0);
        let capacity = FileSlot::capacity_for(reserve.max(data_len), self.erase_align);
        let address = self.next_free;
        if address as usize + capacity as usize > CAP {
            return false;
        }
        if let Some(d) = data {
            self.arena[address as usize..address as usize + d.len()].copy_from_slice(d);
        }
        self.next_free += capacity;
        let slot = FileSlot {
            address,
            size: data_len,
            capacity,
        };
        // Length already checked above; this cannot fail.
        let _ = self.files.push(Entry { name, slot });
        true
    }

    fn write_file(&mut self, name: &str, data: &[u8], replace_mode: ReplaceMode) -> bool {
        let Some(idx) = self.find(name) else {
            return false;
        };
        let slot = self.files[idx].slot;
        let len = data.len() as u32;

        if len <= slot.capacity {
            self.arena[slot.address as usize..slot.address as usize + data.len()]
                .copy_from_slice(data);
            self.files[idx].slot.size = len;
            return true;
        }

        match replace_mode {
            ReplaceMode::InPlace => false,
            ReplaceMode::Relocate | ReplaceMode::EraseRewrite => {
                let new_cap = FileSlot::capacity_for(len, self.erase_align);
                let new_addr = self.next_free;
                if new_addr as usize + new_cap as usize > CAP {
                    return false;
                }
                self.arena[new_addr as usize..new_addr as usize + data.len()]
                    .copy_from_slice(data);
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
        let start = (slot.address + base) as usize;
        self.arena[start..start + data.len()].copy_from_slice(data);
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
        let start = (slot.address + offset) as usize;
        buf[..n as usize].copy_from_slice(&self.arena[start..start + n as usize]);
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
        self.arena = [0xFFu8; CAP];
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

    #[test]
    fn create_then_read_round_trips() {
        let mut fs: MemBackend<4096, 4> = MemBackend::new(BackendId::Psram);
        assert!(fs.mount(false));
        assert!(fs.create_file_slot("a", 0, Some(&[1, 2, 3])));
        let mut buf = [0u8; 3];
        assert_eq!(fs.read_file("a", &mut buf), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(fs.get_file_size("a"), Some(3));
    }

    #[test]
    fn create_over_existing_name_fails() {
        let mut fs: MemBackend<4096, 4> = MemBackend::new(BackendId::Flash);
        fs.mount(true);
        assert!(fs.create_file_slot("a", 4096, None));
        assert!(!fs.create_file_slot("a", 4096, None));
    }

    #[test]
    fn capacity_is_erase_aligned() {
        let mut fs: MemBackend<{ 1 << 20 }, 4> = MemBackend::new(BackendId::Flash);
        fs.mount(true);
        assert!(fs.create_file_slot("a", 1, None));
        let info = fs.get_file_info("a").unwrap();
        assert_eq!(info.capacity, 4096);
    }

    #[test]
    fn write_in_place_rejects_growth_beyond_capacity() {
        let mut fs: MemBackend<4096, 4> = MemBackend::new(BackendId::Flash);
        fs.mount(true);
        fs.create_file_slot("a", 1, None);
        let data = [0u8; 5000];
        assert!(!fs.write_file_in_place("a", &data, false));
    }

    #[test]
    fn write_file_relocates_when_growth_exceeds_capacity() {
        let mut fs: MemBackend<{ 1 << 20 }, 4> = MemBackend::new(BackendId::Flash);
        fs.mount(true);
        fs.create_file_slot("a", 1, Some(&[9u8; 10]));
        let big = [7u8; 5000];
        assert!(fs.write_file("a", &big, ReplaceMode::Relocate));
        assert_eq!(fs.get_file_size("a"), Some(5000));
        let mut buf = [0u8; 5000];
        assert_eq!(fs.read_file("a", &mut buf), 5000);
        assert!(buf.iter().all(|&b| b == 7));
    }

    #[test]
    fn read_past_eof_returns_zero() {
        let mut fs: MemBackend<4096, 4> = MemBackend::new(BackendId::Psram);
        fs.mount(false);
        fs.create_file_slot("a", 0, Some(&[1, 2, 3]));
        let mut buf = [0u8; 4];
        assert_eq!(fs.read_file_range("a", 3, &mut buf), 0);
        assert_eq!(fs.read_file_range("a", 10, &mut buf), 0);
    }

    #[test]
    fn delete_then_recreate_succeeds() {
        let mut fs: MemBackend<4096, 4> = MemBackend::new(BackendId::Psram);
        fs.mount(false);
        fs.create_file_slot("a", 0, Some(&[1]));
        assert!(fs.delete_file("a"));
        assert!(!fs.exists("a"));
        assert!(fs.create_file_slot("a", 0, Some(&[2, 3])));
        assert_eq!(fs.get_file_size("a"), Some(2));
    }
}
