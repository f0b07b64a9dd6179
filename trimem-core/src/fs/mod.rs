// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Uniform filesystem facade over the three storage backends.
//!
//! `FsBackend` is the operation contract every backend implements.
//! `Filesystem` is a closed tagged union: a runtime-selected backend with
//! compile-time-exhaustive dispatch, instead of a function-pointer vtable.

#[cfg(feature = "embedded")]
pub mod device;
pub mod mock;

use crate::backend::{BackendId, ReplaceMode};
use crate::error::Error;
use crate::slot::FileSlot;

/// The operation contract a storage backend presents to the rest of the
/// system. Every method here is infallible-signature on purpose — failures
/// are reported through the return value (`bool`, `Option`, or a byte
/// count); no panics cross the core/collaborator boundary.
pub trait FsBackend {
    /// This backend's identity, for parameter lookup and spec-string round-trips.
    fn backend_id(&self) -> BackendId;

    /// Idempotent. On backends where auto-format-on-empty-mount applies,
    /// `auto_format = true` formats an empty volume. PSRAM ignores the flag.
    fn mount(&mut self, auto_format: bool) -> bool;

    /// Pure lookup; no allocation.
    fn exists(&self, name: &str) -> bool;

    /// `(address, size, capacity)` for a stored file, or `None` if absent.
    fn get_file_info(&self, name: &str) -> Option<FileSlot>;

    /// Logical size of a stored file, or `None` if absent.
    fn get_file_size(&self, name: &str) -> Option<u32> {
        self.get_file_info(name).map(|s| s.size)
    }

    /// Allocate a fresh slot with `capacity = round_up(max(reserve,
    /// erase_align, data_len), erase_align)`, optionally writing initial
    /// bytes. Fails if `name` already exists or space is insufficient.
    fn create_file_slot(&mut self, name: &str, reserve: u32, data: Option<&[u8]>) -> bool;

    /// Write `data` to `name`, possibly relocating. On success the file's
    /// `size` equals `data.len()`; `capacity` may grow but never shrinks
    /// below one erase unit.
    fn write_file(&mut self, name: &str, data: &[u8], replace_mode: ReplaceMode) -> bool;

    /// Write `data` without relocating. Requires `data.len() <= capacity`
    /// (or `cur_size + data.len() <= capacity` when appending). Returns
    /// `false` if it would need to relocate.
    fn write_file_in_place(&mut self, name: &str, data: &[u8], append: bool) -> bool;

    /// Read up to `buf.len()` bytes from the start of `name`. Returns the
    /// number of bytes actually read (`<= min(size, buf.len())`).
    fn read_file(&self, name: &str, buf: &mut [u8]) -> u32 {
        self.read_file_range(name, 0, buf)
    }

    /// Read up to `buf.len()` bytes starting at `offset`. Returns the
    /// number of bytes actually read; zero past EOF.
    fn read_file_range(&self, name: &str, offset: u32, buf: &mut [u8]) -> u32;

    /// Remove a stored file, freeing its slot for reuse. Required to make
    /// `WipeAll`-style tooling expressible.
    fn delete_file(&mut self, name: &str) -> bool;

    /// Reformat the backend's directory, discarding every stored file.
    fn format(&mut self) -> bool;

    /// The replace mode this backend falls back to when the copy engine
    /// (§4.2 step 8) needs one and the caller didn't pick.
    fn native_replace_mode(&self) -> ReplaceMode {
        ReplaceMode::Relocate
    }
}

/// A runtime-selected backend, exhaustively matchable.
pub enum Filesystem<F, N, P> {
    Flash(F),
    Nand(N),
    Psram(P),
}

impl<F: FsBackend, N: FsBackend, P: FsBackend> FsBackend for Filesystem<F, N, P> {
    fn backend_id(&self) -> BackendId {
        match self {
            Filesystem::Flash(b) => b.backend_id(),
            Filesystem::Nand(b) => b.backend_id(),
            Filesystem::Psram(b) => b.backend_id(),
        }
    }

    fn mount(&mut self, auto_format: bool) -> bool {
        match self {
            Filesystem::Flash(b) => b.mount(auto_format),
            Filesystem::Nand(b) => b.mount(auto_format),
            Filesystem::Psram(b) => b.mount(auto_format),
        }
    }

    fn exists(&self, name: &str) -> bool {
        match self {
            Filesystem::Flash(b) => b.exists(name),
            Filesystem::Nand(b) => b.exists(name),
            Filesystem::Psram(b) => b.exists(name),
        }
    }

    fn get_file_info(&self, name: &str) -> Option<FileSlot> {
        match self {
            Filesystem::Flash(b) => b.get_file_info(name),
            Filesystem::Nand(b) => b.get_file_info(name),
            Filesystem::Psram(b) => b.get_file_info(name),
        }
    }

    fn create_file_slot(&mut self, name: &str, reserve: u32, data: Option<&[u8]>) -> bool {
        match self {
            Filesystem::Flash(b) => b.create_file_slot(name, reserve, data),
            Filesystem::Nand(b) => b.create_file_slot(name, reserve, data),
            Filesystem::Psram(b) => b.create_file_slot(name, reserve, data),
        }
    }

    fn write_file(&mut self, name: &str, data: &[u8], replace_mode: ReplaceMode) -> bool {
        match self {
            Filesystem::Flash(b) => b.write_file(name, data, replace_mode),
            Filesystem::Nand(b) => b.write_file(name, data, replace_mode),
            Filesystem::Psram(b) => b.write_file(name, data, replace_mode),
        }
    }

    fn write_file_in_place(&mut self, name: &str, data: &[u8], append: bool) -> bool {
        match self {
            Filesystem::Flash(b) => b.write_file_in_place(name, data, append),
            Filesystem::Nand(b) => b.write_file_in_place(name, data, append),
            Filesystem::Psram(b) => b.write_file_in_place(name, data, append),
        }
    }

    fn read_file_range(&self, name: &str, offset: u32, buf: &mut [u8]) -> u32 {
        match self {
            Filesystem::Flash(b) => b.read_file_range(name, offset, buf),
            Filesystem::Nand(b) => b.read_file_range(name, offset, buf),
            Filesystem::Psram(b) => b.read_file_range(name, offset, buf),
        }
    }

    fn delete_file(&mut self, name: &str) -> bool {
        match self {
            Filesystem::Flash(b) => b.delete_file(name),
            Filesystem::Nand(b) => b.delete_file(name),
            Filesystem::Psram(b) => b.delete_file(name),
        }
    }

    fn format(&mut self) -> bool {
        match self {
            Filesystem::Flash(b) => b.format(),
            Filesystem::Nand(b) => b.format(),
            Filesystem::Psram(b) => b.format(),
        }
    }

    fn native_replace_mode(&self) -> ReplaceMode {
        match self {
            Filesystem::Flash(b) => b.native_replace_mode(),
            Filesystem::Nand(b) => b.native_replace_mode(),
            Filesystem::Psram(b) => b.native_replace_mode(),
        }
    }
}

/// Resolve `name` against `get_file_info`, converting absence into `Error::NotFound`.
pub fn require_file_info<B: FsBackend + ?Sized>(fs: &B, name: &str) -> Result<FileSlot, Error> {
    fs.get_file_info(name).ok_or(Error::NotFound)
}
