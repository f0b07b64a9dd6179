// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Cross-backend copy engine.
//!
//! Resolves a source and destination file across two (possibly distinct)
//! `FsBackend` instances, reserves destination capacity, and chooses
//! in-place versus relocating writes the same way `crispy-bootloader`
//! chooses a flash write strategy around its erase-alignment boundary.
//!
//! No allocator is assumed: the caller supplies the whole-file scratch
//! buffer up front, sized for the largest file the system is expected to
//! move. Filling it is still done in chunks, with a cooperative yield
//! after each one, so a copy never blocks longer than one erase unit worth
//! of backend I/O without giving the caller a chance to service other work.

use crate::backend::BackendId;
use crate::error::Error;
use crate::fs::{require_file_info, FsBackend};
use crate::pathspec::{basename, normalize_name, MAX_NAME_LEN};
use crate::slot::FileSlot;

/// Outcome of a successful copy: the resolved destination name and its
/// final slot geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub name: heapless::String<MAX_NAME_LEN>,
    pub backend: BackendId,
    pub size: u32,
    pub capacity: u32,
}

/// Copy `src_name` from `src` to `dst`, writing under `dst_name` unless
/// `dst_is_dir` is set, in which case the source's basename is appended
/// instead (a destination spec ending in `/`).
///
/// `buf` must be at least as large as the source file; a source larger
/// than `buf` fails with `Error::OutOfSpace` rather than silently
/// truncating. `yield_hook` is invoked once per chunk read from the
/// source, giving the caller a cooperative suspension point.
pub fn copy_across<S, D>(
    src: &mut S,
    src_name: &str,
    dst: &mut D,
    dst_name: &str,
    dst_is_dir: bool,
    force: bool,
    buf: &mut [u8],
    mut yield_hook: impl FnMut(),
) -> Result<CopyReport, Error>
where
    S: FsBackend,
    D: FsBackend,
{
    let resolved_name = if dst_is_dir {
        basename(src_name)
    } else {
        dst_name
    };
    let dst_name = normalize_name(resolved_name)?;

    let src_info = require_file_info(src, src_name)?;
    if src_info.size as usize > buf.len() {
        return Err(Error::OutOfSpace);
    }

    let dst_exists = dst.exists(&dst_name);
    if dst_exists && !force {
        return Err(Error::AlreadyExists);
    }

    let chunk = dst.backend_id().params().erase_align.max(1);
    let mut read = 0u32;
    while read < src_info.size {
        let want = chunk.min(src_info.size - read) as usize;
        let start = read as usize;
        let got = src.read_file_range(src_name, read, &mut buf[start..start + want]);
        if got == 0 {
            return Err(Error::IoError);
        }
        read += got;
        yield_hook();
    }
    let data = &buf[..src_info.size as usize];

    let dst_align = dst.backend_id().params().erase_align;
    let reserve = src_info
        .capacity
        .max(FileSlot::capacity_for(src_info.size, dst_align))
        .max(dst_align);

    let ok = if !dst_exists {
        dst.create_file_slot(&dst_name, reserve, Some(data))
    } else {
        let dst_info = require_file_info(dst, &dst_name)?;
        if dst_info.capacity >= src_info.size {
            dst.write_file_in_place(&dst_name, data, false)
        } else {
            let mode = dst.native_replace_mode();
            dst.write_file(&dst_name, data, mode)
        }
    };
    if !ok {
        return Err(Error::IoError);
    }

    let final_info = require_file_info(dst, &dst_name)?;
    Ok(CopyReport {
        name: dst_name,
        backend: dst.backend_id(),
        size: final_info.size,
        capacity: final_info.capacity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ReplaceMode;
    use crate::fs::mock::MemBackend;

    #[test]
    fn copies_file_across_backends() {
        let mut src: MemBackend<8192, 4> = MemBackend::new(BackendId::Flash);
        let mut dst: MemBackend<8192, 4> = MemBackend::new(BackendId::Psram);
        src.mount(true);
        dst.mount(false);
        src.create_file_slot("a", 0, Some(&[1, 2, 3]));

        let mut buf = [0u8; 8192];
        let report = copy_across(&mut src, "a", &mut dst, "b", false, false, &mut buf, || {})
            .unwrap();

        assert_eq!(report.size, 3);
        assert_eq!(report.backend, BackendId::Psram);
        let mut out = [0u8; 3];
        assert_eq!(dst.read_file("b", &mut out), 3);
        assert_eq!(out, [1, 2, 3]);
    }

    #[test]
    fn directory_destination_uses_source_basename() {
        let mut src: MemBackend<8192, 4> = MemBackend::new(BackendId::Flash);
        let mut dst: MemBackend<8192, 4> = MemBackend::new(BackendId::Psram);
        src.mount(true);
        dst.mount(false);
        src.create_file_slot("nested/name.bin", 0, Some(&[9]));

        let report =
            copy_across(&mut src, "nested/name.bin", &mut dst, "dir/", true, false, &mut [0u8; 64], || {})
                .unwrap();
        assert_eq!(&report.name, "name.bin");
    }

    #[test]
    fn zero_size_source_creates_one_erase_unit_slot() {
        let mut src: MemBackend<8192, 4> = MemBackend::new(BackendId::Flash);
        let mut dst: MemBackend<8192, 4> = MemBackend::new(BackendId::Flash);
        src.mount(true);
        dst.mount(true);
        src.create_file_slot("empty", 0, Some(&[]));

        let report =
            copy_across(&mut src, "empty", &mut dst, "empty", false, false, &mut [0u8; 1], || {})
                .unwrap();
        assert_eq!(report.size, 0);
        assert_eq!(report.capacity, 4096);
    }

    #[test]
    fn existing_destination_without_force_fails() {
        let mut src: MemBackend<8192, 4> = MemBackend::new(BackendId::Flash);
        let mut dst: MemBackend<8192, 4> = MemBackend::new(BackendId::Flash);
        src.mount(true);
        dst.mount(true);
        src.create_file_slot("a", 0, Some(&[1]));
        dst.create_file_slot("a", 0, Some(&[2]));

        let err =
            copy_across(&mut src, "a", &mut dst, "a", false, false, &mut [0u8; 64], || {})
                .unwrap_err();
        assert_eq!(err, Error::AlreadyExists);
    }

    #[test]
    fn existing_destination_with_force_overwrites_in_place() {
        let mut src: MemBackend<8192, 4> = MemBackend::new(BackendId::Flash);
        let mut dst: MemBackend<8192, 4> = MemBackend::new(BackendId::Flash);
        src.mount(true);
        dst.mount(true);
        src.create_file_slot("a", 0, Some(&[1, 2, 3, 4]));
        dst.create_file_slot("a", 4096, Some(&[9, 9]));

        let report =
            copy_across(&mut src, "a", &mut dst, "a", false, true, &mut [0u8; 4096], || {})
                .unwrap();
        assert_eq!(report.size, 4);
        assert_eq!(report.capacity, 4096);
        let mut out = [0u8; 4];
        assert_eq!(dst.read_file("a", &mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn source_larger_than_buffer_fails_out_of_space() {
        let mut src: MemBackend<8192, 4> = MemBackend::new(BackendId::Flash);
        let mut dst: MemBackend<8192, 4> = MemBackend::new(BackendId::Flash);
        src.mount(true);
        dst.mount(true);
        src.create_file_slot("a", 0, Some(&[0u8; 10]));

        let err = copy_across(&mut src, "a", &mut dst, "a", false, false, &mut [0u8; 4], || {})
            .unwrap_err();
        assert_eq!(err, Error::OutOfSpace);
    }

    #[test]
    fn relocates_when_existing_capacity_is_insufficient() {
        let mut src: MemBackend<{ 1 << 20 }, 4> = MemBackend::new(BackendId::Flash);
        let mut dst: MemBackend<{ 1 << 20 }, 4> = MemBackend::new(BackendId::Flash);
        src.mount(true);
        dst.mount(true);
        src.create_file_slot("a", 0, Some(&[7u8; 5000]));
        dst.create_file_slot("a", 1, Some(&[1]));

        assert_eq!(dst.native_replace_mode(), ReplaceMode::Relocate);
        let report = copy_across(
            &mut src,
            "a",
            &mut dst,
            "a",
            false,
            true,
            &mut [0u8; 5000],
            || {},
        )
        .unwrap();
        assert_eq!(report.size, 5000);
    }
}
