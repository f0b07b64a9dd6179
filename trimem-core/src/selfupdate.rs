// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Internal-flash self-update loop: sector-wise erase+program from a
//! stored file, executed from RAM with interrupts disabled, followed by a
//! watchdog-triggered reboot.
//!
//! ROM-routine sequencing and the RAM-resident/IRQ-off discipline are
//! carried over from `crispy-bootloader::flash` verbatim:
//! `connect_internal_flash` -> `flash_exit_xip` -> erase/program ->
//! `flash_flush_cache` -> `flash_enter_cmd_xip`, with interrupts disabled
//! for the whole sequence because the code doing the erasing cannot run
//! from the flash region being erased.
//!
//! The loop logic (`SelfUpdate::run`) is hardware-independent and
//! host-testable; only sector programming and the final reset are gated
//! behind the `embedded` feature, the same split `boot_fsm.rs` made
//! between pure FSM logic and `flash.rs`'s device access.

use crate::error::Error;
use crate::fs::{require_file_info, FsBackend};

pub const SECTOR_SIZE: u32 = 4096;
pub const PAGE_SIZE: u32 = 256;

/// Drives one self-update pass: program `name`'s stored bytes into internal
/// flash starting at `flash_offset`, then reset.
///
/// Preconditions: `name` exists on `fs`, is non-empty, and fits within
/// `flash_capacity` starting at `flash_offset`. A short read aborts the
/// loop before the next sector is erased, leaving flash partially updated
/// — accepted as the failure mode; recovery is via the external UF2
/// bootloader path.
pub fn run(
    fs: &impl FsBackend,
    name: &str,
    flash_offset: u32,
    flash_capacity: u32,
) -> Result<(), Error> {
    let info = require_file_info(fs, name)?;
    if info.size == 0 {
        return Err(Error::InvalidArgument);
    }
    match flash_offset.checked_add(info.size) {
        Some(end) if end <= flash_capacity => {}
        _ => return Err(Error::InvalidArgument),
    }

    let mut scratch = [0u8; SECTOR_SIZE as usize];
    let mut src_off = 0u32;
    let mut dst_off = flash_offset;

    while src_off < info.size {
        scratch.fill(0xFF);
        let want = (info.size - src_off).min(SECTOR_SIZE);
        let got = fs.read_file_range(name, src_off, &mut scratch[..want as usize]);
        if got == 0 {
            return Err(Error::IoError);
        }

        hw::erase_and_program_sector(dst_off, &scratch);

        src_off += got;
        dst_off += SECTOR_SIZE;
    }

    hw::delay_and_reset();
    Ok(())
}

#[cfg(feature = "embedded")]
mod hw {
    //! RAM-resident flash access via RP2040 ROM routines.

    type RomFnVoid = unsafe extern "C" fn();
    type RomFnErase = unsafe extern "C" fn(u32, usize, u32, u8);
    type RomFnProgram = unsafe extern "C" fn(u32, *const u8, usize);

    static mut ROM_CONNECT_INTERNAL_FLASH: RomFnVoid = dummy_void;
    static mut ROM_FLASH_EXIT_XIP: RomFnVoid = dummy_void;
    static mut ROM_FLASH_RANGE_ERASE: RomFnErase = dummy_erase;
    static mut ROM_FLASH_RANGE_PROGRAM: RomFnProgram = dummy_program;
    static mut ROM_FLASH_FLUSH_CACHE: RomFnVoid = dummy_void;
    static mut ROM_FLASH_ENTER_CMD_XIP: RomFnVoid = dummy_void;

    unsafe extern "C" fn dummy_void() {}
    unsafe extern "C" fn dummy_erase(_: u32, _: usize, _: u32, _: u8) {}
    unsafe extern "C" fn dummy_program(_: u32, _: *const u8, _: usize) {}

    unsafe fn rom_func_lookup(tag: &[u8; 2]) -> usize {
        let fn_table = *(0x14 as *const u16) as *const u16;
        let lookup: unsafe extern "C" fn(*const u16, u32) -> usize =
            core::mem::transmute::<usize, unsafe extern "C" fn(*const u16, u32) -> usize>(
                *(0x18 as *const u16) as usize,
            );
        let code = u16::from_le_bytes(*tag) as u32;
        lookup(fn_table, code)
    }

    /// Resolve ROM flash routine pointers. Must run once, from XIP, before
    /// the first call to `erase_and_program_sector`.
    pub fn init() {
        unsafe {
            ROM_CONNECT_INTERNAL_FLASH =
                core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"IF"));
            ROM_FLASH_EXIT_XIP = core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"EX"));
            ROM_FLASH_RANGE_ERASE =
                core::mem::transmute::<usize, RomFnErase>(rom_func_lookup(b"RE"));
            ROM_FLASH_RANGE_PROGRAM =
                core::mem::transmute::<usize, RomFnProgram>(rom_func_lookup(b"RP"));
            ROM_FLASH_FLUSH_CACHE =
                core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"FC"));
            ROM_FLASH_ENTER_CMD_XIP =
                core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"CX"));
        }
    }

    #[link_section = ".data"]
    #[inline(never)]
    pub fn erase_and_program_sector(offset: u32, data: &[u8; super::SECTOR_SIZE as usize]) {
        cortex_m::interrupt::free(|_| unsafe {
            ROM_CONNECT_INTERNAL_FLASH();
            ROM_FLASH_EXIT_XIP();
            ROM_FLASH_RANGE_ERASE(offset, data.len(), super::SECTOR_SIZE, 0x20);
            for page in data.chunks(super::PAGE_SIZE as usize) {
                let page_off = offset + (page.as_ptr() as u32 - data.as_ptr() as u32);
                ROM_FLASH_RANGE_PROGRAM(page_off, page.as_ptr(), page.len());
            }
            ROM_FLASH_FLUSH_CACHE();
            ROM_FLASH_ENTER_CMD_XIP();
        });
    }

    pub fn delay_and_reset() -> ! {
        cortex_m::asm::delay(48_000_000 / 4);
        cortex_m::peripheral::SCB::sys_reset();
    }
}

#[cfg(not(feature = "embedded"))]
mod hw {
    //! Host-side stand-in: no real flash, no reset, so the loop logic
    //! above is exercisable from ordinary unit tests.
    pub fn erase_and_program_sector(_offset: u32, _data: &[u8; super::SECTOR_SIZE as usize]) {}

    pub fn delay_and_reset() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendId;
    use crate::fs::mock::MemBackend;

    #[test]
    fn rejects_empty_file() {
        let mut fs: MemBackend<8192, 4> = MemBackend::new(BackendId::Flash);
        fs.mount(true);
        fs.create_file_slot("fw", 0, Some(&[]));
        assert_eq!(run(&fs, "fw", 0, 1 << 20), Err(Error::InvalidArgument));
    }

    #[test]
    fn rejects_oversize_file() {
        let mut fs: MemBackend<{ 1 << 20 }, 4> = MemBackend::new(BackendId::Flash);
        fs.mount(true);
        fs.create_file_slot("fw", 0, Some(&[1u8; 10]));
        assert_eq!(run(&fs, "fw", 0x1_0000, 0x1_0004), Err(Error::InvalidArgument));
    }

    #[test]
    fn runs_to_completion_for_sector_aligned_file() {
        let mut fs: MemBackend<{ 1 << 20 }, 4> = MemBackend::new(BackendId::Flash);
        fs.mount(true);
        let data = [7u8; SECTOR_SIZE as usize];
        fs.create_file_slot("fw", 0, Some(&data));
        assert_eq!(run(&fs, "fw", 0, 1 << 20), Ok(()));
    }

    #[test]
    fn runs_to_completion_for_file_needing_tail_padding() {
        let mut fs: MemBackend<{ 1 << 20 }, 4> = MemBackend::new(BackendId::Flash);
        fs.mount(true);
        fs.create_file_slot("fw", 0, Some(&[3u8; 5000]));
        assert_eq!(run(&fs, "fw", 0, 1 << 20), Ok(()));
    }

    #[test]
    fn missing_file_is_not_found() {
        let mut fs: MemBackend<8192, 4> = MemBackend::new(BackendId::Flash);
        fs.mount(true);
        assert_eq!(run(&fs, "missing", 0, 1 << 20), Err(Error::NotFound));
    }
}
