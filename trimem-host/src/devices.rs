// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Concrete `RawDevice` implementations for the three storage chips this
//! board carries: internal XIP flash, an external SPI NAND, and an
//! external SPI PSRAM. Each one is a thin adapter — the bookkeeping
//! (directory, slots, relocate-vs-in-place) lives entirely in
//! `trimem_core::fs::device::DeviceBackend`; these structs only know how
//! to move bytes in and out of their chip.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;
use trimem_core::fs::device::RawDevice;

/// Internal RP2040 flash, accessed through the boot ROM's erase/program
/// routines. Erase/program must run from RAM with interrupts off because
/// the code performing them cannot also be the code being erased; see
/// the `hw` submodule below, ported from the teacher's
/// `crispy-common::flash` for this same sequence.
pub struct InternalFlashDevice {
    base_offset: u32,
    capacity: u32,
}

impl InternalFlashDevice {
    /// `base_offset` is relative to the start of flash (not the XIP base
    /// address); `capacity` bounds how much of flash this device exposes.
    pub fn new(base_offset: u32, capacity: u32) -> Self {
        hw::init();
        Self {
            base_offset,
            capacity,
        }
    }
}

impl RawDevice for InternalFlashDevice {
    fn capacity_bytes(&self) -> u32 {
        self.capacity
    }

    fn erase_align(&self) -> u32 {
        hw::SECTOR_SIZE
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) {
        hw::flash_read(hw::FLASH_BASE + self.base_offset + addr, buf);
    }

    fn erase(&mut self, addr: u32, len: u32) -> bool {
        hw::flash_erase(self.base_offset + addr, len);
        true
    }

    fn program(&mut self, addr: u32, data: &[u8]) -> bool {
        let mut off = 0usize;
        while off < data.len() {
            let n = (data.len() - off).min(hw::PAGE_SIZE as usize);
            let mut page = [0xFFu8; hw::PAGE_SIZE as usize];
            page[..n].copy_from_slice(&data[off..off + n]);
            hw::flash_program(self.base_offset + addr + off as u32, &page);
            off += n;
        }
        true
    }
}

mod hw {
    //! RAM-resident ROM flash routines. Lifted from `flash.rs`, with the
    //! `BootData`-specific helpers dropped — this module only moves raw
    //! bytes, the directory lives in `DeviceBackend`.

    pub const FLASH_BASE: u32 = 0x1000_0000;
    pub const SECTOR_SIZE: u32 = 4096;
    pub const PAGE_SIZE: u32 = 256;

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
    pub fn flash_erase(offset: u32, size: u32) {
        cortex_m::interrupt::free(|_| unsafe {
            ROM_CONNECT_INTERNAL_FLASH();
            ROM_FLASH_EXIT_XIP();
            ROM_FLASH_RANGE_ERASE(offset, size as usize, SECTOR_SIZE, 0x20);
            ROM_FLASH_FLUSH_CACHE();
            ROM_FLASH_ENTER_CMD_XIP();
        });
    }

    #[link_section = ".data"]
    #[inline(never)]
    pub fn flash_program(offset: u32, page: &[u8; PAGE_SIZE as usize]) {
        cortex_m::interrupt::free(|_| unsafe {
            ROM_CONNECT_INTERNAL_FLASH();
            ROM_FLASH_EXIT_XIP();
            ROM_FLASH_RANGE_PROGRAM(offset, page.as_ptr(), page.len());
            ROM_FLASH_FLUSH_CACHE();
            ROM_FLASH_ENTER_CMD_XIP();
        });
    }

    pub fn flash_read(abs_addr: u32, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = unsafe { ((abs_addr + i as u32) as *const u8).read_volatile() };
        }
    }
}

/// SPI NAND command opcodes, ONFI-compatible (Winbond/GigaDevice-style
/// single-die parts): `GET FEATURE`/`SET FEATURE` poll the operation-in-
/// progress bit instead of a dedicated busy pin, same status-register
/// convention as `stm32-fmc`'s `0x70 Read Status`.
mod nand_cmd {
    pub const WRITE_ENABLE: u8 = 0x06;
    pub const GET_FEATURE: u8 = 0x0F;
    pub const PAGE_READ: u8 = 0x13;
    pub const READ_FROM_CACHE: u8 = 0x03;
    pub const PROGRAM_LOAD: u8 = 0x02;
    pub const PROGRAM_EXECUTE: u8 = 0x10;
    pub const BLOCK_ERASE: u8 = 0xD8;
    pub const STATUS_REG_ADDR: u8 = 0xC0;
    pub const STATUS_OIP: u8 = 0x01;
}

/// An SPI-attached NAND chip. `PAGE_SIZE` and `BLOCK_SIZE` are fixed by
/// the part; `capacity` is `BLOCK_SIZE * blocks`. Spare/ECC bytes are not
/// modeled — only the main data area is exposed, matching
/// `embedded-nand`'s `NandFlash::{PAGE_SIZE, ERASE_SIZE}` split.
pub struct SpiNandDevice<SPI, D> {
    spi: SPI,
    delay: D,
    page_size: u32,
    block_size: u32,
    capacity: u32,
}

impl<SPI: SpiDevice, D: DelayNs> SpiNandDevice<SPI, D> {
    pub fn new(spi: SPI, delay: D, page_size: u32, block_size: u32, capacity: u32) -> Self {
        Self {
            spi,
            delay,
            page_size,
            block_size,
            capacity,
        }
    }

    fn wait_ready(&mut self) -> bool {
        for _ in 0..1000 {
            let mut status = [0u8; 1];
            if self
                .spi
                .transaction(&mut [
                    embedded_hal::spi::Operation::Write(&[
                        nand_cmd::GET_FEATURE,
                        nand_cmd::STATUS_REG_ADDR,
                    ]),
                    embedded_hal::spi::Operation::Read(&mut status),
                ])
                .is_err()
            {
                return false;
            }
            if status[0] & nand_cmd::STATUS_OIP == 0 {
                return true;
            }
            self.delay.delay_us(10);
        }
        false
    }

    fn row_col(&self, addr: u32) -> (u32, u16) {
        (addr / self.page_size, (addr % self.page_size) as u16)
    }
}

impl<SPI: SpiDevice, D: DelayNs> RawDevice for SpiNandDevice<SPI, D> {
    fn capacity_bytes(&self) -> u32 {
        self.capacity
    }

    fn erase_align(&self) -> u32 {
        self.block_size
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) {
        let (row, col) = self.row_col(addr);
        let _ = self.spi.transaction(&mut [embedded_hal::spi::Operation::Write(&[
            nand_cmd::PAGE_READ,
            (row >> 16) as u8,
            (row >> 8) as u8,
            row as u8,
        ])]);
        self.wait_ready();
        let _ = self.spi.transaction(&mut [
            embedded_hal::spi::Operation::Write(&[
                nand_cmd::READ_FROM_CACHE,
                (col >> 8) as u8,
                col as u8,
                0x00,
            ]),
            embedded_hal::spi::Operation::Read(buf),
        ]);
    }

    fn erase(&mut self, addr: u32, _len: u32) -> bool {
        let (row, _) = self.row_col(addr);
        if self.spi.write(&[nand_cmd::WRITE_ENABLE]).is_err() {
            return false;
        }
        if self
            .spi
            .write(&[
                nand_cmd::BLOCK_ERASE,
                (row >> 16) as u8,
                (row >> 8) as u8,
                row as u8,
            ])
            .is_err()
        {
            return false;
        }
        self.wait_ready()
    }

    fn program(&mut self, addr: u32, data: &[u8]) -> bool {
        let (row, col) = self.row_col(addr);
        if self.spi.write(&[nand_cmd::WRITE_ENABLE]).is_err() {
            return false;
        }
        if self
            .spi
            .transaction(&mut [embedded_hal::spi::Operation::Write(&[
                nand_cmd::PROGRAM_LOAD,
                (col >> 8) as u8,
                col as u8,
            ])])
            .is_err()
        {
            return false;
        }
        if self.spi.write(data).is_err() {
            return false;
        }
        if self
            .spi
            .write(&[
                nand_cmd::PROGRAM_EXECUTE,
                (row >> 16) as u8,
                (row >> 8) as u8,
                row as u8,
            ])
            .is_err()
        {
            return false;
        }
        self.wait_ready()
    }
}

/// An SPI-attached PSRAM chip (APS6404L-class): byte-addressable, no
/// erase step, 24-bit address in every command — `erase` is a pure
/// no-op success the same way `BackendId::Psram`'s static parameters
/// already say `erase_align() == 1`.
pub struct SpiPsramDevice<SPI> {
    spi: SPI,
    capacity: u32,
}

mod psram_cmd {
    pub const READ: u8 = 0x03;
    pub const WRITE: u8 = 0x02;
}

impl<SPI: SpiDevice> SpiPsramDevice<SPI> {
    pub fn new(spi: SPI, capacity: u32) -> Self {
        Self { spi, capacity }
    }

    fn addr_bytes(addr: u32) -> [u8; 3] {
        [(addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
    }
}

impl<SPI: SpiDevice> RawDevice for SpiPsramDevice<SPI> {
    fn capacity_bytes(&self) -> u32 {
        self.capacity
    }

    fn erase_align(&self) -> u32 {
        1
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) {
        let a = Self::addr_bytes(addr);
        let _ = self.spi.transaction(&mut [
            embedded_hal::spi::Operation::Write(&[psram_cmd::READ, a[0], a[1], a[2]]),
            embedded_hal::spi::Operation::Read(buf),
        ]);
    }

    fn erase(&mut self, _addr: u32, _len: u32) -> bool {
        true
    }

    fn program(&mut self, addr: u32, data: &[u8]) -> bool {
        let a = Self::addr_bytes(addr);
        self.spi
            .transaction(&mut [
                embedded_hal::spi::Operation::Write(&[psram_cmd::WRITE, a[0], a[1], a[2]]),
                embedded_hal::spi::Operation::Write(data),
            ])
            .is_ok()
    }
}
