// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Host MCU firmware: mounts the three storage backends, wires the bus
//! arbiter and co-processor RPC link, and runs the USB CDC console loop.

#![no_std]
#![no_main]

mod bus;
mod console;
mod devices;
mod peripherals;
mod rpc_link;
mod usb_transport;

use console::{Backends, Console, SELFUPDATE_FLASH_CAPACITY};
use defmt_rtt as _;
use devices::{InternalFlashDevice, SpiNandDevice, SpiPsramDevice};
use panic_probe as _;
use rp2040_hal as hal;
use trimem_core::fs::device::DeviceBackend;
use trimem_core::BackendId;
use usb_device::class_prelude::UsbBusAllocator;

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;

#[unsafe(link_section = ".boot2")]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

const MAX_FILES: usize = 16;

/// Internal flash ahead of `SELFUPDATE_FLASH_CAPACITY` holds the running
/// firmware image the self-update loop overwrites; the flash-backed
/// `FsBackend` is given the remainder of the chip, so a stored file can
/// never alias the image currently executing.
const FLASH_TOTAL_CAPACITY: u32 = 2 * 1024 * 1024;
const FLASH_FS_BASE: u32 = SELFUPDATE_FLASH_CAPACITY;
const FLASH_FS_CAPACITY: u32 = FLASH_TOTAL_CAPACITY - FLASH_FS_BASE;

const NAND_PAGE_SIZE: u32 = 2048;
const NAND_BLOCK_SIZE: u32 = 128 * 1024;
const NAND_CAPACITY: u32 = 128 * 1024 * 1024;

const PSRAM_CAPACITY: u32 = 8 * 1024 * 1024;

type FlashBackend = DeviceBackend<InternalFlashDevice, MAX_FILES>;
type NandBackend =
    DeviceBackend<SpiNandDevice<peripherals::NandSpiDevice, hal::Timer>, MAX_FILES>;
type PsramBackend = DeviceBackend<SpiPsramDevice<peripherals::PsramSpiDevice>, MAX_FILES>;

#[entry]
fn main() -> ! {
    defmt::println!("trimem host init");

    let mut p = peripherals::init();
    trimem_core::blink(&mut p.led_pin, &mut p.timer, 3, 200);

    let mut backends = Backends::<FlashBackend, NandBackend, PsramBackend> {
        flash: DeviceBackend::new(
            BackendId::Flash,
            InternalFlashDevice::new(FLASH_FS_BASE, FLASH_FS_CAPACITY),
        ),
        nand: DeviceBackend::new(
            BackendId::Nand,
            SpiNandDevice::new(
                p.nand_spi,
                p.timer.clone(),
                NAND_PAGE_SIZE,
                NAND_BLOCK_SIZE,
                NAND_CAPACITY,
            ),
        ),
        psram: DeviceBackend::new(
            BackendId::Psram,
            SpiPsramDevice::new(p.psram_spi, PSRAM_CAPACITY),
        ),
    };
    backends.mount_all();

    let mut arbiter = bus::new_arbiter(p.request_pin, p.grant_pin);
    let mut rpc = rpc_link::RpcLink::new(p.rpc_uart);

    let mut usb = p.usb.take().expect("USB peripherals already taken");
    let usb_bus = UsbBusAllocator::new(hal::usb::UsbBus::new(
        usb.regs,
        usb.dpram,
        usb.clock,
        true,
        &mut usb.resets,
    ));
    peripherals::store_usb_bus(usb_bus);
    let mut transport = usb_transport::UsbTransport::new(peripherals::usb_bus_ref());

    defmt::println!("USB CDC console ready");

    let clock = p.timer;
    let mut console = Console::new();

    loop {
        console.poll(
            &mut transport,
            &mut backends,
            &mut arbiter,
            || (clock.get_counter().ticks() / 1000) as u32,
            &mut rpc,
        );
    }
}
