// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Peripheral initialization for the storage/code-delivery board.

use core::cell::RefCell;
use embedded_hal_bus::spi::RefCellDevice;
use fugit::RateExtU32;
use rp2040_hal as hal;
use rp2040_hal::gpio::FunctionSpi;
use rp2040_hal::usb::UsbBus;
use usb_device::class_prelude::UsbBusAllocator;

pub type LedPin =
    hal::gpio::Pin<hal::gpio::bank0::Gpio25, hal::gpio::FunctionSioOutput, hal::gpio::PullDown>;

/// Bus-arbiter request line: this MCU asserts it to ask for the shared bus.
pub type RequestPin =
    hal::gpio::Pin<hal::gpio::bank0::Gpio2, hal::gpio::FunctionSioOutput, hal::gpio::PullDown>;
/// Bus-arbiter grant line: the co-processor asserts it back when the bus is ours.
pub type GrantPin =
    hal::gpio::Pin<hal::gpio::bank0::Gpio3, hal::gpio::FunctionSioInput, hal::gpio::PullDown>;

pub type CsNandPin =
    hal::gpio::Pin<hal::gpio::bank0::Gpio17, hal::gpio::FunctionSioOutput, hal::gpio::PullUp>;
pub type CsPsramPin =
    hal::gpio::Pin<hal::gpio::bank0::Gpio13, hal::gpio::FunctionSioOutput, hal::gpio::PullUp>;

type StorageSpiBus = hal::spi::Spi<hal::spi::Enabled, hal::pac::SPI0, (SpiMosi, SpiMiso, SpiSck)>;
type SpiMosi = hal::gpio::Pin<hal::gpio::bank0::Gpio19, FunctionSpi, hal::gpio::PullNone>;
type SpiMiso = hal::gpio::Pin<hal::gpio::bank0::Gpio16, FunctionSpi, hal::gpio::PullNone>;
type SpiSck = hal::gpio::Pin<hal::gpio::bank0::Gpio18, FunctionSpi, hal::gpio::PullNone>;

pub type NandSpiDevice = RefCellDevice<'static, StorageSpiBus, CsNandPin, hal::Timer>;
pub type PsramSpiDevice = RefCellDevice<'static, StorageSpiBus, CsPsramPin, hal::Timer>;

/// UART to the co-processor, carrying COBS+postcard-framed RPC calls.
pub type RpcUart = hal::uart::UartPeripheral<
    hal::uart::Enabled,
    hal::pac::UART0,
    (
        hal::gpio::Pin<hal::gpio::bank0::Gpio0, hal::gpio::FunctionUart, hal::gpio::PullNone>,
        hal::gpio::Pin<hal::gpio::bank0::Gpio1, hal::gpio::FunctionUart, hal::gpio::PullNone>,
    ),
>;

/// Static storage for UsbBusAllocator (required by usb-device for 'static lifetime).
static mut USB_BUS: Option<UsbBusAllocator<UsbBus>> = None;

pub fn usb_bus_ref() -> &'static UsbBusAllocator<UsbBus> {
    unsafe { (*core::ptr::addr_of!(USB_BUS)).as_ref().unwrap() }
}

pub fn store_usb_bus(bus: UsbBusAllocator<UsbBus>) {
    unsafe {
        USB_BUS = Some(bus);
    }
}

/// Static storage for the SPI bus NAND and PSRAM take turns on. Same
/// 'static-via-steal pattern as `USB_BUS`: both `RefCellDevice`s need a
/// `&'static RefCell<_>` and this board never tears the bus down.
static mut STORAGE_SPI: Option<RefCell<StorageSpiBus>> = None;

fn storage_spi_ref() -> &'static RefCell<StorageSpiBus> {
    unsafe { (*core::ptr::addr_of!(STORAGE_SPI)).as_ref().unwrap() }
}

fn store_storage_spi(bus: StorageSpiBus) {
    unsafe {
        STORAGE_SPI = Some(RefCell::new(bus));
    }
}

pub struct Peripherals {
    pub led_pin: LedPin,
    pub request_pin: RequestPin,
    pub grant_pin: GrantPin,
    pub nand_spi: NandSpiDevice,
    pub psram_spi: PsramSpiDevice,
    pub rpc_uart: RpcUart,
    pub timer: hal::Timer,
    pub usb: Option<UsbPeripherals>,
}

pub struct UsbPeripherals {
    pub regs: hal::pac::USBCTRL_REGS,
    pub dpram: hal::pac::USBCTRL_DPRAM,
    pub clock: hal::clocks::UsbClock,
    pub resets: hal::pac::RESETS,
}

pub fn init() -> Peripherals {
    let mut pac = unsafe { hal::pac::Peripherals::steal() };

    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);
    let clocks = hal::clocks::init_clocks_and_plls(
        12_000_000u32,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .unwrap();

    let timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let spi_bus = hal::spi::Spi::<_, _, _, 8>::new(
        pac.SPI0,
        (
            pins.gpio19.into_function(),
            pins.gpio16.into_function(),
            pins.gpio18.into_function(),
        ),
    )
    .init(
        &mut pac.RESETS,
        clocks.peripheral_clock.freq(),
        16.MHz(),
        embedded_hal::spi::MODE_0,
    );

    store_storage_spi(spi_bus);
    let cs_nand: CsNandPin = pins.gpio17.reconfigure();
    let cs_psram: CsPsramPin = pins.gpio13.reconfigure();

    let rpc_uart = hal::uart::UartPeripheral::new(
        pac.UART0,
        (pins.gpio0.into_function(), pins.gpio1.into_function()),
        &mut pac.RESETS,
    )
    .enable(
        hal::uart::UartConfig::new(
            115_200.Hz(),
            hal::uart::DataBits::Eight,
            None,
            hal::uart::StopBits::One,
        ),
        clocks.peripheral_clock.freq(),
    )
    .unwrap();

    Peripherals {
        led_pin: pins.gpio25.into_push_pull_output(),
        request_pin: pins.gpio2.into_push_pull_output(),
        grant_pin: pins.gpio3.into_pull_down_input(),
        // `Timer` is cheap to clone (it's a thin handle onto the shared
        // TIMER peripheral, not an exclusive alarm claim), so each
        // `RefCellDevice` gets its own handle alongside the one kept on
        // `Peripherals` for the console's `now_ms` clock.
        nand_spi: RefCellDevice::new(storage_spi_ref(), cs_nand, timer.clone()).unwrap(),
        psram_spi: RefCellDevice::new(storage_spi_ref(), cs_psram, timer.clone()).unwrap(),
        rpc_uart,
        timer,
        usb: Some(UsbPeripherals {
            regs: pac.USBCTRL_REGS,
            dpram: pac.USBCTRL_DPRAM,
            clock: clocks.usb_clock,
            resets: pac.RESETS,
        }),
    }
}
