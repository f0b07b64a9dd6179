// Copyright (c) 2026 ADNT Sarl <info@adnt.io>
// SPDX-License-Identifier: MIT

#![no_std]
#![no_main]

mod adc;
mod pins;

use defmt_rtt as _;
use embedded_hal::digital::{InputPin, OutputPin, StatefulOutputPin};
use fugit::RateExtU32;
use embedded_hal_nb::serial::{Read, Write};
use panic_probe as _;
use rp2040_hal as hal;
use trimem_core::rpc::{check_arity, dispatch, RpcEntry, ERR_INVALID_ARGUMENT};
use trimem_core::rpcwire::{RpcCall, RpcResult};

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;

/// Co-processor side of the two-wire bus arbiter: a passive responder,
/// not a `BusArbiter` client. It only ever mirrors the host's request
/// line onto the grant line; it never itself asks for the bus. Polarity
/// matches `trimem-host::bus` (`req` active-low, `grant` active-high).
fn service_arbiter(
    request: &mut impl InputPin,
    grant: &mut impl OutputPin,
) {
    let requested = request.is_low().unwrap_or(false);
    let _ = if requested {
        grant.set_high()
    } else {
        grant.set_low()
    };
}

fn digital_write(argv: &[i32], argc: u32) -> i32 {
    if let Some(err) = check_arity(argc, 2) {
        return err;
    }
    let idx = argv[0] as usize;
    let level = argv[1] != 0;
    match pins::with_pin(idx, |p| {
        if level {
            p.set_high()
        } else {
            p.set_low()
        }
        .is_ok()
    }) {
        Some(true) => 0,
        _ => ERR_INVALID_ARGUMENT,
    }
}

fn digital_read(argv: &[i32], argc: u32) -> i32 {
    if let Some(err) = check_arity(argc, 1) {
        return err;
    }
    let idx = argv[0] as usize;
    match pins::with_pin(idx, |p| p.is_high().unwrap_or(false)) {
        Some(true) => 1,
        Some(false) => 0,
        None => ERR_INVALID_ARGUMENT,
    }
}

fn pin_mode(argv: &[i32], argc: u32) -> i32 {
    if let Some(err) = check_arity(argc, 2) {
        return err;
    }
    let idx = argv[0] as usize;
    let ok = match argv[1] {
        0 => pins::reconfigure_input(idx),
        1 => pins::reconfigure_output(idx),
        _ => false,
    };
    if ok {
        0
    } else {
        ERR_INVALID_ARGUMENT
    }
}

fn analog_read(argv: &[i32], argc: u32) -> i32 {
    if let Some(err) = check_arity(argc, 1) {
        return err;
    }
    let channel = argv[0];
    if !(0..=4).contains(&channel) {
        return ERR_INVALID_ARGUMENT;
    }
    adc::read_channel(channel as u8) as i32
}

fn delay(argv: &[i32], argc: u32) -> i32 {
    if let Some(err) = check_arity(argc, 1) {
        return err;
    }
    let ms = argv[0].max(0) as u32;
    // Approximate cycles/ms at the default 125MHz sysclk; accuracy
    // beyond "about this long" is not a requirement for this handler.
    cortex_m::asm::delay(ms.saturating_mul(125_000));
    0
}

const RPC_TABLE: &[RpcEntry] = &[
    RpcEntry {
        name: "digitalWrite",
        handler: digital_write,
    },
    RpcEntry {
        name: "digitalRead",
        handler: digital_read,
    },
    RpcEntry {
        name: "pinMode",
        handler: pin_mode,
    },
    RpcEntry {
        name: "analogRead",
        handler: analog_read,
    },
    RpcEntry {
        name: "delay",
        handler: delay,
    },
];

/// Read one COBS-framed `RpcCall`, dispatch it, and send back the
/// COBS-framed `RpcResult` — the same framing `trimem-host::rpc_link`
/// uses to send it, just read from the other end of the same UART.
fn service_rpc(uart: &mut impl embedded_hal_nb::serial::ErrorType + Read<u8> + Write<u8>) {
    // `from_bytes_cobs` decodes in place and expects the trailing zero
    // delimiter included in the slice, matching `to_slice_cobs`'s output —
    // kept here rather than stripped, same convention as the host side's
    // `rpc_link`.
    let mut rx = [0u8; 64];
    let mut pos = 0usize;
    loop {
        if pos >= rx.len() {
            return;
        }
        let Ok(byte) = nb::block!(uart.read()) else {
            return;
        };
        rx[pos] = byte;
        pos += 1;
        if byte == 0x00 {
            break;
        }
    }
    if pos <= 1 {
        return;
    }
    let Ok(call) = postcard::from_bytes_cobs::<RpcCall>(&mut rx[..pos]) else {
        return;
    };

    let value = dispatch(RPC_TABLE, &call.name, &call.argv);
    let result = RpcResult { value };

    let mut tx = [0u8; 16];
    if let Ok(encoded) = postcard::to_slice_cobs(&result, &mut tx) {
        for &b in encoded.iter() {
            let _ = nb::block!(uart.write(b));
        }
    }
}

#[entry]
fn main() -> ! {
    defmt::println!("Co-processor firmware started");

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

    let mut timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let sio = hal::Sio::new(pac.SIO);
    let pins_set = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let mut led_pin = pins_set.gpio25.into_push_pull_output();
    trimem_core::blink(&mut led_pin, &mut timer, 5, 100);

    let mut request_pin = pins_set.gpio2.into_pull_down_input();
    let mut grant_pin = pins_set.gpio3.into_push_pull_output();

    let mut rpc_uart = hal::uart::UartPeripheral::new(
        pac.UART0,
        (
            pins_set.gpio0.into_function(),
            pins_set.gpio1.into_function(),
        ),
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

    pins::init(pins_set.gpio4, pins_set.gpio5, pins_set.gpio6, pins_set.gpio7);

    defmt::println!("RPC link and bus-arbiter responder ready");

    let mut blink_counter = 0u32;
    loop {
        service_arbiter(&mut request_pin, &mut grant_pin);
        service_rpc(&mut rpc_uart);

        blink_counter += 1;
        if blink_counter >= 500_000 {
            blink_counter = 0;
            if led_pin.is_set_high().unwrap_or(false) {
                led_pin.set_low().ok();
            } else {
                led_pin.set_high().ok();
            }
        }
    }
}
