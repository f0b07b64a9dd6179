// Copyright (c) 2026 ADNT Sarl <info@adnt.io>
// SPDX-License-Identifier: MIT

//! A small runtime-indexed GPIO table for the RPC handlers.
//!
//! `RpcHandler` is a plain `fn` pointer (`trimem_core::rpc`'s "dangerous
//! on purpose" trampoline) — it cannot capture a pin instance, so the
//! pins it operates on live in `static mut` storage the same way
//! `peripherals.rs`'s `USB_BUS` does. `DynPin` lets one array hold pins
//! of different GPIO numbers and reconfigure their direction at runtime,
//! which `pinMode` needs.

use rp2040_hal::gpio::DynPin;

pub const MAX_PINS: usize = 8;

static mut PINS: [Option<DynPin>; MAX_PINS] = [None, None, None, None, None, None, None, None];

/// Populate the general-purpose RPC pin table. Only indices 4..=7 are
/// wired up; the rest stay `None` and every handler call against them
/// reports `ERR_INVALID_ARGUMENT`.
pub fn init(p4: impl Into<DynPin>, p5: impl Into<DynPin>, p6: impl Into<DynPin>, p7: impl Into<DynPin>) {
    unsafe {
        PINS[4] = Some(p4.into());
        PINS[5] = Some(p5.into());
        PINS[6] = Some(p6.into());
        PINS[7] = Some(p7.into());
    }
}

pub fn with_pin<R>(idx: usize, f: impl FnOnce(&mut DynPin) -> R) -> Option<R> {
    unsafe {
        #[allow(static_mut_refs)]
        PINS.get_mut(idx)?.as_mut().map(f)
    }
}

pub fn reconfigure_output(idx: usize) -> bool {
    reconfigure(idx, |p| p.into_push_pull_output())
}

pub fn reconfigure_input(idx: usize) -> bool {
    reconfigure(idx, |p| p.into_floating_input())
}

fn reconfigure(idx: usize, f: impl FnOnce(DynPin) -> DynPin) -> bool {
    unsafe {
        #[allow(static_mut_refs)]
        let Some(slot) = PINS.get_mut(idx) else {
            return false;
        };
        let Some(pin) = slot.take() else {
            return false;
        };
        *slot = Some(f(pin));
        true
    }
}
