// Copyright (c) 2026 ADNT Sarl <info@adnt.io>
// SPDX-License-Identifier: MIT

//! Single-shot ADC channel read via direct register access, in the same
//! style as `flash.rs`'s raw ROM/register access: the `analogRead` RPC
//! handler is a bare `fn` pointer with no peripheral instance to borrow,
//! so there is nothing to own and stealing the register block per call
//! is the only option.

use rp2040_hal::pac;

pub fn read_channel(channel: u8) -> u16 {
    let adc = unsafe { &*pac::ADC::PTR };
    adc.cs().write(|w| unsafe { w.ainsel().bits(channel) });
    adc.cs().modify(|_, w| w.start_once().set_bit());
    while adc.cs().read().ready().bit_is_clear() {}
    adc.result().read().result().bits()
}
