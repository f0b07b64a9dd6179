// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Wires the board's request/grant GPIO pair into `trimem_core`'s
//! generic bus-arbiter client.

use crate::peripherals::{GrantPin, RequestPin};
use trimem_core::arbiter::{BusArbiter, HalGrantPin, HalRequestPin};

pub type HostBusArbiter = BusArbiter<HalRequestPin<RequestPin>, HalGrantPin<GrantPin>>;

/// `req` is active-low (idle high, asserted low to ask for the bus);
/// `grant` is active-high (the co-processor drives it high once the bus
/// is ours), matching `original_source/…BusArbiterClient.h`'s polarity.
pub fn new_arbiter(req: RequestPin, grant: GrantPin) -> HostBusArbiter {
    BusArbiter::new(HalRequestPin::new(req, true), HalGrantPin::new(grant, true))
}
