// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Wire types for the RPC channel between the host MCU and the
//! co-processor, serialized with `postcard` and framed with COBS exactly
//! as `trimem-host::usb_transport` already frames its console protocol.
//!
//! RPC calls on the co-processor are serialized by the transport — one in
//! flight at a time — so these types carry no correlation id.

use crate::rpc::MAX_NAME_LEN;
use serde::{Deserialize, Serialize};

/// Maximum argv length a call can carry.
pub const MAX_ARGV: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcCall {
    pub name: heapless::String<MAX_NAME_LEN>,
    pub argv: heapless::Vec<i32, MAX_ARGV>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResult {
    pub value: i32,
}

impl RpcCall {
    pub fn new(name: &str, argv: &[i32]) -> Option<Self> {
        let name = heapless::String::try_from(name).ok()?;
        let mut v = heapless::Vec::new();
        for &a in argv {
            v.push(a).ok()?;
        }
        Some(Self { name, argv: v })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_round_trips_through_postcard_cobs() {
        let call = RpcCall::new("digitalWrite", &[7, 1]).unwrap();
        let mut buf = [0u8; 64];
        let encoded = postcard::to_slice_cobs(&call, &mut buf).unwrap();

        let mut rx = [0u8; 64];
        rx[..encoded.len()].copy_from_slice(encoded);
        let decoded: RpcCall = postcard::from_bytes_cobs(&mut rx[..encoded.len()]).unwrap();
        assert_eq!(decoded, call);
    }

    #[test]
    fn name_over_capacity_is_rejected() {
        assert!(RpcCall::new("aNameThatIsDefinitelyTooLongForTheField", &[]).is_none());
    }

    #[test]
    fn argv_over_capacity_is_rejected() {
        assert!(RpcCall::new("f", &[1, 2, 3, 4, 5]).is_none());
    }

    #[test]
    fn result_round_trips() {
        let r = RpcResult { value: -22 };
        let mut buf = [0u8; 16];
        let encoded = postcard::to_slice_cobs(&r, &mut buf).unwrap();
        let mut rx = [0u8; 16];
        rx[..encoded.len()].copy_from_slice(encoded);
        let decoded: RpcResult = postcard::from_bytes_cobs(&mut rx[..encoded.len()]).unwrap();
        assert_eq!(decoded, r);
    }
}
