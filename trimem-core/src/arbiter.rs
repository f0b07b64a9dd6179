// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Two-wire bus arbiter client: active-low request, active-high grant,
//! nesting-safe, timeout-bounded.
//!
//! The request/grant pins are generic over `embedded_hal::digital` traits
//! so host firmware gets compile-time-checked pin assignment instead of a
//! pair of raw pin-index statics. Polarity and the nesting `depth` counter
//! are bundled into the arbiter instance itself rather than held as
//! process-wide state, matching the "single instance per bus" invariant.

use crate::error::Error;

#[cfg(feature = "embedded")]
use embedded_hal::digital::{InputPin, OutputPin};

/// Minimal pin traits the arbiter needs, decoupled from `embedded-hal` so
/// the state machine is testable without any HAL in scope.
pub trait RequestPin {
    fn assert(&mut self);
    fn deassert(&mut self);
}

pub trait GrantPin {
    fn is_granted(&mut self) -> bool;
}

#[cfg(feature = "embedded")]
pub struct HalRequestPin<P: OutputPin> {
    pin: P,
    active_low: bool,
}

#[cfg(feature = "embedded")]
impl<P: OutputPin> HalRequestPin<P> {
    pub fn new(pin: P, active_low: bool) -> Self {
        Self { pin, active_low }
    }
}

#[cfg(feature = "embedded")]
impl<P: OutputPin> RequestPin for HalRequestPin<P> {
    fn assert(&mut self) {
        let _ = if self.active_low {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        };
    }

    fn deassert(&mut self) {
        let _ = if self.active_low {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
    }
}

#[cfg(feature = "embedded")]
pub struct HalGrantPin<P: InputPin> {
    pin: P,
    active_high: bool,
}

#[cfg(feature = "embedded")]
impl<P: InputPin> HalGrantPin<P> {
    pub fn new(pin: P, active_high: bool) -> Self {
        Self { pin, active_high }
    }
}

#[cfg(feature = "embedded")]
impl<P: InputPin> GrantPin for HalGrantPin<P> {
    fn is_granted(&mut self) -> bool {
        let level = self.pin.is_high().unwrap_or(false);
        level == self.active_high
    }
}

/// Request/grant handshake client for the shared external bus.
///
/// Nested acquisitions within a single task are safe: the second `acquire`
/// in `acquire; acquire; release; release` succeeds immediately because the
/// line is already asserted, and only the matching second `release`
/// deasserts it. Cross-task nesting is not supported — this is a
/// single-master client, by type (no `Sync`, no shared state).
pub struct BusArbiter<R, G> {
    req: R,
    grant: G,
    depth: u16,
}

impl<R: RequestPin, G: GrantPin> BusArbiter<R, G> {
    pub fn new(req: R, grant: G) -> Self {
        Self {
            req,
            grant,
            depth: 0,
        }
    }

    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Acquire the bus, nesting safely. `now_ms` returns a monotonic
    /// millisecond clock reading; `delay` is invoked once per poll
    /// iteration as the cooperative yield point. Returns `false` (and
    /// resets `depth` to zero) if `grant` is not observed within
    /// `timeout_ms`. `timeout_ms == 0` waits forever.
    pub fn acquire(
        &mut self,
        timeout_ms: u32,
        mut now_ms: impl FnMut() -> u32,
        mut delay: impl FnMut(),
    ) -> bool {
        if self.depth > 0 {
            self.depth += 1;
            return true;
        }

        self.req.assert();
        let start = now_ms();
        loop {
            if self.grant.is_granted() {
                self.depth = 1;
                return true;
            }
            if timeout_ms != 0 && now_ms().wrapping_sub(start) >= timeout_ms {
                self.req.deassert();
                self.depth = 0;
                return false;
            }
            delay();
        }
    }

    /// Release one level of nesting. Deasserts `req` only when the last
    /// matching acquisition is released; extra releases are no-ops.
    pub fn release(&mut self) {
        if self.depth == 0 {
            return;
        }
        self.depth -= 1;
        if self.depth == 0 {
            self.req.deassert();
        }
    }

    /// Acquire the bus and return a scoped guard that releases on drop,
    /// covering every exit path including early returns and panics that
    /// unwind through it.
    pub fn guard(
        &mut self,
        timeout_ms: u32,
        now_ms: impl FnMut() -> u32,
        delay: impl FnMut(),
    ) -> Result<BusGuard<'_, R, G>, Error> {
        if self.acquire(timeout_ms, now_ms, delay) {
            Ok(BusGuard { arbiter: self })
        } else {
            Err(Error::Timeout)
        }
    }
}

/// RAII guard pairing `acquire` with `release`.
pub struct BusGuard<'a, R, G> {
    arbiter: &'a mut BusArbiter<R, G>,
}

impl<'a, R, G> BusGuard<'a, R, G> {
    pub fn depth(&self) -> u16 {
        self.arbiter.depth
    }
}

impl<'a, R: RequestPin, G: GrantPin> Drop for BusGuard<'a, R, G> {
    fn drop(&mut self) {
        self.arbiter.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct StubReq {
        asserted: Cell<bool>,
    }

    impl RequestPin for StubReq {
        fn assert(&mut self) {
            self.asserted.set(true);
        }
        fn deassert(&mut self) {
            self.asserted.set(false);
        }
    }

    struct StubGrant {
        granted: bool,
    }

    impl GrantPin for StubGrant {
        fn is_granted(&mut self) -> bool {
            self.granted
        }
    }

    fn arbiter(granted: bool) -> BusArbiter<StubReq, StubGrant> {
        BusArbiter::new(
            StubReq {
                asserted: Cell::new(false),
            },
            StubGrant { granted },
        )
    }

    #[test]
    fn nested_acquire_release_asserts_request_line_once() {
        let mut bus = arbiter(true);
        assert!(bus.acquire(10, || 0, || {}));
        assert!(bus.req.asserted.get());
        assert!(bus.acquire(10, || 0, || {}));
        assert_eq!(bus.depth(), 2);

        bus.release();
        assert!(bus.req.asserted.get());
        bus.release();
        assert!(!bus.req.asserted.get());
        assert_eq!(bus.depth(), 0);
    }

    #[test]
    fn extra_release_is_a_no_op() {
        let mut bus = arbiter(true);
        bus.acquire(10, || 0, || {});
        bus.release();
        bus.release();
        bus.release();
        assert_eq!(bus.depth(), 0);
        assert!(!bus.req.asserted.get());
    }

    #[test]
    fn timeout_resets_depth_and_deasserts_request() {
        let mut bus = arbiter(false);
        let mut t = 0u32;
        let ok = bus.acquire(
            100,
            || {
                t += 10;
                t
            },
            || {},
        );
        assert!(!ok);
        assert_eq!(bus.depth(), 0);
        assert!(!bus.req.asserted.get());
    }

    struct GrantAfter {
        polls_remaining: Cell<u32>,
    }

    impl GrantPin for GrantAfter {
        fn is_granted(&mut self) -> bool {
            let remaining = self.polls_remaining.get();
            if remaining == 0 {
                true
            } else {
                self.polls_remaining.set(remaining - 1);
                false
            }
        }
    }

    #[test]
    fn zero_timeout_waits_forever() {
        let mut bus = BusArbiter::new(
            StubReq {
                asserted: Cell::new(false),
            },
            GrantAfter {
                polls_remaining: Cell::new(5),
            },
        );
        // `now_ms` keeps advancing well past any ordinary timeout, but
        // `timeout_ms == 0` must keep polling regardless.
        let mut t = 0u32;
        let ok = bus.acquire(
            0,
            || {
                t += 1_000_000;
                t
            },
            || {},
        );
        assert!(ok);
        assert_eq!(bus.depth(), 1);
    }

    #[test]
    fn guard_releases_on_drop() {
        let mut bus = arbiter(true);
        {
            let g = bus.guard(10, || 0, || {}).unwrap();
            assert_eq!(g.depth(), 1);
        }
        assert_eq!(bus.depth(), 0);
    }
}
