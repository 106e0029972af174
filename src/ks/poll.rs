// Licensed under the Apache-2.0 license

//! Bounded status polling.

use embedded_hal::delay::DelayNs;
use fugit::NanosDurationU32;

/// The polling budget ran out before the condition was met.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timeout;

/// Number of condition checks and the pause between two checks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PollBudget {
    pub attempts: u32,
    pub interval: NanosDurationU32,
}

impl PollBudget {
    #[must_use]
    pub const fn new(attempts: u32, interval: NanosDurationU32) -> Self {
        Self { attempts, interval }
    }
}

/// Evaluates `check` until it stops returning `WouldBlock`.
///
/// `check` is evaluated at most `budget.attempts` times (at least once). A
/// `WouldBlock` on the last attempt yields `E::from(Timeout)`; any other
/// error from `check` is returned as is.
pub fn poll<T, E, D, F>(delay: &mut D, budget: PollBudget, mut check: F) -> Result<T, E>
where
    D: DelayNs,
    E: From<Timeout>,
    F: FnMut() -> nb::Result<T, E>,
{
    let interval_ns = budget.interval.to_nanos();
    let mut remaining = budget.attempts.max(1);
    loop {
        match check() {
            Ok(value) => return Ok(value),
            Err(nb::Error::Other(err)) => return Err(err),
            Err(nb::Error::WouldBlock) => {}
        }
        remaining -= 1;
        if remaining == 0 {
            return Err(E::from(Timeout));
        }
        if interval_ns != 0 {
            delay.delay_ns(interval_ns);
        }
    }
}

/// Delay that returns immediately, for tight polling loops.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Busy-loop delay of roughly one `nop` per nanosecond requested.
#[cfg(target_arch = "arm")]
#[derive(Clone, Copy, Debug, Default)]
pub struct SpinDelay;

#[cfg(target_arch = "arm")]
impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        for _ in 0..ns {
            cortex_m::asm::nop();
        }
    }
}
