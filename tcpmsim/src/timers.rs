//! Delay source for the simulator's timed behavior.
use core::future::Future;

/// The timer trait to implement by the hosting application or test harness.
pub trait Timer {
    /// Expire after the specified number of milliseconds.
    fn after_millis(milliseconds: u64) -> impl Future<Output = ()>;
}

/// Kinds of delays the simulator arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DelayType {
    /// VBUS ramp time after a simulated source asserts its CC pull-up.
    VbusRamp,
    /// Processing latency of the simulated peer before a reply is delivered.
    PeerResponse,
}

impl DelayType {
    /// The delay duration in milliseconds.
    pub fn millis(self) -> u64 {
        match self {
            DelayType::VbusRamp => 5,
            DelayType::PeerResponse => 2,
        }
    }

    /// Create a timer future for this delay type.
    pub fn delay<TIMER: Timer>(self) -> impl Future<Output = ()> {
        TIMER::after_millis(self.millis())
    }
}
