//! Software USB PD port-partner simulator.
//!
//! Presents a port-controller interface to a Type-C Port Manager and
//! fabricates the timed message sequence of a plausible sink or source
//! partner, so the Port Manager's protocol engine can be exercised without
//! hardware.
//!
//! The operator selects the simulated role through [`engine::PortSimulator`];
//! the Port Manager drives the simulator through the
//! [`tcpmsim_traits::PortController`] operations and observes it through
//! [`tcpmsim_traits::PortManager`] callbacks.
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

// This mod must go first, so that the others see its macros.
mod fmt;

pub mod counters;
pub mod decode;
pub mod engine;
pub mod message;
pub mod timers;

#[cfg(test)]
mod dummy;

#[macro_use]
extern crate uom;

/// Unit types used by message accessors.
pub mod units {
    pub use uom::si::u32::{ElectricCurrent, ElectricPotential, Power};
}

pub(crate) mod _50millivolts_mod {
    unit! {
        system: uom::si;
        quantity: uom::si::electric_potential;

        @_50millivolts: 0.05; "50 mV", "50 millivolt", "50 millivolts";
    }
}

pub(crate) mod _250milliwatts_mod {
    unit! {
        system: uom::si;
        quantity: uom::si::power;

        @_250milliwatts: 0.25; "250 mW", "250 milliwatt", "250 milliwatts";
    }
}

/// Simulated port-partner behavior, selected by the operator.
///
/// `Reset` is only ever requested: it tears the session down like `None`,
/// but additionally reports a full controller reset to the Port Manager.
/// The active mode collapses to `None` once teardown completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SimulatorMode {
    /// No simulated partner attached.
    None,
    /// Tear down the session and report a controller reset.
    Reset,
    /// Simulate a sink partner.
    Sink,
    /// Simulate a source partner.
    Source,
}

impl core::str::FromStr for SimulatorMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim_end_matches('\n') {
            "none" => Ok(Self::None),
            "reset" => Ok(Self::Reset),
            "snk" => Ok(Self::Sink),
            "src" => Ok(Self::Source),
            _ => Err(Error::UnknownMode),
        }
    }
}

impl core::fmt::Display for SimulatorMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Reset => "reset",
            Self::Sink => "snk",
            Self::Source => "src",
        })
    }
}

/// Errors reported synchronously to the operator.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The mode string is not one of `none`, `reset`, `snk` or `src`.
    #[error("unrecognized simulator mode")]
    UnknownMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trip() {
        for mode in [
            SimulatorMode::None,
            SimulatorMode::Reset,
            SimulatorMode::Sink,
            SimulatorMode::Source,
        ] {
            let formatted = std::format!("{mode}");
            assert_eq!(formatted.parse::<SimulatorMode>().unwrap(), mode);
        }
    }

    #[test]
    fn mode_parse_rejects_garbage() {
        assert_eq!("dfp".parse::<SimulatorMode>(), Err(Error::UnknownMode));
        assert_eq!("".parse::<SimulatorMode>(), Err(Error::UnknownMode));
    }

    #[test]
    fn mode_parse_tolerates_trailing_newline() {
        // Operator interfaces commonly deliver a trailing newline.
        assert_eq!("snk\n".parse::<SimulatorMode>().unwrap(), SimulatorMode::Sink);
    }
}
