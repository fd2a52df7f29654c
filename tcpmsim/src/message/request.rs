//! Request data objects, carried by request messages.
use proc_bitfield::bitfield;
use uom::si::electric_current::centiampere;

use crate::_250milliwatts_mod::_250milliwatts;
use crate::units::{ElectricCurrent, Power};

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// An unclassified request data object; only the position is interpreted.
    pub struct RawDataObject(pub u32): Debug, FromStorage, IntoStorage {
        /// One-based index into the answered capabilities, valid range 1..=7.
        pub object_position: u8 @ 28..=31,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A request against a fixed or variable supply.
    pub struct FixedVariableSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// One-based index into the answered capabilities, valid range 1..=7.
        pub object_position: u8 @ 28..=31,
        /// GiveBack support
        pub giveback_flag: bool @ 27,
        /// Capability mismatch
        pub capability_mismatch: bool @ 26,
        /// USB communications capable
        pub usb_communications_capable: bool @ 25,
        /// No USB suspend
        pub no_usb_suspend: bool @ 24,
        /// Operating current in 10 mA units
        pub raw_operating_current: u16 @ 10..=19,
        /// Maximum operating current in 10 mA units
        pub raw_max_operating_current: u16 @ 0..=9,
    }
}

impl FixedVariableSupply {
    /// The requested operating current.
    pub fn operating_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<centiampere>(self.raw_operating_current().into())
    }

    /// The requested maximum operating current.
    pub fn max_operating_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<centiampere>(self.raw_max_operating_current().into())
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A request against a battery supply.
    pub struct Battery(pub u32): Debug, FromStorage, IntoStorage {
        /// One-based index into the answered capabilities, valid range 1..=7.
        pub object_position: u8 @ 28..=31,
        /// GiveBack support
        pub giveback_flag: bool @ 27,
        /// Capability mismatch
        pub capability_mismatch: bool @ 26,
        /// USB communications capable
        pub usb_communications_capable: bool @ 25,
        /// No USB suspend
        pub no_usb_suspend: bool @ 24,
        /// Operating power in 250 mW units
        pub raw_operating_power: u16 @ 10..=19,
        /// Maximum operating power in 250 mW units
        pub raw_max_operating_power: u16 @ 0..=9,
    }
}

impl Battery {
    /// The requested operating power.
    pub fn operating_power(&self) -> Power {
        Power::new::<_250milliwatts>(self.raw_operating_power().into())
    }

    /// The requested maximum operating power.
    pub fn max_operating_power(&self) -> Power {
        Power::new::<_250milliwatts>(self.raw_max_operating_power().into())
    }
}

/// A classified request data object.
///
/// Classification requires knowledge of the capabilities that the request
/// answers (see [`crate::message::pdo::PdoState`]); without it, the object
/// is kept raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// Request against a fixed or variable supply.
    FixedVariableSupply(FixedVariableSupply),
    /// Request against a battery supply.
    Battery(Battery),
    /// Request whose target supply kind is unknown.
    Unknown(RawDataObject),
}

impl Request {
    /// The one-based object position the request refers to.
    pub fn object_position(&self) -> u8 {
        match self {
            Request::FixedVariableSupply(rdo) => rdo.object_position(),
            Request::Battery(rdo) => rdo.object_position(),
            Request::Unknown(rdo) => rdo.object_position(),
        }
    }
}

impl From<Request> for u32 {
    fn from(value: Request) -> Self {
        match value {
            Request::FixedVariableSupply(rdo) => rdo.0,
            Request::Battery(rdo) => rdo.0,
            Request::Unknown(rdo) => rdo.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use uom::si::electric_current::milliampere;

    use super::*;

    #[test]
    fn fixed_request_units() {
        let rdo = FixedVariableSupply(0)
            .with_object_position(1)
            .with_raw_operating_current(300)
            .with_raw_max_operating_current(300);

        assert_eq!(rdo.operating_current().get::<milliampere>(), 3000);
        assert_eq!(rdo.max_operating_current().get::<milliampere>(), 3000);
        assert_eq!(Request::FixedVariableSupply(rdo).object_position(), 1);
    }
}
