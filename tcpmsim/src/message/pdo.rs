//! Power data objects, carried by capability messages.
use heapless::Vec;
use proc_bitfield::bitfield;
use uom::si::electric_current::centiampere;

use crate::_50millivolts_mod::_50millivolts;
use crate::_250milliwatts_mod::_250milliwatts;
use crate::units::{ElectricCurrent, ElectricPotential, Power};

/// Kinds of supplies that can be reported within capabilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Kind {
    /// Fixed voltage supply.
    FixedSupply,
    /// Battery supply.
    Battery,
    /// Variable voltage supply.
    VariableSupply,
}

/// Lookup of the supply kind at an object position of previously observed
/// capabilities.
///
/// A request data object only carries an index into the capabilities it
/// answers, so its layout can only be known from context.
pub trait PdoState {
    /// The supply kind at a one-based object position, if known.
    fn pdo_at_object_position(&self, position: u8) -> Option<Kind>;
}

impl PdoState for () {
    fn pdo_at_object_position(&self, _position: u8) -> Option<Kind> {
        None
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// An unclassified power data object; only the kind field is interpreted.
    pub struct RawPowerDataObject(pub u32): Debug, FromStorage, IntoStorage {
        /// Supply kind discriminator.
        pub kind: u8 @ 30..=31,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A fixed supply power data object.
    pub struct FixedSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// Fixed supply
        pub kind: u8 @ 30..=31,
        /// Dual-role power
        pub dual_role_power: bool @ 29,
        /// USB suspend supported (source) / higher capability (sink)
        pub usb_suspend_supported: bool @ 28,
        /// Unconstrained (externally powered) supply
        pub unconstrained_power: bool @ 27,
        /// USB communications capable
        pub usb_communications_capable: bool @ 26,
        /// Dual-role data
        pub dual_role_data: bool @ 25,
        /// Peak current capability
        pub peak_current: u8 @ 20..=21,
        /// Voltage in 50 mV units
        pub raw_voltage: u16 @ 10..=19,
        /// Maximum current in 10 mA units
        pub raw_max_current: u16 @ 0..=9,
    }
}

impl Default for FixedSupply {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedSupply {
    /// Create an empty fixed supply object.
    pub fn new() -> Self {
        Self(0)
    }

    /// The supply voltage.
    pub fn voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_voltage().into())
    }

    /// The maximum supply current.
    pub fn max_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<centiampere>(self.raw_max_current().into())
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A battery supply power data object.
    pub struct Battery(pub u32): Debug, FromStorage, IntoStorage {
        /// Battery
        pub kind: u8 @ 30..=31,
        /// Maximum voltage in 50 mV units
        pub raw_max_voltage: u16 @ 20..=29,
        /// Minimum voltage in 50 mV units
        pub raw_min_voltage: u16 @ 10..=19,
        /// Maximum allowable power in 250 mW units
        pub raw_max_power: u16 @ 0..=9,
    }
}

impl Battery {
    /// The maximum supply voltage.
    pub fn max_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_max_voltage().into())
    }

    /// The minimum supply voltage.
    pub fn min_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_min_voltage().into())
    }

    /// The maximum allowable power.
    pub fn max_power(&self) -> Power {
        Power::new::<_250milliwatts>(self.raw_max_power().into())
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A variable (non-battery) supply power data object.
    pub struct VariableSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// Variable supply
        pub kind: u8 @ 30..=31,
        /// Maximum voltage in 50 mV units
        pub raw_max_voltage: u16 @ 20..=29,
        /// Minimum voltage in 50 mV units
        pub raw_min_voltage: u16 @ 10..=19,
        /// Maximum current in 10 mA units
        pub raw_max_current: u16 @ 0..=9,
    }
}

impl VariableSupply {
    /// The maximum supply voltage.
    pub fn max_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_max_voltage().into())
    }

    /// The minimum supply voltage.
    pub fn min_voltage(&self) -> ElectricPotential {
        ElectricPotential::new::<_50millivolts>(self.raw_min_voltage().into())
    }

    /// The maximum supply current.
    pub fn max_current(&self) -> ElectricCurrent {
        ElectricCurrent::new::<centiampere>(self.raw_max_current().into())
    }
}

/// A classified power data object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerDataObject {
    /// Fixed voltage supply.
    FixedSupply(FixedSupply),
    /// Battery supply.
    Battery(Battery),
    /// Variable voltage supply.
    VariableSupply(VariableSupply),
    /// Unrecognized supply kind, kept raw.
    Unknown(RawPowerDataObject),
}

impl PowerDataObject {
    /// Classify a raw 32 bit power data object.
    pub fn from_raw(value: u32) -> Self {
        let raw = RawPowerDataObject(value);
        match raw.kind() {
            0b00 => PowerDataObject::FixedSupply(FixedSupply(value)),
            0b01 => PowerDataObject::Battery(Battery(value)),
            0b10 => PowerDataObject::VariableSupply(VariableSupply(value)),
            _ => {
                trace!("Unknown power data object kind {}", raw.kind());
                PowerDataObject::Unknown(raw)
            }
        }
    }

    /// The supply kind, if recognized.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            PowerDataObject::FixedSupply(_) => Some(Kind::FixedSupply),
            PowerDataObject::Battery(_) => Some(Kind::Battery),
            PowerDataObject::VariableSupply(_) => Some(Kind::VariableSupply),
            PowerDataObject::Unknown(_) => None,
        }
    }
}

impl From<PowerDataObject> for u32 {
    fn from(value: PowerDataObject) -> Self {
        match value {
            PowerDataObject::FixedSupply(pdo) => pdo.0,
            PowerDataObject::Battery(pdo) => pdo.0,
            PowerDataObject::VariableSupply(pdo) => pdo.0,
            PowerDataObject::Unknown(pdo) => pdo.0,
        }
    }
}

/// Source capabilities, an ordered list of power data objects.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SourceCapabilities(pub Vec<PowerDataObject, 7>);

impl SourceCapabilities {
    /// The mandatory vSafe5V supply, if present at the first position.
    pub fn vsafe_5v(&self) -> Option<&FixedSupply> {
        self.0.first().and_then(|supply| {
            if let PowerDataObject::FixedSupply(supply) = supply {
                Some(supply)
            } else {
                None
            }
        })
    }

    /// Get power data objects (PDOs) from the source.
    pub fn pdos(&self) -> &[PowerDataObject] {
        &self.0
    }
}

impl PdoState for SourceCapabilities {
    fn pdo_at_object_position(&self, position: u8) -> Option<Kind> {
        self.pdos()
            .get(position.saturating_sub(1) as usize)
            .and_then(PowerDataObject::kind)
    }
}

/// Sink capabilities, an ordered list of power data objects.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SinkCapabilities(pub Vec<PowerDataObject, 7>);

impl SinkCapabilities {
    /// Get power data objects (PDOs) from the sink.
    pub fn pdos(&self) -> &[PowerDataObject] {
        &self.0
    }
}

/// Per-object-position cache of observed capability kinds.
///
/// Filled whenever a capabilities message passes through the simulator, in
/// either direction, and consulted to classify later request objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdoKindCache {
    kinds: [Option<Kind>; tcpmsim_traits::PD_MAX_OBJECTS],
}

impl PdoKindCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the kinds of a capability object list.
    pub fn record(&mut self, pdos: &[PowerDataObject]) {
        for (slot, pdo) in self.kinds.iter_mut().zip(pdos) {
            *slot = pdo.kind();
        }
    }

    /// Forget all recorded kinds.
    pub fn clear(&mut self) {
        self.kinds = Default::default();
    }
}

impl PdoState for PdoKindCache {
    fn pdo_at_object_position(&self, position: u8) -> Option<Kind> {
        self.kinds
            .get(position.saturating_sub(1) as usize)
            .copied()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use uom::si::electric_current::milliampere;
    use uom::si::electric_potential::millivolt;

    use super::*;

    #[test]
    fn fixed_supply_units() {
        let pdo = FixedSupply::new().with_raw_voltage(100).with_raw_max_current(300);

        assert_eq!(pdo.voltage().get::<millivolt>(), 5000);
        assert_eq!(pdo.max_current().get::<milliampere>(), 3000);
    }

    #[test]
    fn classification_follows_kind_bits() {
        assert!(matches!(
            PowerDataObject::from_raw(0x0001_9096),
            PowerDataObject::FixedSupply(_)
        ));
        assert!(matches!(
            PowerDataObject::from_raw(0x4000_0000),
            PowerDataObject::Battery(_)
        ));
        assert!(matches!(
            PowerDataObject::from_raw(0x8000_0000),
            PowerDataObject::VariableSupply(_)
        ));
        assert!(matches!(
            PowerDataObject::from_raw(0xC000_0000),
            PowerDataObject::Unknown(_)
        ));
    }

    #[test]
    fn kind_cache_uses_one_based_positions() {
        let mut cache = PdoKindCache::new();
        cache.record(&[PowerDataObject::from_raw(0x0001_9096)]);

        assert_eq!(cache.pdo_at_object_position(1), Some(Kind::FixedSupply));
        assert_eq!(cache.pdo_at_object_position(0), None);
        assert_eq!(cache.pdo_at_object_position(2), None);

        cache.clear();
        assert_eq!(cache.pdo_at_object_position(1), None);
    }
}
