//! USB PD port-partner simulator traits.
//!
//! Defines the contract between a simulated port controller and the Type-C
//! Port Manager that drives it: plain wire-level types, the
//! [`PortController`] operations the Port Manager calls, and the
//! [`PortManager`] callbacks the simulator raises.
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

/// Maximum number of 32 bit data objects in a PD message.
pub const PD_MAX_OBJECTS: usize = 7;

/// A raw PD message, as exchanged between port controller and Port Manager.
///
/// The header encodes the number of valid entries in `objects`.
/// Wire-level framing and CRC are assumed to be handled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdMessage {
    /// The 16 bit message header.
    pub header: u16,
    /// Data objects; entries beyond the header's object count are unused.
    pub objects: [u32; PD_MAX_OBJECTS],
}

impl PdMessage {
    /// Create a message from a header and its data objects.
    ///
    /// Panics if `objects` holds more than [`PD_MAX_OBJECTS`] entries.
    pub fn new(header: u16, objects: &[u32]) -> Self {
        let mut message = Self {
            header,
            objects: [0; PD_MAX_OBJECTS],
        };
        message.objects[..objects.len()].copy_from_slice(objects);
        message
    }

    /// The number of valid data objects, as encoded in the header.
    pub fn object_count(&self) -> usize {
        usize::from((self.header >> 12) & 0x7)
    }

    /// The valid data objects.
    pub fn objects(&self) -> &[u32] {
        &self.objects[..self.object_count()]
    }
}

/// Status of a CC line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcStatus {
    /// Line is open (no termination).
    Open,
    /// Powered-cable termination.
    Ra,
    /// Sink pull-down.
    Rd,
    /// Source pull-up, default USB current.
    RpDefault,
    /// Source pull-up, 1.5 A.
    Rp1A5,
    /// Source pull-up, 3.0 A.
    Rp3A0,
}

/// Plug orientation, named after the CC line in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcPolarity {
    /// CC1 carries the configuration channel.
    Cc1,
    /// CC2 carries the configuration channel.
    Cc2,
}

/// The power role of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerRole {
    /// Consumes power.
    Sink,
    /// Provides power.
    Source,
}

impl From<bool> for PowerRole {
    fn from(value: bool) -> Self {
        match value {
            false => Self::Sink,
            true => Self::Source,
        }
    }
}

impl From<PowerRole> for bool {
    fn from(role: PowerRole) -> bool {
        match role {
            PowerRole::Sink => false,
            PowerRole::Source => true,
        }
    }
}

/// The data role of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataRole {
    /// Upstream-facing port (device).
    Ufp,
    /// Downstream-facing port (host).
    Dfp,
}

impl From<bool> for DataRole {
    fn from(value: bool) -> Self {
        match value {
            false => Self::Ufp,
            true => Self::Dfp,
        }
    }
}

impl From<DataRole> for bool {
    fn from(role: DataRole) -> bool {
        match role {
            DataRole::Ufp => false,
            DataRole::Dfp => true,
        }
    }
}

/// Framing type of a transmission.
///
/// Hard reset and cable reset are signaling events that carry no message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SopType {
    /// Start of packet, port-to-port communication.
    Sop,
    /// SOP', cable plug communication.
    SopPrime,
    /// SOP'', far-end cable plug communication.
    SopDoublePrime,
    /// Debug SOP'.
    SopDebugPrime,
    /// Debug SOP''.
    SopDebugDoublePrime,
    /// Hard reset signaling.
    HardReset,
    /// Cable reset signaling.
    CableReset,
    /// BIST carrier mode 2.
    BistMode2,
}

/// Outcome of a transmission, reported back to the Port Manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransmitStatus {
    /// The port partner acknowledged the message.
    Success,
    /// The message was dropped, e.g. due to an incoming message.
    Discarded,
    /// Transmission failed.
    Failed,
}

/// Operations a port controller exposes to the Port Manager.
///
/// All operations are fire-and-forget: they record intent and return without
/// blocking. State queries report the most recent snapshot.
pub trait PortController {
    /// Initialize the controller.
    fn init(&self);

    /// Query VBUS presence.
    fn vbus_present(&self) -> bool;

    /// Enable or disable sourcing and sinking of VBUS.
    fn set_vbus(&self, source: bool, sink: bool);

    /// Query the status of both CC lines.
    fn cc_status(&self) -> (CcStatus, CcStatus);

    /// Apply a pull resistor configuration to the CC lines.
    fn set_cc(&self, pull: CcStatus);

    /// Start dual-role toggling between the given pull and its complement.
    fn start_toggling(&self, pull: CcStatus);

    /// Select the plug orientation.
    fn set_polarity(&self, polarity: CcPolarity);

    /// Enable or disable VCONN sourcing.
    fn set_vconn(&self, enable: bool);

    /// Inform the controller about attachment state and negotiated roles.
    fn set_roles(&self, attached: bool, power_role: PowerRole, data_role: DataRole);

    /// Enable or disable PD message reception.
    fn set_pd_rx(&self, enable: bool);

    /// Transmit a message, or signal a reset for message-less framing types.
    fn pd_transmit(&self, sop_type: SopType, message: Option<&PdMessage>);
}

/// Callbacks a port controller raises towards the Port Manager.
///
/// Raised from the controller's own execution context; implementations may
/// call back into the [`PortController`] immediately.
pub trait PortManager {
    /// A CC line status changed.
    fn cc_change(&self);

    /// VBUS presence changed.
    fn vbus_change(&self);

    /// A message was received from the port partner.
    fn pd_receive(&self, message: &PdMessage);

    /// A previously requested transmission completed.
    fn pd_transmit_complete(&self, status: TransmitStatus);

    /// The port partner signaled a hard reset.
    fn pd_hard_reset(&self);

    /// The controller performed a full reset and lost its configuration.
    fn tcpc_reset(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_count_follows_header() {
        let message = PdMessage::new(0x1042, &[0xff]);
        assert_eq!(message.object_count(), 1);
        assert_eq!(message.objects(), &[0xff]);

        // Control message, no objects.
        let message = PdMessage::new(0x0041, &[]);
        assert_eq!(message.object_count(), 0);
        assert!(message.objects().is_empty());
    }
}
