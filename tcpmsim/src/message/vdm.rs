//! Vendor-defined message objects, used for alternate-mode discovery.
use proc_bitfield::bitfield;

use crate::message::ParseError;

/// Standard ID of the PD specification itself.
pub const USB_SID_PD: u16 = 0xff00;
/// Standard ID of the DisplayPort alternate mode.
pub const USB_SID_DISPLAYPORT: u16 = 0xff01;

/// Whether a VDM header is structured or unstructured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VdmType {
    /// Vendor-private payload, ignored by the simulator.
    Unstructured,
    /// Structured VDM with command semantics.
    Structured,
}

impl From<VdmType> for bool {
    fn from(value: VdmType) -> Self {
        match value {
            VdmType::Unstructured => false,
            VdmType::Structured => true,
        }
    }
}

impl From<bool> for VdmType {
    fn from(value: bool) -> Self {
        match value {
            false => VdmType::Unstructured,
            true => VdmType::Structured,
        }
    }
}

/// The command type of a structured VDM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VdmCommandType {
    /// Initiation by the initiator.
    InitiatorReq,
    /// Responder acknowledge.
    ResponderAck,
    /// Responder negative acknowledge.
    ResponderNak,
    /// Responder busy.
    ResponderBusy,
}

impl From<VdmCommandType> for u8 {
    fn from(value: VdmCommandType) -> Self {
        match value {
            VdmCommandType::InitiatorReq => 0,
            VdmCommandType::ResponderAck => 1,
            VdmCommandType::ResponderNak => 2,
            VdmCommandType::ResponderBusy => 3,
        }
    }
}

impl From<u8> for VdmCommandType {
    fn from(value: u8) -> Self {
        match value {
            0 => VdmCommandType::InitiatorReq,
            1 => VdmCommandType::ResponderAck,
            2 => VdmCommandType::ResponderNak,
            _ => VdmCommandType::ResponderBusy,
        }
    }
}

/// Structured VDM commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum VdmCommand {
    DiscoverIdentity,
    DiscoverSvids,
    DiscoverModes,
    EnterMode,
    ExitMode,
    Attention,
    DisplayPortStatus,
    DisplayPortConfig,
}

impl From<VdmCommand> for u8 {
    fn from(value: VdmCommand) -> Self {
        match value {
            VdmCommand::DiscoverIdentity => 0x01,
            VdmCommand::DiscoverSvids => 0x02,
            VdmCommand::DiscoverModes => 0x03,
            VdmCommand::EnterMode => 0x04,
            VdmCommand::ExitMode => 0x05,
            VdmCommand::Attention => 0x06,
            VdmCommand::DisplayPortStatus => 0x10,
            VdmCommand::DisplayPortConfig => 0x11,
        }
    }
}

impl TryFrom<u8> for VdmCommand {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(VdmCommand::DiscoverIdentity),
            0x02 => Ok(VdmCommand::DiscoverSvids),
            0x03 => Ok(VdmCommand::DiscoverModes),
            0x04 => Ok(VdmCommand::EnterMode),
            0x05 => Ok(VdmCommand::ExitMode),
            0x06 => Ok(VdmCommand::Attention),
            0x10 => Ok(VdmCommand::DisplayPortStatus),
            0x11 => Ok(VdmCommand::DisplayPortConfig),
            _ => Err(ParseError::InvalidVdmCommand(value)),
        }
    }
}

bitfield! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// The fields common to both VDM header flavors.
    pub struct VdmHeaderRaw(pub u32): FromStorage, IntoStorage {
        /// VDM standard or vendor ID
        pub standard_or_vid: u16 @ 16..=31,
        /// VDM type (unstructured/structured)
        pub vdm_type: bool [VdmType] @ 15,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    /// A structured VDM header.
    pub struct VdmHeaderStructured(pub u32): Debug, FromStorage, IntoStorage {
        /// VDM standard or vendor ID
        pub standard_or_vid: u16 @ 16..=31,
        /// VDM type (unstructured/structured)
        pub vdm_type: bool [VdmType] @ 15,
        /// Structured VDM version
        pub vdm_version: u8 @ 13..=14,
        /// Object position
        pub object_position: u8 @ 8..=10,
        /// Command type
        pub command_type: u8 [get VdmCommandType, set VdmCommandType] @ 6..=7,
        /// Command
        pub command: u8 [try_get VdmCommand, set VdmCommand] @ 0..=4,
    }
}

impl Default for VdmHeaderStructured {
    fn default() -> Self {
        VdmHeaderStructured(0).with_vdm_type(VdmType::Structured)
    }
}

bitfield! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    /// An unstructured VDM header; payload semantics are vendor-private.
    pub struct VdmHeaderUnstructured(pub u32): FromStorage, IntoStorage {
        /// VDM standard or vendor ID
        pub standard_or_vid: u16 @ 16..=31,
        /// VDM type (unstructured/structured)
        pub vdm_type: bool [VdmType] @ 15,
        /// Vendor-defined payload bits
        pub data: u16 @ 0..=14,
    }
}

/// A classified VDM header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VdmHeader {
    /// Structured VDM.
    Structured(VdmHeaderStructured),
    /// Unstructured VDM.
    Unstructured(VdmHeaderUnstructured),
}

impl From<u32> for VdmHeader {
    fn from(value: u32) -> Self {
        match VdmHeaderRaw(value).vdm_type() {
            VdmType::Structured => VdmHeader::Structured(VdmHeaderStructured(value)),
            VdmType::Unstructured => VdmHeader::Unstructured(VdmHeaderUnstructured(value)),
        }
    }
}

impl From<VdmHeader> for u32 {
    fn from(value: VdmHeader) -> Self {
        match value {
            VdmHeader::Structured(header) => header.0,
            VdmHeader::Unstructured(header) => header.0,
        }
    }
}

/// Product types a discover-identity response can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum ProductType {
    Undefined,
    Hub,
    Peripheral,
    PassiveCable,
    ActiveCable,
    AlternateModeAdapter,
}

impl From<ProductType> for u8 {
    fn from(value: ProductType) -> Self {
        match value {
            ProductType::Undefined => 0b000,
            ProductType::Hub => 0b001,
            ProductType::Peripheral => 0b010,
            ProductType::PassiveCable => 0b011,
            ProductType::ActiveCable => 0b100,
            ProductType::AlternateModeAdapter => 0b101,
        }
    }
}

impl TryFrom<u8> for ProductType {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0b000 => Ok(ProductType::Undefined),
            0b001 => Ok(ProductType::Hub),
            0b010 => Ok(ProductType::Peripheral),
            0b011 => Ok(ProductType::PassiveCable),
            0b100 => Ok(ProductType::ActiveCable),
            0b101 => Ok(ProductType::AlternateModeAdapter),
            _ => Err(ParseError::InvalidProductType(value)),
        }
    }
}

bitfield! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// The identity header VDO of a discover-identity response.
    pub struct VdmIdentityHeader(pub u32): FromStorage, IntoStorage {
        /// Capable of communicating as USB host
        pub usb_host: bool @ 31,
        /// Capable of communicating as USB device
        pub usb_device: bool @ 30,
        /// Product type
        pub product_type: u8 [try_get ProductType, set ProductType] @ 27..=29,
        /// Modal operation supported
        pub modal_supported: bool @ 26,
        /// USB vendor ID
        pub vid: u16 @ 0..=15,
    }
}

bitfield! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// The certification status VDO of a discover-identity response.
    pub struct CertStatVdo(pub u32): FromStorage, IntoStorage {
        /// USB-IF assigned XID
        pub xid: u32 @ 0..=31,
    }
}

bitfield! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// The product VDO of a discover-identity response.
    pub struct ProductVdo(pub u32): FromStorage, IntoStorage {
        /// USB product ID
        pub pid: u16 @ 16..=31,
        /// Device release number, BCD
        pub bcd_device: u16 @ 0..=15,
    }
}

/// VCONN power an alternate-mode adapter requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum AmaVconnPower {
    W1,
    W1_5,
    W2,
    W3,
    W4,
    W5,
    W6,
}

impl From<AmaVconnPower> for u8 {
    fn from(value: AmaVconnPower) -> Self {
        match value {
            AmaVconnPower::W1 => 0b000,
            AmaVconnPower::W1_5 => 0b001,
            AmaVconnPower::W2 => 0b010,
            AmaVconnPower::W3 => 0b011,
            AmaVconnPower::W4 => 0b100,
            AmaVconnPower::W5 => 0b101,
            AmaVconnPower::W6 => 0b110,
        }
    }
}

impl TryFrom<u8> for AmaVconnPower {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0b000 => Ok(AmaVconnPower::W1),
            0b001 => Ok(AmaVconnPower::W1_5),
            0b010 => Ok(AmaVconnPower::W2),
            0b011 => Ok(AmaVconnPower::W3),
            0b100 => Ok(AmaVconnPower::W4),
            0b101 => Ok(AmaVconnPower::W5),
            0b110 => Ok(AmaVconnPower::W6),
            _ => Err(ParseError::InvalidVconnPower(value)),
        }
    }
}

/// Superspeed signaling support of an alternate-mode adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum AmaUsbSuperspeed {
    Usb20Only,
    Usb31Gen1,
    Usb31Gen2,
    Usb20BillboardOnly,
}

impl From<AmaUsbSuperspeed> for u8 {
    fn from(value: AmaUsbSuperspeed) -> Self {
        match value {
            AmaUsbSuperspeed::Usb20Only => 0b000,
            AmaUsbSuperspeed::Usb31Gen1 => 0b001,
            AmaUsbSuperspeed::Usb31Gen2 => 0b010,
            AmaUsbSuperspeed::Usb20BillboardOnly => 0b011,
        }
    }
}

impl TryFrom<u8> for AmaUsbSuperspeed {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0b000 => Ok(AmaUsbSuperspeed::Usb20Only),
            0b001 => Ok(AmaUsbSuperspeed::Usb31Gen1),
            0b010 => Ok(AmaUsbSuperspeed::Usb31Gen2),
            0b011 => Ok(AmaUsbSuperspeed::Usb20BillboardOnly),
            _ => Err(ParseError::InvalidSuperspeedSupport(value)),
        }
    }
}

bitfield! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// The alternate-mode adapter VDO of a discover-identity response.
    pub struct AmaVdo(pub u32): FromStorage, IntoStorage {
        /// Hardware version
        pub hw_version: u8 @ 28..=31,
        /// Firmware version
        pub fw_version: u8 @ 24..=27,
        /// SSTX1 directionality (fixed/configurable)
        pub sstx1_configurable: bool @ 11,
        /// SSTX2 directionality (fixed/configurable)
        pub sstx2_configurable: bool @ 10,
        /// SSRX1 directionality (fixed/configurable)
        pub ssrx1_configurable: bool @ 9,
        /// SSRX2 directionality (fixed/configurable)
        pub ssrx2_configurable: bool @ 8,
        /// Required VCONN power
        pub vconn_power: u8 [try_get AmaVconnPower, set AmaVconnPower] @ 5..=7,
        /// VCONN required
        pub vconn_required: bool @ 4,
        /// VBUS required
        pub vbus_required: bool @ 3,
        /// Superspeed signaling support
        pub usb_superspeed: u8 [try_get AmaUsbSuperspeed, set AmaUsbSuperspeed] @ 0..=2,
    }
}

bitfield! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// One VDO of a discover-SVIDs response, carrying two SVIDs.
    pub struct SvidListVdo(pub u32): FromStorage, IntoStorage {
        /// First SVID, zero if unused
        pub svid0: u16 @ 16..=31,
        /// Second SVID, zero if unused
        pub svid1: u16 @ 0..=15,
    }
}

/// DisplayPort pin assignment masks.
#[allow(missing_docs)]
pub mod dp_pin {
    pub const PIN_A: u8 = 0x01;
    pub const PIN_B: u8 = 0x02;
    pub const PIN_C: u8 = 0x04;
    pub const PIN_D: u8 = 0x08;
    pub const PIN_E: u8 = 0x10;
}

/// DisplayPort signaling rate: DP 1.3.
pub const DP_SIGNALING_DP13: u8 = 0x1;

/// Port capability of a DisplayPort mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum DisplayPortCapability {
    Reserved,
    UfpD,
    DfpD,
    Both,
}

impl From<DisplayPortCapability> for u8 {
    fn from(value: DisplayPortCapability) -> Self {
        match value {
            DisplayPortCapability::Reserved => 0b00,
            DisplayPortCapability::UfpD => 0b01,
            DisplayPortCapability::DfpD => 0b10,
            DisplayPortCapability::Both => 0b11,
        }
    }
}

impl From<u8> for DisplayPortCapability {
    fn from(value: u8) -> Self {
        match value {
            0b01 => DisplayPortCapability::UfpD,
            0b10 => DisplayPortCapability::DfpD,
            0b11 => DisplayPortCapability::Both,
            _ => DisplayPortCapability::Reserved,
        }
    }
}

bitfield! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// One mode VDO of a DisplayPort discover-modes response.
    pub struct DisplayPortCapabilities(pub u32): FromStorage, IntoStorage {
        /// UFP_D pin assignments supported
        pub ufp_d_pin_assignments: u8 @ 16..=23,
        /// DFP_D pin assignments supported
        pub dfp_d_pin_assignments: u8 @ 8..=15,
        /// USB r2.0 signaling not used
        pub usb20_signalling_not_used: bool @ 7,
        /// Receptacle indication
        pub receptacle_indication: bool @ 6,
        /// Signaling for transport of DisplayPort protocol
        pub signaling_rate: u8 @ 2..=5,
        /// Port capability
        pub capability: u8 [get DisplayPortCapability, set DisplayPortCapability] @ 0..=1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_classification_follows_type_bit() {
        let structured = u32::from(
            VdmHeaderStructured::default()
                .with_standard_or_vid(USB_SID_PD)
                .with_command(VdmCommand::DiscoverIdentity),
        );
        assert!(matches!(VdmHeader::from(structured), VdmHeader::Structured(_)));

        let unstructured = 0x5ac0_1234;
        assert!(matches!(VdmHeader::from(unstructured), VdmHeader::Unstructured(_)));
    }

    #[test]
    fn reserved_command_is_rejected() {
        // Structured type bit set, command field holding a reserved value.
        let header = VdmHeaderStructured(0x8000 | 0x1f);
        assert!(header.command().is_err());
    }
}
