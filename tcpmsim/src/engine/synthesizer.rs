//! Builders for the messages the simulated peer originates.
//!
//! All field values are fixed and deterministic; they describe a DisplayPort
//! capable, dual-role device that is just complete enough to satisfy a
//! generic Port Manager's negotiation and discovery sequences. Every staged
//! message consumes one message ID.
use heapless::Vec;
use tcpmsim_traits::{DataRole, PowerRole};

use super::Shared;
use crate::message::header::{ControlMessageType, DataMessageType, Header, SpecificationRevision};
use crate::message::pdo::{FixedSupply, PowerDataObject, SinkCapabilities, SourceCapabilities};
use crate::message::request::{self, Request};
use crate::message::vdm::{
    self, AmaUsbSuperspeed, AmaVconnPower, DisplayPortCapability, ProductType, VdmCommand, VdmCommandType, VdmHeader,
    VdmHeaderStructured,
};
use crate::message::{Data, Message};

/// Current the simulated sink requests, in 10 mA units (1.5 A).
const SINK_REQUEST_CURRENT: u16 = 150;
/// Current the simulated sink advertises, in 10 mA units (2 A).
const SINK_CAPABILITY_CURRENT: u16 = 200;
/// Current the simulated source advertises, in 10 mA units (3 A).
const SOURCE_CAPABILITY_CURRENT: u16 = 300;
/// Supply voltage of both roles, in 50 mV units (5 V).
const SUPPLY_VOLTAGE: u16 = 100;

/// USB vendor and product identity of the simulated device.
const IDENTITY_VID: u16 = 0x2109;
const IDENTITY_PID: u16 = 0x0101;
const IDENTITY_BCD_DEVICE: u16 = 0x0001;

impl Shared {
    fn sink_header_template() -> Header {
        Header::new_template(DataRole::Ufp, PowerRole::Sink, SpecificationRevision::R2_0)
    }

    fn source_header_template() -> Header {
        Header::new_template(DataRole::Dfp, PowerRole::Source, SpecificationRevision::R2_0)
    }

    /// Stage a message as the next one "received" from the simulated peer.
    ///
    /// Replaces any previously staged message; delivery happens once the
    /// response latency elapses.
    fn stage(&mut self, message: Message) {
        trace!("stage {:?}", message.header.message_type());
        self.outbound = message.to_raw();
        self.requests.deliver = true;
    }

    fn stage_control(&mut self, template: Header, message_type: ControlMessageType) {
        let header = Header::new_control(template, self.message_id.next(), message_type);
        self.stage(Message::new(header));
    }

    /// Request against the first capability: fixed supply, 1.5 A.
    pub(super) fn stage_sink_request(&mut self) {
        let rdo = request::FixedVariableSupply(0)
            .with_object_position(1)
            .with_raw_operating_current(SINK_REQUEST_CURRENT)
            .with_raw_max_operating_current(SINK_REQUEST_CURRENT)
            .with_usb_communications_capable(true);

        let header = Header::new_data(
            Self::sink_header_template(),
            self.message_id.next(),
            DataMessageType::Request,
            1,
        );
        self.stage(Message::new_with_data(
            header,
            Data::Request(Request::FixedVariableSupply(rdo)),
        ));
    }

    /// Sink capability report: one fixed 5 V / 2 A supply.
    pub(super) fn stage_sink_capabilities(&mut self) {
        let pdo = PowerDataObject::FixedSupply(
            FixedSupply::new()
                .with_raw_voltage(SUPPLY_VOLTAGE)
                .with_raw_max_current(SINK_CAPABILITY_CURRENT)
                .with_usb_communications_capable(true),
        );

        let header = Header::new_data(
            Self::sink_header_template(),
            self.message_id.next(),
            DataMessageType::SinkCapabilities,
            1,
        );
        self.stage(Message::new_with_data(
            header,
            Data::SinkCapabilities(SinkCapabilities([pdo].into_iter().collect())),
        ));
    }

    /// Source capability advertisement: one fixed 5 V / 3 A supply with
    /// dual-role, external-power, USB-comm and data-swap flags.
    pub(super) fn stage_source_capabilities(&mut self) {
        let pdo = PowerDataObject::FixedSupply(
            FixedSupply::new()
                .with_raw_voltage(SUPPLY_VOLTAGE)
                .with_raw_max_current(SOURCE_CAPABILITY_CURRENT)
                .with_dual_role_power(true)
                .with_unconstrained_power(true)
                .with_usb_communications_capable(true)
                .with_dual_role_data(true),
        );
        let capabilities = SourceCapabilities([pdo].into_iter().collect());

        // Remember our own advertisement, so a later request against it can
        // be classified.
        self.kind_cache.record(capabilities.pdos());

        let header = Header::new_data(
            Self::source_header_template(),
            self.message_id.next(),
            DataMessageType::SourceCapabilities,
            1,
        );
        self.stage(Message::new_with_data(header, Data::SourceCapabilities(capabilities)));
    }

    pub(super) fn stage_accept(&mut self) {
        self.stage_control(Self::source_header_template(), ControlMessageType::Accept);
    }

    pub(super) fn stage_power_ready(&mut self) {
        self.stage_control(Self::source_header_template(), ControlMessageType::PsRdy);
    }

    fn vdm_reply_header(svid: u16, command: VdmCommand) -> VdmHeaderStructured {
        VdmHeaderStructured::default()
            .with_standard_or_vid(svid)
            .with_command_type(VdmCommandType::ResponderAck)
            .with_command(command)
    }

    /// Discover-identity acknowledge: a modal alternate-mode adapter.
    pub(super) fn stage_discover_identity_reply(&mut self) {
        let identity = vdm::VdmIdentityHeader(0)
            .with_usb_device(true)
            .with_product_type(ProductType::AlternateModeAdapter)
            .with_modal_supported(true)
            .with_vid(IDENTITY_VID);
        let cert_stat = vdm::CertStatVdo(0);
        let product = vdm::ProductVdo(0)
            .with_pid(IDENTITY_PID)
            .with_bcd_device(IDENTITY_BCD_DEVICE);
        let ama = vdm::AmaVdo(0)
            .with_vconn_power(AmaVconnPower::W1_5)
            .with_vconn_required(true)
            .with_vbus_required(true)
            .with_usb_superspeed(AmaUsbSuperspeed::Usb20BillboardOnly);

        let vdos: Vec<u32, 6> = [identity.0, cert_stat.0, product.0, ama.0].into_iter().collect();
        let header = Header::new_data(
            Self::sink_header_template(),
            self.message_id.next(),
            DataMessageType::VendorDefined,
            5,
        );
        self.stage(Message::new_with_data(
            header,
            Data::VendorDefined((
                VdmHeader::Structured(Self::vdm_reply_header(vdm::USB_SID_PD, VdmCommand::DiscoverIdentity)),
                vdos,
            )),
        ));
    }

    /// Discover-SVIDs acknowledge, advertising the DisplayPort SVID.
    pub(super) fn stage_discover_svids_reply(&mut self) {
        let svids = vdm::SvidListVdo(0).with_svid0(vdm::USB_SID_DISPLAYPORT);

        let vdos: Vec<u32, 6> = [svids.0].into_iter().collect();
        let header = Header::new_data(
            Self::sink_header_template(),
            self.message_id.next(),
            DataMessageType::VendorDefined,
            2,
        );
        self.stage(Message::new_with_data(
            header,
            Data::VendorDefined((
                VdmHeader::Structured(Self::vdm_reply_header(vdm::USB_SID_PD, VdmCommand::DiscoverSvids)),
                vdos,
            )),
        ));
    }

    /// Discover-modes acknowledge for DisplayPort: one UFP_D pin-C mode.
    ///
    /// Mode discovery for any other SVID stays unanswered.
    pub(super) fn stage_discover_modes_reply(&mut self, svid: u16) {
        if svid != vdm::USB_SID_DISPLAYPORT {
            return;
        }

        let mode = vdm::DisplayPortCapabilities(0)
            .with_ufp_d_pin_assignments(vdm::dp_pin::PIN_C)
            .with_receptacle_indication(true)
            .with_signaling_rate(vdm::DP_SIGNALING_DP13)
            .with_capability(DisplayPortCapability::UfpD);

        let vdos: Vec<u32, 6> = [mode.0].into_iter().collect();
        let header = Header::new_data(
            Self::sink_header_template(),
            self.message_id.next(),
            DataMessageType::VendorDefined,
            2,
        );
        self.stage(Message::new_with_data(
            header,
            Data::VendorDefined((
                VdmHeader::Structured(Self::vdm_reply_header(vdm::USB_SID_DISPLAYPORT, VdmCommand::DiscoverModes)),
                vdos,
            )),
        ));
    }
}
