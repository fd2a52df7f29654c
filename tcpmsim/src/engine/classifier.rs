//! Reaction of the simulated peer to messages the Port Manager transmits.
//!
//! The peer is deliberately tolerant: everything it does not understand is
//! absorbed without a reaction, and protocol violations are answered the way
//! a real partner would answer them, with a hard reset rather than an error.
use tcpmsim_traits::{PdMessage, SopType, TransmitStatus};

use super::state_machine::SimState;
use super::{Notification, Notifications, Shared};
use crate::SimulatorMode;
use crate::message::header::{ControlMessageType, DataMessageType, MessageType};
use crate::message::vdm::{VdmCommand, VdmCommandType, VdmHeader};
use crate::message::{Data, Message};

impl Shared {
    /// Consume a pending transmission and decide the peer's reaction.
    ///
    /// Reports the transmit completion for the consumed message; the
    /// reaction itself, if any, is staged for delayed delivery or folded
    /// into the state machine.
    pub(super) fn handle_transmit(&mut self, notifications: &mut Notifications) {
        if !self.requests.process {
            return;
        }
        self.requests.process = false;

        let sop_type = self.tx_sop_type;
        let message = self.tx_message.take();

        let status = match self.mode {
            SimulatorMode::Sink | SimulatorMode::Source => TransmitStatus::Success,
            _ => TransmitStatus::Failed,
        };

        match self.mode {
            SimulatorMode::Sink => self.react_as_sink(sop_type, message, notifications),
            SimulatorMode::Source => self.react_as_source(sop_type, message, notifications),
            _ => (),
        }

        _ = notifications.push(Notification::TransmitComplete(status));
    }

    fn react_as_sink(&mut self, sop_type: SopType, message: Option<PdMessage>, notifications: &mut Notifications) {
        if sop_type == SopType::HardReset {
            // The reset itself, not a reaction to one: reset silently.
            self.local_reset();
            return;
        }
        if sop_type != SopType::Sop {
            return;
        }
        let Some(raw) = message else {
            return;
        };

        let cache = self.kind_cache;
        let message = Message::parse(&raw, &cache);

        match message.header.message_type() {
            MessageType::Control(control) => match control {
                ControlMessageType::GoodCRC
                | ControlMessageType::GotoMin
                | ControlMessageType::Accept
                | ControlMessageType::Ping
                | ControlMessageType::PsRdy
                | ControlMessageType::Wait => (),

                ControlMessageType::Reject
                | ControlMessageType::GetSourceCap
                | ControlMessageType::DrSwap
                | ControlMessageType::PrSwap
                | ControlMessageType::VconnSwap => self.peer_hard_reset(notifications),

                ControlMessageType::GetSinkCap => self.stage_sink_capabilities(),
                ControlMessageType::SoftReset => self.message_id.reset(),
                ControlMessageType::Reserved => (),
            },
            MessageType::Data(data) => match data {
                DataMessageType::SourceCapabilities => {
                    if let Some(Data::SourceCapabilities(capabilities)) = &message.data {
                        self.kind_cache.record(capabilities.pdos());
                    }
                    self.stage_sink_request();
                }
                DataMessageType::Request | DataMessageType::SinkCapabilities => self.peer_hard_reset(notifications),
                DataMessageType::Bist => (),
                DataMessageType::VendorDefined => self.react_to_vdm_as_sink(&message),
                DataMessageType::Reserved => (),
            },
        }
    }

    /// Alternate-mode discovery: only structured initiation commands are
    /// answered; ACK/NAK/BUSY echoes and unstructured VDMs are ignored.
    fn react_to_vdm_as_sink(&mut self, message: &Message) {
        let Some(Data::VendorDefined((vdm_header, _))) = &message.data else {
            return;
        };
        let VdmHeader::Structured(structured) = vdm_header else {
            return;
        };
        if structured.command_type() != VdmCommandType::InitiatorReq {
            return;
        }

        match structured.command() {
            Ok(VdmCommand::DiscoverIdentity) => self.stage_discover_identity_reply(),
            Ok(VdmCommand::DiscoverSvids) => self.stage_discover_svids_reply(),
            Ok(VdmCommand::DiscoverModes) => self.stage_discover_modes_reply(structured.standard_or_vid()),
            _ => (),
        }
    }

    fn react_as_source(&mut self, sop_type: SopType, message: Option<PdMessage>, notifications: &mut Notifications) {
        if sop_type == SopType::HardReset {
            self.local_reset();
            return;
        }
        if sop_type != SopType::Sop {
            return;
        }
        let Some(raw) = message else {
            return;
        };

        let cache = self.kind_cache;
        let message = Message::parse(&raw, &cache);

        match message.header.message_type() {
            MessageType::Control(control) => match control {
                ControlMessageType::GoodCRC
                | ControlMessageType::GotoMin
                | ControlMessageType::Ping
                | ControlMessageType::PsRdy
                | ControlMessageType::Wait => (),

                ControlMessageType::Accept
                | ControlMessageType::Reject
                | ControlMessageType::GetSinkCap
                | ControlMessageType::DrSwap
                | ControlMessageType::PrSwap
                | ControlMessageType::VconnSwap => self.peer_hard_reset(notifications),

                ControlMessageType::GetSourceCap => self.stage_source_capabilities(),
                ControlMessageType::SoftReset => self.message_id.reset(),
                ControlMessageType::Reserved => (),
            },
            MessageType::Data(data) => match data {
                DataMessageType::SourceCapabilities | DataMessageType::SinkCapabilities => {
                    self.peer_hard_reset(notifications)
                }
                DataMessageType::Request => {
                    // The accept/power-ready sequence runs from the state
                    // machine; a request outside the negotiation window is
                    // absorbed.
                    if self.state == SimState::SourceAwaitRequest {
                        self.state = SimState::SourceSendRequestAccept;
                    }
                }
                DataMessageType::Bist => (),
                DataMessageType::VendorDefined => (),
                DataMessageType::Reserved => (),
            },
        }
    }
}
