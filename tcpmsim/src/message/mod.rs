//! Typed model of the PD messages the simulator exchanges with the Port
//! Manager.
//!
//! Messages cross the port-controller boundary as raw
//! [`tcpmsim_traits::PdMessage`] values; this module classifies them for the
//! classifier and decode logging, and serializes synthesized replies.

pub mod header;
pub mod pdo;
pub mod request;
pub mod vdm;

use header::{DataMessageType, Header, MessageType};
use heapless::Vec;
use tcpmsim_traits::PdMessage;

use crate::message::pdo::{PdoState, PowerDataObject};

/// Errors that can occur when interpreting message fields.
///
/// Parsing itself is tolerant; these only surface from accessors of
/// individual reserved field encodings.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// The specification revision field is reserved.
    #[error("unsupported specification revision `{0}`")]
    UnsupportedSpecificationRevision(u8),
    /// The VDM command field holds an unknown command.
    #[error("unknown VDM command `{0}`")]
    InvalidVdmCommand(u8),
    /// The identity header's product type field is reserved.
    #[error("reserved product type `{0}`")]
    InvalidProductType(u8),
    /// The AMA VDO's VCONN power field is reserved.
    #[error("reserved VCONN power `{0}`")]
    InvalidVconnPower(u8),
    /// The AMA VDO's superspeed support field is reserved.
    #[error("reserved superspeed support `{0}`")]
    InvalidSuperspeedSupport(u8),
}

/// Payload of a data message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Data {
    /// Source capabilities.
    SourceCapabilities(pdo::SourceCapabilities),
    /// Sink capabilities.
    SinkCapabilities(pdo::SinkCapabilities),
    /// Request for a power level.
    Request(request::Request),
    /// Vendor-defined message: header and trailing objects.
    VendorDefined((vdm::VdmHeader, Vec<u32, 6>)),
    /// Unclassified payload, kept raw.
    Unknown(Vec<u32, 7>),
}

impl Data {
    /// Serialize the payload into data objects.
    fn to_objects(&self, objects: &mut Vec<u32, 7>) {
        match self {
            Data::SourceCapabilities(caps) => {
                for pdo in caps.pdos() {
                    _ = objects.push((*pdo).into());
                }
            }
            Data::SinkCapabilities(caps) => {
                for pdo in caps.pdos() {
                    _ = objects.push((*pdo).into());
                }
            }
            Data::Request(rdo) => _ = objects.push((*rdo).into()),
            Data::VendorDefined((vdm_header, vdos)) => {
                _ = objects.push((*vdm_header).into());
                for vdo in vdos {
                    _ = objects.push(*vdo);
                }
            }
            Data::Unknown(raw) => {
                for object in raw {
                    _ = objects.push(*object);
                }
            }
        }
    }
}

/// A classified PD message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message {
    /// The message header.
    pub header: Header,
    /// Payload of data messages.
    pub data: Option<Data>,
}

impl Message {
    /// Create a new message from a message header.
    pub fn new(header: Header) -> Self {
        Self { header, data: None }
    }

    /// Create a new message from a message header and payload data.
    pub fn new_with_data(header: Header, data: Data) -> Self {
        Self {
            header,
            data: Some(data),
        }
    }

    /// Classify a raw message.
    ///
    /// Never fails: unknown types and malformed payloads classify as
    /// [`Data::Unknown`]. Request objects are typed through `state`, the
    /// kinds of the capabilities they answer.
    pub fn parse<P: PdoState>(raw: &PdMessage, state: &P) -> Self {
        let header = Header(raw.header);
        let objects = raw.objects();

        let data = match header.message_type() {
            MessageType::Control(_) => None,
            MessageType::Data(message_type) => Some(match message_type {
                DataMessageType::SourceCapabilities => Data::SourceCapabilities(pdo::SourceCapabilities(
                    objects.iter().map(|object| PowerDataObject::from_raw(*object)).collect(),
                )),
                DataMessageType::SinkCapabilities => Data::SinkCapabilities(pdo::SinkCapabilities(
                    objects.iter().map(|object| PowerDataObject::from_raw(*object)).collect(),
                )),
                DataMessageType::Request => {
                    let raw_rdo = request::RawDataObject(objects[0]);
                    Data::Request(match state.pdo_at_object_position(raw_rdo.object_position()) {
                        Some(pdo::Kind::FixedSupply) | Some(pdo::Kind::VariableSupply) => {
                            request::Request::FixedVariableSupply(request::FixedVariableSupply(raw_rdo.0))
                        }
                        Some(pdo::Kind::Battery) => request::Request::Battery(request::Battery(raw_rdo.0)),
                        None => request::Request::Unknown(raw_rdo),
                    })
                }
                DataMessageType::VendorDefined => Data::VendorDefined((
                    vdm::VdmHeader::from(objects[0]),
                    objects[1..].iter().copied().collect(),
                )),
                DataMessageType::Bist | DataMessageType::Reserved => {
                    Data::Unknown(objects.iter().copied().collect())
                }
            }),
        };

        Self { header, data }
    }

    /// Serialize the message to its raw representation.
    pub fn to_raw(&self) -> PdMessage {
        let mut objects: Vec<u32, 7> = Vec::new();
        if let Some(data) = &self.data {
            data.to_objects(&mut objects);
        }

        debug_assert_eq!(objects.len(), self.header.num_objects());

        PdMessage::new(self.header.0, &objects)
    }
}
