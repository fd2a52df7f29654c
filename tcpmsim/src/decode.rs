//! Human-readable logging of PD messages.
//!
//! Every message that crosses the simulator boundary is decoded into a
//! summary line plus one line per data object, so a Port Manager trace can
//! be followed without a protocol analyzer. Output goes through the crate's
//! logging macros and disappears entirely when no logging feature is active.
use tcpmsim_traits::SopType;

use crate::message::header::MessageType;
use crate::message::vdm::{self, VdmCommand, VdmHeader};
use crate::message::{Data, Message, pdo, request};

/// Log a message with a direction label, e.g. `"tx"` or `"rx"`.
///
/// `message` is `None` for framing types that carry no message, such as a
/// hard reset.
pub fn log_message(label: &str, sop_type: SopType, message: Option<&Message>) {
    let Some(message) = message else {
        info!("{}: {:?}", label, sop_type);
        return;
    };

    let header = message.header;
    match header.message_type() {
        MessageType::Control(control) => info!(
            "{}: {:?}: {:?}[{}] {:?}/{:?}",
            label,
            sop_type,
            control,
            header.message_id(),
            header.port_power_role(),
            header.port_data_role(),
        ),
        MessageType::Data(data) => info!(
            "{}: {:?}: {:?}[{}] {:?}/{:?}",
            label,
            sop_type,
            data,
            header.message_id(),
            header.port_power_role(),
            header.port_data_role(),
        ),
    }

    match &message.data {
        None => (),
        Some(Data::SourceCapabilities(caps)) => log_capabilities(caps.pdos()),
        Some(Data::SinkCapabilities(caps)) => log_capabilities(caps.pdos()),
        Some(Data::Request(rdo)) => log_request(rdo),
        Some(Data::VendorDefined((vdm_header, vdos))) => log_vdm(vdm_header, vdos),
        Some(Data::Unknown(objects)) => {
            for object in objects {
                log_object_hex(*object);
            }
        }
    }
}

fn log_object_hex(object: u32) {
    info!("- 0x{:08x}", object);
}

// Field units per the data object definitions: voltages come in 50 mV
// steps, currents in 10 mA steps, powers in 250 mW steps.
fn log_capabilities(pdos: &[pdo::PowerDataObject]) {
    for pdo in pdos {
        match pdo {
            pdo::PowerDataObject::FixedSupply(fixed) => info!(
                "- FIX: DRP={} SS={} EP={} CC={} DRD={} {} mV {} mA",
                fixed.dual_role_power() as u8,
                fixed.usb_suspend_supported() as u8,
                fixed.unconstrained_power() as u8,
                fixed.usb_communications_capable() as u8,
                fixed.dual_role_data() as u8,
                u32::from(fixed.raw_voltage()) * 50,
                u32::from(fixed.raw_max_current()) * 10,
            ),
            pdo::PowerDataObject::Battery(battery) => info!(
                "- BAT: {}-{} mV {} mW",
                u32::from(battery.raw_min_voltage()) * 50,
                u32::from(battery.raw_max_voltage()) * 50,
                u32::from(battery.raw_max_power()) * 250,
            ),
            pdo::PowerDataObject::VariableSupply(variable) => info!(
                "- VAR: {}-{} mV {} mA",
                u32::from(variable.raw_min_voltage()) * 50,
                u32::from(variable.raw_max_voltage()) * 50,
                u32::from(variable.raw_max_current()) * 10,
            ),
            pdo::PowerDataObject::Unknown(raw) => log_object_hex(raw.0),
        }
    }
}

fn log_request(rdo: &request::Request) {
    match rdo {
        request::Request::FixedVariableSupply(fixed) => info!(
            "- REQ[{}]: GB={} CM={} CC={} NS={} {} mA / {} mA",
            fixed.object_position(),
            fixed.giveback_flag() as u8,
            fixed.capability_mismatch() as u8,
            fixed.usb_communications_capable() as u8,
            fixed.no_usb_suspend() as u8,
            u32::from(fixed.raw_operating_current()) * 10,
            u32::from(fixed.raw_max_operating_current()) * 10,
        ),
        request::Request::Battery(battery) => info!(
            "- REQ[{}]: GB={} CM={} CC={} NS={} {} mW / {} mW",
            battery.object_position(),
            battery.giveback_flag() as u8,
            battery.capability_mismatch() as u8,
            battery.usb_communications_capable() as u8,
            battery.no_usb_suspend() as u8,
            u32::from(battery.raw_operating_power()) * 250,
            u32::from(battery.raw_max_operating_power()) * 250,
        ),
        request::Request::Unknown(raw) => log_object_hex(raw.0),
    }
}

fn log_vdm(vdm_header: &VdmHeader, vdos: &[u32]) {
    let structured = match vdm_header {
        VdmHeader::Unstructured(unstructured) => {
            info!(
                "- VDM: SVID=0x{:04x} unstructured data=0x{:04x}",
                unstructured.standard_or_vid(),
                unstructured.data(),
            );
            for vdo in vdos {
                log_object_hex(*vdo);
            }
            return;
        }
        VdmHeader::Structured(structured) => structured,
    };

    match structured.command() {
        Ok(command) => info!(
            "- VDM: SVID=0x{:04x} v{} pos={} {:?} {:?}",
            structured.standard_or_vid(),
            structured.vdm_version(),
            structured.object_position(),
            structured.command_type(),
            command,
        ),
        Err(_) => {
            log_object_hex(structured.0);
            return;
        }
    }

    match structured.command() {
        Ok(VdmCommand::DiscoverIdentity) => log_identity(vdos),
        Ok(VdmCommand::DiscoverSvids) => {
            for vdo in vdos {
                let svids = vdm::SvidListVdo(*vdo);
                info!("- SVIDS: 0x{:04x} 0x{:04x}", svids.svid0(), svids.svid1());
            }
        }
        Ok(VdmCommand::DiscoverModes) if structured.standard_or_vid() == vdm::USB_SID_DISPLAYPORT => {
            for vdo in vdos {
                let mode = vdm::DisplayPortCapabilities(*vdo);
                info!(
                    "- DP: UFP_D=0x{:02x} DFP_D=0x{:02x} N2={} R={} S=0x{:x} CAP={:?}",
                    mode.ufp_d_pin_assignments(),
                    mode.dfp_d_pin_assignments(),
                    mode.usb20_signalling_not_used() as u8,
                    mode.receptacle_indication() as u8,
                    mode.signaling_rate(),
                    mode.capability(),
                );
            }
        }
        _ => {
            for vdo in vdos {
                log_object_hex(*vdo);
            }
        }
    }
}

/// Identity response VDO positions after the VDM header.
const VDO_INDEX_IDH: usize = 0;
const VDO_INDEX_CSTAT: usize = 1;
const VDO_INDEX_PRODUCT: usize = 2;
const VDO_INDEX_AMA: usize = 3;

fn log_identity(vdos: &[u32]) {
    for (index, vdo) in vdos.iter().enumerate() {
        match index {
            VDO_INDEX_IDH => {
                let identity = vdm::VdmIdentityHeader(*vdo);
                match identity.product_type() {
                    Ok(product_type) => info!(
                        "- IDH: UH={} UD={} PT={:?} MO={} VID=0x{:04x}",
                        identity.usb_host() as u8,
                        identity.usb_device() as u8,
                        product_type,
                        identity.modal_supported() as u8,
                        identity.vid(),
                    ),
                    Err(_) => log_object_hex(*vdo),
                }
            }
            VDO_INDEX_CSTAT => info!("- XID: 0x{:08x}", vdm::CertStatVdo(*vdo).xid()),
            VDO_INDEX_PRODUCT => {
                let product = vdm::ProductVdo(*vdo);
                info!("- PID: 0x{:04x} bcdDevice=0x{:04x}", product.pid(), product.bcd_device());
            }
            VDO_INDEX_AMA => {
                let ama = vdm::AmaVdo(*vdo);
                info!(
                    "- AMA: HW={} FW={} VCR={} VBR={}",
                    ama.hw_version(),
                    ama.fw_version(),
                    ama.vconn_required() as u8,
                    ama.vbus_required() as u8,
                );
            }
            _ => log_object_hex(*vdo),
        }
    }
}
