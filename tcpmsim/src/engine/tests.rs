//! Tests for the simulation engine.
use tcpmsim_traits::{CcStatus, DataRole, PdMessage, PortController, PowerRole, SopType, TransmitStatus};

use super::PortSimulator;
use super::state_machine::SimState;
use crate::SimulatorMode;
use crate::dummy::{DummyTimer, PortEvent, RecordingPort, TokioTimer};
use crate::message::header::{
    ControlMessageType, DataMessageType, Header, MessageType, SpecificationRevision,
};
use crate::message::pdo::{FixedSupply, PowerDataObject, SourceCapabilities};
use crate::message::request::FixedVariableSupply;
use crate::message::vdm::{self, VdmCommand, VdmCommandType, VdmHeaderStructured, VdmIdentityHeader};
use crate::message::{Data, Message};
use crate::timers::DelayType;

type Sim = PortSimulator<RecordingPort, DummyTimer>;

fn get_simulator() -> Sim {
    PortSimulator::new(RecordingPort::new())
}

fn sim_state(simulator: &Sim) -> SimState {
    simulator.lock(|shared| shared.state)
}

fn message_id(simulator: &Sim) -> u8 {
    simulator.lock(|shared| shared.message_id.value())
}

fn events(simulator: &Sim) -> Vec<PortEvent> {
    simulator.port_manager().take_events()
}

/// Expire the armed delay and run the timeout pass, reporting what was armed.
fn expire_delay(simulator: &Sim) -> DelayType {
    let delay = simulator.lock(|shared| shared.delay.take()).expect("no delay armed");
    simulator.service_timeout();
    delay
}

/// Header template of the Port Manager playing the source against a
/// simulated sink.
fn pm_source_template() -> Header {
    Header::new_template(DataRole::Dfp, PowerRole::Source, SpecificationRevision::R2_0)
}

/// Header template of the Port Manager playing the sink against a simulated
/// source.
fn pm_sink_template() -> Header {
    Header::new_template(DataRole::Ufp, PowerRole::Sink, SpecificationRevision::R2_0)
}

fn transmit_control(simulator: &Sim, template: Header, message_id: u8, control: ControlMessageType) {
    let raw = Message::new(Header::new_control(template, message_id, control)).to_raw();
    simulator.pd_transmit(SopType::Sop, Some(&raw));
    simulator.service();
}

fn transmit_source_capabilities(simulator: &Sim) {
    let pdo = PowerDataObject::FixedSupply(
        FixedSupply::new()
            .with_raw_voltage(100)
            .with_raw_max_current(300)
            .with_dual_role_power(true),
    );
    let header = Header::new_data(pm_source_template(), 0, DataMessageType::SourceCapabilities, 1);
    let raw = Message::new_with_data(
        header,
        Data::SourceCapabilities(SourceCapabilities([pdo].into_iter().collect())),
    )
    .to_raw();

    simulator.pd_transmit(SopType::Sop, Some(&raw));
    simulator.service();
}

fn transmit_request(simulator: &Sim, object_position: u8) {
    let rdo = FixedVariableSupply(0)
        .with_object_position(object_position)
        .with_raw_operating_current(300)
        .with_raw_max_operating_current(300);
    let header = Header::new_data(pm_sink_template(), 1, DataMessageType::Request, 1);
    let raw = PdMessage::new(header.0, &[rdo.0]);

    simulator.pd_transmit(SopType::Sop, Some(&raw));
    simulator.service();
}

fn transmit_vdm(simulator: &Sim, vdm_header: VdmHeaderStructured) {
    let header = Header::new_data(pm_source_template(), 2, DataMessageType::VendorDefined, 1);
    let raw = PdMessage::new(header.0, &[vdm_header.0]);

    simulator.pd_transmit(SopType::Sop, Some(&raw));
    simulator.service();
}

fn received_messages(events: &[PortEvent]) -> Vec<PdMessage> {
    events
        .iter()
        .filter_map(|event| match event {
            PortEvent::Receive(message) => Some(*message),
            _ => None,
        })
        .collect()
}

/// Attach a simulated sink and drain the attach notifications.
fn attach_sink(simulator: &Sim) {
    simulator.set_mode(SimulatorMode::Sink);
    simulator.service();
    assert_eq!(sim_state(simulator), SimState::SinkRunning);
    assert_eq!(events(simulator), vec![PortEvent::CcChange]);
}

/// Attach a simulated source up to the point where capabilities have been
/// staged but not yet delivered.
fn attach_source(simulator: &Sim) {
    simulator.set_mode(SimulatorMode::Source);
    simulator.service();
    assert_eq!(sim_state(simulator), SimState::SourceVbusWait);
    assert_eq!(simulator.cc_status(), (CcStatus::Open, CcStatus::Rp3A0));
    assert_eq!(events(simulator), vec![PortEvent::CcChange]);

    // VBUS ramp expires, the timeout pass latches the VBUS change and the
    // follow-up pass reports it.
    assert_eq!(expire_delay(simulator), DelayType::VbusRamp);
    simulator.service();
    assert!(simulator.vbus_present());
    assert_eq!(sim_state(simulator), SimState::SourceAwaitSourceCapSend);
    assert_eq!(events(simulator), vec![PortEvent::VbusChange]);

    simulator.set_pd_rx(true);
    simulator.service();
    assert_eq!(sim_state(simulator), SimState::SourceAwaitRequest);
}

#[test]
fn sink_attach_asserts_cc() {
    let simulator = get_simulator();

    simulator.set_mode(SimulatorMode::Sink);
    assert_eq!(simulator.mode(), SimulatorMode::None);

    simulator.service();

    assert_eq!(simulator.mode(), SimulatorMode::Sink);
    assert_eq!(sim_state(&simulator), SimState::SinkRunning);
    assert_eq!(simulator.cc_status(), (CcStatus::Rd, CcStatus::Ra));
    assert!(!simulator.vbus_present());
    assert_eq!(events(&simulator), vec![PortEvent::CcChange]);
}

#[test]
fn sink_answers_source_capabilities_with_request() {
    let simulator = get_simulator();
    attach_sink(&simulator);

    transmit_source_capabilities(&simulator);
    assert_eq!(
        events(&simulator),
        vec![PortEvent::TransmitComplete(TransmitStatus::Success)]
    );

    // The reply is delivered one response latency later.
    assert_eq!(expire_delay(&simulator), DelayType::PeerResponse);
    let received = received_messages(&events(&simulator));
    assert_eq!(received.len(), 1);

    let header = Header(received[0].header);
    assert_eq!(header.message_type(), MessageType::Data(DataMessageType::Request));
    assert_eq!(header.message_id(), 0);
    assert!(matches!(header.port_power_role(), PowerRole::Sink));
    assert!(matches!(header.port_data_role(), DataRole::Ufp));

    let rdo = FixedVariableSupply(received[0].objects()[0]);
    assert_eq!(rdo.object_position(), 1);
    assert_eq!(rdo.raw_operating_current(), 150);
    assert_eq!(rdo.raw_max_operating_current(), 150);
    assert!(rdo.usb_communications_capable());
}

#[test]
fn source_negotiation_reaches_running_with_accept_then_power_ready() {
    let simulator = get_simulator();
    attach_source(&simulator);

    // Capabilities are delivered within one latency window of rx enable.
    assert_eq!(expire_delay(&simulator), DelayType::PeerResponse);
    let received = received_messages(&events(&simulator));
    assert_eq!(received.len(), 1);

    let header = Header(received[0].header);
    assert_eq!(
        header.message_type(),
        MessageType::Data(DataMessageType::SourceCapabilities)
    );
    assert!(matches!(header.port_power_role(), PowerRole::Source));

    let pdo = FixedSupply(received[0].objects()[0]);
    assert_eq!(pdo.raw_voltage(), 100);
    assert_eq!(pdo.raw_max_current(), 300);
    assert!(pdo.dual_role_power());
    assert!(pdo.unconstrained_power());
    assert!(pdo.usb_communications_capable());
    assert!(pdo.dual_role_data());

    // The Port Manager requests object position 1; the accept is staged in
    // the same pass.
    transmit_request(&simulator, 1);
    assert_eq!(sim_state(&simulator), SimState::SourceSendPowerReady);
    assert_eq!(
        events(&simulator),
        vec![PortEvent::TransmitComplete(TransmitStatus::Success)]
    );

    // Accept delivers first, power-ready only after the accept left the
    // engine.
    assert_eq!(expire_delay(&simulator), DelayType::PeerResponse);
    assert_eq!(sim_state(&simulator), SimState::SourceRunning);
    assert_eq!(expire_delay(&simulator), DelayType::PeerResponse);

    let received = received_messages(&events(&simulator));
    let types: Vec<_> = received
        .iter()
        .map(|message| Header(message.header).message_type())
        .collect();
    assert_eq!(
        types,
        vec![
            MessageType::Control(ControlMessageType::Accept),
            MessageType::Control(ControlMessageType::PsRdy),
        ]
    );

    // Message IDs across the session: capabilities 0, accept 1, power-ready 2.
    assert_eq!(Header(received[0].header).message_id(), 1);
    assert_eq!(Header(received[1].header).message_id(), 2);
}

#[test]
fn source_capabilities_wait_for_pd_rx_enable() {
    let simulator = get_simulator();

    simulator.set_mode(SimulatorMode::Source);
    simulator.service();
    expire_delay(&simulator);
    simulator.service();
    events(&simulator);

    // Reception still disabled: nothing is staged, no delay armed.
    assert_eq!(sim_state(&simulator), SimState::SourceAwaitSourceCapSend);
    assert!(simulator.lock(|shared| shared.delay.is_none()));
    assert!(simulator.lock(|shared| !shared.requests.deliver));
}

#[test]
fn unsolicited_sink_capabilities_while_running_hard_reset() {
    let simulator = get_simulator();
    attach_source(&simulator);
    expire_delay(&simulator);
    transmit_request(&simulator, 1);
    expire_delay(&simulator);
    expire_delay(&simulator);
    assert_eq!(sim_state(&simulator), SimState::SourceRunning);
    events(&simulator);

    // An unsolicited capability advertisement is a protocol violation; the
    // peer reacts like a real partner, with a hard reset.
    let header = Header::new_data(pm_sink_template(), 3, DataMessageType::SinkCapabilities, 1);
    let pdo = FixedSupply::new().with_raw_voltage(100).with_raw_max_current(100);
    let raw = PdMessage::new(header.0, &[pdo.0]);
    simulator.pd_transmit(SopType::Sop, Some(&raw));
    simulator.service();

    assert_eq!(
        events(&simulator),
        vec![
            PortEvent::HardReset,
            PortEvent::TransmitComplete(TransmitStatus::Success),
        ]
    );
    assert_eq!(message_id(&simulator), 0);
}

#[test]
fn protocol_violations_at_sink_hard_reset() {
    for control in [
        ControlMessageType::Reject,
        ControlMessageType::GetSourceCap,
        ControlMessageType::DrSwap,
        ControlMessageType::PrSwap,
        ControlMessageType::VconnSwap,
    ] {
        let simulator = get_simulator();
        attach_sink(&simulator);
        transmit_source_capabilities(&simulator);
        expire_delay(&simulator);
        events(&simulator);
        assert_ne!(message_id(&simulator), 0);

        transmit_control(&simulator, pm_source_template(), 1, control);

        assert_eq!(
            events(&simulator),
            vec![
                PortEvent::HardReset,
                PortEvent::TransmitComplete(TransmitStatus::Success),
            ]
        );
        assert_eq!(message_id(&simulator), 0);
    }
}

#[test]
fn absorbed_control_messages_cause_no_reaction() {
    let simulator = get_simulator();
    attach_sink(&simulator);

    for control in [
        ControlMessageType::GoodCRC,
        ControlMessageType::GotoMin,
        ControlMessageType::Accept,
        ControlMessageType::Ping,
        ControlMessageType::PsRdy,
        ControlMessageType::Wait,
    ] {
        transmit_control(&simulator, pm_source_template(), 0, control);
        assert_eq!(
            events(&simulator),
            vec![PortEvent::TransmitComplete(TransmitStatus::Success)]
        );
        assert!(simulator.lock(|shared| !shared.requests.deliver));
    }
}

#[test]
fn get_sink_cap_stages_sink_capabilities() {
    let simulator = get_simulator();
    attach_sink(&simulator);

    transmit_control(&simulator, pm_source_template(), 0, ControlMessageType::GetSinkCap);
    expire_delay(&simulator);

    let all = events(&simulator);
    let received = received_messages(&all);
    assert_eq!(received.len(), 1);

    let header = Header(received[0].header);
    assert_eq!(
        header.message_type(),
        MessageType::Data(DataMessageType::SinkCapabilities)
    );

    let pdo = FixedSupply(received[0].objects()[0]);
    assert_eq!(pdo.raw_voltage(), 100);
    assert_eq!(pdo.raw_max_current(), 200);
    assert!(pdo.usb_communications_capable());
}

#[test]
fn message_ids_strictly_increase_mod_8() {
    let simulator = get_simulator();
    attach_sink(&simulator);

    for round in 0..10u8 {
        transmit_control(&simulator, pm_source_template(), round & 0x7, ControlMessageType::GetSinkCap);
        expire_delay(&simulator);

        let received = received_messages(&events(&simulator));
        assert_eq!(Header(received[0].header).message_id(), round & 0x7);
    }
}

#[test]
fn soft_reset_resets_only_the_message_id_counter() {
    let simulator = get_simulator();
    attach_sink(&simulator);

    transmit_source_capabilities(&simulator);
    expire_delay(&simulator);
    events(&simulator);
    assert_eq!(message_id(&simulator), 1);

    transmit_control(&simulator, pm_source_template(), 1, ControlMessageType::SoftReset);

    // No hard reset reported, counter back at zero, session still up.
    assert_eq!(
        events(&simulator),
        vec![PortEvent::TransmitComplete(TransmitStatus::Success)]
    );
    assert_eq!(message_id(&simulator), 0);
    assert_eq!(sim_state(&simulator), SimState::SinkRunning);
    assert_eq!(simulator.mode(), SimulatorMode::Sink);
}

#[test]
fn hard_reset_transmit_resets_silently() {
    let simulator = get_simulator();
    attach_sink(&simulator);

    // Stage a reply, then hard-reset before it is delivered.
    transmit_source_capabilities(&simulator);
    events(&simulator);
    assert!(simulator.lock(|shared| shared.requests.deliver));

    simulator.pd_transmit(SopType::HardReset, None);
    simulator.service();

    // The transmitted reset is the reset; the peer does not report one back.
    assert_eq!(
        events(&simulator),
        vec![PortEvent::TransmitComplete(TransmitStatus::Success)]
    );
    assert!(simulator.lock(|shared| !shared.requests.deliver));
    assert_eq!(message_id(&simulator), 0);
}

#[test]
fn non_sop_transmissions_are_ignored() {
    let simulator = get_simulator();
    attach_sink(&simulator);

    let raw = Message::new(Header::new_control(pm_source_template(), 0, ControlMessageType::Ping)).to_raw();
    simulator.pd_transmit(SopType::SopPrime, Some(&raw));
    simulator.service();

    assert_eq!(
        events(&simulator),
        vec![PortEvent::TransmitComplete(TransmitStatus::Success)]
    );
    assert!(simulator.lock(|shared| !shared.requests.deliver));
}

#[test]
fn transmit_without_session_fails() {
    let simulator = get_simulator();

    let raw = Message::new(Header::new_control(pm_source_template(), 0, ControlMessageType::Ping)).to_raw();
    simulator.pd_transmit(SopType::Sop, Some(&raw));
    simulator.service();

    assert_eq!(
        events(&simulator),
        vec![PortEvent::TransmitComplete(TransmitStatus::Failed)]
    );
}

#[test]
fn set_vbus_latches_at_most_once_per_change() {
    let simulator = get_simulator();

    simulator.set_vbus(true, false);
    simulator.service();
    assert_eq!(events(&simulator), vec![PortEvent::VbusChange]);

    // Same presence value again: no further notification.
    simulator.set_vbus(true, true);
    simulator.service();
    assert_eq!(events(&simulator), vec![]);

    simulator.set_vbus(false, false);
    simulator.service();
    assert_eq!(events(&simulator), vec![PortEvent::VbusChange]);
}

#[test]
fn mode_requests_during_session_are_dropped() {
    let simulator = get_simulator();
    attach_sink(&simulator);

    // A second role cannot arm before the session returns to idle.
    simulator.set_mode(SimulatorMode::Source);
    simulator.service();
    assert_eq!(simulator.mode(), SimulatorMode::Sink);
    assert_eq!(sim_state(&simulator), SimState::SinkRunning);

    simulator.set_mode(SimulatorMode::None);
    simulator.service();
    assert_eq!(simulator.mode(), SimulatorMode::None);
    assert_eq!(sim_state(&simulator), SimState::Idle);
    events(&simulator);

    simulator.set_mode(SimulatorMode::Source);
    simulator.service();
    assert_eq!(simulator.mode(), SimulatorMode::Source);
    assert_eq!(sim_state(&simulator), SimState::SourceVbusWait);
}

#[test]
fn plain_detach_reports_cc_change() {
    let simulator = get_simulator();
    attach_sink(&simulator);

    simulator.set_mode(SimulatorMode::None);
    simulator.service();

    assert_eq!(events(&simulator), vec![PortEvent::CcChange]);
    assert_eq!(simulator.cc_status(), (CcStatus::Open, CcStatus::Open));
    assert_eq!(simulator.mode(), SimulatorMode::None);
}

#[test]
fn reset_mode_reports_controller_reset() {
    let simulator = get_simulator();
    attach_source(&simulator);
    expire_delay(&simulator);
    events(&simulator);
    assert_ne!(message_id(&simulator), 0);

    simulator.set_mode(SimulatorMode::Reset);
    simulator.service();

    // Full teardown with a controller reset instead of a CC change.
    assert_eq!(events(&simulator), vec![PortEvent::TcpcReset]);
    assert_eq!(simulator.mode(), SimulatorMode::None);
    assert_eq!(sim_state(&simulator), SimState::Idle);
    assert_eq!(simulator.cc_status(), (CcStatus::Open, CcStatus::Open));
    assert!(!simulator.vbus_present());
    assert_eq!(message_id(&simulator), 0);
}

#[test]
fn staged_reply_is_replaced_not_stacked() {
    let simulator = get_simulator();
    attach_sink(&simulator);

    // Stage a request reply, then a sink capability reply before delivery.
    transmit_source_capabilities(&simulator);
    transmit_control(&simulator, pm_source_template(), 1, ControlMessageType::GetSinkCap);
    expire_delay(&simulator);

    let received = received_messages(&events(&simulator));
    assert_eq!(received.len(), 1);
    assert_eq!(
        Header(received[0].header).message_type(),
        MessageType::Data(DataMessageType::SinkCapabilities)
    );
    // Both syntheses consumed an ID; the delivered message carries the last.
    assert_eq!(Header(received[0].header).message_id(), 1);
}

#[test]
fn vdm_discovery_sequence_is_answered() {
    let simulator = get_simulator();
    attach_sink(&simulator);

    // Discover identity.
    transmit_vdm(
        &simulator,
        VdmHeaderStructured::default()
            .with_standard_or_vid(vdm::USB_SID_PD)
            .with_command_type(VdmCommandType::InitiatorReq)
            .with_command(VdmCommand::DiscoverIdentity),
    );
    expire_delay(&simulator);
    let received = received_messages(&events(&simulator));
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].object_count(), 5);

    let reply = VdmHeaderStructured(received[0].objects()[0]);
    assert_eq!(reply.command_type(), VdmCommandType::ResponderAck);
    assert_eq!(reply.command().unwrap(), VdmCommand::DiscoverIdentity);
    assert_eq!(reply.standard_or_vid(), vdm::USB_SID_PD);

    let identity = VdmIdentityHeader(received[0].objects()[1]);
    assert!(identity.usb_device());
    assert!(identity.modal_supported());
    assert_eq!(identity.vid(), 0x2109);

    // Discover SVIDs: advertises DisplayPort.
    transmit_vdm(
        &simulator,
        VdmHeaderStructured::default()
            .with_standard_or_vid(vdm::USB_SID_PD)
            .with_command_type(VdmCommandType::InitiatorReq)
            .with_command(VdmCommand::DiscoverSvids),
    );
    expire_delay(&simulator);
    let received = received_messages(&events(&simulator));
    let svids = vdm::SvidListVdo(received[0].objects()[1]);
    assert_eq!(svids.svid0(), vdm::USB_SID_DISPLAYPORT);
    assert_eq!(svids.svid1(), 0);

    // Discover modes for DisplayPort: one UFP_D pin-C mode.
    transmit_vdm(
        &simulator,
        VdmHeaderStructured::default()
            .with_standard_or_vid(vdm::USB_SID_DISPLAYPORT)
            .with_command_type(VdmCommandType::InitiatorReq)
            .with_command(VdmCommand::DiscoverModes),
    );
    expire_delay(&simulator);
    let received = received_messages(&events(&simulator));
    let mode = vdm::DisplayPortCapabilities(received[0].objects()[1]);
    assert_eq!(mode.ufp_d_pin_assignments(), vdm::dp_pin::PIN_C);
    assert!(mode.receptacle_indication());
    assert_eq!(mode.capability(), vdm::DisplayPortCapability::UfpD);
}

#[test]
fn vdm_echoes_and_foreign_svids_are_ignored() {
    let simulator = get_simulator();
    attach_sink(&simulator);

    // A responder ACK echo must not be answered.
    transmit_vdm(
        &simulator,
        VdmHeaderStructured::default()
            .with_standard_or_vid(vdm::USB_SID_PD)
            .with_command_type(VdmCommandType::ResponderAck)
            .with_command(VdmCommand::DiscoverIdentity),
    );
    assert!(simulator.lock(|shared| !shared.requests.deliver));

    // Mode discovery for a non-DisplayPort SVID stays unanswered.
    transmit_vdm(
        &simulator,
        VdmHeaderStructured::default()
            .with_standard_or_vid(0x18d1)
            .with_command_type(VdmCommandType::InitiatorReq)
            .with_command(VdmCommand::DiscoverModes),
    );
    assert!(simulator.lock(|shared| !shared.requests.deliver));

    // Unstructured VDMs are vendor-private and ignored.
    let header = Header::new_data(pm_source_template(), 0, DataMessageType::VendorDefined, 1);
    let raw = PdMessage::new(header.0, &[0x5ac0_1234]);
    simulator.pd_transmit(SopType::Sop, Some(&raw));
    simulator.service();
    assert!(simulator.lock(|shared| !shared.requests.deliver));

    events(&simulator);
}

#[test]
fn get_source_cap_while_source_stages_capabilities() {
    let simulator = get_simulator();
    attach_source(&simulator);
    expire_delay(&simulator);
    events(&simulator);

    transmit_control(&simulator, pm_sink_template(), 1, ControlMessageType::GetSourceCap);
    expire_delay(&simulator);

    let received = received_messages(&events(&simulator));
    assert_eq!(received.len(), 1);
    assert_eq!(
        Header(received[0].header).message_type(),
        MessageType::Data(DataMessageType::SourceCapabilities)
    );
}

#[test]
fn request_outside_negotiation_window_is_absorbed() {
    let simulator = get_simulator();
    attach_source(&simulator);
    expire_delay(&simulator);
    transmit_request(&simulator, 1);
    expire_delay(&simulator);
    expire_delay(&simulator);
    assert_eq!(sim_state(&simulator), SimState::SourceRunning);
    events(&simulator);

    transmit_request(&simulator, 1);

    assert_eq!(sim_state(&simulator), SimState::SourceRunning);
    assert_eq!(
        events(&simulator),
        vec![PortEvent::TransmitComplete(TransmitStatus::Success)]
    );
}

#[tokio::test(start_paused = true)]
async fn run_loop_delivers_source_session() {
    let simulator: PortSimulator<RecordingPort, TokioTimer> = PortSimulator::new(RecordingPort::new());

    let drive = async {
        simulator.set_mode(SimulatorMode::Source);
        // Wait out attach and VBUS ramp.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        simulator.set_pd_rx(true);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    };

    embassy_futures::select::select(simulator.run(), drive).await;

    let all = simulator.port_manager().take_events();
    assert!(all.contains(&PortEvent::CcChange));
    assert!(all.contains(&PortEvent::VbusChange));

    let received = received_messages(&all);
    assert_eq!(received.len(), 1);
    assert_eq!(
        Header(received[0].header).message_type(),
        MessageType::Data(DataMessageType::SourceCapabilities)
    );
}
