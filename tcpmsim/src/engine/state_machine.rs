//! The attach progression of the simulated port partner.
use tcpmsim_traits::CcStatus;

use super::{Notification, Notifications, Shared};
use crate::SimulatorMode;
use crate::timers::DelayType;

/// States of a simulated attach session.
///
/// `Idle` is both the initial state and the terminal state of a completed
/// session. Exactly one state is active at a time; transitions depend only
/// on the current state, the request latch and the timer-expired flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(super) enum SimState {
    Idle,
    SinkAttachStart,
    SinkRunning,
    SourceAttachStart,
    SourceVbusWait,
    SourceAwaitSourceCapSend,
    SourceAwaitRequest,
    SourceSendRequestAccept,
    SourceSendPowerReady,
    SourceRunning,
    TransitionToIdle,
}

impl Shared {
    /// Run a single state machine step.
    ///
    /// `timer_expired` is set when the step runs because the armed delay
    /// fired, rather than because of latched work.
    pub(super) fn step(&mut self, timer_expired: bool, notifications: &mut Notifications) {
        let state = match self.state {
            SimState::Idle => SimState::Idle,

            // The simulated sink presents its pull-down and then only ever
            // reacts to traffic from the Port Manager.
            SimState::SinkAttachStart => {
                self.vbus_present = false;
                self.cc1 = CcStatus::Rd;
                self.cc2 = CcStatus::Ra;
                _ = notifications.push(Notification::CcChange);
                SimState::SinkRunning
            }
            SimState::SinkRunning => SimState::SinkRunning,

            SimState::SourceAttachStart => {
                self.cc1 = CcStatus::Open;
                self.cc2 = CcStatus::Rp3A0;
                _ = notifications.push(Notification::CcChange);
                self.delay = Some(DelayType::VbusRamp);
                SimState::SourceVbusWait
            }
            SimState::SourceVbusWait => {
                if timer_expired {
                    self.vbus_present = true;
                    self.requests.vbus_changed = true;
                    SimState::SourceAwaitSourceCapSend
                } else {
                    SimState::SourceVbusWait
                }
            }
            SimState::SourceAwaitSourceCapSend => {
                if self.pd_rx_enabled {
                    self.stage_source_capabilities();
                    SimState::SourceAwaitRequest
                } else {
                    SimState::SourceAwaitSourceCapSend
                }
            }
            // Stalls until the classifier observes a power request.
            SimState::SourceAwaitRequest => SimState::SourceAwaitRequest,

            SimState::SourceSendRequestAccept => {
                self.stage_accept();
                SimState::SourceSendPowerReady
            }
            SimState::SourceSendPowerReady => {
                // Power-ready only follows once the accept left the engine.
                if !self.requests.deliver {
                    self.stage_power_ready();
                    SimState::SourceRunning
                } else {
                    SimState::SourceSendPowerReady
                }
            }
            SimState::SourceRunning => SimState::SourceRunning,

            SimState::TransitionToIdle => {
                self.vbus_present = false;
                self.cc1 = CcStatus::Open;
                self.cc2 = CcStatus::Open;
                self.local_reset();
                self.kind_cache.clear();

                if self.mode_request == SimulatorMode::Reset {
                    _ = notifications.push(Notification::ControllerReset);
                } else {
                    _ = notifications.push(Notification::CcChange);
                }

                self.mode = SimulatorMode::None;
                SimState::Idle
            }
        };

        if state != self.state {
            trace!("state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}
