//! The simulation engine: request latch, event dispatcher and the
//! port-controller facade.
//!
//! All mutable simulator state lives in one region behind a single blocking
//! mutex. Facade calls only record intent under the lock and wake the
//! dispatcher; the dispatcher ([`PortSimulator::run`]) is the only place
//! where state advances. Callbacks to the Port Manager are collected during
//! a locked pass and invoked after the lock is released, so a callback may
//! immediately call back into the facade.

mod classifier;
mod state_machine;
mod synthesizer;

#[cfg(test)]
mod tests;

use core::cell::RefCell;
use core::marker::PhantomData;
use core::pin::pin;

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use heapless::Vec;
use state_machine::SimState;
use tcpmsim_traits::{
    CcPolarity, CcStatus, DataRole, PdMessage, PortController, PortManager, PowerRole, SopType, TransmitStatus,
};

use crate::counters::MessageIdCounter;
use crate::message::Message;
use crate::message::pdo::PdoKindCache;
use crate::timers::{DelayType, Timer};
use crate::{SimulatorMode, decode};

/// The asynchronous request flags, set by producers and cleared exactly once
/// by the event dispatcher. Multiple flags may be pending at the same time;
/// bursts coalesce into a single dispatcher wake-up.
#[derive(Debug, Clone, Copy, Default)]
struct PendingRequests {
    /// The operator requested a mode change.
    mode_change: bool,
    /// VBUS presence changed and the Port Manager was not yet told.
    vbus_changed: bool,
    /// A staged message awaits delivery to the Port Manager.
    deliver: bool,
    /// A transmitted message awaits processing by the simulated peer.
    process: bool,
}

impl PendingRequests {
    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A callback queued during a dispatcher pass.
///
/// Queue capacity covers the worst-case pass: vbus-change, hard reset,
/// transmit completion, message delivery and a CC change never exceed it.
#[derive(Debug)]
enum Notification {
    CcChange,
    VbusChange,
    Receive(PdMessage),
    TransmitComplete(TransmitStatus),
    HardReset,
    ControllerReset,
}

type Notifications = Vec<Notification, 8>;

/// The single mutable region: everything the simulator knows.
struct Shared {
    mode: SimulatorMode,
    mode_request: SimulatorMode,
    state: SimState,
    requests: PendingRequests,

    cc1: CcStatus,
    cc2: CcStatus,
    vbus_present: bool,
    polarity: CcPolarity,
    vconn_enabled: bool,
    pd_rx_enabled: bool,
    attached: bool,
    power_role: PowerRole,
    data_role: DataRole,

    /// Framing type of the last transmission from the Port Manager.
    tx_sop_type: SopType,
    /// Last message the Port Manager transmitted, if any.
    tx_message: Option<PdMessage>,
    /// Next message to deliver as if received from the simulated peer.
    outbound: PdMessage,
    message_id: MessageIdCounter,
    kind_cache: PdoKindCache,

    /// Delay to arm before the next dispatcher wake-up; re-arm replaces.
    delay: Option<DelayType>,
}

impl Shared {
    fn new() -> Self {
        Self {
            mode: SimulatorMode::None,
            mode_request: SimulatorMode::None,
            state: SimState::Idle,
            requests: PendingRequests::default(),
            cc1: CcStatus::Open,
            cc2: CcStatus::Open,
            vbus_present: false,
            polarity: CcPolarity::Cc1,
            vconn_enabled: false,
            pd_rx_enabled: false,
            attached: false,
            power_role: PowerRole::Sink,
            data_role: DataRole::Ufp,
            tx_sop_type: SopType::Sop,
            tx_message: None,
            outbound: PdMessage::default(),
            message_id: MessageIdCounter::new(),
            kind_cache: PdoKindCache::new(),
            delay: None,
        }
    }

    /// Process a pending operator mode request.
    ///
    /// A non-idle session always routes through `TransitionToIdle` first; a
    /// new role can only arm from an idle engine, so requests that would
    /// overlap a running session are dropped here.
    fn handle_mode_change(&mut self) {
        if !self.requests.mode_change {
            return;
        }
        self.requests.mode_change = false;

        match self.mode_request {
            SimulatorMode::None | SimulatorMode::Reset => {
                if self.mode != SimulatorMode::None {
                    self.state = SimState::TransitionToIdle;
                }
            }
            SimulatorMode::Sink => {
                if self.mode == SimulatorMode::None {
                    self.mode = SimulatorMode::Sink;
                    self.state = SimState::SinkAttachStart;
                }
            }
            SimulatorMode::Source => {
                if self.mode == SimulatorMode::None {
                    self.mode = SimulatorMode::Source;
                    self.state = SimState::SourceAttachStart;
                }
            }
        }
    }

    /// Forward a latched VBUS change to the Port Manager, exactly once.
    fn handle_vbus_change(&mut self, notifications: &mut Notifications) {
        if self.requests.vbus_changed {
            self.requests.vbus_changed = false;
            _ = notifications.push(Notification::VbusChange);
        }
    }

    /// Reset the local protocol state: pending requests and message IDs.
    fn local_reset(&mut self) {
        self.requests.clear();
        self.message_id.reset();
    }

    /// Hard reset initiated by the simulated peer.
    fn peer_hard_reset(&mut self, notifications: &mut Notifications) {
        warn!("simulated peer issues hard reset");
        self.local_reset();
        _ = notifications.push(Notification::HardReset);
    }
}

/// The port-partner simulator.
///
/// Implements [`PortController`] towards the Port Manager under test and
/// reports events through the owned [`PortManager`] callbacks. The operator
/// selects the simulated role with [`PortSimulator::set_mode`]. Simulation
/// only advances while [`PortSimulator::run`] is polled.
pub struct PortSimulator<TCPM: PortManager, TIMER: Timer> {
    shared: Mutex<CriticalSectionRawMutex, RefCell<Shared>>,
    kick: Signal<CriticalSectionRawMutex, ()>,
    port_manager: TCPM,
    _timer: PhantomData<TIMER>,
}

impl<TCPM: PortManager, TIMER: Timer> PortSimulator<TCPM, TIMER> {
    /// Create a new simulator that reports to the given Port Manager.
    pub fn new(port_manager: TCPM) -> Self {
        Self {
            shared: Mutex::new(RefCell::new(Shared::new())),
            kick: Signal::new(),
            port_manager,
            _timer: PhantomData,
        }
    }

    /// Access the Port Manager this simulator reports to.
    pub fn port_manager(&self) -> &TCPM {
        &self.port_manager
    }

    /// The currently active simulator mode.
    ///
    /// A requested mode becomes active only once the dispatcher has processed
    /// it; `Reset` never becomes active, it collapses to `None`.
    pub fn mode(&self) -> SimulatorMode {
        self.lock(|shared| shared.mode)
    }

    /// Request a mode change.
    pub fn set_mode(&self, mode: SimulatorMode) {
        info!("mode request {:?}", mode);
        self.lock(|shared| {
            shared.mode_request = mode;
            shared.requests.mode_change = true;
        });
        self.kick.signal(());
    }

    /// Parse and apply an operator mode string.
    ///
    /// Accepts exactly `"none"`, `"reset"`, `"snk"` and `"src"`; anything
    /// else is rejected without a state change.
    pub fn set_mode_str(&self, mode: &str) -> Result<(), crate::Error> {
        self.set_mode(mode.parse()?);
        Ok(())
    }

    /// Drive the simulation.
    ///
    /// Serializes all dispatcher passes and owns the single delayed-completion
    /// timer. The future never resolves; drop it to stop the simulation.
    pub async fn run(&self) -> ! {
        loop {
            match self.lock(|shared| shared.delay.take()) {
                None => {
                    self.kick.wait().await;
                    self.service();
                }
                Some(delay_type) => {
                    trace!("arm {:?} delay", delay_type);
                    let mut timer = pin!(delay_type.delay::<TIMER>());

                    loop {
                        match select(&mut timer, self.kick.wait()).await {
                            Either::First(()) => {
                                self.service_timeout();
                                break;
                            }
                            Either::Second(()) => {
                                self.service();

                                // A pass may have re-armed; replace the timer.
                                if self.lock(|shared| shared.delay.is_some()) {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    fn lock<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> R {
        self.shared.lock(|cell| f(&mut cell.borrow_mut()))
    }

    fn notify(&self, notifications: Notifications) {
        for notification in notifications {
            match notification {
                Notification::CcChange => self.port_manager.cc_change(),
                Notification::VbusChange => self.port_manager.vbus_change(),
                Notification::Receive(message) => self.port_manager.pd_receive(&message),
                Notification::TransmitComplete(status) => self.port_manager.pd_transmit_complete(status),
                Notification::HardReset => self.port_manager.pd_hard_reset(),
                Notification::ControllerReset => self.port_manager.tcpc_reset(),
            }
        }
    }

    /// One regular dispatcher pass, in fixed order: mode change, VBUS
    /// change, inbound message processing, one state machine step.
    fn service(&self) {
        let notifications = self.lock(|shared| {
            let mut notifications = Notifications::new();

            shared.handle_mode_change();
            shared.handle_vbus_change(&mut notifications);
            shared.handle_transmit(&mut notifications);
            shared.step(false, &mut notifications);

            // A staged reply is delivered one response latency later. This
            // replaces any pending delay, restarting the latency window.
            if shared.requests.deliver {
                shared.delay = Some(DelayType::PeerResponse);
            }

            notifications
        });

        self.notify(notifications);
    }

    /// Dispatcher pass after the armed delay expired: deliver the staged
    /// message, then advance the state machine with the expiry flag set.
    fn service_timeout(&self) {
        let (notifications, rekick) = self.lock(|shared| {
            let mut notifications = Notifications::new();

            if shared.requests.deliver {
                shared.requests.deliver = false;
                let message = shared.outbound;
                let cache = shared.kind_cache;
                decode::log_message("rx", SopType::Sop, Some(&Message::parse(&message, &cache)));
                _ = notifications.push(Notification::Receive(message));
            }

            shared.step(true, &mut notifications);

            if shared.requests.deliver {
                shared.delay = Some(DelayType::PeerResponse);
            }

            // Work latched by the step itself needs a regular pass.
            let rekick = shared.requests.mode_change || shared.requests.vbus_changed || shared.requests.process;
            (notifications, rekick)
        });

        self.notify(notifications);

        if rekick {
            self.kick.signal(());
        }
    }
}

impl<TCPM: PortManager, TIMER: Timer> PortController for PortSimulator<TCPM, TIMER> {
    fn init(&self) {
        debug!("init");
    }

    fn vbus_present(&self) -> bool {
        let vbus_present = self.lock(|shared| shared.vbus_present);
        trace!("vbus_present() = {}", vbus_present);
        vbus_present
    }

    fn set_vbus(&self, source: bool, sink: bool) {
        debug!("set_vbus(source: {}, sink: {})", source, sink);
        let changed = self.lock(|shared| {
            let vbus_present = source || sink;
            if vbus_present == shared.vbus_present {
                return false;
            }
            shared.vbus_present = vbus_present;
            shared.requests.vbus_changed = true;
            true
        });

        if changed {
            self.kick.signal(());
        }
    }

    fn cc_status(&self) -> (CcStatus, CcStatus) {
        let (cc1, cc2) = self.lock(|shared| (shared.cc1, shared.cc2));
        trace!("cc_status() = ({:?}, {:?})", cc1, cc2);
        (cc1, cc2)
    }

    fn set_cc(&self, pull: CcStatus) {
        // The simulated partner decides the CC levels itself.
        debug!("set_cc({:?})", pull);
    }

    fn start_toggling(&self, pull: CcStatus) {
        debug!("start_toggling({:?})", pull);
    }

    fn set_polarity(&self, polarity: CcPolarity) {
        self.lock(|shared| {
            shared.polarity = polarity;
            debug!("set_polarity({:?})", shared.polarity);
        });
    }

    fn set_vconn(&self, enable: bool) {
        self.lock(|shared| {
            shared.vconn_enabled = enable;
            debug!("set_vconn({})", shared.vconn_enabled);
        });
    }

    fn set_roles(&self, attached: bool, power_role: PowerRole, data_role: DataRole) {
        self.lock(|shared| {
            shared.attached = attached;
            shared.power_role = power_role;
            shared.data_role = data_role;
            debug!(
                "set_roles(attached: {}, {:?}, {:?})",
                shared.attached, shared.power_role, shared.data_role
            );
        });
    }

    fn set_pd_rx(&self, enable: bool) {
        debug!("set_pd_rx({})", enable);
        let changed = self.lock(|shared| {
            if shared.pd_rx_enabled == enable {
                return false;
            }
            shared.pd_rx_enabled = enable;
            true
        });

        if changed {
            self.kick.signal(());
        }
    }

    fn pd_transmit(&self, sop_type: SopType, message: Option<&PdMessage>) {
        self.lock(|shared| {
            let cache = shared.kind_cache;
            decode::log_message("tx", sop_type, message.map(|raw| Message::parse(raw, &cache)).as_ref());

            shared.tx_sop_type = sop_type;
            shared.tx_message = message.copied();
            shared.requests.process = true;
        });
        self.kick.signal(());
    }
}
