//! Test doubles: timers and a recording Port Manager.
use std::cell::RefCell;
use std::time::Duration;
use std::vec::Vec;

// Links the host implementation of critical-section for the engine's mutex.
use critical_section as _;

use tcpmsim_traits::{PdMessage, PortManager, TransmitStatus};

use crate::timers::Timer;

/// A timer that never fires, for stepping the engine by hand.
pub struct DummyTimer {}

impl Timer for DummyTimer {
    async fn after_millis(_milliseconds: u64) {
        // Never time out
        core::future::pending().await
    }
}

/// A timer backed by the tokio runtime, for run-loop tests.
pub struct TokioTimer {}

impl Timer for TokioTimer {
    async fn after_millis(milliseconds: u64) {
        tokio::time::sleep(Duration::from_millis(milliseconds)).await
    }
}

/// A callback captured by a [`RecordingPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortEvent {
    CcChange,
    VbusChange,
    Receive(PdMessage),
    TransmitComplete(TransmitStatus),
    HardReset,
    TcpcReset,
}

/// A Port Manager double that records every callback for assertions.
#[derive(Default)]
pub struct RecordingPort {
    events: RefCell<Vec<PortEvent>>,
}

impl RecordingPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain all recorded callbacks, in the order they were raised.
    pub fn take_events(&self) -> Vec<PortEvent> {
        self.events.take()
    }
}

impl PortManager for RecordingPort {
    fn cc_change(&self) {
        self.events.borrow_mut().push(PortEvent::CcChange);
    }

    fn vbus_change(&self) {
        self.events.borrow_mut().push(PortEvent::VbusChange);
    }

    fn pd_receive(&self, message: &PdMessage) {
        self.events.borrow_mut().push(PortEvent::Receive(*message));
    }

    fn pd_transmit_complete(&self, status: TransmitStatus) {
        self.events.borrow_mut().push(PortEvent::TransmitComplete(status));
    }

    fn pd_hard_reset(&self) {
        self.events.borrow_mut().push(PortEvent::HardReset);
    }

    fn tcpc_reset(&self) {
        self.events.borrow_mut().push(PortEvent::TcpcReset);
    }
}
