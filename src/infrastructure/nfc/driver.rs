//! Driver and protocol stack contracts
//!
//! The controller consumes two external collaborators: the driver, which owns
//! the physical transceiver and raises hardware interrupts, and the
//! transceiver handle it produces, which embeds the protocol stack and is
//! advanced one scheduler step at a time.

use crate::domain::discovery::DiscoveredEndpoint;
use crate::domain::error::{DriverError, StackError};
use crate::domain::models::RfProtocols;
use crate::infrastructure::nfc::queue::InterruptSink;
use std::time::Duration;

/// Platform driver for a specific NFC controller chip
pub trait NfcControllerDriver {
    type Transceiver: Transceiver;

    /// Bring the hardware up and return the transceiver handle.
    ///
    /// The driver keeps `interrupts` and calls
    /// [`InterruptSink::on_hw_interrupt`] whenever the chip raises its IRQ line.
    fn initialize(&mut self, interrupts: InterruptSink) -> Result<Self::Transceiver, DriverError>;

    /// RF protocols this chip can handle
    fn supported_rf_protocols(&self) -> RfProtocols;
}

/// Transceiver handle with its embedded protocol stack
pub trait Transceiver {
    /// Select the protocols used by the next polling loop
    fn set_protocols(&mut self, protocols: RfProtocols);

    /// Begin polling. Progress and outcome are reported through later steps.
    fn start_polling(&mut self);

    /// Abort an in-flight polling loop
    fn abort(&mut self);

    /// Drop the link with the connected endpoint
    fn disconnect(&mut self);

    /// Run one scheduler iteration.
    ///
    /// `elapsed` is the scheduler clock (time since initialization). Discovery
    /// outcomes are raised into `events`; the return value tells the
    /// controller when the stack wants to run again.
    fn process(
        &mut self,
        event: SchedulerEvent,
        elapsed: Duration,
        events: &mut StackEvents,
    ) -> StepOutcome;
}

/// Why a scheduler step is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    None,
    HwInterrupt,
}

/// What the stack wants after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Run again after this delay (zero means as soon as possible)
    NeedsReschedule(Duration),
    /// Nothing pending until the next hardware interrupt
    Idle,
    /// Unrecoverable failure for the current cycle
    Error(StackError),
}

/// Events the stack raises from inside a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEvent {
    EndpointFound(DiscoveredEndpoint),
    RfError(StackError),
    /// Polling stopped after an abort request
    Aborted,
    /// The connected endpoint went away
    LinkLost,
}

/// Collects events raised during a single step
#[derive(Debug, Default)]
pub struct StackEvents {
    events: Vec<StackEvent>,
}

impl StackEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, event: StackEvent) {
        self.events.push(event);
    }

    pub fn endpoint_found(&mut self, endpoint: DiscoveredEndpoint) {
        self.raise(StackEvent::EndpointFound(endpoint));
    }

    pub fn rf_error(&mut self, error: StackError) {
        self.raise(StackEvent::RfError(error));
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_vec(self) -> Vec<StackEvent> {
        self.events
    }
}
