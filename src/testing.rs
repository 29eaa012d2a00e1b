//! Scripted driver, transceiver and delegate used by unit tests

use crate::domain::discovery::DiscoveredEndpoint;
use crate::domain::endpoint::{EndpointId, RemoteEndpoint, RemoteInitiator, RemoteTarget};
use crate::domain::error::{DriverError, StackError};
use crate::domain::models::{NfcTechs, RfProtocols, TerminationReason};
use crate::domain::settings::{SchedulerSettings, Settings};
use crate::infrastructure::nfc::driver::{
    NfcControllerDriver, SchedulerEvent, StackEvent, StackEvents, StepOutcome, Transceiver,
};
use crate::infrastructure::nfc::notifier::NfcControllerDelegate;
use crate::infrastructure::nfc::queue::InterruptSink;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// One scripted scheduler iteration
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    pub events: Vec<StackEvent>,
    pub outcome: StepOutcome,
}

impl ScriptedStep {
    pub fn idle() -> Self {
        Self {
            events: Vec::new(),
            outcome: StepOutcome::Idle,
        }
    }

    pub fn reschedule(ms: u64) -> Self {
        Self {
            events: Vec::new(),
            outcome: StepOutcome::NeedsReschedule(Duration::from_millis(ms)),
        }
    }

    pub fn failing(code: i32) -> Self {
        Self {
            events: Vec::new(),
            outcome: StepOutcome::Error(StackError::new(code)),
        }
    }

    pub fn found_initiator() -> Self {
        Self::idle().with(StackEvent::EndpointFound(DiscoveredEndpoint::Initiator(
            iso_dep_a(),
        )))
    }

    pub fn found_target() -> Self {
        Self::idle().with(StackEvent::EndpointFound(DiscoveredEndpoint::Target(
            iso_dep_a(),
        )))
    }

    pub fn rf_error(code: i32) -> Self {
        Self::idle().with(StackEvent::RfError(StackError::new(code)))
    }

    pub fn with(mut self, event: StackEvent) -> Self {
        self.events.push(event);
        self
    }
}

pub fn iso_dep_a() -> NfcTechs {
    NfcTechs {
        iso_dep_a: true,
        ..Default::default()
    }
}

/// Everything the mock stack observed, shared with the test body
#[derive(Default)]
pub struct StackLog {
    pub protocols: RfProtocols,
    pub polling: bool,
    pub polls: usize,
    pub aborts: usize,
    pub disconnects: usize,
    pub steps: Vec<SchedulerEvent>,
    pub depth: usize,
    pub max_depth: usize,
    /// Raised as a hardware interrupt from inside the next step
    pub interrupt_in_step: Option<InterruptSink>,
    script: VecDeque<ScriptedStep>,
}

impl StackLog {
    pub fn script(&mut self, step: ScriptedStep) {
        self.script.push_back(step);
    }

    pub fn hw_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|event| **event == SchedulerEvent::HwInterrupt)
            .count()
    }
}

pub type SharedStack = Rc<RefCell<StackLog>>;

pub struct MockDriver {
    pub supported: RfProtocols,
    pub fault: Option<DriverError>,
    pub stack: SharedStack,
    pub sink: Rc<RefCell<Option<InterruptSink>>>,
}

impl MockDriver {
    pub fn new(supported: RfProtocols) -> Self {
        Self {
            supported,
            fault: None,
            stack: SharedStack::default(),
            sink: Rc::default(),
        }
    }

    pub fn failing(fault: DriverError) -> Self {
        Self {
            fault: Some(fault),
            ..Self::new(RfProtocols::ALL)
        }
    }
}

impl NfcControllerDriver for MockDriver {
    type Transceiver = MockTransceiver;

    fn initialize(&mut self, interrupts: InterruptSink) -> Result<MockTransceiver, DriverError> {
        if let Some(fault) = self.fault.clone() {
            return Err(fault);
        }
        *self.sink.borrow_mut() = Some(interrupts);
        Ok(MockTransceiver {
            stack: self.stack.clone(),
        })
    }

    fn supported_rf_protocols(&self) -> RfProtocols {
        self.supported
    }
}

pub struct MockTransceiver {
    stack: SharedStack,
}

impl Transceiver for MockTransceiver {
    fn set_protocols(&mut self, protocols: RfProtocols) {
        self.stack.borrow_mut().protocols = protocols;
    }

    fn start_polling(&mut self) {
        let mut stack = self.stack.borrow_mut();
        stack.polling = true;
        stack.polls += 1;
    }

    fn abort(&mut self) {
        let mut stack = self.stack.borrow_mut();
        stack.polling = false;
        stack.aborts += 1;
    }

    fn disconnect(&mut self) {
        self.stack.borrow_mut().disconnects += 1;
    }

    fn process(
        &mut self,
        event: SchedulerEvent,
        _elapsed: Duration,
        events: &mut StackEvents,
    ) -> StepOutcome {
        let (step, nested) = {
            let mut stack = self.stack.borrow_mut();
            stack.depth += 1;
            stack.max_depth = stack.max_depth.max(stack.depth);
            stack.steps.push(event);
            (stack.script.pop_front(), stack.interrupt_in_step.take())
        };

        if let Some(sink) = nested {
            sink.on_hw_interrupt();
        }

        let step = step.unwrap_or_else(ScriptedStep::idle);
        for raised in step.events {
            events.raise(raised);
        }

        self.stack.borrow_mut().depth -= 1;
        step.outcome
    }
}

/// Delegate callback as seen by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seen {
    Initiator(EndpointId),
    Target(EndpointId),
    Terminated(TerminationReason),
}

#[derive(Default)]
pub struct RecordingDelegate {
    pub seen: RefCell<Vec<Seen>>,
    pub initiators: RefCell<Vec<RemoteInitiator>>,
    pub targets: RefCell<Vec<RemoteTarget>>,
}

impl RecordingDelegate {
    pub fn take(&self) -> Vec<Seen> {
        std::mem::take(&mut *self.seen.borrow_mut())
    }
}

impl NfcControllerDelegate for RecordingDelegate {
    fn on_discovery_terminated(&self, reason: TerminationReason) {
        self.seen.borrow_mut().push(Seen::Terminated(reason));
    }

    fn on_initiator_discovered(&self, initiator: RemoteInitiator) {
        self.seen.borrow_mut().push(Seen::Initiator(initiator.id()));
        self.initiators.borrow_mut().push(initiator);
    }

    fn on_target_discovered(&self, target: RemoteTarget) {
        self.seen.borrow_mut().push(Seen::Target(target.id()));
        self.targets.borrow_mut().push(target);
    }
}

/// Settings without the startup pump, so scripts line up with explicit triggers
pub fn quiet_settings() -> Settings {
    Settings {
        scheduler: SchedulerSettings {
            initial_pump: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn ndef_buffer() -> &'static mut [u8] {
    Box::leak(vec![0u8; 256].into_boxed_slice())
}
