//! NFC Controller Service
//!
//! Main coordinator: owns the driver, the transceiver handle, the scheduler
//! and the event queue, and exposes the public operations. Everything here
//! runs on the single context that owns the controller; only
//! [`InterruptSink`](crate::infrastructure::nfc::queue::InterruptSink) is
//! touched from interrupt context.

use crate::domain::discovery::{DiscoveryOutcome, DiscoveryStateMachine};
use crate::domain::endpoint::RemoteEndpoint;
use crate::domain::error::NfcError;
use crate::domain::models::{ControllerEvent, ControllerState, RfProtocols, TerminationReason};
use crate::domain::settings::Settings;
use crate::infrastructure::nfc::driver::{NfcControllerDriver, StackEvent, Transceiver};
use crate::infrastructure::nfc::notifier::{EventNotifier, NfcControllerDelegate};
use crate::infrastructure::nfc::queue::{EventQueue, Work};
use crate::infrastructure::nfc::scheduler::{PendingTimeout, PumpReport, PumpTrigger, Scheduler};
use crate::infrastructure::nfc::session::EndpointSession;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{error, info, trace, warn};

/// An initialized NFC controller.
///
/// The only constructor is [`NfcController::initialize`], so initialization
/// always happens exactly once, before any other operation.
pub struct NfcController<'a, D: NfcControllerDriver> {
    driver: D,
    transceiver: D::Transceiver,
    machine: DiscoveryStateMachine,
    scheduler: Scheduler,
    notifier: EventNotifier,
    queue: EventQueue,
    ndef_buffer: &'a mut [u8],
}

impl<'a, D: NfcControllerDriver> NfcController<'a, D> {
    /// Bring up the controller.
    ///
    /// # Arguments
    /// * `driver` - platform driver; owned by the controller from now on
    /// * `ndef_buffer` - storage lent to endpoint sessions for NDEF messages
    /// * `settings` - scheduler limits and optional default protocols
    pub fn initialize(
        mut driver: D,
        ndef_buffer: &'a mut [u8],
        settings: &Settings,
    ) -> Result<Self, NfcError> {
        let queue = EventQueue::new();

        // Step 1: Hand the interrupt sink to the driver and get the transceiver
        let transceiver = driver.initialize(queue.interrupt_sink()).map_err(|e| {
            error!("NFC controller initialization failed: {}", e);
            NfcError::Init(e)
        })?;

        // Step 2: Query hardware capabilities
        let supported = driver.supported_rf_protocols();
        info!(
            "NFC controller initialized, supported RF protocols: {}, NDEF buffer: {} bytes",
            supported,
            ndef_buffer.len()
        );

        let mut controller = Self {
            driver,
            transceiver,
            machine: DiscoveryStateMachine::new(supported),
            scheduler: Scheduler::new(&settings.scheduler),
            notifier: EventNotifier::default(),
            queue,
            ndef_buffer,
        };

        // Step 3: Apply configured defaults
        if let Some(protocols) = settings.default_rf_protocols {
            if let Err(e) = controller.configure_rf_protocols(protocols) {
                warn!("Ignoring default RF protocols: {}", e);
            }
        }

        // Step 4: Let the stack run its startup work
        if settings.scheduler.initial_pump {
            controller.queue.post(Work::Pump(PumpTrigger::Scheduled));
        }

        Ok(controller)
    }

    /// Register the delegate that receives discovery events.
    ///
    /// Only a weak reference is kept: once the caller drops its `Arc`,
    /// notifications are dropped.
    pub fn set_delegate<T: NfcControllerDelegate + 'static>(&mut self, delegate: &Arc<T>) {
        let delegate: Arc<dyn NfcControllerDelegate> = delegate.clone();
        self.notifier.set_delegate(Some(Arc::downgrade(&delegate)));
    }

    pub fn clear_delegate(&mut self) {
        self.notifier.set_delegate(None);
    }

    pub fn state(&self) -> ControllerState {
        self.machine.state()
    }

    pub fn is_discovering(&self) -> bool {
        self.machine.state() == ControllerState::Discovering
    }

    /// RF protocols supported by the hardware
    pub fn supported_rf_protocols(&self) -> RfProtocols {
        self.machine.supported()
    }

    /// RF protocols used by the next discovery
    pub fn configured_rf_protocols(&self) -> RfProtocols {
        self.machine.configured()
    }

    /// Set the RF protocols to look for during discovery.
    ///
    /// Fails with `Busy` while discovery is running and with `Unsupported` if
    /// the set contains a protocol the hardware cannot do.
    pub fn configure_rf_protocols(&mut self, protocols: RfProtocols) -> Result<(), NfcError> {
        self.machine.configure(protocols)?;
        self.transceiver.set_protocols(protocols);
        info!("RF protocols configured: {}", protocols);
        Ok(())
    }

    /// Start discovery with the configured protocols.
    ///
    /// A connected endpoint is disconnected first. The outcome is reported
    /// through the delegate.
    pub fn start_discovery(&mut self) -> Result<(), NfcError> {
        let start = self.machine.begin_discovery()?;

        if let Some(endpoint) = start.dropped {
            info!("Disconnecting {} before starting discovery", endpoint);
            self.transceiver.disconnect();
        }

        self.transceiver.start_polling();
        self.queue.post(Work::Pump(PumpTrigger::Scheduled));
        Ok(())
    }

    /// Cancel a running discovery. Succeeds trivially when none is running.
    pub fn cancel_discovery(&mut self) -> Result<(), NfcError> {
        if self.machine.cancel().is_none() {
            return Ok(());
        }

        self.transceiver.abort();
        self.scheduler.disarm();
        self.notifier.post(
            &self.queue,
            ControllerEvent::DiscoveryTerminated(TerminationReason::Canceled),
        );
        Ok(())
    }

    /// Drop the connected endpoint, if any
    pub fn disconnect(&mut self) -> Result<(), NfcError> {
        if self.machine.disconnect().is_some() {
            self.transceiver.disconnect();
        }
        Ok(())
    }

    /// Open a data-exchange session with the connected endpoint
    pub fn endpoint_session<E: RemoteEndpoint>(
        &mut self,
        endpoint: &E,
    ) -> Result<EndpointSession<'_, D::Transceiver>, NfcError> {
        if !endpoint.is_connected() || self.machine.active_endpoint() != Some(endpoint.id()) {
            return Err(NfcError::EndpointGone);
        }
        Ok(EndpointSession::new(
            endpoint.id(),
            &mut self.transceiver,
            &mut *self.ndef_buffer,
        ))
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn pending_timeout(&self) -> &PendingTimeout {
        self.scheduler.pending_timeout()
    }

    /// Run everything that is ready now: an expired timeout and all queued
    /// work, including notifications posted along the way. Returns the number
    /// of items handled.
    ///
    /// At most one timeout pump runs per call, so a stack asking for
    /// zero-delay reschedules cannot starve the caller.
    pub fn dispatch_pending(&mut self) -> usize {
        let now = Instant::now();
        let mut timer_fired = false;
        let mut handled = 0;

        loop {
            if !timer_fired && self.scheduler.take_expired(now) {
                timer_fired = true;
                self.pump(PumpTrigger::Timeout);
            } else if let Some(work) = self.queue.try_next() {
                self.handle(work);
            } else {
                break;
            }
            handled += 1;
        }

        handled
    }

    /// Wait for the next queued work item or the pending timeout, then
    /// dispatch everything that is ready
    pub async fn run_once(&mut self) {
        let deadline = self.scheduler.deadline();
        let work = tokio::select! {
            work = self.queue.next() => work,
            _ = sleep_until_deadline(deadline) => None,
        };

        if let Some(work) = work {
            self.handle(work);
        }
        self.dispatch_pending();
    }

    /// Drive the controller until `shutdown` fires or its sender is dropped
    pub async fn run(&mut self, mut shutdown: oneshot::Receiver<()>) {
        info!("NFC controller event loop started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.run_once() => {}
            }
        }
        info!("NFC controller event loop stopped");
    }

    fn handle(&mut self, work: Work) {
        match work {
            Work::Pump(trigger) => self.pump(trigger),
            Work::Notify(notification) => self.notifier.deliver(notification),
        }
    }

    fn pump(&mut self, trigger: PumpTrigger) {
        let report = self.scheduler.pump(&mut self.transceiver, trigger);
        self.apply(report);
    }

    /// Turn what the stack raised during one step into state transitions
    fn apply(&mut self, report: PumpReport) {
        let mut found = None;
        let mut rf_error = None;
        let mut aborted = false;
        let mut link_lost = false;

        for event in report.events {
            match event {
                StackEvent::EndpointFound(endpoint) => {
                    if found.is_some() {
                        warn!("Stack reported more than one endpoint in a step, keeping the first");
                    } else {
                        found = Some(endpoint);
                    }
                }
                StackEvent::RfError(error) => {
                    rf_error.get_or_insert(error);
                }
                StackEvent::Aborted => aborted = true,
                StackEvent::LinkLost => link_lost = true,
            }
        }
        let rf_error = rf_error.or(report.fault.map(|fault| fault.stack_error()));

        match self.machine.state() {
            ControllerState::Discovering => {
                // An error in the same step beats a discovered endpoint
                let outcome = if let Some(error) = rf_error {
                    warn!("Discovery failed: {}", error);
                    Some(DiscoveryOutcome::RfError)
                } else if aborted {
                    Some(DiscoveryOutcome::Aborted)
                } else {
                    found.map(DiscoveryOutcome::Found)
                };

                if let Some(events) = outcome.and_then(|o| self.machine.finish(o)) {
                    for event in events {
                        self.notifier.post(&self.queue, event);
                    }
                }
            }
            ControllerState::Connected => {
                if let Some(error) = rf_error {
                    warn!("Link error while connected: {}", error);
                }
                if link_lost || rf_error.is_some() {
                    self.machine.disconnect();
                }
            }
            ControllerState::Idle => {
                if found.is_some() || rf_error.is_some() || aborted || link_lost {
                    trace!("Controller idle, discarding stale stack events");
                }
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
