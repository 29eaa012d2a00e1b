//! Event notifier
//!
//! Delegate callbacks are never invoked where an event is detected. They are
//! posted to the event queue and delivered when the queue is drained, in
//! detection order. Each notification is bound to the delegate registered
//! when it was posted, so replacing the delegate mid-cycle never splits a
//! cycle's events across two delegates.

use crate::domain::endpoint::{RemoteInitiator, RemoteTarget};
use crate::domain::models::{ControllerEvent, TerminationReason};
use crate::infrastructure::nfc::queue::{EventQueue, Work};
use std::collections::HashMap;
use std::sync::Weak;
use tokio::sync::mpsc;
use tracing::trace;

/// Receives discovery events. Every method defaults to doing nothing.
pub trait NfcControllerDelegate {
    /// The discovery process terminated
    fn on_discovery_terminated(&self, _reason: TerminationReason) {}

    /// A remote initiator was discovered (the local controller is in target mode)
    fn on_initiator_discovered(&self, _initiator: RemoteInitiator) {}

    /// A remote target was discovered (the local controller is in initiator mode)
    fn on_target_discovered(&self, _target: RemoteTarget) {}
}

/// Forward events to a channel, for applications that consume them from a task
impl NfcControllerDelegate for mpsc::UnboundedSender<ControllerEvent> {
    fn on_discovery_terminated(&self, reason: TerminationReason) {
        let _ = self.send(ControllerEvent::DiscoveryTerminated(reason));
    }

    fn on_initiator_discovered(&self, initiator: RemoteInitiator) {
        let _ = self.send(ControllerEvent::InitiatorDiscovered(initiator));
    }

    fn on_target_discovered(&self, target: RemoteTarget) {
        let _ = self.send(ControllerEvent::TargetDiscovered(target));
    }
}

/// A queued event, tagged with the delegate registration it was posted under.
/// Carries no delegate reference so the queue stays `Send`.
#[derive(Debug)]
pub(crate) struct Notification {
    registration: u64,
    event: ControllerEvent,
}

struct Registration {
    delegate: Weak<dyn NfcControllerDelegate>,
    pending: usize,
}

/// Holds non-owning references to the current delegate and to replaced
/// delegates that still have notifications in the queue
#[derive(Default)]
pub(crate) struct EventNotifier {
    current: u64,
    registrations: HashMap<u64, Registration>,
}

impl EventNotifier {
    pub(crate) fn set_delegate(&mut self, delegate: Option<Weak<dyn NfcControllerDelegate>>) {
        self.current += 1;
        self.registrations.retain(|_, r| r.pending > 0);
        if let Some(delegate) = delegate {
            self.registrations.insert(
                self.current,
                Registration {
                    delegate,
                    pending: 0,
                },
            );
        }
    }

    /// Queue a notification for the current delegate. Dropped right away
    /// when nobody is listening.
    pub(crate) fn post(&mut self, queue: &EventQueue, event: ControllerEvent) {
        let registration = match self.registrations.get_mut(&self.current) {
            Some(r) if r.delegate.strong_count() > 0 => r,
            _ => {
                trace!("No delegate, dropping {:?}", event);
                return;
            }
        };
        registration.pending += 1;
        queue.post(Work::Notify(Notification {
            registration: self.current,
            event,
        }));
    }

    /// Run a queued notification against the delegate it was posted for
    pub(crate) fn deliver(&mut self, notification: Notification) {
        let Notification {
            registration: id,
            event,
        } = notification;

        let delegate = match self.registrations.get_mut(&id) {
            Some(registration) => {
                registration.pending = registration.pending.saturating_sub(1);
                let delegate = registration.delegate.upgrade();
                if registration.pending == 0 && id != self.current {
                    self.registrations.remove(&id);
                }
                delegate
            }
            None => None,
        };
        let Some(delegate) = delegate else {
            trace!("Delegate gone before delivery, dropping {:?}", event);
            return;
        };

        match event {
            ControllerEvent::InitiatorDiscovered(initiator) => {
                delegate.on_initiator_discovered(initiator)
            }
            ControllerEvent::TargetDiscovered(target) => delegate.on_target_discovered(target),
            ControllerEvent::DiscoveryTerminated(reason) => {
                delegate.on_discovery_terminated(reason)
            }
        }
    }
}
