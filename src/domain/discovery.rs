//! Discovery / connection state machine
//!
//! Pure bookkeeping: this type never talks to the transceiver. The controller
//! service asks it whether an operation is legal, performs the driver calls,
//! and relies on the returned values to know what to tear down or announce.

use crate::domain::endpoint::{EndpointId, EndpointLease, RemoteInitiator, RemoteTarget};
use crate::domain::error::NfcError;
use crate::domain::models::{
    ControllerEvent, ControllerState, NfcTechs, RfProtocols, TerminationReason,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Exists only while discovery is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverySession {
    cycle: u64,
}

impl DiscoverySession {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }
}

/// What the stack found at the end of a discovery cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveredEndpoint {
    /// A remote initiator polled us (local controller in target mode)
    Initiator(NfcTechs),
    /// We polled a remote target (local controller in initiator mode)
    Target(NfcTechs),
}

/// How a discovery cycle ended, as seen by the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    Found(DiscoveredEndpoint),
    Aborted,
    RfError,
}

/// Result of a successful start request
#[derive(Debug)]
pub struct DiscoveryStart {
    pub session: DiscoverySession,
    /// Endpoint that had to be disconnected first, if any
    pub dropped: Option<EndpointId>,
}

#[derive(Debug)]
struct ConnectedEndpoint {
    lease: Arc<EndpointLease>,
}

#[derive(Debug)]
enum Mode {
    Idle,
    Discovering(DiscoverySession),
    Connected(ConnectedEndpoint),
}

pub struct DiscoveryStateMachine {
    mode: Mode,
    supported: RfProtocols,
    configured: RfProtocols,
    cycles: u64,
    endpoints: u64,
}

impl DiscoveryStateMachine {
    pub fn new(supported: RfProtocols) -> Self {
        Self {
            mode: Mode::Idle,
            supported,
            configured: RfProtocols::EMPTY,
            cycles: 0,
            endpoints: 0,
        }
    }

    pub fn state(&self) -> ControllerState {
        match self.mode {
            Mode::Idle => ControllerState::Idle,
            Mode::Discovering(_) => ControllerState::Discovering,
            Mode::Connected(_) => ControllerState::Connected,
        }
    }

    pub fn supported(&self) -> RfProtocols {
        self.supported
    }

    pub fn configured(&self) -> RfProtocols {
        self.configured
    }

    pub fn session(&self) -> Option<DiscoverySession> {
        match self.mode {
            Mode::Discovering(session) => Some(session),
            _ => None,
        }
    }

    pub fn active_endpoint(&self) -> Option<EndpointId> {
        match &self.mode {
            Mode::Connected(endpoint) => Some(endpoint.lease.id),
            _ => None,
        }
    }

    /// Validate and store a new protocol selection.
    ///
    /// Running discovery is checked before the subset test, so a request made
    /// mid-discovery reports `Busy` even when it is also unsupported.
    pub fn configure(&mut self, protocols: RfProtocols) -> Result<(), NfcError> {
        if matches!(self.mode, Mode::Discovering(_)) {
            return Err(NfcError::Busy);
        }
        if !protocols.is_subset_of(self.supported) {
            return Err(NfcError::Unsupported {
                requested: protocols,
                supported: self.supported,
            });
        }
        self.configured = protocols;
        debug!("Configured RF protocols: {}", protocols);
        Ok(())
    }

    /// Enter Discovering, dropping any connected endpoint first
    pub fn begin_discovery(&mut self) -> Result<DiscoveryStart, NfcError> {
        let dropped = match &self.mode {
            Mode::Discovering(_) => return Err(NfcError::Busy),
            Mode::Connected(endpoint) => Some(endpoint.lease.id),
            Mode::Idle => None,
        };

        self.cycles += 1;
        let session = DiscoverySession { cycle: self.cycles };
        self.mode = Mode::Discovering(session);
        info!("Discovery cycle {} started", session.cycle);

        Ok(DiscoveryStart { session, dropped })
    }

    /// Leave Discovering on caller request. Returns the canceled session, or
    /// None when discovery was not running.
    pub fn cancel(&mut self) -> Option<DiscoverySession> {
        let session = self.session()?;
        self.mode = Mode::Idle;
        info!("Discovery cycle {} canceled", session.cycle);
        Some(session)
    }

    /// Apply the stack's verdict on the running cycle and return the
    /// notifications to post, in order. Returns None when discovery is not
    /// running, in which case the outcome is stale and must be ignored.
    pub fn finish(&mut self, outcome: DiscoveryOutcome) -> Option<Vec<ControllerEvent>> {
        let session = self.session()?;

        let events = match outcome {
            DiscoveryOutcome::Found(endpoint) => {
                self.endpoints += 1;
                let lease = EndpointLease::new(EndpointId(self.endpoints));
                let discovered = match endpoint {
                    DiscoveredEndpoint::Initiator(techs) => {
                        ControllerEvent::InitiatorDiscovered(RemoteInitiator::new(&lease, techs))
                    }
                    DiscoveredEndpoint::Target(techs) => {
                        ControllerEvent::TargetDiscovered(RemoteTarget::new(&lease, techs))
                    }
                };
                info!(
                    "Discovery cycle {} completed, {} connected",
                    session.cycle, lease.id
                );
                self.mode = Mode::Connected(ConnectedEndpoint { lease });
                vec![
                    discovered,
                    ControllerEvent::DiscoveryTerminated(TerminationReason::Completed),
                ]
            }
            DiscoveryOutcome::Aborted => {
                info!("Discovery cycle {} aborted by the stack", session.cycle);
                self.mode = Mode::Idle;
                vec![ControllerEvent::DiscoveryTerminated(TerminationReason::Canceled)]
            }
            DiscoveryOutcome::RfError => {
                info!("Discovery cycle {} ended on RF error", session.cycle);
                self.mode = Mode::Idle;
                vec![ControllerEvent::DiscoveryTerminated(TerminationReason::RfError)]
            }
        };

        Some(events)
    }

    /// Drop the connected endpoint. Returns its id, or None when nothing was
    /// connected.
    pub fn disconnect(&mut self) -> Option<EndpointId> {
        let id = self.active_endpoint()?;
        // Dropping the lease kills every handle given to the delegate
        self.mode = Mode::Idle;
        info!("{} disconnected", id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::endpoint::RemoteEndpoint;

    fn machine() -> DiscoveryStateMachine {
        DiscoveryStateMachine::new(RfProtocols::ISO_DEP | RfProtocols::T5T)
    }

    fn iso_dep() -> NfcTechs {
        NfcTechs {
            iso_dep_a: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_configure_checks_subset() {
        let mut sm = machine();
        assert!(sm.configure(RfProtocols::ISO_DEP).is_ok());
        assert_eq!(sm.configured(), RfProtocols::ISO_DEP);

        let err = sm.configure(RfProtocols::T1T).unwrap_err();
        assert!(matches!(
            err,
            NfcError::Unsupported { requested, .. } if requested == RfProtocols::T1T
        ));
        assert_eq!(sm.configured(), RfProtocols::ISO_DEP);
    }

    #[test]
    fn test_configure_busy_wins_over_unsupported() {
        let mut sm = machine();
        sm.configure(RfProtocols::ISO_DEP).unwrap();
        sm.begin_discovery().unwrap();

        assert!(matches!(sm.configure(RfProtocols::T5T), Err(NfcError::Busy)));
        assert!(matches!(sm.configure(RfProtocols::T1T), Err(NfcError::Busy)));
        assert_eq!(sm.configured(), RfProtocols::ISO_DEP);
    }

    #[test]
    fn test_begin_twice_is_busy() {
        let mut sm = machine();
        let start = sm.begin_discovery().unwrap();
        assert_eq!(start.session.cycle(), 1);
        assert!(start.dropped.is_none());
        assert!(matches!(sm.begin_discovery(), Err(NfcError::Busy)));
        assert_eq!(sm.state(), ControllerState::Discovering);
    }

    #[test]
    fn test_found_connects_and_orders_events() {
        let mut sm = machine();
        sm.begin_discovery().unwrap();

        let events = sm
            .finish(DiscoveryOutcome::Found(DiscoveredEndpoint::Initiator(iso_dep())))
            .unwrap();

        assert_eq!(sm.state(), ControllerState::Connected);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ControllerEvent::InitiatorDiscovered(_)));
        assert!(matches!(
            events[1],
            ControllerEvent::DiscoveryTerminated(TerminationReason::Completed)
        ));
    }

    #[test]
    fn test_restart_from_connected_drops_endpoint() {
        let mut sm = machine();
        sm.begin_discovery().unwrap();
        let events = sm
            .finish(DiscoveryOutcome::Found(DiscoveredEndpoint::Target(iso_dep())))
            .unwrap();
        let target = match &events[0] {
            ControllerEvent::TargetDiscovered(target) => target.clone(),
            other => panic!("unexpected event {:?}", other),
        };
        assert!(target.is_connected());

        let start = sm.begin_discovery().unwrap();
        assert_eq!(start.dropped, Some(target.id()));
        assert_eq!(start.session.cycle(), 2);
        assert!(!target.is_connected());
        assert_eq!(sm.state(), ControllerState::Discovering);
    }

    #[test]
    fn test_rf_error_returns_to_idle_without_endpoint() {
        let mut sm = machine();
        sm.begin_discovery().unwrap();
        let events = sm.finish(DiscoveryOutcome::RfError).unwrap();
        assert_eq!(sm.state(), ControllerState::Idle);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            ControllerEvent::DiscoveryTerminated(TerminationReason::RfError)
        ));
    }

    #[test]
    fn test_stale_outcome_is_ignored() {
        let mut sm = machine();
        assert!(sm.finish(DiscoveryOutcome::RfError).is_none());

        sm.begin_discovery().unwrap();
        assert!(sm.cancel().is_some());
        assert!(sm.cancel().is_none());
        assert!(sm
            .finish(DiscoveryOutcome::Found(DiscoveredEndpoint::Target(iso_dep())))
            .is_none());
        assert_eq!(sm.state(), ControllerState::Idle);
    }

    #[test]
    fn test_configure_allowed_while_connected() {
        let mut sm = machine();
        sm.begin_discovery().unwrap();
        sm.finish(DiscoveryOutcome::Found(DiscoveredEndpoint::Target(iso_dep())))
            .unwrap();
        assert!(sm.configure(RfProtocols::T5T).is_ok());
        assert_eq!(sm.state(), ControllerState::Connected);
    }

    #[test]
    fn test_disconnect() {
        let mut sm = machine();
        assert!(sm.disconnect().is_none());
        sm.begin_discovery().unwrap();
        sm.finish(DiscoveryOutcome::Found(DiscoveredEndpoint::Target(iso_dep())))
            .unwrap();
        assert!(sm.disconnect().is_some());
        assert_eq!(sm.state(), ControllerState::Idle);
        assert!(sm.active_endpoint().is_none());
    }
}
