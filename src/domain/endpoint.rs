//! Remote endpoint handles
//!
//! Handles are what the delegate receives when discovery completes. They do
//! not own anything: the controller keeps the only strong reference to the
//! connection lease, so a handle goes dead as soon as the controller drops
//! the endpoint (explicit disconnect, link loss, or a new discovery cycle).

use crate::domain::models::NfcTechs;
use std::fmt;
use std::sync::{Arc, Weak};

/// Identifies one connected endpoint for the lifetime of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(pub(crate) u64);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint#{}", self.0)
    }
}

/// Liveness token held by the controller while an endpoint is connected
#[derive(Debug)]
pub(crate) struct EndpointLease {
    pub(crate) id: EndpointId,
}

impl EndpointLease {
    pub(crate) fn new(id: EndpointId) -> Arc<Self> {
        Arc::new(Self { id })
    }
}

/// Common surface of discovered endpoints
pub trait RemoteEndpoint {
    fn id(&self) -> EndpointId;

    /// Technologies that were activated when the endpoint was discovered
    fn technologies(&self) -> NfcTechs;

    /// False once the controller has dropped the connection
    fn is_connected(&self) -> bool;
}

/// A remote initiator discovered while the local controller acted as target
#[derive(Debug, Clone)]
pub struct RemoteInitiator {
    id: EndpointId,
    techs: NfcTechs,
    lease: Weak<EndpointLease>,
}

impl RemoteInitiator {
    pub(crate) fn new(lease: &Arc<EndpointLease>, techs: NfcTechs) -> Self {
        Self {
            id: lease.id,
            techs,
            lease: Arc::downgrade(lease),
        }
    }
}

impl RemoteEndpoint for RemoteInitiator {
    fn id(&self) -> EndpointId {
        self.id
    }

    fn technologies(&self) -> NfcTechs {
        self.techs
    }

    fn is_connected(&self) -> bool {
        self.lease.strong_count() > 0
    }
}

/// A remote target (tag or peer) discovered while the local controller polled
#[derive(Debug, Clone)]
pub struct RemoteTarget {
    id: EndpointId,
    techs: NfcTechs,
    lease: Weak<EndpointLease>,
}

impl RemoteTarget {
    pub(crate) fn new(lease: &Arc<EndpointLease>, techs: NfcTechs) -> Self {
        Self {
            id: lease.id,
            techs,
            lease: Arc::downgrade(lease),
        }
    }
}

impl RemoteEndpoint for RemoteTarget {
    fn id(&self) -> EndpointId {
        self.id
    }

    fn technologies(&self) -> NfcTechs {
        self.techs
    }

    fn is_connected(&self) -> bool {
        self.lease.strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_dies_with_lease() {
        let lease = EndpointLease::new(EndpointId(7));
        let techs = NfcTechs {
            iso_dep_a: true,
            ..Default::default()
        };
        let initiator = RemoteInitiator::new(&lease, techs);
        let copy = initiator.clone();

        assert!(initiator.is_connected());
        assert_eq!(initiator.id(), EndpointId(7));
        assert!(initiator.technologies().is_iso_dep());

        drop(lease);
        assert!(!initiator.is_connected());
        assert!(!copy.is_connected());
    }
}
