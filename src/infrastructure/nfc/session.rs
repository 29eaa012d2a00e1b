//! Endpoint session access
//!
//! Post-discovery data exchange (NDEF read/write, ISO-DEP APDUs) is done by
//! session objects outside this crate. They need the transceiver and the NDEF
//! buffer, and must not outlive the controller or the endpoint they were
//! opened for. An `EndpointSession` is a borrow of the controller, so the
//! compiler enforces the first rule; the controller only hands one out for the
//! currently connected endpoint, which covers the second.

use crate::domain::endpoint::EndpointId;
use crate::infrastructure::nfc::driver::Transceiver;

pub struct EndpointSession<'c, T: Transceiver> {
    endpoint: EndpointId,
    transceiver: &'c mut T,
    ndef_buffer: &'c mut [u8],
}

impl<'c, T: Transceiver> EndpointSession<'c, T> {
    pub(crate) fn new(
        endpoint: EndpointId,
        transceiver: &'c mut T,
        ndef_buffer: &'c mut [u8],
    ) -> Self {
        Self {
            endpoint,
            transceiver,
            ndef_buffer,
        }
    }

    pub fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    pub fn transceiver(&mut self) -> &mut T {
        self.transceiver
    }

    /// Caller-supplied NDEF storage, fixed for the controller's lifetime
    pub fn ndef_buffer(&mut self) -> &mut [u8] {
        self.ndef_buffer
    }
}
