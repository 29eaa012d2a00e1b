use crate::domain::models::RfProtocols;
use thiserror::Error;

/// Errors returned synchronously by controller operations
#[derive(Debug, Error)]
pub enum NfcError {
    /// The driver reported a hardware fault while bringing the controller up
    #[error("controller initialization failed: {0}")]
    Init(#[source] DriverError),

    #[error("unsupported RF protocols {requested} (controller supports {supported})")]
    Unsupported {
        requested: RfProtocols,
        supported: RfProtocols,
    },

    #[error("discovery is already running")]
    Busy,

    /// The endpoint handle no longer refers to the connected endpoint
    #[error("remote endpoint is no longer connected")]
    EndpointGone,
}

/// Faults reported by the transceiver driver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("hardware fault: {0}")]
    HardwareFault(String),

    #[error("transceiver not responding")]
    NotResponding,
}

/// Error code raised by the protocol stack during a scheduler step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("protocol stack error (code {code})")]
pub struct StackError {
    pub code: i32,
}

impl StackError {
    /// Code used when the scheduler itself cannot arm the next wake-up
    pub const TIMER_FAULT: i32 = -1;

    pub fn new(code: i32) -> Self {
        Self { code }
    }
}
