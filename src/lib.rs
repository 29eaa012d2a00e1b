//! NFC controller endpoint manager.
//!
//! Drives an NFC transceiver through discovery and connection, pumps the
//! protocol stack on hardware interrupts and timeouts, and reports discovered
//! remote endpoints to a delegate.
//!
//! ```ignore
//! let mut controller = NfcController::initialize(driver, &mut ndef_buffer, &settings)?;
//! controller.set_delegate(&delegate);
//! controller.configure_rf_protocols(RfProtocols::ISO_DEP)?;
//! controller.start_discovery()?;
//! controller.run(shutdown).await;
//! ```

pub mod domain;
pub mod infrastructure;

#[cfg(test)]
mod testing;

pub use domain::endpoint::{EndpointId, RemoteEndpoint, RemoteInitiator, RemoteTarget};
pub use domain::error::{DriverError, NfcError, StackError};
pub use domain::models::{
    ControllerEvent, ControllerState, NfcTechs, RfProtocol, RfProtocols, TerminationReason,
};
pub use domain::settings::{Settings, SettingsService};
pub use infrastructure::nfc::driver::{NfcControllerDriver, Transceiver};
pub use infrastructure::nfc::notifier::NfcControllerDelegate;
pub use infrastructure::nfc::queue::InterruptSink;
pub use infrastructure::nfc::NfcController;
