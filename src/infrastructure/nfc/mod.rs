//! NFC Controller Module
//!
//! Drives a platform NFC controller through discovery and hands out the
//! discovered endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     NfcController                        │
//! │  (Main coordinator - public API for the application)     │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼──────────────┬──────────────┐
//!         │             │              │              │
//!         ▼             ▼              ▼              ▼
//! ┌────────────┐ ┌────────────┐ ┌─────────────┐ ┌───────────┐
//! │ Scheduler  │ │ EventQueue │ │  Notifier   │ │  Driver   │
//! │            │ │            │ │             │ │           │
//! │ - one step │ │ - FIFO     │ │ - delegate  │ │ - init    │
//! │   per pump │ │ - interrupt│ │   callbacks │ │ - stack   │
//! │ - timeout  │ │   coalesce │ │   deferred  │ │   steps   │
//! └────────────┘ └────────────┘ └─────────────┘ └───────────┘
//! ```
//!
//! The discovery state machine itself is pure and lives in
//! [`crate::domain::discovery`].
//!
//! ## Modules
//!
//! - [`driver`] - Traits the platform driver and its transceiver implement
//! - [`queue`] - Event-dispatch queue and the interrupt-context handle
//! - [`scheduler`] - Stack pumping and the single pending timeout
//! - [`notifier`] - Delegate trait and deferred delivery
//! - [`session`] - Borrowed access for post-discovery data exchange
//! - [`service`] - Main controller coordinator

pub mod driver;
pub mod notifier;
pub mod queue;
pub mod scheduler;
pub mod service;
pub mod session;

// Re-export main service for convenience
pub use service::NfcController;
