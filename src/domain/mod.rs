pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod models;
pub mod settings;
