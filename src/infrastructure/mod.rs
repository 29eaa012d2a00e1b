pub mod logging;
pub mod nfc;
