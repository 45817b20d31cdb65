//! Common code shared between `detect_client` and `stub_server`.
pub mod protocol;

/// Error type.
pub type Error = Box<dyn std::error::Error>;
