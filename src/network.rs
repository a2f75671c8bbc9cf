//! Host name handling shared by every protocol adapter: locating the embedded
//! correlation identifier and normalising `Host` values.

pub mod host;
pub mod identifier;
pub mod types;

pub use host::{host_without_port, is_bare_domain};
pub use identifier::{extract_identifier, reflect, CORRELATION_ID_WIDTH, IDENTIFIER_WIDTH};
pub use types::ExtractedId;
