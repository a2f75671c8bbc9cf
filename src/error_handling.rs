pub mod types;

pub use types::{CodecError, ConfigError, ControllerError, StoreError, WebError};
