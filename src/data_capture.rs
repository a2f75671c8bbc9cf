pub mod codec;
pub mod types;

pub use codec::{CompressorPool, InteractionCodec};
pub use types::{CompressedInteraction, Interaction, Protocol};
