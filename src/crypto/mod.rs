pub mod encryption;
pub mod types;

pub use encryption::{decrypt, encrypt};
pub use types::EncryptionKey;
