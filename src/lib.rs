pub mod backend;
pub mod chunker;
pub mod common;
pub mod crypto;
pub mod pipeline;
pub mod server;
pub mod store;
