//! Credential signing, storage and rotation

pub mod credential;
pub mod guard;
pub mod signer;
pub mod store;
pub mod token_client;
