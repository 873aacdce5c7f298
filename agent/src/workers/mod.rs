//! Background workers

pub mod credential_sync;
pub mod poller;
