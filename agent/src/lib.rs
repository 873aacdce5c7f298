//! Tuya Monitor Library
//!
//! Signs requests to the Tuya cloud OpenAPI, keeps per-account credentials
//! fresh and polls device properties.

pub mod app;
pub mod authn;
pub mod cache;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod storage;
pub mod utils;
pub mod workers;
