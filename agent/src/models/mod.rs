pub mod device;
pub mod envelope;
pub mod region;
