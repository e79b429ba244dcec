//! Data store modules

pub mod relay;

pub use relay::MemoryRelay;
