//! Services that talk to the outside world

pub mod load_save;
pub mod storage;
#[cfg(feature = "runtime")]
pub mod tracing_setup;
