//! Infrastructure layer for the capture service.
//!
//! Contains OS-facing adapters: the Raw Input notification source, config
//! file loading, `tracing` setup, and the C ABI bridge to the host.

pub mod host_bridge;
pub mod logging;
pub mod notification_source;
pub mod storage;
