//! rawmouse-capture library entry point.
//!
//! Built both as a `cdylib` (the C exports in
//! [`infrastructure::host_bridge`]) and as an `rlib` shared by the
//! `rawmouse-debug` console and the integration tests in `tests/`.

pub mod application;
pub mod infrastructure;

pub use application::lifecycle::{CaptureService, InitOutcome, KillReport, ServiceState};
pub use infrastructure::host_bridge::{
    rawmouse_free_buffer, rawmouse_init, rawmouse_kill, rawmouse_poll, PollBuffer,
};
