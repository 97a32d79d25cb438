//! Application layer: the capture service's use cases.
//!
//! # Sub-modules
//!
//! - **`aggregator`** – The shared device table and discrete event queue.
//!   Every notification ends up here, and every poll drains it.
//!
//! - **`capture`** – The background thread that turns source notifications
//!   into aggregator updates.
//!
//! - **`lifecycle`** – `init` / `kill` / `poll` over one capture session at a
//!   time.

pub mod aggregator;
pub mod capture;
pub mod lifecycle;
