//! Domain entities for raw mouse capture.
//!
//! Nothing in here touches the OS. The capture crate translates OS
//! notifications into these types, and the protocol module turns them into
//! bytes.
//!
//! # Two kinds of output (for beginners)
//!
//! Mouse input splits naturally into two shapes:
//!
//! - **Edges** happen once and must never be lost or merged: a device
//!   plugging in, a button going down. These are [`event::DiscreteEvent`]s and
//!   are queued in arrival order.
//! - **Motion** is continuous. Reporting every tiny delta would be wasteful,
//!   so deltas are summed per device and reported once per poll as a
//!   [`event::MovementSample`].

pub mod buttons;
pub mod device;
pub mod event;
pub mod snapshot;
