//! Test doubles for algomon.
//!
//! - [`fixtures`]: result documents, stream packets and in-memory results
//!   with fixed timestamps.
//! - [`MockFrames`]: a frame connector whose socket is fed by the test through
//!   a [`FramesController`].
//! - [`MockApi`]: a results API that replays a script of snapshots and
//!   failures.

mod api;
pub mod fixtures;
mod frames;

pub use api::{ApiStep, MockApi};
pub use frames::{FailingConnector, FramesController, MockFrames};
