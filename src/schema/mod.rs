//! Recorded trace schema (blink.frame.v1)
//!
//! This module defines the on-disk format for recorded sessions: one frame
//! record per processed camera frame, as NDJSON or a JSON array.

mod adapter;
mod frame_record;

pub use adapter::*;
pub use frame_record::*;
