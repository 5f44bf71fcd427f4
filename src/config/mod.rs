//! Configuration
//!
//! A single [`StaticConfig`] is loaded at startup and shared by `Arc`.

mod structs;

pub use structs::*;
