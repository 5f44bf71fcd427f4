//! Execution modes

pub mod modes;
