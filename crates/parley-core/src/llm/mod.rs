//! Completion client abstraction.

pub mod client;
