//! Chat turns: prompt construction, per-conversation turn guard, and the
//! conversation orchestrator.

pub mod guard;
pub mod orchestrator;
pub mod prompt;
