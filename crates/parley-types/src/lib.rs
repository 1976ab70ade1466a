//! Shared domain types for Parley.
//!
//! This crate contains the core domain types used across the Parley service:
//! User, Identity, Persona, Conversation, Message, the completion request
//! shapes, service configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod conversation;
pub mod error;
pub mod identity;
pub mod llm;
pub mod persona;
