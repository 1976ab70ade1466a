//! Business logic and repository trait definitions for Parley.
//!
//! This crate defines the "ports" (repository, session store, and completion
//! client traits) that the infrastructure layer implements. It depends only
//! on `parley-types` -- never on `parley-infra` or any database/IO crate.

pub mod chat;
pub mod identity;
pub mod llm;
pub mod repository;
pub mod service;
