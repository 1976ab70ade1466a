//! Infrastructure layer for Parley.
//!
//! Contains implementations of the traits defined in `parley-core`: SQLite
//! storage and session store, the Anthropic completion client, the HTTP
//! userinfo identity provider, plus config loading and data directory
//! resolution.

pub mod config;
pub mod data_dir;
pub mod identity;
pub mod llm;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod test_server;
