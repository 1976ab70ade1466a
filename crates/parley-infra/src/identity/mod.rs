//! External identity provider adapters.

pub mod userinfo;
