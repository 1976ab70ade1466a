//! Identity gate, session storage port, and login/logout service.

pub mod gate;
pub mod provider;
pub mod service;
pub mod session_store;
