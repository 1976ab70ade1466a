//! Domain services.

pub mod persona;
