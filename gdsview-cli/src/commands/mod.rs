//! Command implementations for the gdsview CLI

pub mod bounds;
pub mod config;
pub mod simulate;
pub mod zoom_limits;
