//! Core types, config, errors, and call-session model for voxrelay.

pub mod call;
pub mod config;
pub mod error;
pub mod types;
