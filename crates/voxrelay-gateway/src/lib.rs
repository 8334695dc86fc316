//! HTTP gateway for the voxrelay voice assistant.
//!
//! Serves the audio pipeline (`POST /api`), the Retell credential endpoints,
//! a UI analytics sink, and health. Vendor clients are injected through
//! [`GatewayState`] so every handler can run against fakes.

pub mod error;
pub mod form;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod pipeline;
pub mod prompt;
pub mod server;
pub mod state;
pub mod token;
pub mod track;

pub use error::PipelineError;
pub use server::{app, start_gateway, ServeOptions};
pub use state::{GatewayState, Pipeline, VoiceAgent};
