//! Media services: speech-to-text and text-to-speech over hosted APIs.

pub mod stt;
pub mod tts;

pub use stt::{Transcriber, WhisperTranscriber};
pub use tts::{AudioStream, ElevenLabsSynthesizer, Synthesis, Synthesizer};
