//! Pipeline-step handlers and callback delivery for a media-processing job
//! orchestrator.
//!
//! The crate covers three steps of an execution: staging the source file
//! ([`ingest`]), running managed transcription jobs ([`transcribe`]), and
//! fanning results out to caller-declared destinations ([`callback`]).

pub mod api;
pub mod callback;
pub mod config;
pub mod credentials;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod storage;
pub mod transcribe;
pub mod types;

pub use error::{Error, Result};
