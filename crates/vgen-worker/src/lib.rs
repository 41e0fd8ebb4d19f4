//! Narrated video worker.
//!
//! This crate provides:
//! - The per-job pipeline from topic to rendered video
//! - Traits for the external script, speech, transcription and footage services
//! - Progress delivery and per-job status logs
//! - A job executor with bounded concurrency, timeouts and cancellation
//! - Manifest-backed collaborators for offline renders

pub mod collaborators;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod progress;
pub mod retry;

#[cfg(test)]
mod testing;

pub use collaborators::{Collaborators, FootageSearch, ScriptWriter, SpeechSynthesizer, Transcriber};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use manifest::JobManifest;
pub use pipeline::{JobContext, RenderPipeline};
pub use progress::{ChannelProgress, JobProgress, ProgressSink, StatusBoard};
