//! Document transcription and progress reporting.

mod orchestrator;
mod progress;

pub use orchestrator::{Transcriber, Transcription, TranscriptionState};
pub use progress::{ProgressEvent, ProgressHub};
