//! Audio/video to structured text — speech-to-text API in, template-shaped
//! text out.
//!
//! **aiscribe** handles the full pipeline: media intake and fingerprinting,
//! audio extraction (via ffmpeg), transcription through a speech-to-text
//! vendor API, and optional shaping of the transcript through a
//! chat-completion vendor with a prompt template (meeting notes, summaries,
//! …). Results are cached by content fingerprint so repeated runs over the
//! same input make no network calls.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> aiscribe::Result<()> {
//! // Transcribe a local file
//! let transcript = aiscribe::transcribe_file("meeting.mp3").await?;
//! println!("{}", transcript.text);
//!
//! // Or run the whole chain: transcribe, then shape with a template
//! let output = aiscribe::process_file("meeting.mp3", "meeting_notes").await?;
//! println!("{}", output.processed.unwrap().text);
//! # Ok(())
//! # }
//! ```
//!
//! Vendor credentials come from [`PipelineConfig`] or the
//! `SILICONFLOW_API_KEY` / `DEEPSEEK_API_KEY` environment variables.

pub mod cache;
pub mod config;
pub mod error;
pub(crate) mod intake;
pub(crate) mod media;
pub mod pipeline;
pub mod process;
pub mod scheme;
pub mod template;
pub mod transcribe;
pub mod types;
pub(crate) mod vendor;

pub use config::{CacheConfig, ChatConfig, MediaConfig, PipelineConfig, RetryConfig, SpeechConfig};
pub use error::{Error, Result};
pub use pipeline::Pipeline;
pub use scheme::Action;
pub use template::{PromptTemplate, TemplateCatalog};
pub use types::{
    FileOutcome, MediaItem, MediaKind, PipelineOutput, ProcessedText, Segment,
    TranscriptionResult,
};
pub use vendor::Vendor;

use std::path::Path;

/// Transcribe a local audio/video file with the default configuration.
pub async fn transcribe_file(path: impl AsRef<Path>) -> Result<TranscriptionResult> {
    let pipeline = Pipeline::new(PipelineConfig::load_default())?;
    pipeline.transcribe(path.as_ref(), None).await
}

/// Run the full pipeline on a local file: transcribe, then apply the given
/// prompt template.
pub async fn process_file(
    path: impl AsRef<Path>,
    template_id: &str,
) -> Result<PipelineOutput> {
    let pipeline = Pipeline::new(PipelineConfig::load_default())?;
    pipeline.run(path.as_ref(), Some(template_id), None).await
}
