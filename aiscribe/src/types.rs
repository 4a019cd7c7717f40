use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Broad media class, decided by extension at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// An intaken media file with its content fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub path: PathBuf,
    pub kind: MediaKind,
    /// Lowercase extension without the dot.
    pub extension: String,
    pub size_bytes: u64,
    /// Probed duration, when ffprobe could tell.
    pub duration_secs: Option<f64>,
    /// SHA-256 of the file content, hex-encoded.
    pub fingerprint: String,
}

impl MediaItem {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// A transcript segment with vendor-supplied timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Result of the speech-to-text stage. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    /// Detected or requested language code, when the vendor reports one.
    pub language: Option<String>,
    /// Per-segment timestamps, when the vendor provides them.
    pub segments: Option<Vec<Segment>>,
    /// Fingerprint of the source media file.
    pub fingerprint: String,
}

impl TranscriptionResult {
    /// Format as SRT subtitles. Without segment timing the whole text
    /// becomes a single cue.
    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for (i, (start, end, text)) in self.cues().into_iter().enumerate() {
            out.push_str(&format!("{}\n", i + 1));
            out.push_str(&format!(
                "{} --> {}\n",
                format_srt_time(start),
                format_srt_time(end)
            ));
            out.push_str(text.trim());
            out.push_str("\n\n");
        }
        out
    }

    /// Format as WebVTT subtitles.
    pub fn to_vtt(&self) -> String {
        let mut out = String::from("WEBVTT\n\n");
        for (start, end, text) in self.cues() {
            out.push_str(&format!(
                "{} --> {}\n",
                format_vtt_time(start),
                format_vtt_time(end)
            ));
            out.push_str(text.trim());
            out.push_str("\n\n");
        }
        out
    }

    /// Format as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn cues(&self) -> Vec<(f64, f64, &str)> {
        match &self.segments {
            Some(segments) if !segments.is_empty() => segments
                .iter()
                .map(|s| (s.start, s.end, s.text.as_str()))
                .collect(),
            _ => vec![(0.0, 0.0, self.text.as_str())],
        }
    }
}

/// Result of the AI text-processing stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedText {
    pub text: String,
    /// Id of the prompt template that produced this.
    pub template_id: String,
    /// Fingerprint of the transcript this was derived from.
    pub source_fingerprint: String,
}

/// Full-pipeline result for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub media: MediaItem,
    pub transcript: TranscriptionResult,
    /// Present when a template was applied.
    pub processed: Option<ProcessedText>,
}

impl PipelineOutput {
    /// Format as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Per-file outcome of a batch run, in input order.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: crate::Result<PipelineOutput>,
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm
fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0) as u64;
    let h = total_ms / 3_600_000;
    let m = (total_ms % 3_600_000) / 60_000;
    let s = (total_ms % 60_000) / 1_000;
    let ms = total_ms % 1_000;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

/// Format seconds as VTT timestamp: HH:MM:SS.mmm
fn format_vtt_time(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0) as u64;
    let h = total_ms / 3_600_000;
    let m = (total_ms % 3_600_000) / 60_000;
    let s = (total_ms % 60_000) / 1_000;
    let ms = total_ms % 1_000;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}
