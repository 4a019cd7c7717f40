use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{RetryConfig, SpeechConfig};
use crate::error::{Error, Result};
use crate::types::Segment;
use crate::vendor::{self, Vendor};

/// A vendor transcript before it is tied to a source fingerprint.
#[derive(Debug, Clone)]
pub struct RawTranscript {
    pub text: String,
    pub language: Option<String>,
    pub segments: Option<Vec<Segment>>,
}

/// The speech-to-text seam. The HTTP client is the production
/// implementation; tests swap in counters and canned transcripts.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<RawTranscript>;
}

/// HTTP client for an OpenAI-style `/audio/transcriptions` endpoint.
pub struct HttpSpeechClient {
    http: reqwest::Client,
    config: SpeechConfig,
    retry: RetryConfig,
}

impl HttpSpeechClient {
    pub fn new(config: SpeechConfig, retry: RetryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            config,
            retry,
        })
    }
}

#[async_trait]
impl SpeechBackend for HttpSpeechClient {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<RawTranscript> {
        let api_key = self.config.resolve_api_key().ok_or(Error::ApiKeyMissing {
            vendor: Vendor::Speech,
        })?;

        let bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();
        let mime = mime_for(&file_name);
        let url = format!(
            "{}/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        );

        info!(
            path = %audio_path.display(),
            size_bytes = bytes.len(),
            model = %self.config.model,
            "uploading audio for transcription"
        );

        let value = vendor::request_json(Vendor::Speech, &self.retry, || {
            let part = reqwest::multipart::Part::bytes(bytes.clone())
                .file_name(file_name.clone())
                .mime_str(mime)
                .expect("static mime type");
            let mut form = reqwest::multipart::Form::new()
                .part("file", part)
                .text("model", self.config.model.clone())
                .text("response_format", "json");
            if let Some(lang) = language {
                form = form.text("language", lang.to_string());
            }
            self.http.post(&url).bearer_auth(&api_key).multipart(form)
        })
        .await?;

        parse_transcript(&value)
    }
}

/// Pull a transcript out of the vendor response. Shapes seen in the wild:
/// `{text}`, `{data: {text}}`, and OpenAI-style `choices`.
fn parse_transcript(value: &Value) -> Result<RawTranscript> {
    let text = value
        .get("text")
        .and_then(Value::as_str)
        .or_else(|| value.pointer("/data/text").and_then(Value::as_str))
        .or_else(|| value.pointer("/choices/0/text").and_then(Value::as_str))
        .or_else(|| {
            value
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
        })
        .ok_or_else(|| Error::Vendor {
            vendor: Vendor::Speech,
            status: None,
            message: "unrecognized response shape: no transcript text".into(),
        })?
        .trim()
        .to_string();

    let language = value
        .get("language")
        .and_then(Value::as_str)
        .map(str::to_string);

    let segments = value
        .get("segments")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(parse_segment).collect::<Vec<_>>())
        .filter(|v: &Vec<Segment>| !v.is_empty());

    Ok(RawTranscript {
        text,
        language,
        segments,
    })
}

fn parse_segment(value: &Value) -> Option<Segment> {
    Some(Segment {
        start: value.get("start")?.as_f64()?,
        end: value.get("end")?.as_f64()?,
        text: value.get("text")?.as_str()?.trim().to_string(),
    })
}

/// Merge per-chunk transcripts back into one, in chunk order. A failed
/// chunk leaves a placeholder; segment times are shifted by the chunk
/// offset. Errors out only when every chunk failed.
pub(crate) fn merge_chunks(
    parts: Vec<Result<RawTranscript>>,
    chunk_secs: u64,
) -> Result<(RawTranscript, usize)> {
    let total = parts.len();
    let mut texts = Vec::with_capacity(total);
    let mut segments: Vec<Segment> = Vec::new();
    let mut language = None;
    let mut failed = 0;
    let mut first_err = None;

    for (i, part) in parts.into_iter().enumerate() {
        match part {
            Ok(chunk) => {
                texts.push(chunk.text);
                if language.is_none() {
                    language = chunk.language;
                }
                if let Some(chunk_segments) = chunk.segments {
                    let offset = (i as u64 * chunk_secs) as f64;
                    segments.extend(chunk_segments.into_iter().map(|s| Segment {
                        start: s.start + offset,
                        end: s.end + offset,
                        text: s.text,
                    }));
                }
            }
            Err(e) => {
                warn!(chunk = i + 1, total, error = %e, "chunk transcription failed");
                texts.push(format!("[segment {} of {} failed]", i + 1, total));
                failed += 1;
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }

    if failed == total {
        return Err(first_err.unwrap_or(Error::Vendor {
            vendor: Vendor::Speech,
            status: None,
            message: "all chunks failed".into(),
        }));
    }

    Ok((
        RawTranscript {
            text: texts.join(" "),
            language,
            segments: (!segments.is_empty()).then_some(segments),
        },
        failed,
    ))
}

fn mime_for(file_name: &str) -> &'static str {
    match file_name.rsplit('.').next() {
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        _ => "audio/wav",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_text_shape() {
        let value = json!({ "text": "  hello world  " });
        let t = parse_transcript(&value).unwrap();
        assert_eq!(t.text, "hello world");
        assert!(t.language.is_none());
        assert!(t.segments.is_none());
    }

    #[test]
    fn test_parse_data_text_shape() {
        let value = json!({ "data": { "text": "nested" } });
        assert_eq!(parse_transcript(&value).unwrap().text, "nested");
    }

    #[test]
    fn test_parse_choices_shapes() {
        let value = json!({ "choices": [{ "text": "from choices" }] });
        assert_eq!(parse_transcript(&value).unwrap().text, "from choices");

        let value = json!({ "choices": [{ "message": { "content": "from message" } }] });
        assert_eq!(parse_transcript(&value).unwrap().text, "from message");
    }

    #[test]
    fn test_parse_with_language_and_segments() {
        let value = json!({
            "text": "one two",
            "language": "en",
            "segments": [
                { "start": 0.0, "end": 1.0, "text": " one " },
                { "start": 1.0, "end": 2.0, "text": "two" }
            ]
        });
        let t = parse_transcript(&value).unwrap();
        assert_eq!(t.language.as_deref(), Some("en"));
        let segments = t.segments.unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "one");
    }

    #[test]
    fn test_parse_malformed_segments_ignored() {
        let value = json!({
            "text": "ok",
            "segments": [{ "start": "not a number" }]
        });
        let t = parse_transcript(&value).unwrap();
        assert!(t.segments.is_none());
    }

    #[test]
    fn test_parse_unknown_shape_is_vendor_error() {
        let value = json!({ "status": "done" });
        let err = parse_transcript(&value).unwrap_err();
        assert!(matches!(err, Error::Vendor { .. }));
    }

    #[test]
    fn test_merge_chunks_in_order() {
        let parts = vec![
            Ok(RawTranscript {
                text: "first".into(),
                language: Some("en".into()),
                segments: Some(vec![Segment {
                    start: 0.0,
                    end: 2.0,
                    text: "first".into(),
                }]),
            }),
            Ok(RawTranscript {
                text: "second".into(),
                language: None,
                segments: Some(vec![Segment {
                    start: 0.5,
                    end: 1.5,
                    text: "second".into(),
                }]),
            }),
        ];

        let (merged, failed) = merge_chunks(parts, 60).unwrap();
        assert_eq!(merged.text, "first second");
        assert_eq!(failed, 0);
        assert_eq!(merged.language.as_deref(), Some("en"));
        let segments = merged.segments.unwrap();
        assert_eq!(segments[1].start, 60.5);
        assert_eq!(segments[1].end, 61.5);
    }

    #[test]
    fn test_merge_chunks_with_failure_placeholder() {
        let parts = vec![
            Ok(RawTranscript {
                text: "good".into(),
                language: None,
                segments: None,
            }),
            Err(Error::Vendor {
                vendor: Vendor::Speech,
                status: Some(500),
                message: "boom".into(),
            }),
        ];

        let (merged, failed) = merge_chunks(parts, 60).unwrap();
        assert_eq!(failed, 1);
        assert!(merged.text.contains("good"));
        assert!(merged.text.contains("[segment 2 of 2 failed]"));
    }

    #[test]
    fn test_merge_chunks_all_failed() {
        let parts: Vec<Result<RawTranscript>> = vec![
            Err(Error::Vendor {
                vendor: Vendor::Speech,
                status: None,
                message: "first failure".into(),
            }),
            Err(Error::Vendor {
                vendor: Vendor::Speech,
                status: None,
                message: "second failure".into(),
            }),
        ];

        let err = merge_chunks(parts, 60).unwrap_err();
        assert!(err.to_string().contains("first failure"));
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for("a.mp3"), "audio/mpeg");
        assert_eq!(mime_for("a.wav"), "audio/wav");
        assert_eq!(mime_for("noext"), "audio/wav");
    }
}
