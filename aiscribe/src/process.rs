use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::{ChatConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::template::PromptTemplate;
use crate::vendor::{self, Vendor};

/// Chunking parameters for long transcripts: maximum characters per chunk
/// and the overlap carried between chunks to avoid cutting meaning.
const CHUNK_MAX_CHARS: usize = 2000;
const CHUNK_OVERLAP_CHARS: usize = 200;

/// The chat-completion seam.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, system_prompt: Option<&str>, user_prompt: &str) -> Result<String>;
}

/// HTTP client for an OpenAI-style `/chat/completions` endpoint.
pub struct HttpChatClient {
    http: reqwest::Client,
    config: ChatConfig,
    retry: RetryConfig,
}

impl HttpChatClient {
    pub fn new(config: ChatConfig, retry: RetryConfig) -> Result<Self> {
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
impl ChatBackend for HttpChatClient {
    async fn complete(&self, system_prompt: Option<&str>, user_prompt: &str) -> Result<String> {
        let api_key = self.config.resolve_api_key().ok_or(Error::ApiKeyMissing {
            vendor: Vendor::Chat,
        })?;

        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": user_prompt }));

        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "stream": false,
        });

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        info!(model = %self.config.model, prompt_chars = user_prompt.len(), "requesting completion");

        let value = vendor::request_json(Vendor::Chat, &self.retry, || {
            self.http.post(&url).bearer_auth(&api_key).json(&body)
        })
        .await?;

        parse_completion(&value)
    }
}

/// Apply a prompt template to a transcript, chunking when the text would
/// not fit the completion window.
pub async fn apply_template(
    backend: &dyn ChatBackend,
    config: &ChatConfig,
    template: &PromptTemplate,
    text: &str,
) -> Result<String> {
    if text.trim().is_empty() {
        return Err(Error::EmptyInput("transcript text".into()));
    }

    if estimate_tokens(text) > (config.max_tokens / 2) as usize {
        info!("transcript is long, processing in chunks");
        apply_template_chunked(backend, template, text).await
    } else {
        let user = build_user_prompt(&template.user_prompt, text);
        backend.complete(template.system_prompt.as_deref(), &user).await
    }
}

async fn apply_template_chunked(
    backend: &dyn ChatBackend,
    template: &PromptTemplate,
    text: &str,
) -> Result<String> {
    let chunks = chunk_text(text, CHUNK_MAX_CHARS, CHUNK_OVERLAP_CHARS);
    let total = chunks.len();
    info!(total, "processing text chunks");

    let mut results = Vec::with_capacity(total);
    let mut failed = 0;
    let mut first_err = None;

    for (i, chunk) in chunks.iter().enumerate() {
        let prompt = format!(
            "{}\n\nNote: this is part {} of {}. Keep the result consistent with the other parts.",
            template.user_prompt,
            i + 1,
            total
        );
        let user = build_user_prompt(&prompt, chunk);

        match backend.complete(template.system_prompt.as_deref(), &user).await {
            Ok(processed) => results.push(processed),
            Err(e) => {
                warn!(chunk = i + 1, total, error = %e, "chunk processing failed");
                results.push(format!("[processing failed, original text] {chunk}"));
                failed += 1;
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }

    if failed == total {
        return Err(first_err.unwrap_or(Error::Vendor {
            vendor: Vendor::Chat,
            status: None,
            message: "all chunks failed".into(),
        }));
    }
    if failed > 0 {
        warn!(failed, total, "some chunks fell back to the original text");
    }

    Ok(results.join("\n\n"))
}

fn build_user_prompt(prompt: &str, text: &str) -> String {
    format!("{prompt}\n\nSource text:\n{text}")
}

/// Pull the completion text out of the vendor response.
fn parse_completion(value: &Value) -> Result<String> {
    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .or_else(|| value.get("text").and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .ok_or_else(|| Error::Vendor {
            vendor: Vendor::Chat,
            status: None,
            message: "unrecognized response shape: no completion content".into(),
        })
}

/// Rough token estimate: CJK characters count one each, the rest counts by
/// whitespace-separated words.
pub(crate) fn estimate_tokens(text: &str) -> usize {
    let cjk = text.chars().filter(|c| is_cjk(*c)).count();
    let words = text
        .split_whitespace()
        .flat_map(|w| w.split(is_cjk))
        .filter(|w| !w.is_empty())
        .count();
    cjk + words
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Split long text into chunks of at most `max_chars`, preferring sentence
/// boundaries and keeping `overlap` characters of context between chunks.
pub(crate) fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = start + max_chars;
        if end >= chars.len() {
            chunks.push(chars[start..].iter().collect());
            break;
        }

        // Scan back for a sentence boundary, but no further than the
        // overlap window.
        let floor = (start + max_chars).saturating_sub(overlap);
        for i in (floor..end).rev() {
            if matches!(chars[i], '.' | '!' | '?' | '。' | '！' | '？') {
                end = i + 1;
                break;
            }
        }

        chunks.push(chars[start..end].iter().collect());
        start = end.saturating_sub(overlap);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_completion_message_content() {
        let value = json!({
            "choices": [{ "message": { "role": "assistant", "content": " result " } }]
        });
        assert_eq!(parse_completion(&value).unwrap(), "result");
    }

    #[test]
    fn test_parse_completion_text_fallback() {
        let value = json!({ "text": "plain" });
        assert_eq!(parse_completion(&value).unwrap(), "plain");
    }

    #[test]
    fn test_parse_completion_unknown_shape() {
        let value = json!({ "choices": [] });
        let err = parse_completion(&value).unwrap_err();
        assert!(matches!(err, Error::Vendor { .. }));
    }

    #[test]
    fn test_estimate_tokens_english() {
        assert_eq!(estimate_tokens("three small words"), 3);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_estimate_tokens_cjk() {
        // 4 CJK chars, no latin words
        assert_eq!(estimate_tokens("会议纪要"), 4);
        // mixed: 2 CJK chars + 2 words
        assert_eq!(estimate_tokens("开会 two words"), 4);
    }

    #[test]
    fn test_chunk_text_short_passthrough() {
        let chunks = chunk_text("short text", 100, 10);
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn test_chunk_text_splits_at_sentence_boundary() {
        let text = "First sentence. Second sentence is a bit longer! Third one here.";
        let chunks = chunk_text(text, 20, 10);
        assert!(chunks.len() > 1);
        // The boundary at offset 14 sits inside the scan-back window.
        assert_eq!(chunks[0], "First sentence.");
    }

    #[test]
    fn test_chunk_text_overlap_preserved() {
        let text = "a".repeat(250);
        let chunks = chunk_text(&text, 100, 20);
        assert!(chunks.len() >= 3);
        // With no sentence boundaries the next chunk starts overlap chars back.
        let first: Vec<char> = chunks[0].chars().collect();
        let second: Vec<char> = chunks[1].chars().collect();
        assert_eq!(&first[first.len() - 20..], &second[..20]);
    }

    #[test]
    fn test_chunk_text_covers_everything() {
        let text: String = ("sentence one. sentence two. ").repeat(40);
        let chunks = chunk_text(&text, 200, 30);
        let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
        // Overlap means total >= original length; nothing may be lost.
        assert!(total >= text.chars().count());
        assert!(chunks.iter().all(|c| c.chars().count() <= 200));
    }

    struct CannedChat {
        reply: String,
        fail: bool,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl ChatBackend for CannedChat {
        async fn complete(&self, _system: Option<&str>, _user: &str) -> Result<String> {
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if self.fail {
                Err(Error::Vendor {
                    vendor: Vendor::Chat,
                    status: Some(500),
                    message: "canned failure".into(),
                })
            } else {
                Ok(self.reply.clone())
            }
        }
    }

    fn template() -> PromptTemplate {
        PromptTemplate {
            name: "t".into(),
            description: String::new(),
            system_prompt: Some("sys".into()),
            user_prompt: "Summarize.".into(),
            category: String::new(),
            tags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_apply_template_empty_input() {
        let backend = CannedChat {
            reply: "r".into(),
            fail: false,
            calls: Default::default(),
        };
        let err = apply_template(&backend, &ChatConfig::default(), &template(), "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyInput(_)));
        assert_eq!(backend.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_apply_template_single_call_for_short_text() {
        let backend = CannedChat {
            reply: "processed".into(),
            fail: false,
            calls: Default::default(),
        };
        let out = apply_template(&backend, &ChatConfig::default(), &template(), "short input")
            .await
            .unwrap();
        assert_eq!(out, "processed");
        assert_eq!(backend.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_apply_template_chunks_long_text() {
        let backend = CannedChat {
            reply: "chunk result".into(),
            fail: false,
            calls: Default::default(),
        };
        // Well over max_tokens/2 words triggers chunking.
        let long = "word ".repeat(3000);
        let out = apply_template(&backend, &ChatConfig::default(), &template(), &long)
            .await
            .unwrap();
        let calls = backend.calls.load(std::sync::atomic::Ordering::SeqCst);
        assert!(calls > 1, "expected chunked calls, got {calls}");
        assert!(out.contains("chunk result"));
    }

    #[tokio::test]
    async fn test_apply_template_all_chunks_failed() {
        let backend = CannedChat {
            reply: String::new(),
            fail: true,
            calls: Default::default(),
        };
        let long = "word ".repeat(3000);
        let err = apply_template(&backend, &ChatConfig::default(), &template(), &long)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("canned failure"));
    }
}
