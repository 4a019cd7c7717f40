use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::{self, ResultCache};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::intake;
use crate::media;
use crate::process::{self, ChatBackend, HttpChatClient};
use crate::template::TemplateCatalog;
use crate::transcribe::{self, HttpSpeechClient, RawTranscript, SpeechBackend};
use crate::types::{FileOutcome, MediaItem, PipelineOutput, ProcessedText, TranscriptionResult};

/// Progress callback: fraction in [0, 1] plus a short status message,
/// invoked from the running task.
pub type ProgressFn = dyn Fn(f32, &str) + Send + Sync;

/// The processing pipeline: intake → normalize → transcribe (cache first)
/// → AI-process (cache first). One pipeline handles one user action at a
/// time; batches run strictly sequentially.
pub struct Pipeline {
    config: PipelineConfig,
    cache: ResultCache,
    templates: TemplateCatalog,
    speech: Box<dyn SpeechBackend>,
    chat: Box<dyn ChatBackend>,
    progress: Option<Box<ProgressFn>>,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    /// Build a pipeline with the real HTTP vendor clients.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let speech = HttpSpeechClient::new(config.speech.clone(), config.retry.clone())?;
        let chat = HttpChatClient::new(config.chat.clone(), config.retry.clone())?;
        Self::with_backends(config, Box::new(speech), Box::new(chat))
    }

    /// Build a pipeline around custom backends. Used by tests and by
    /// callers bringing their own vendors.
    pub fn with_backends(
        config: PipelineConfig,
        speech: Box<dyn SpeechBackend>,
        chat: Box<dyn ChatBackend>,
    ) -> Result<Self> {
        let cache = ResultCache::open(&config.cache)?;
        Ok(Self {
            config,
            cache,
            templates: TemplateCatalog::builtin(),
            speech,
            chat,
            progress: None,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Attach a progress callback.
    pub fn on_progress(mut self, callback: impl Fn(f32, &str) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Flag checked between stages. Setting it discards the result of the
    /// stage in flight; it does not abort the request itself.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn templates(&self) -> &TemplateCatalog {
        &self.templates
    }

    pub fn templates_mut(&mut self) -> &mut TemplateCatalog {
        &mut self.templates
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Transcribe one file, serving a cached result when the fingerprint
    /// and language hint match a previous run.
    pub async fn transcribe(
        &self,
        path: &Path,
        language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        self.transcribe_span(path, language, 0.0, 1.0).await
    }

    /// Apply a template to transcribed text, serving a cached result when
    /// the transcript and template match a previous run.
    pub async fn process(
        &self,
        transcript: &TranscriptionResult,
        template_id: &str,
    ) -> Result<ProcessedText> {
        self.process_span(&transcript.text, template_id, 0.0, 1.0)
            .await
    }

    /// Apply a template to arbitrary text (the `process` URL action).
    pub async fn process_text(&self, text: &str, template_id: &str) -> Result<ProcessedText> {
        self.process_span(text, template_id, 0.0, 1.0).await
    }

    /// The full chain for one file. Without a template the output stops at
    /// the transcript.
    pub async fn run(
        &self,
        path: &Path,
        template_id: Option<&str>,
        language: Option<&str>,
    ) -> Result<PipelineOutput> {
        // Fail on an unknown template before any network work.
        if let Some(id) = template_id {
            self.templates.require(id)?;
        }

        let media = intake::resolve(path, &self.config.media)?;

        let transcript = match template_id {
            Some(_) => self.transcribe_media(&media, language, 0.0, 0.6).await?,
            None => self.transcribe_media(&media, language, 0.0, 1.0).await?,
        };

        let processed = match template_id {
            Some(id) => {
                self.check_cancelled()?;
                Some(self.process_span(&transcript.text, id, 0.6, 0.4).await?)
            }
            None => None,
        };

        self.report(1.0, "done");
        Ok(PipelineOutput {
            media,
            transcript,
            processed,
        })
    }

    /// Process a batch strictly sequentially: one file's full pipeline
    /// completes before the next begins. Output order matches input order;
    /// a file's failure is recorded, not fatal.
    pub async fn run_batch(
        &self,
        paths: &[PathBuf],
        template_id: Option<&str>,
        language: Option<&str>,
    ) -> Vec<FileOutcome> {
        let total = paths.len();
        let mut outcomes = Vec::with_capacity(total);

        for (i, path) in paths.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                outcomes.push(FileOutcome {
                    path: path.clone(),
                    result: Err(Error::Cancelled),
                });
                continue;
            }

            info!(file = %path.display(), n = i + 1, total, "batch item start");
            self.report(
                i as f32 / total.max(1) as f32,
                &format!("file {} of {}", i + 1, total),
            );

            let result = self.run(path, template_id, language).await;
            if let Err(e) = &result {
                warn!(file = %path.display(), error = %e, "batch item failed");
            }
            outcomes.push(FileOutcome {
                path: path.clone(),
                result,
            });
        }

        self.report(1.0, "batch done");
        outcomes
    }

    async fn transcribe_span(
        &self,
        path: &Path,
        language: Option<&str>,
        base: f32,
        span: f32,
    ) -> Result<TranscriptionResult> {
        let media = intake::resolve(path, &self.config.media)?;
        self.transcribe_media(&media, language, base, span).await
    }

    async fn transcribe_media(
        &self,
        media: &MediaItem,
        language: Option<&str>,
        base: f32,
        span: f32,
    ) -> Result<TranscriptionResult> {
        self.report_span(base, span, 0.0, "starting transcription");

        let key = cache::transcription_key(&media.fingerprint, language);
        if let Some(cached) = self.cache.get::<TranscriptionResult>(&key) {
            info!(file = %media.path.display(), "transcription served from cache");
            self.report_span(base, span, 1.0, "transcription complete (cached)");
            return Ok(cached);
        }

        self.check_cancelled()?;
        self.report_span(base, span, 0.2, "preparing audio");
        let normalized = media::normalize(media)?;

        self.check_cancelled()?;
        let raw = if media::should_split(media, &self.config.media) {
            self.transcribe_chunked(normalized.path(), language, base, span)
                .await?
        } else {
            self.report_span(base, span, 0.4, "uploading audio");
            self.speech.transcribe(normalized.path(), language).await?
        };
        self.check_cancelled()?;

        let result = TranscriptionResult {
            text: raw.text,
            language: raw.language.or_else(|| language.map(str::to_string)),
            segments: raw.segments,
            fingerprint: media.fingerprint.clone(),
        };

        if let Err(e) = self.cache.put(&key, &result) {
            warn!(error = %e, "could not cache transcription");
        }

        self.report_span(base, span, 1.0, "transcription complete");
        Ok(result)
    }

    async fn transcribe_chunked(
        &self,
        audio_path: &Path,
        language: Option<&str>,
        base: f32,
        span: f32,
    ) -> Result<RawTranscript> {
        let chunk_secs = self.config.media.chunk_duration_secs;
        self.report_span(base, span, 0.3, "splitting audio");
        let chunks = media::split_wav(audio_path, chunk_secs)?;
        let total = chunks.paths.len();

        let mut parts = Vec::with_capacity(total);
        for (i, chunk_path) in chunks.paths.iter().enumerate() {
            self.check_cancelled()?;
            self.report_span(
                base,
                span,
                0.4 + (i as f32 / total.max(1) as f32) * 0.5,
                &format!("transcribing segment {} of {}", i + 1, total),
            );
            parts.push(self.speech.transcribe(chunk_path, language).await);
        }

        let (merged, failed) = transcribe::merge_chunks(parts, chunk_secs)?;
        if failed > 0 {
            warn!(failed, total, "some segments failed to transcribe");
        }
        Ok(merged)
    }

    async fn process_span(
        &self,
        text: &str,
        template_id: &str,
        base: f32,
        span: f32,
    ) -> Result<ProcessedText> {
        self.report_span(base, span, 0.0, "preparing processing");
        let template = self.templates.require(template_id)?;

        let text_fingerprint = intake::fingerprint_text(text);
        let key = cache::processing_key(&text_fingerprint, template_id);
        if let Some(cached) = self.cache.get::<ProcessedText>(&key) {
            info!(template_id, "processing served from cache");
            self.report_span(base, span, 1.0, "processing complete (cached)");
            return Ok(cached);
        }

        self.check_cancelled()?;
        self.report_span(base, span, 0.2, "running AI processing");
        let output = process::apply_template(self.chat.as_ref(), &self.config.chat, template, text)
            .await?;
        self.check_cancelled()?;

        let result = ProcessedText {
            text: output,
            template_id: template_id.to_string(),
            source_fingerprint: text_fingerprint,
        };

        if let Err(e) = self.cache.put(&key, &result) {
            warn!(error = %e, "could not cache processed text");
        }

        self.report_span(base, span, 1.0, "processing complete");
        Ok(result)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn report(&self, progress: f32, message: &str) {
        if let Some(callback) = &self.progress {
            callback(progress.clamp(0.0, 1.0), message);
        }
    }

    fn report_span(&self, base: f32, span: f32, progress: f32, message: &str) {
        self.report(base + span * progress, message);
    }
}
