use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::config::MediaConfig;
use crate::error::{Error, Result};
use crate::types::{MediaItem, MediaKind};

/// Target sample rate for vendor upload.
const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Audio extensions the transcription endpoint accepts as-is.
const PASSTHROUGH_FORMATS: [&str; 2] = ["wav", "mp3"];

/// Normalized audio ready for upload. Holds the temp directory alive for
/// converted output; passthrough input carries no guard.
pub struct NormalizedAudio {
    path: PathBuf,
    _guard: Option<TempDirGuard>,
}

impl NormalizedAudio {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Fixed-duration WAV chunks split out of one long recording. The chunk
/// files live in a temp directory removed when this is dropped.
pub struct AudioChunks {
    pub paths: Vec<PathBuf>,
    _guard: TempDirGuard,
}

/// Normalize a media file for upload: audio in a passthrough format is
/// used untouched, anything else is converted/extracted to 16 kHz mono WAV
/// via ffmpeg.
pub fn normalize(item: &MediaItem) -> Result<NormalizedAudio> {
    if item.kind == MediaKind::Audio && PASSTHROUGH_FORMATS.contains(&item.extension.as_str()) {
        debug!(path = %item.path.display(), "audio format needs no conversion");
        return Ok(NormalizedAudio {
            path: item.path.clone(),
            _guard: None,
        });
    }

    info!(path = %item.path.display(), kind = ?item.kind, "extracting audio track");

    let guard = TempDirGuard::create()?;
    let out = guard.path().join("audio.wav");
    run_ffmpeg(|cmd| {
        cmd.args(["-nostdin", "-i"])
            .arg(&item.path)
            .args(["-vn", "-ac", "1", "-acodec", "pcm_s16le", "-ar"])
            .arg(TARGET_SAMPLE_RATE.to_string())
            .arg(&out);
    })?;

    if !out.exists() {
        return Err(Error::AudioConvert(
            "ffmpeg produced no output — the file may have no audio track".into(),
        ));
    }

    Ok(NormalizedAudio {
        path: out,
        _guard: Some(guard),
    })
}

/// Whether a recording is long enough to warrant chunked transcription:
/// over 80 % of the size limit, or longer than twice the chunk duration.
pub fn should_split(item: &MediaItem, config: &MediaConfig) -> bool {
    let size_mb = item.size_mb();
    if size_mb > config.max_file_size_mb as f64 * 0.8 {
        debug!(size_mb, "size over split threshold");
        return true;
    }
    if let Some(duration) = item.duration_secs {
        if duration > (config.chunk_duration_secs * 2) as f64 {
            debug!(duration, "duration over split threshold");
            return true;
        }
    }
    false
}

/// Split a WAV file into fixed-duration chunks with ffmpeg.
pub fn split_wav(path: &Path, chunk_secs: u64) -> Result<AudioChunks> {
    let duration = probe_duration(path).ok_or_else(|| {
        Error::AudioConvert(format!("cannot probe duration of {}", path.display()))
    })?;

    if chunk_secs == 0 {
        return Err(Error::AudioConvert("chunk duration must be nonzero".into()));
    }

    let num_chunks = (duration / chunk_secs as f64).ceil().max(1.0) as u64;
    info!(duration, num_chunks, "splitting audio");

    let guard = TempDirGuard::create()?;
    let mut paths = Vec::with_capacity(num_chunks as usize);

    for i in 0..num_chunks {
        let out = guard.path().join(format!("chunk_{i:04}.wav"));
        let offset = i * chunk_secs;
        run_ffmpeg(|cmd| {
            cmd.args(["-nostdin", "-ss"])
                .arg(offset.to_string())
                .args(["-t"])
                .arg(chunk_secs.to_string())
                .arg("-i")
                .arg(path)
                .args(["-ac", "1", "-acodec", "pcm_s16le", "-ar"])
                .arg(TARGET_SAMPLE_RATE.to_string())
                .arg(&out);
        })?;
        if out.exists() {
            paths.push(out);
        }
    }

    if paths.is_empty() {
        return Err(Error::AudioConvert("splitting produced no chunks".into()));
    }

    Ok(AudioChunks {
        paths,
        _guard: guard,
    })
}

/// Probe a file's duration in seconds via ffprobe. Failures are tolerated;
/// callers treat a missing duration as "unknown".
pub fn probe_duration(path: &Path) -> Option<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output();

    match output {
        Ok(out) if out.status.success() => {
            let raw = String::from_utf8_lossy(&out.stdout);
            raw.trim().parse::<f64>().ok()
        }
        Ok(out) => {
            debug!(
                path = %path.display(),
                stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                "ffprobe failed"
            );
            None
        }
        Err(e) => {
            debug!(error = %e, "ffprobe not available");
            None
        }
    }
}

/// Run ffmpeg with the given argument setup, mapping spawn and exit
/// failures into crate errors.
fn run_ffmpeg(configure: impl FnOnce(&mut Command)) -> Result<()> {
    let mut cmd = Command::new("ffmpeg");
    configure(&mut cmd);

    let output = cmd.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FfmpegNotFound
        } else {
            Error::AudioConvert(format!("failed to run ffmpeg: {e}"))
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr_truncated: String = stderr.chars().take(1000).collect();
        return Err(Error::AudioConvert(format!(
            "ffmpeg failed: {stderr_truncated}"
        )));
    }

    Ok(())
}

/// RAII guard owning a per-invocation temp directory.
pub(crate) struct TempDirGuard(PathBuf);

impl TempDirGuard {
    /// Create a unique temp directory so concurrent runs (even within the
    /// same process) don't collide.
    pub(crate) fn create() -> Result<Self> {
        let dir = std::env::temp_dir().join(format!(
            "aiscribe-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir)?;
        Ok(Self(dir))
    }

    pub(crate) fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.0) {
                warn!(path = %self.0.display(), error = %e, "failed to clean up temp dir");
            }
        }
    }
}
