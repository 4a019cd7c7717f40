use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Error, Result};
use crate::media;
use crate::types::{MediaItem, MediaKind};

/// Resolve an incoming file reference into a [`MediaItem`]: validate the
/// path, classify the format, enforce the size limit, and fingerprint the
/// content.
pub fn resolve(path: &Path, config: &MediaConfig) -> Result<MediaItem> {
    if path.as_os_str().is_empty() {
        return Err(Error::EmptyInput("file path".into()));
    }
    if !path.exists() {
        return Err(Error::MediaNotFound {
            path: path.to_path_buf(),
        });
    }
    if !path.is_file() {
        return Err(Error::NotAFile {
            path: path.to_path_buf(),
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let kind = classify(&extension, config).ok_or_else(|| {
        Error::UnsupportedFormat(if extension.is_empty() {
            path.display().to_string()
        } else {
            extension.clone()
        })
    })?;

    let size_bytes = std::fs::metadata(path)?.len();
    let size_mb = size_bytes as f64 / (1024.0 * 1024.0);
    if size_mb > config.max_file_size_mb as f64 {
        return Err(Error::FileTooLarge {
            size_mb,
            limit_mb: config.max_file_size_mb,
        });
    }

    let fingerprint = fingerprint_file(path)?;
    let duration_secs = media::probe_duration(path);

    debug!(
        path = %path.display(),
        ?kind,
        size_bytes,
        fingerprint = %fingerprint,
        "media resolved"
    );
    info!(path = %path.display(), "intake complete");

    Ok(MediaItem {
        path: path.to_path_buf(),
        kind,
        extension,
        size_bytes,
        duration_secs,
        fingerprint,
    })
}

/// Classify an extension against the configured format lists.
pub fn classify(extension: &str, config: &MediaConfig) -> Option<MediaKind> {
    if config.audio_formats.iter().any(|f| f == extension) {
        Some(MediaKind::Audio)
    } else if config.video_formats.iter().any(|f| f == extension) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Streaming SHA-256 of a file's content, hex-encoded.
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

/// SHA-256 of a string, hex-encoded. Used for cache keys over text.
pub fn fingerprint_text(text: &str) -> String {
    hex_encode(&Sha256::digest(text.as_bytes()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn write_temp(name: &str, content: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_resolve_missing_file() {
        let result = resolve(Path::new("/nonexistent/talk.mp3"), &MediaConfig::default());
        assert!(matches!(result.unwrap_err(), Error::MediaNotFound { .. }));
    }

    #[test]
    fn test_resolve_empty_path() {
        let result = resolve(Path::new(""), &MediaConfig::default());
        assert!(matches!(result.unwrap_err(), Error::EmptyInput(_)));
    }

    #[test]
    fn test_resolve_directory_rejected() {
        let result = resolve(&std::env::temp_dir(), &MediaConfig::default());
        assert!(matches!(result.unwrap_err(), Error::NotAFile { .. }));
    }

    #[test]
    fn test_resolve_unsupported_format() {
        let path = write_temp("aiscribe_test_intake.txt", b"not media");
        let result = resolve(&path, &MediaConfig::default());
        assert!(matches!(result.unwrap_err(), Error::UnsupportedFormat(_)));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_resolve_size_limit() {
        let path = write_temp("aiscribe_test_intake_big.wav", &[0u8; 4096]);
        let config = MediaConfig {
            max_file_size_mb: 0,
            ..MediaConfig::default()
        };
        let result = resolve(&path, &config);
        assert!(matches!(result.unwrap_err(), Error::FileTooLarge { .. }));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_resolve_audio_and_video_kinds() {
        let config = MediaConfig::default();
        assert_eq!(classify("mp3", &config), Some(MediaKind::Audio));
        assert_eq!(classify("mkv", &config), Some(MediaKind::Video));
        assert_eq!(classify("txt", &config), None);
        assert_eq!(classify("", &config), None);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let path = write_temp("aiscribe_test_fp_stable.wav", b"same content");
        let a = fingerprint_file(&path).unwrap();
        let b = fingerprint_file(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_fingerprints_differ_for_different_content() {
        let a_path = write_temp("aiscribe_test_fp_a.wav", b"content A");
        let b_path = write_temp("aiscribe_test_fp_b.wav", b"content B");
        let a = fingerprint_file(&a_path).unwrap();
        let b = fingerprint_file(&b_path).unwrap();
        assert_ne!(a, b);
        fs::remove_file(&a_path).ok();
        fs::remove_file(&b_path).ok();
    }

    #[test]
    fn test_fingerprint_text() {
        let a = fingerprint_text("hello");
        let b = fingerprint_text("hello");
        let c = fingerprint_text("hello!");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_resolved_item_carries_fingerprint() {
        let path = write_temp("aiscribe_test_intake_ok.mp3", b"fake mp3 bytes");
        let item = resolve(&path, &MediaConfig::default()).unwrap();
        assert_eq!(item.kind, MediaKind::Audio);
        assert_eq!(item.extension, "mp3");
        assert_eq!(item.size_bytes, 14);
        assert_eq!(item.fingerprint, fingerprint_file(&path).unwrap());
        fs::remove_file(&path).ok();
    }
}
