//! Validating and storing an uploaded video.

use std::fmt::Display;
use std::path::Path;

use futures_util::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;

use crate::error::UploadError;
use crate::sanitize;

/// Stem used when sanitizing leaves nothing of the original name.
const FALLBACK_STEM: &str = "video";

/// An upload that passed the request checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    /// Sanitized name used on disk and in the job record.
    pub filename: String,
    pub target_language: String,
}

/// Checks the client-supplied filename and language before anything is
/// written.
pub fn validate(filename: &str, target_language: &str) -> Result<ValidatedUpload, UploadError> {
    if filename.trim().is_empty() {
        return Err(UploadError::EmptyFilename);
    }

    let Some(extension) = sanitize::allowed_extension(filename) else {
        let extension = Path::new(filename)
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Err(UploadError::DisallowedExtension { extension });
    };

    let target_language = target_language.trim();
    if !sanitize::is_valid_language(target_language) {
        return Err(UploadError::InvalidLanguage(target_language.to_string()));
    }

    let mut safe = sanitize::secure_filename(filename);
    // Names made only of non-ASCII characters lose their whole stem.
    if sanitize::allowed_extension(&safe).is_none() {
        safe = format!("{FALLBACK_STEM}.{extension}");
    }

    Ok(ValidatedUpload {
        filename: safe,
        target_language: target_language.to_string(),
    })
}

/// Streams `body` into `path`, returning the number of bytes written.
///
/// A partially written file is removed on failure.
pub async fn write_stream<S, B, E>(path: &Path, body: S) -> Result<u64, UploadError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let result = copy_to_file(path, body).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Could not remove partial upload {}: {}", path.display(), e);
            }
        }
    }
    result
}

async fn copy_to_file<S, B, E>(path: &Path, body: S) -> Result<u64, UploadError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let io_err = |e| UploadError::Io {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = tokio::fs::File::create(path).await.map_err(io_err)?;
    let mut written = 0u64;

    futures_util::pin_mut!(body);
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| UploadError::Read(e.to_string()))?;
        let bytes = chunk.as_ref();
        file.write_all(bytes).await.map_err(io_err)?;
        written += bytes.len() as u64;
    }
    file.flush().await.map_err(io_err)?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn test_validate_accepts_and_sanitizes() {
        let upload = validate("../My Holiday.MP4", "pt-BR").unwrap();
        assert_eq!(upload.filename, "My_Holiday.MP4");
        assert_eq!(upload.target_language, "pt-BR");
    }

    #[test]
    fn test_validate_rejections() {
        assert!(matches!(validate("", "fr"), Err(UploadError::EmptyFilename)));
        assert!(matches!(validate("  ", "fr"), Err(UploadError::EmptyFilename)));
        assert!(matches!(
            validate("notes.txt", "fr"),
            Err(UploadError::DisallowedExtension { extension }) if extension == "txt"
        ));
        assert!(matches!(
            validate("noext", "fr"),
            Err(UploadError::DisallowedExtension { .. })
        ));
        assert!(matches!(
            validate("clip.mp4", "French"),
            Err(UploadError::InvalidLanguage(_))
        ));
    }

    #[test]
    fn test_validate_falls_back_when_stem_is_stripped() {
        let upload = validate("فيديو.mp4", "ar").unwrap();
        assert_eq!(upload.filename, "video.mp4");

        assert_eq!(validate("..MKV", "fr").unwrap().filename, "video.mkv");
        assert_eq!(validate("视频 片段.webm", "zh-CN").unwrap().filename, "video.webm");
    }

    #[tokio::test]
    async fn test_write_stream_counts_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let chunks: Vec<Result<Vec<u8>, String>> = vec![Ok(b"abc".to_vec()), Ok(b"defg".to_vec())];

        let written = write_stream(&path, stream::iter(chunks)).await.unwrap();
        assert_eq!(written, 7);
        assert_eq!(std::fs::read(&path).unwrap(), b"abcdefg");
    }

    #[tokio::test]
    async fn test_write_stream_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let chunks: Vec<Result<Vec<u8>, String>> =
            vec![Ok(b"abc".to_vec()), Err("connection reset".to_string())];

        let err = write_stream(&path, stream::iter(chunks)).await.unwrap_err();
        assert!(matches!(err, UploadError::Read(msg) if msg == "connection reset"));
        assert!(!path.exists());
    }
}
