//! ffmpeg / ffprobe backed stages.

use std::ffi::OsStr;
use std::path::Path;

use async_trait::async_trait;

use super::command::{ensure_output, ensure_readable, run_tool};
use super::error::StageError;
use super::{AudioExtractor, MediaProbe, VideoMerger};

/// Demuxes the audio track to mono 16 kHz 16-bit PCM WAV.
pub struct FfmpegAudioExtractor {
    ffmpeg: String,
}

impl FfmpegAudioExtractor {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

#[async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    async fn extract(&self, video: &Path, audio_out: &Path) -> Result<(), StageError> {
        ensure_readable(video).await?;

        let args: [&OsStr; 11] = [
            "-i".as_ref(),
            video.as_os_str(),
            "-vn".as_ref(),
            "-acodec".as_ref(),
            "pcm_s16le".as_ref(),
            "-ar".as_ref(),
            "16000".as_ref(),
            "-ac".as_ref(),
            "1".as_ref(),
            audio_out.as_os_str(),
            "-y".as_ref(),
        ];
        run_tool(&self.ffmpeg, args).await?;

        ensure_output(audio_out).await
    }
}

/// Replaces the audio of a video, copying the video stream untouched.
pub struct FfmpegVideoMerger {
    ffmpeg: String,
}

impl FfmpegVideoMerger {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

#[async_trait]
impl VideoMerger for FfmpegVideoMerger {
    async fn merge(&self, video: &Path, audio: &Path, out: &Path) -> Result<(), StageError> {
        ensure_readable(video).await?;
        ensure_readable(audio).await?;

        let args: [&OsStr; 13] = [
            "-i".as_ref(),
            video.as_os_str(),
            "-i".as_ref(),
            audio.as_os_str(),
            "-map".as_ref(),
            "0:v".as_ref(),
            "-map".as_ref(),
            "1:a".as_ref(),
            "-c:v".as_ref(),
            "copy".as_ref(),
            "-shortest".as_ref(),
            out.as_os_str(),
            "-y".as_ref(),
        ];
        run_tool(&self.ffmpeg, args).await?;

        ensure_output(out).await
    }
}

/// Reads container duration with ffprobe.
pub struct FfprobeMediaProbe {
    ffprobe: String,
}

impl FfprobeMediaProbe {
    pub fn new(ffprobe: impl Into<String>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }
}

#[async_trait]
impl MediaProbe for FfprobeMediaProbe {
    async fn duration(&self, path: &Path) -> Result<f64, StageError> {
        ensure_readable(path).await?;

        let args: [&OsStr; 7] = [
            "-v".as_ref(),
            "error".as_ref(),
            "-show_entries".as_ref(),
            "format=duration".as_ref(),
            "-of".as_ref(),
            "default=noprint_wrappers=1:nokey=1".as_ref(),
            path.as_os_str(),
        ];
        let output = run_tool(&self.ffprobe, args).await?;

        parse_duration(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            StageError::ToolFailed {
                tool: self.ffprobe.clone(),
                status: "exit code 0".to_string(),
                stderr: "no duration in output".to_string(),
            }
        })
    }
}

fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .find_map(|l| l.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("12.345000\n"), Some(12.345));
        assert_eq!(parse_duration("N/A\n"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[tokio::test]
    async fn test_extract_rejects_missing_video() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FfmpegAudioExtractor::new("ffmpeg");
        let err = extractor
            .extract(&dir.path().join("none.mp4"), &dir.path().join("a.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::SourceUnreadable { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"not really a video").unwrap();

        let extractor = FfmpegAudioExtractor::new("voxdub-missing-ffmpeg");
        let err = extractor
            .extract(&video, &dir.path().join("a.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_merge_reports_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        let audio = dir.path().join("voice.wav");
        std::fs::write(&video, b"v").unwrap();
        std::fs::write(&audio, b"a").unwrap();

        // `true` accepts any arguments and writes nothing.
        let merger = FfmpegVideoMerger::new("true");
        let err = merger
            .merge(&video, &audio, &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::MissingOutput(_)));
    }
}
