//! Helpers for cleaning user-supplied names and for keeping full paths
//! out of tracing span attributes.

use std::path::Path;

/// Video containers accepted for upload.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Reduces an uploaded filename to something safe to place on disk.
///
/// Directory components are dropped, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9._-]` is removed and leading/trailing `.`/`_` are
/// trimmed. The result may be empty.
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Lowercased extension of `name` if it is an allowed video container.
pub fn allowed_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&ext.as_str())
        .then_some(ext)
}

/// Accepts codes like `fr`, `ara`, `pt-BR`, `zh-CN`.
pub fn is_valid_language(code: &str) -> bool {
    let (primary, region) = match code.split_once('-') {
        Some((p, r)) => (p, Some(r)),
        None => (code, None),
    };
    let primary_ok =
        (2..=3).contains(&primary.len()) && primary.chars().all(|c| c.is_ascii_lowercase());
    let region_ok = region.is_none_or(|r| {
        (2..=4).contains(&r.len()) && r.chars().all(|c| c.is_ascii_alphanumeric())
    });
    primary_ok && region_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(Path::new("/data/uploads/abc/holiday.mp4")),
            "holiday.mp4"
        );
    }

    #[test]
    fn test_redact_path_no_filename() {
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }

    #[test]
    fn test_secure_filename_strips_directories() {
        assert_eq!(secure_filename("../../etc/passwd"), "passwd");
        assert_eq!(secure_filename("C:\\Users\\me\\clip.mp4"), "clip.mp4");
    }

    #[test]
    fn test_secure_filename_replaces_spaces() {
        assert_eq!(secure_filename("my  summer video.mov"), "my_summer_video.mov");
    }

    #[test]
    fn test_secure_filename_drops_unsafe_chars() {
        assert_eq!(secure_filename("clip<1>?.mkv"), "clip1.mkv");
        assert_eq!(secure_filename(".hidden.webm"), "hidden.webm");
    }

    #[test]
    fn test_secure_filename_can_be_empty() {
        assert_eq!(secure_filename(""), "");
        assert_eq!(secure_filename("///"), "");
        assert_eq!(secure_filename("..."), "");
    }

    #[test]
    fn test_allowed_extension_case_insensitive() {
        assert_eq!(allowed_extension("clip.MP4").as_deref(), Some("mp4"));
        assert_eq!(allowed_extension("clip.webm").as_deref(), Some("webm"));
        assert!(allowed_extension("clip.exe").is_none());
        assert!(allowed_extension("mp4").is_none());
    }

    #[test]
    fn test_language_codes() {
        for ok in ["en", "fr", "ara", "pt-BR", "zh-CN", "sr-Latn"] {
            assert!(is_valid_language(ok), "{ok}");
        }
        for bad in ["", "e", "EN", "english", "pt-", "pt-BRAZIL", "en_US", "fr-B!"] {
            assert!(!is_valid_language(bad), "{bad}");
        }
    }
}
