//! Pre-submission checks for uploaded videos and voice configuration.

use crate::error::CoreError;
use crate::workflow::VoiceConfig;

/// Largest accepted upload (1 GiB).
pub const MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// Accepted file extensions, lowercase with leading dot.
pub const SUPPORTED_VIDEO_FORMATS: &[&str] = &[
    ".mp4", ".avi", ".mov", ".mkv", ".webm", ".flv", ".wmv", ".3gp", ".m4v",
];

/// Validate a video before requesting an upload slot.
///
/// Checks, in order: size limit, extension, MIME type.
pub fn validate_video_file(file_name: &str, size_bytes: u64, mime_type: &str) -> Result<(), CoreError> {
    if size_bytes > MAX_FILE_SIZE {
        return Err(CoreError::Validation(format!(
            "File size exceeds 1GB limit. Current size: {}",
            format_file_size(size_bytes)
        )));
    }

    let extension = file_extension(file_name);
    if !SUPPORTED_VIDEO_FORMATS.contains(&extension.as_str()) {
        return Err(CoreError::Validation(format!(
            "Unsupported file format: '{extension}'. Supported formats: {}",
            SUPPORTED_VIDEO_FORMATS.join(", ")
        )));
    }

    if !mime_type.starts_with("video/") {
        return Err(CoreError::Validation(format!(
            "Invalid file type. Expected video file, got: '{mime_type}'"
        )));
    }

    Ok(())
}

/// Validate that a configuration is complete enough to start processing.
pub fn validate_voice_config(config: &VoiceConfig) -> Result<(), CoreError> {
    if config.target_language.as_deref().map_or(true, str::is_empty) {
        return Err(CoreError::Validation("Target language is required".into()));
    }
    if config.voice_provider.is_none() {
        return Err(CoreError::Validation("TTS provider is required".into()));
    }
    if config.voice_id.as_deref().map_or(true, str::is_empty) {
        return Err(CoreError::Validation("TTS voice is required".into()));
    }
    Ok(())
}

/// Lowercased extension including the dot, or empty when there is none.
fn file_extension(file_name: &str) -> String {
    file_name
        .rfind('.')
        .map(|idx| file_name[idx..].to_lowercase())
        .unwrap_or_default()
}

/// Render a byte count with a binary unit, e.g. `1.5 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exponent = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && exponent < UNITS.len() - 1 {
        value /= 1024.0;
        exponent += 1;
    }

    // Two decimals, trailing zeros trimmed.
    let rendered = format!("{value:.2}");
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{rendered} {}", UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::catalog::VoiceProvider;

    #[test]
    fn accepts_regular_mp4() {
        assert!(validate_video_file("clip.MP4", 10 * 1024 * 1024, "video/mp4").is_ok());
    }

    #[test]
    fn rejects_oversized_file() {
        let err = validate_video_file("clip.mp4", MAX_FILE_SIZE + 1, "video/mp4").unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("1GB"));
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = validate_video_file("notes.txt", 10, "video/mp4").unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains(".txt"));
    }

    #[test]
    fn rejects_missing_extension() {
        assert!(validate_video_file("clip", 10, "video/mp4").is_err());
    }

    #[test]
    fn rejects_non_video_mime() {
        let err = validate_video_file("clip.mkv", 10, "application/octet-stream").unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("octet-stream"));
    }

    #[test]
    fn config_requires_target_language() {
        let config = VoiceConfig::default();
        let err = validate_voice_config(&config).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("Target language"));
    }

    #[test]
    fn config_requires_voice() {
        let config = VoiceConfig {
            target_language: Some("es".into()),
            voice_provider: Some(VoiceProvider::OpenAi),
            ..Default::default()
        };
        let err = validate_voice_config(&config).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("voice"));
    }

    #[test]
    fn complete_config_is_valid() {
        let config = VoiceConfig {
            target_language: Some("es".into()),
            voice_provider: Some(VoiceProvider::OpenAi),
            voice_id: Some("onyx".into()),
            ..Default::default()
        };
        assert!(validate_voice_config(&config).is_ok());
    }

    #[test]
    fn file_sizes_render_with_units() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024), "1 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3 GB");
    }
}
