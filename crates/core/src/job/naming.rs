//! Output file naming.

use std::path::Path;

use super::types::RecordingMetadata;

/// Replaces every run of whitespace with a single underscore.
pub fn underscore(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Builds the video file name from recording metadata.
///
/// `Title S01E02 Subtitle` when season and episode are known, otherwise
/// `Title - Subtitle`; whitespace becomes `_`. Falls back to the recording's
/// file stem when neither title nor subtitle is known.
pub fn video_file_name(meta: &RecordingMetadata, recording: &Path, extension: &str) -> String {
    let title = meta.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let subtitle = meta
        .subtitle
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut parts: Vec<String> = Vec::new();
    if let Some(title) = title {
        parts.push(title.to_string());
    }
    if meta.season > 0 && meta.episode > 0 {
        parts.push(format!("S{:02}E{:02}", meta.season, meta.episode));
    } else if subtitle.is_some() {
        parts.push("-".to_string());
    }
    if let Some(subtitle) = subtitle {
        parts.push(subtitle.to_string());
    }

    let base = if title.is_none() && subtitle.is_none() {
        recording
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "recording".to_string())
    } else {
        parts.join(" ")
    };

    format!("{}.{}", safe_file_name(&base), extension)
}

/// `text` as it appears in generated file names: whitespace runs become `_`,
/// path separators are replaced.
pub fn safe_file_name(text: &str) -> String {
    sanitize(&underscore(text))
}

/// Strips characters that cannot appear in a file name.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\0' => '_',
            c => c,
        })
        .collect()
}
