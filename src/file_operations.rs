//! Download layout
//!
//! Files land in `<download_root>/<sanitized title>/<filename>`, where the
//! filename is `S{season:02}E{episode:02}_{quality}.mp4` for episodes and
//! `{title}_{quality}.mp4` for movies.

use crate::catalog::EpisodeKey;
use std::path::{Path, PathBuf};

/// Extension of every downloaded file
const VIDEO_EXTENSION: &str = "mp4";

/// Fallback folder name for titles that sanitize to nothing
const UNTITLED: &str = "Untitled";

/// Sanitizes a string for use in filenames by replacing problematic characters
///
/// Replaces characters that are invalid or problematic in filenames across platforms:
/// - Path separators: / \
/// - Reserved characters: : * ? " < > |
/// - Control characters
/// - Trim leading/trailing whitespace and dots
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();

    // Trim whitespace and dots from start/end
    sanitized
        .trim_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string()
}

/// Sanitized title, never empty.
fn safe_title(title: &str) -> String {
    let sanitized = sanitize_filename(title);
    if sanitized.is_empty() {
        UNTITLED.to_string()
    } else {
        sanitized
    }
}

/// Filename of one episode, e.g. `S02E01_1080p.mp4`.
pub fn episode_filename(key: EpisodeKey, quality: &str) -> String {
    format!(
        "S{:02}E{:02}_{}.{}",
        key.season,
        key.episode,
        sanitize_filename(quality),
        VIDEO_EXTENSION
    )
}

/// Filename of a movie, e.g. `Some Film_720p.mp4`.
pub fn movie_filename(title: &str, quality: &str) -> String {
    format!(
        "{}_{}.{}",
        safe_title(title),
        sanitize_filename(quality),
        VIDEO_EXTENSION
    )
}

/// Folder that receives every file of one title.
pub fn content_dir(download_root: &Path, title: &str) -> PathBuf {
    download_root.join(safe_title(title))
}
