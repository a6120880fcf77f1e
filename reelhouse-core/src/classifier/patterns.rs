//! Naming conventions recognised inside the `Series` category.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static SEASON_FOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Season (\d+)$").expect("season pattern"));

static LEGACY_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Episode (\d+)").expect("legacy episode pattern"));

static SEASON_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)S\d{1,2}E(\d+)").expect("SxxEyy pattern"));

static RELEASE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*\((\d{4})\)\s*$").expect("release year pattern"));

/// Number from a literal `Season <N>` segment.
pub fn season_number(segment: &str) -> Option<u32> {
    capture_number(&SEASON_FOLDER, segment)
}

/// Episode number from a file name. Tries the legacy `Episode <N>` token
/// first, then `S<season>E<episode>`.
pub fn episode_number(file_name: &str) -> Option<u32> {
    if let Some(number) = capture_number(&LEGACY_EPISODE, file_name) {
        debug!(file_name, number, "matched legacy episode pattern");
        return Some(number);
    }
    let number = capture_number(&SEASON_EPISODE, file_name)?;
    debug!(file_name, number, "matched SxxEyy episode pattern");
    Some(number)
}

/// Splits `Heat (1995)` into `("Heat", 1995)`.
pub fn split_release_year(title: &str) -> Option<(&str, i32)> {
    let captures = RELEASE_YEAR.captures(title)?;
    let name = captures.get(1)?.as_str();
    let year = captures.get(2)?.as_str().parse().ok()?;
    if name.is_empty() {
        return None;
    }
    Some((name, year))
}

/// Strips a trailing extension. Only a short alphanumeric run after the final
/// `.` counts, so `Mr. Robot` keeps its full name.
pub fn strip_extension(segment: &str) -> &str {
    match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && is_extension(ext) => stem,
        _ => segment,
    }
}

/// Lower-cased extension of a segment, if it has one.
pub fn extension(segment: &str) -> Option<String> {
    match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && is_extension(ext) => {
            Some(ext.to_ascii_lowercase())
        }
        _ => None,
    }
}

fn is_extension(candidate: &str) -> bool {
    (1..=5).contains(&candidate.len()) && candidate.chars().all(|c| c.is_ascii_alphanumeric())
}

fn capture_number(pattern: &Regex, haystack: &str) -> Option<u32> {
    pattern
        .captures(haystack)
        .and_then(|captures| captures.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
