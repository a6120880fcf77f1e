use std::path::PathBuf;
use std::time::Duration;

/// Parse a boolean value from a raw string, accepting common env-style forms.
///
/// Accepted truthy values (case-insensitive): `"1"`, `"true"`, `"yes"`, `"on"`.
/// Accepted falsy values: `"0"`, `"false"`, `"no"`, `"off"`.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_bool_var(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|raw| parse_bool(&raw))
}

/// Split a `:`-separated path list, dropping empty entries.
pub fn parse_path_list(raw: &str) -> Vec<PathBuf> {
    raw.split(':')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(PathBuf::from)
        .collect()
}

pub fn parse_path_list_var(name: &str) -> Option<Vec<PathBuf>> {
    std::env::var(name).ok().map(|raw| parse_path_list(&raw))
}

/// Human-friendly duration such as `3days`, `90s` or `1h 30m`.
pub fn parse_duration(raw: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(raw.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_lists_skip_blanks() {
        assert_eq!(
            parse_path_list("/media/a::/media/b: "),
            vec![PathBuf::from("/media/a"), PathBuf::from("/media/b")]
        );
    }

    #[test]
    fn bools_accept_env_forms() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn durations_are_humantime() {
        assert_eq!(
            parse_duration("3days").unwrap(),
            Duration::from_secs(3 * 24 * 60 * 60)
        );
        assert_eq!(parse_duration("1h 30m").unwrap(), Duration::from_secs(5400));
        assert!(parse_duration("soon").is_err());
    }
}
