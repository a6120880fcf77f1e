use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::ModelError;

/// Position of a path in the movie/series/season/episode hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum MediaType {
    /// Movie media type
    Movie = 0,
    /// Series media type
    Series = 1,
    /// Season media type
    Season = 2,
    /// Episode media type
    Episode = 3,
}

impl MediaType {
    /// Stable storage label, also used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "MOVIE",
            MediaType::Series => "SERIES",
            MediaType::Season => "SEASON",
            MediaType::Episode => "EPISODE",
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Movie => write!(f, "Movie"),
            MediaType::Series => write!(f, "Series"),
            MediaType::Season => write!(f, "Season"),
            MediaType::Episode => write!(f, "Episode"),
        }
    }
}

impl FromStr for MediaType {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "MOVIE" => Ok(MediaType::Movie),
            "SERIES" => Ok(MediaType::Series),
            "SEASON" => Ok(MediaType::Season),
            "EPISODE" => Ok(MediaType::Episode),
            _ => Err(ModelError::InvalidMediaType(raw.to_string())),
        }
    }
}

impl TryFrom<i16> for MediaType {
    type Error = ModelError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MediaType::Movie),
            1 => Ok(MediaType::Series),
            2 => Ok(MediaType::Season),
            3 => Ok(MediaType::Episode),
            other => Err(ModelError::InvalidMediaType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_storage_labels_case_insensitively() {
        assert_eq!("episode".parse::<MediaType>().unwrap(), MediaType::Episode);
        assert_eq!(
            MediaType::Season.as_str().parse::<MediaType>().unwrap(),
            MediaType::Season
        );
        assert!("person".parse::<MediaType>().is_err());
    }

    #[test]
    fn rejects_unknown_discriminant() {
        assert_eq!(MediaType::try_from(1).unwrap(), MediaType::Series);
        assert!(MediaType::try_from(4).is_err());
    }
}
