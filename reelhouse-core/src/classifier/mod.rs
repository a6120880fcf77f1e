//! Path classification.
//!
//! Maps a filesystem path onto the movie/series/season/episode hierarchy
//! anchored at the two category folders `Movies` and `Series`. The mapping is
//! a pure function of the path: no filesystem access and no state beyond the
//! configured library roots.

pub mod patterns;

use std::fmt;
use std::path::{Component, Path, PathBuf};

use reelhouse_model::{JobId, MediaType};
use serde::Serialize;

use crate::error::ClassificationError;

/// Category folder holding movies, at any nesting depth.
pub const MOVIES_CATEGORY: &str = "Movies";
/// Category folder holding `Series/<name>/Season <N>/<episode>` trees.
pub const SERIES_CATEGORY: &str = "Series";

/// Configured library roots. Paths are catalogued relative to the root they
/// live under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryRoots {
    roots: Vec<PathBuf>,
}

impl LibraryRoots {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut roots: Vec<PathBuf> = roots.into_iter().collect();
        // Most specific root first so nested roots win.
        roots.sort_by(|a, b| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });
        roots.dedup();
        Self { roots }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.roots.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// `/`-separated path relative to the owning root. Relative inputs are
    /// taken as already relative to a root.
    pub fn relativize(&self, path: &Path) -> Result<String, ClassificationError> {
        let outside = || ClassificationError::OutsideLibrary {
            path: path.display().to_string(),
        };

        let remainder = if path.is_absolute() {
            self.roots
                .iter()
                .find_map(|root| path.strip_prefix(root).ok())
                .ok_or_else(outside)?
        } else {
            path
        };

        let mut segments: Vec<String> = Vec::new();
        for component in remainder.components() {
            match component {
                Component::Normal(segment) => {
                    segments.push(segment.to_string_lossy().into_owned())
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if segments.pop().is_none() {
                        return Err(outside());
                    }
                }
                Component::RootDir | Component::Prefix(_) => return Err(outside()),
            }
        }

        if segments.is_empty() {
            return Err(ClassificationError::Empty);
        }
        Ok(segments.join("/"))
    }

    /// Root a relative path belongs to: the one where it currently exists,
    /// else the first root.
    pub fn root_for(&self, relative: &str) -> Option<&PathBuf> {
        self.roots
            .iter()
            .find(|root| root.join(relative).exists())
            .or_else(|| self.roots.first())
    }

    /// Absolute location of a relative path, under [`LibraryRoots::root_for`].
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        self.root_for(relative).map(|root| root.join(relative))
    }
}

/// Classified identity of a library path.
///
/// Equality is structural, so classifying the same path twice yields equal
/// values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MediaPath {
    relative_path: String,
    media_type: MediaType,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    season_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    episode_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<Box<MediaPath>>,
}

impl MediaPath {
    /// Classifies a path that is already relative to a library root.
    pub fn parse(relative_path: &str) -> Result<Self, ClassificationError> {
        let segments: Vec<&str> = relative_path
            .split(['/', '\\'])
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect();
        classify_segments(&segments)
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn season_number(&self) -> Option<u32> {
        self.season_number
    }

    pub fn episode_number(&self) -> Option<u32> {
        self.episode_number
    }

    pub fn parent(&self) -> Option<&MediaPath> {
        self.parent.as_deref()
    }

    /// Final path segment, extension included.
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }

    pub fn extension(&self) -> Option<String> {
        patterns::extension(self.file_name())
    }

    /// Ancestors ordered from the outermost (series) down to the direct parent.
    pub fn ancestors(&self) -> Vec<&MediaPath> {
        let mut chain = Vec::new();
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            chain.push(node);
            cursor = node.parent();
        }
        chain.reverse();
        chain
    }

    /// The owning series for seasons and episodes; the series itself for a
    /// series path. Found by walking the classified parent chain.
    pub fn series_path(&self) -> Option<&MediaPath> {
        let mut cursor = Some(self);
        while let Some(node) = cursor {
            if node.media_type == MediaType::Series {
                return Some(node);
            }
            cursor = node.parent();
        }
        None
    }

    /// Nearest season ancestor (or self when this is a season).
    pub fn season_path(&self) -> Option<&MediaPath> {
        let mut cursor = Some(self);
        while let Some(node) = cursor {
            if node.media_type == MediaType::Season {
                return Some(node);
            }
            cursor = node.parent();
        }
        None
    }

    /// Release year parsed from a trailing ` (YYYY)` in the title.
    pub fn release_year(&self) -> Option<i32> {
        patterns::split_release_year(&self.title).map(|(_, year)| year)
    }

    /// Title suitable for provider lookups, without the release-year suffix.
    pub fn search_title(&self) -> &str {
        patterns::split_release_year(&self.title)
            .map(|(name, _)| name)
            .unwrap_or(&self.title)
    }

    pub fn job_id(&self) -> JobId {
        JobId::from_path_key(&self.relative_path)
    }
}

impl fmt::Display for MediaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.relative_path, self.media_type)
    }
}

fn classify_segments(segments: &[&str]) -> Result<MediaPath, ClassificationError> {
    let Some((category, _)) = segments.split_first() else {
        return Err(ClassificationError::Empty);
    };
    let relative_path = segments.join("/");
    let last = segments[segments.len() - 1];

    match *category {
        MOVIES_CATEGORY => {
            if segments.len() < 2 {
                return Err(ClassificationError::CategoryRoot {
                    path: relative_path,
                });
            }
            Ok(MediaPath {
                title: patterns::strip_extension(last).to_string(),
                relative_path,
                media_type: MediaType::Movie,
                season_number: None,
                episode_number: None,
                parent: None,
            })
        }
        SERIES_CATEGORY => match segments.len() {
            1 => Err(ClassificationError::CategoryRoot {
                path: relative_path,
            }),
            2 => Ok(MediaPath {
                title: patterns::strip_extension(last).to_string(),
                relative_path,
                media_type: MediaType::Series,
                season_number: None,
                episode_number: None,
                parent: None,
            }),
            3 => {
                let season = patterns::season_number(last).ok_or_else(|| {
                    ClassificationError::MissingSeasonNumber {
                        segment: last.to_string(),
                        path: relative_path.clone(),
                    }
                })?;
                let parent = classify_segments(&segments[..2])?;
                Ok(MediaPath {
                    title: last.to_string(),
                    relative_path,
                    media_type: MediaType::Season,
                    season_number: Some(season),
                    episode_number: None,
                    parent: Some(Box::new(parent)),
                })
            }
            depth => {
                let parent = classify_segments(&segments[..depth - 1])?;
                let episode = patterns::episode_number(last).ok_or_else(|| {
                    ClassificationError::MissingEpisodeNumber {
                        file_name: last.to_string(),
                        path: relative_path.clone(),
                    }
                })?;
                Ok(MediaPath {
                    title: patterns::strip_extension(last).to_string(),
                    relative_path,
                    media_type: MediaType::Episode,
                    season_number: parent.season_number,
                    episode_number: Some(episode),
                    parent: Some(Box::new(parent)),
                })
            }
        },
        other => Err(ClassificationError::UnknownCategory {
            category: other.to_string(),
            path: relative_path,
        }),
    }
}

/// Classifies absolute or root-relative paths against the configured roots.
#[derive(Debug, Clone, Default)]
pub struct PathClassifier {
    roots: LibraryRoots,
}

impl PathClassifier {
    pub fn new(roots: LibraryRoots) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &LibraryRoots {
        &self.roots
    }

    pub fn relativize(&self, path: &Path) -> Result<String, ClassificationError> {
        self.roots.relativize(path)
    }

    pub fn classify(&self, path: &Path) -> Result<MediaPath, ClassificationError> {
        let relative = self.relativize(path)?;
        MediaPath::parse(&relative)
    }

    /// Executor-safe job id for a file under the library.
    pub fn job_id_for(&self, path: &Path) -> JobId {
        match self.relativize(path) {
            Ok(relative) => JobId::from_path_key(&relative),
            Err(_) => JobId::from_path_key(&path.to_string_lossy()),
        }
    }

    /// Whether `path` lies inside the `Movies` category. Directories there
    /// only group a movie's files; the movie is the video inside.
    pub fn is_in_movies(&self, path: &Path) -> bool {
        self.relativize(path)
            .is_ok_and(|relative| relative.split('/').next() == Some(MOVIES_CATEGORY))
    }
}

/// Destination for an automatic conversion: `.mp4` becomes `.mkv`, every other
/// extension becomes `.mp4`.
pub fn conversion_output(input: &Path) -> PathBuf {
    let is_mp4 = input
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));
    input.with_extension(if is_mp4 { "mkv" } else { "mp4" })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> PathClassifier {
        PathClassifier::new(LibraryRoots::new([PathBuf::from("/srv/LocalMedia")]))
    }

    #[test]
    fn movies_are_movies_at_any_depth() {
        for path in [
            "Movies/Inception.mkv",
            "Movies/Inception/Inception.mkv",
            "Movies/Nolan/2010/Inception.mkv",
        ] {
            let media = MediaPath::parse(path).unwrap();
            assert_eq!(media.media_type(), MediaType::Movie, "{path}");
            assert_eq!(media.title(), "Inception", "{path}");
            assert!(media.parent().is_none());
        }
    }

    #[test]
    fn season_links_back_to_series() {
        let season = MediaPath::parse("Series/The Wire/Season 2").unwrap();

        assert_eq!(season.media_type(), MediaType::Season);
        assert_eq!(season.season_number(), Some(2));
        let series = season.series_path().unwrap();
        assert_eq!(series.relative_path(), "Series/The Wire");
        assert_eq!(series.media_type(), MediaType::Series);
        assert_eq!(season.parent(), Some(series));
    }

    #[test]
    fn episodes_accept_both_naming_conventions() {
        let legacy = MediaPath::parse("Series/Lost/Season 1/Episode 4.mp4").unwrap();
        let modern = MediaPath::parse("Series/Lost/Season 1/Lost.S01E04.mp4").unwrap();

        for episode in [&legacy, &modern] {
            assert_eq!(episode.media_type(), MediaType::Episode);
            assert_eq!(episode.episode_number(), Some(4));
            assert_eq!(episode.season_number(), Some(1));
            assert_eq!(
                episode.parent().map(MediaPath::relative_path),
                Some("Series/Lost/Season 1")
            );
            assert_eq!(
                episode.series_path().map(MediaPath::relative_path),
                Some("Series/Lost")
            );
        }
        assert_eq!(legacy.title(), "Episode 4");
    }

    #[test]
    fn malformed_episode_names_fail() {
        let err = MediaPath::parse("Series/Lost/Season 1/Ep 5.mkv").unwrap_err();
        assert_eq!(
            err,
            ClassificationError::MissingEpisodeNumber {
                file_name: "Ep 5.mkv".into(),
                path: "Series/Lost/Season 1/Ep 5.mkv".into(),
            }
        );
    }

    #[test]
    fn malformed_season_names_fail() {
        assert!(matches!(
            MediaPath::parse("Series/Lost/Specials"),
            Err(ClassificationError::MissingSeasonNumber { .. })
        ));
        // The season segment is validated even for deeper paths.
        assert!(matches!(
            MediaPath::parse("Series/Lost/Specials/Episode 1.mkv"),
            Err(ClassificationError::MissingSeasonNumber { .. })
        ));
    }

    #[test]
    fn nested_episode_folder_yields_two_level_parent() {
        let media =
            MediaPath::parse("Series/Dark/Season 3/Episode 8/Episode 8.mkv").unwrap();

        assert_eq!(media.media_type(), MediaType::Episode);
        let folder = media.parent().unwrap();
        assert_eq!(folder.media_type(), MediaType::Episode);
        assert_eq!(folder.parent().unwrap().relative_path(), "Series/Dark/Season 3");
        assert_eq!(media.season_number(), Some(3));
        assert_eq!(media.ancestors().len(), 3);
    }

    #[test]
    fn category_roots_and_unknown_categories_fail() {
        assert!(matches!(
            MediaPath::parse("Movies"),
            Err(ClassificationError::CategoryRoot { .. })
        ));
        assert!(matches!(
            MediaPath::parse("Music/album.flac"),
            Err(ClassificationError::UnknownCategory { .. })
        ));
        assert_eq!(MediaPath::parse(""), Err(ClassificationError::Empty));
    }

    #[test]
    fn strips_library_root_prefix() {
        let media = classifier()
            .classify(Path::new("/srv/LocalMedia/Series/Lost/Season 1"))
            .unwrap();
        assert_eq!(media.relative_path(), "Series/Lost/Season 1");

        assert!(matches!(
            classifier().classify(Path::new("/tmp/Movies/x.mkv")),
            Err(ClassificationError::OutsideLibrary { .. })
        ));
        assert!(matches!(
            classifier().classify(Path::new("../Movies/x.mkv")),
            Err(ClassificationError::OutsideLibrary { .. })
        ));
    }

    #[test]
    fn recognises_paths_inside_movies() {
        let classifier = classifier();
        assert!(classifier.is_in_movies(Path::new("/srv/LocalMedia/Movies/Inception")));
        assert!(classifier.is_in_movies(Path::new("Movies/Inception/Inception.mkv")));
        assert!(!classifier.is_in_movies(Path::new("/srv/LocalMedia/Series/Dark")));
        assert!(!classifier.is_in_movies(Path::new("/tmp/Movies/Inception")));
    }

    #[test]
    fn classification_is_idempotent() {
        let path = Path::new("/srv/LocalMedia/Series/Dark/Season 1/Dark S01E01.mkv");
        assert_eq!(classifier().classify(path), classifier().classify(path));
    }

    #[test]
    fn release_year_and_search_title() {
        let media = MediaPath::parse("Movies/Heat (1995)/Heat (1995).mkv").unwrap();
        assert_eq!(media.release_year(), Some(1995));
        assert_eq!(media.search_title(), "Heat");
    }

    #[test]
    fn job_ids_and_conversion_outputs() {
        let classifier = classifier();
        assert_eq!(
            classifier
                .job_id_for(Path::new("/srv/LocalMedia/Movies/X (2001).avi"))
                .as_str(),
            "Movies-X--2001--avi"
        );
        assert_eq!(
            conversion_output(Path::new("/m/Movies/X.avi")),
            PathBuf::from("/m/Movies/X.mp4")
        );
        assert_eq!(
            conversion_output(Path::new("/m/Movies/X.mp4")),
            PathBuf::from("/m/Movies/X.mkv")
        );
    }
}
