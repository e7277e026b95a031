use std::fmt;

pub mod extractor;
pub mod filename;
pub mod tags;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

#[derive(Debug)]
pub struct LibraryError;

impl fmt::Display for LibraryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Library error")
    }
}

impl std::error::Error for LibraryError {}

pub type LibraryResult<T> = error_stack::Result<T, LibraryError>;

/// Title and artist derived for a single local audio file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackRecord {
    pub title: String,
    pub artist: String,
}

impl TrackRecord {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }

    pub fn search_query(&self) -> String {
        format!("{} {}", self.title, self.artist)
    }
}

impl fmt::Display for TrackRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}", self.title, self.artist)
    }
}
