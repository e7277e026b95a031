use std::fmt;
use std::path::Path;

use error_stack::{Report, ResultExt};
use lofty::config::ParseOptions;
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::Accessor;

#[derive(Debug)]
pub struct TagReadError;

impl fmt::Display for TagReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Tag read error")
    }
}

impl std::error::Error for TagReadError {}

pub type TagReadResult<T> = error_stack::Result<T, TagReadError>;

/// Title and artist as stored in the file's tag. Blank values are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFields {
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl TagFields {
    pub fn new(title: Option<&str>, artist: Option<&str>) -> Self {
        Self {
            title: non_blank(title),
            artist: non_blank(artist),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub trait TagReader {
    /// `Ok(None)` means the file carries no tag at all.
    fn read_tags(&self, path: &Path) -> TagReadResult<Option<TagFields>>;
}

/// Reads ID3, MP4 ilst and Vorbis comments through `lofty`. Audio properties
/// are not parsed, so a damaged stream does not hide intact tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> TagReadResult<Option<TagFields>> {
        let tagged_file = Probe::open(path)
            .and_then(|file| file.options(ParseOptions::new().read_properties(false)).read())
            .map_err(|err| Report::new(TagReadError).attach_printable(err.to_string()))
            .attach_printable_lazy(|| format!("Failed to read tags of {}", path.display()))?;
        let Some(tag) = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
        else {
            return Ok(None);
        };
        Ok(Some(TagFields::new(
            tag.title().as_deref(),
            tag.artist().as_deref(),
        )))
    }
}
