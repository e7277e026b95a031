use std::path::Path;

use lazy_regex::regex_captures;

use crate::library::{TrackRecord, UNKNOWN_ARTIST};

/// File name without its extension. Names with no stem (e.g. an empty string)
/// yield an empty stem.
pub fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Guesses title and artist from a file named like `Artist - Title.mp3`.
///
/// The artist is everything before the first `" - "`, the title everything
/// after it. Names without the separator become the title, with an unknown
/// artist.
pub fn parse_filename(file_name: &str) -> TrackRecord {
    let stem = file_stem(file_name);
    match regex_captures!(r"^(.+?) - (.+)", &stem) {
        Some((_, artist, title)) => TrackRecord::new(title, artist),
        None => TrackRecord::new(stem.clone(), UNKNOWN_ARTIST),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artist_dash_title() {
        let record = parse_filename("Artist1 - SongA.mp3");
        assert_eq!(record, TrackRecord::new("SongA", "Artist1"));
    }

    #[test]
    fn test_without_separator_uses_stem_and_unknown_artist() {
        assert_eq!(
            parse_filename("SongB.m4a"),
            TrackRecord::new("SongB", UNKNOWN_ARTIST)
        );
        assert_eq!(
            parse_filename("Artist-Title.mp3"),
            TrackRecord::new("Artist-Title", UNKNOWN_ARTIST)
        );
    }

    #[test]
    fn test_first_separator_wins() {
        let record = parse_filename("A - B - C.flac");
        assert_eq!(record.artist, "A");
        assert_eq!(record.title, "B - C");
    }

    #[test]
    fn test_only_last_extension_is_stripped() {
        let record = parse_filename("Mr. Big - To Be With You.v2.mp3");
        assert_eq!(record.artist, "Mr. Big");
        assert_eq!(record.title, "To Be With You.v2");
    }

    #[test]
    fn test_degenerate_inputs_never_fail() {
        assert_eq!(parse_filename(""), TrackRecord::new("", UNKNOWN_ARTIST));
        assert_eq!(
            parse_filename(" - .mp3"),
            TrackRecord::new(" - ", UNKNOWN_ARTIST)
        );
        assert_eq!(
            parse_filename("Artist - .mp3"),
            TrackRecord::new("Artist - ", UNKNOWN_ARTIST)
        );
        assert_eq!(
            parse_filename("no_extension"),
            TrackRecord::new("no_extension", UNKNOWN_ARTIST)
        );
    }
}
