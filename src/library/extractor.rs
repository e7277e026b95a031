use std::fs;
use std::path::{Path, PathBuf};

use error_stack::{IntoReport, Report, ResultExt};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::AppConfig;
use crate::library::filename::{file_stem, parse_filename};
use crate::library::tags::{LoftyTagReader, TagReader};
use crate::library::{LibraryError, LibraryResult, TrackRecord, UNKNOWN_ARTIST};

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            AppConfig::AUDIO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Turns the audio files of a single directory into [`TrackRecord`]s.
pub struct MetadataExtractor<R: TagReader = LoftyTagReader> {
    reader: R,
}

impl MetadataExtractor<LoftyTagReader> {
    pub fn new() -> Self {
        Self::with_reader(LoftyTagReader)
    }
}

impl Default for MetadataExtractor<LoftyTagReader> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: TagReader> MetadataExtractor<R> {
    pub fn with_reader(reader: R) -> Self {
        Self { reader }
    }

    /// Lists the audio files directly inside `directory`, in the order the
    /// file system returns them. Subdirectories are not visited; symlinked
    /// files count as the file they point to.
    pub fn files(&self, directory: &Path) -> LibraryResult<Vec<PathBuf>> {
        let metadata = fs::metadata(directory)
            .into_report()
            .change_context(LibraryError)
            .attach_printable_lazy(|| format!("Cannot access {}", directory.display()))?;
        if !metadata.is_dir() {
            return Err(Report::new(LibraryError)
                .attach_printable(format!("{} is not a directory", directory.display())));
        }

        let mut files = vec![];
        for entry in WalkDir::new(directory)
            .follow_links(true)
            .min_depth(1)
            .max_depth(1)
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if err.depth() == 0 {
                        return Err(Report::new(LibraryError).attach_printable(format!(
                            "Cannot read {}: {err}",
                            directory.display()
                        )));
                    }
                    warn!("Skipping unreadable entry in {}: {err}", directory.display());
                    continue;
                }
            };
            if entry.file_type().is_file() && is_audio_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
        info!("Found {} audio files in {}", files.len(), directory.display());
        Ok(files)
    }

    pub fn extract_metadata(&self, directory: &Path) -> LibraryResult<Vec<TrackRecord>> {
        let records = self
            .files(directory)?
            .iter()
            .map(|path| self.record_for(path))
            .collect::<Vec<_>>();
        Ok(records)
    }

    fn record_for(&self, path: &Path) -> TrackRecord {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        match self.reader.read_tags(path) {
            Ok(Some(tags)) => {
                let record = TrackRecord {
                    title: tags.title.unwrap_or_else(|| file_stem(&file_name)),
                    artist: tags.artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
                };
                debug!("Read tags of {file_name}: {record}");
                record
            }
            Ok(None) => {
                let record = parse_filename(&file_name);
                info!("No tags in {file_name}, parsed from filename: {record}");
                record
            }
            Err(report) => {
                error!("Error reading {}: {report:?}", path.display());
                let record = parse_filename(&file_name);
                info!("Parsed {file_name} from filename: {record}");
                record
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use error_stack::Report;
    use tempfile::tempdir;

    use crate::library::tags::tests::flac_bytes;
    use crate::library::tags::{TagFields, TagReadError, TagReadResult};
    use crate::logger::capture::capture;

    use super::*;

    /// Tag reader answering from a fixed table keyed by file name. Files
    /// absent from the table fail to read.
    struct StubTagReader(HashMap<String, Option<TagFields>>);

    impl StubTagReader {
        fn new(entries: &[(&str, Option<TagFields>)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(name, tags)| (name.to_string(), tags.clone()))
                    .collect(),
            )
        }
    }

    impl TagReader for StubTagReader {
        fn read_tags(&self, path: &Path) -> TagReadResult<Option<TagFields>> {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            self.0
                .get(&name)
                .cloned()
                .ok_or_else(|| Report::new(TagReadError))
        }
    }

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), b"").unwrap();
        }
    }

    fn sorted(mut records: Vec<TrackRecord>) -> Vec<TrackRecord> {
        records.sort_by(|a, b| a.title.cmp(&b.title));
        records
    }

    #[test]
    fn test_is_audio_file_matches_known_extensions_case_insensitive() {
        assert!(is_audio_file(Path::new("/tmp/a.mp3")));
        assert!(is_audio_file(Path::new("/tmp/a.MP3")));
        assert!(is_audio_file(Path::new("/tmp/a.m4a")));
        assert!(is_audio_file(Path::new("/tmp/a.flac")));
        assert!(!is_audio_file(Path::new("/tmp/a.txt")));
        assert!(!is_audio_file(Path::new("/tmp/mp3")));
    }

    #[test]
    fn test_files_skips_other_extensions_and_subdirectories() {
        let dir = tempdir().unwrap();
        touch(dir.path(), &["a.mp3", "b.m4a", "notes.txt"]);
        fs::create_dir(dir.path().join("nested.mp3")).unwrap();
        touch(&dir.path().join("nested.mp3"), &["deep.mp3"]);

        let extractor = MetadataExtractor::new();
        let mut names = extractor
            .files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec!["a.mp3", "b.m4a"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_audio_files_are_listed() {
        use std::os::unix::fs::symlink;

        let store = tempdir().unwrap();
        touch(store.path(), &["real.mp3"]);
        let dir = tempdir().unwrap();
        symlink(
            store.path().join("real.mp3"),
            dir.path().join("Artist1 - SongA.mp3"),
        )
        .unwrap();
        symlink(store.path().join("gone.mp3"), dir.path().join("Dangling.mp3")).unwrap();
        symlink(store.path(), dir.path().join("linked-folder.mp3")).unwrap();

        let files = MetadataExtractor::new().files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("Artist1 - SongA.mp3")]);

        let records = MetadataExtractor::with_reader(StubTagReader::new(&[(
            "Artist1 - SongA.mp3",
            None,
        )]))
        .extract_metadata(dir.path())
        .unwrap();
        assert_eq!(records, vec![TrackRecord::new("SongA", "Artist1")]);
    }

    #[test]
    fn test_tags_are_preferred() {
        let dir = tempdir().unwrap();
        touch(dir.path(), &["x - y.mp3"]);
        let extractor = MetadataExtractor::with_reader(StubTagReader::new(&[(
            "x - y.mp3",
            Some(TagFields::new(Some("T"), Some("A"))),
        )]));
        let records = extractor.extract_metadata(dir.path()).unwrap();
        assert_eq!(records, vec![TrackRecord::new("T", "A")]);
    }

    #[test]
    fn test_missing_tag_fields_fall_back_individually() {
        let dir = tempdir().unwrap();
        touch(dir.path(), &["Some - Name.mp3", "Other.m4a"]);
        let extractor = MetadataExtractor::with_reader(StubTagReader::new(&[
            ("Some - Name.mp3", Some(TagFields::new(Some("T"), None))),
            ("Other.m4a", Some(TagFields::new(None, Some("A")))),
        ]));
        let records = sorted(extractor.extract_metadata(dir.path()).unwrap());
        assert_eq!(
            records,
            vec![
                TrackRecord::new("Other", "A"),
                TrackRecord::new("T", UNKNOWN_ARTIST),
            ]
        );
    }

    #[test]
    fn test_no_tag_header_uses_filename_parser() {
        let (logs, _guard) = capture();
        let dir = tempdir().unwrap();
        touch(dir.path(), &["Artist1 - SongA.mp3"]);
        let extractor =
            MetadataExtractor::with_reader(StubTagReader::new(&[("Artist1 - SongA.mp3", None)]));
        let records = extractor.extract_metadata(dir.path()).unwrap();
        assert_eq!(records, vec![parse_filename("Artist1 - SongA.mp3")]);
        assert!(logs.contents().contains("Found 1 audio files"));
        assert!(logs
            .contents()
            .contains("No tags in Artist1 - SongA.mp3, parsed from filename: SongA by Artist1"));
    }

    #[test]
    fn test_tag_read_failure_is_not_fatal() {
        let (logs, _guard) = capture();
        let dir = tempdir().unwrap();
        touch(dir.path(), &["Broken - File.mp3", "Fine.m4a"]);
        let extractor = MetadataExtractor::with_reader(StubTagReader::new(&[(
            "Fine.m4a",
            Some(TagFields::new(Some("Fine"), Some("Band"))),
        )]));
        let records = sorted(extractor.extract_metadata(dir.path()).unwrap());
        assert_eq!(
            records,
            vec![
                TrackRecord::new("File", "Broken"),
                TrackRecord::new("Fine", "Band"),
            ]
        );
        assert_eq!(logs.count("Error reading"), 1);
        assert_eq!(logs.count("Parsed Broken - File.mp3 from filename: File by Broken"), 1);
    }

    #[test]
    fn test_lofty_reader_falls_back_on_invalid_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Band2 - Song B.m4a"), b"not a real m4a").unwrap();
        let records = MetadataExtractor::new()
            .extract_metadata(dir.path())
            .unwrap();
        assert_eq!(records, vec![TrackRecord::new("Song B", "Band2")]);
    }

    #[test]
    fn test_lofty_reader_prefers_tags_over_filename() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("Wrong - Name.flac"),
            flac_bytes(Some(&["TITLE=Song B", "ARTIST=Band2"])),
        )
        .unwrap();
        fs::write(dir.path().join("Artist1 - SongA.flac"), flac_bytes(None)).unwrap();
        let records = sorted(
            MetadataExtractor::new()
                .extract_metadata(dir.path())
                .unwrap(),
        );
        assert_eq!(
            records,
            vec![
                TrackRecord::new("Song B", "Band2"),
                TrackRecord::new("SongA", "Artist1"),
            ]
        );
    }

    #[test]
    fn test_empty_directory_yields_no_records() {
        let dir = tempdir().unwrap();
        let records = MetadataExtractor::new()
            .extract_metadata(dir.path())
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = tempdir().unwrap();
        let result = MetadataExtractor::new().extract_metadata(&dir.path().join("missing"));
        assert!(result.is_err());
    }

    #[test]
    fn test_file_path_is_not_a_directory() {
        let dir = tempdir().unwrap();
        touch(dir.path(), &["a.mp3"]);
        let result = MetadataExtractor::new().extract_metadata(&dir.path().join("a.mp3"));
        assert!(result.is_err());
    }
}
