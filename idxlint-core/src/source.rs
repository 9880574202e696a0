//! Source file discovery.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions of entity and repository source files.
pub const SOURCE_EXTENSIONS: &[&str] = &["kt", "java"];

/// Recursively list files under `dir` whose extension is in `extensions`.
///
/// The walk is sorted by file name so that repeated scans of the same tree
/// visit files in the same order. A missing directory yields nothing.
pub fn find_files(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_extension(path, extensions))
        .collect()
}

/// Whether `path` has one of `extensions` (case-insensitive).
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Read a source file, logging and swallowing failures.
///
/// Invalid UTF-8 (a Latin-1 comment, say) is replaced rather than rejected.
pub fn read_source(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                debug!(file = %path.display(), "source is not valid UTF-8, decoding lossily");
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        }),
        Err(err) => {
            warn!(file = %path.display(), error = %err, "failed to read source file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        fs::write(dir.path().join("b/nested/Zeta.kt"), "").unwrap();
        fs::write(dir.path().join("Alpha.java"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = find_files(dir.path(), SOURCE_EXTENSIONS);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["Alpha.java", "Zeta.kt"]);
    }

    #[test]
    fn test_find_files_missing_dir() {
        assert!(find_files(Path::new("/definitely/not/here"), SOURCE_EXTENSIONS).is_empty());
    }

    #[test]
    fn test_read_source_tolerates_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("User.kt");
        fs::write(&path, b"// Gr\xfc\xdfe\n@Entity\nclass User\n").unwrap();

        let text = read_source(&path).unwrap();
        assert!(text.starts_with("// Gr\u{FFFD}\u{FFFD}e\n"));
        assert!(text.contains("@Entity\nclass User"));
        assert!(read_source(&dir.path().join("missing.kt")).is_none());
    }

    #[test]
    fn test_has_extension_case_insensitive() {
        assert!(has_extension(Path::new("User.KT"), SOURCE_EXTENSIONS));
        assert!(!has_extension(Path::new("User"), SOURCE_EXTENSIONS));
    }
}
