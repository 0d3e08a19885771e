//! Recursive audio file discovery
//!
//! Files are recognized by suffix only; decodability is checked lazily when a
//! file is first selected.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Suffixes imported as audio entries
pub const AUDIO_FILE_SUFFIXES: [&str; 7] = ["wav", "au", "wa1", "wa2", "nis", "flac", "mp3"];

/// Directory scan errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// True when `path` carries one of [`AUDIO_FILE_SUFFIXES`] (case-insensitive)
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            AUDIO_FILE_SUFFIXES.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Audio file scanner
pub struct FileScanner {
    /// Entry names skipped wherever they appear, compared whole
    ignored_names: Vec<String>,
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl FileScanner {
    /// Scanner skipping hidden entries and common system files
    pub fn new() -> Self {
        Self {
            ignored_names: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
            ],
        }
    }

    /// All audio files under `root_path`, sorted by path
    pub fn scan(&self, root_path: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root_path.exists() {
            return Err(ScanError::PathNotFound(root_path.to_path_buf()));
        }
        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory(root_path.to_path_buf()));
        }

        let mut files = Vec::new();

        // links are not followed, so the walk cannot loop
        let walker = WalkDir::new(root_path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && is_audio_file(entry.path()) {
                        files.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => {
                    // keep scanning
                    warn!("Error accessing entry: {}", e);
                }
            }
        }

        debug!("Scan of {} found {} audio files", root_path.display(), files.len());
        Ok(files)
    }

    fn should_process_entry(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        let file_name = entry.file_name().to_string_lossy();
        !file_name.starts_with('.') && !self.ignored_names.iter().any(|name| *name == file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_suffix_recognition() {
        assert!(is_audio_file(Path::new("/a/b.WAV")));
        assert!(is_audio_file(Path::new("x.wa1")));
        assert!(is_audio_file(Path::new("x.nis")));
        assert!(!is_audio_file(Path::new("x.db")));
        assert!(!is_audio_file(Path::new("wav")));
    }

    #[test]
    fn test_scan_recursive_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("spk01")).unwrap();
        fs::create_dir_all(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join("spk01/a.wav"), b"").unwrap();
        fs::write(dir.path().join("b.flac"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::write(dir.path().join(".cache/c.wav"), b"").unwrap();

        let files = FileScanner::new().scan(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.flac", "spk01/a.wav"]);
    }

    #[test]
    fn test_ignored_names_match_whole_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Thumbs.db")).unwrap();
        fs::write(dir.path().join("Thumbs.db/x.wav"), b"").unwrap();
        fs::write(dir.path().join("a.git.wav"), b"").unwrap();
        fs::write(dir.path().join("Thumbs.db.wav"), b"").unwrap();

        let files = FileScanner::new().scan(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["Thumbs.db.wav", "a.git.wav"]);
    }

    #[test]
    fn test_scan_rejects_missing_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.wav");
        fs::write(&file, b"").unwrap();
        assert!(matches!(
            FileScanner::new().scan(&dir.path().join("missing")),
            Err(ScanError::PathNotFound(_))
        ));
        assert!(matches!(FileScanner::new().scan(&file), Err(ScanError::NotADirectory(_))));
    }
}
