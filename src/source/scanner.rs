//! Input file discovery.

use std::io;
use std::path::{Path, PathBuf};

/// List regular files in `dir` whose extension is `extension`.
///
/// Results are sorted by path so runs are reproducible; processing order
/// carries no meaning.
pub fn list_input_files(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Base name of an input file: its file name without the extension.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
