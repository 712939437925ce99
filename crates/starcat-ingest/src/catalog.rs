//! Local catalog file discovery

use std::io;
use std::path::{Path, PathBuf};

/// Every regular file in `dir` whose name ends with `extension`, sorted by path
pub fn discover_catalog_files(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(extension));
        if matches {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}
