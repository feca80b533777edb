// src/loader.rs - Reading pattern text from files and directories
use crate::error::CompilationError;
use crate::registry::PatternRegistry;
use std::fs;
use std::path::{Path, PathBuf};

/// Read one pattern file
pub fn read_pattern_file(path: &Path) -> Result<String, CompilationError> {
    fs::read_to_string(path).map_err(|source| CompilationError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// All regular files below `path`, sorted so load order is stable.
/// A plain file is returned as-is.
pub fn collect_pattern_files(path: &Path) -> Result<Vec<PathBuf>, CompilationError> {
    let mut files = Vec::new();
    walk(path, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk(path: &Path, files: &mut Vec<PathBuf>) -> Result<(), CompilationError> {
    let io_err = |source| CompilationError::Io {
        path: path.to_path_buf(),
        source,
    };

    let metadata = fs::metadata(path).map_err(io_err)?;
    if metadata.is_file() {
        files.push(path.to_path_buf());
        return Ok(());
    }

    for entry in fs::read_dir(path).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        walk(&entry.path(), files)?;
    }
    Ok(())
}

/// Concatenate the contents of every file under each of `paths`
pub fn read_pattern_paths<P: AsRef<Path>>(paths: &[P]) -> Result<String, CompilationError> {
    let mut text = String::new();
    for path in paths {
        for file in collect_pattern_files(path.as_ref())? {
            let content = read_pattern_file(&file)?;
            text.push_str(&content);
            if !content.ends_with('\n') {
                text.push('\n');
            }
        }
    }
    Ok(text)
}

/// Register the patterns found under `paths` on top of what `registry` holds.
/// Files are parsed together, so one malformed line rejects all of them.
pub fn load_pattern_paths<P: AsRef<Path>>(
    registry: &mut PatternRegistry,
    paths: &[P],
) -> Result<usize, CompilationError> {
    let text = read_pattern_paths(paths)?;
    let count = registry.register_bulk(&text)?;
    tracing::debug!(count, "loaded additional grok patterns");
    Ok(count)
}
