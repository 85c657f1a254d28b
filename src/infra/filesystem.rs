//! Filesystem operations
//!
//! Handles file and directory operations.

use std::path::Path;

use walkdir::WalkDir;

use crate::error::FilesystemError;

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), FilesystemError> {
    std::fs::create_dir_all(path).map_err(|e| FilesystemError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Remove a directory and all its contents
pub fn remove_dir_all(path: &Path) -> Result<(), FilesystemError> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| FilesystemError::RemoveDir {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
    }
    Ok(())
}

/// Write content to a file
pub fn write_file(path: &Path, content: &str) -> Result<(), FilesystemError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    std::fs::write(path, content).map_err(|e| FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Read content from a file
pub fn read_file(path: &Path) -> Result<String, FilesystemError> {
    std::fs::read_to_string(path).map_err(|e| FilesystemError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Copy a file, creating the destination's parent
pub fn copy_file(from: &Path, to: &Path) -> Result<(), FilesystemError> {
    if let Some(parent) = to.parent() {
        create_dir_all(parent)?;
    }
    std::fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| FilesystemError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            error: e.to_string(),
        })
}

/// Copy a file into a directory, keeping its name
pub fn install_into(file: &Path, dir: &Path) -> Result<(), FilesystemError> {
    let name = file.file_name().ok_or_else(|| FilesystemError::Copy {
        from: file.to_path_buf(),
        to: dir.to_path_buf(),
        error: "source has no file name".to_string(),
    })?;
    copy_file(file, &dir.join(name))
}

/// Create a symbolic link at `link` pointing to `target`
pub fn symlink(target: &Path, link: &Path) -> Result<(), FilesystemError> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(target, link);
    #[cfg(not(unix))]
    let result = std::fs::copy(link.parent().unwrap_or(link).join(target), link).map(|_| ());

    result.map_err(|e| FilesystemError::Symlink {
        link: link.to_path_buf(),
        target: target.to_path_buf(),
        error: e.to_string(),
    })
}

/// Recursively copy a directory tree into `to`
pub fn copy_tree(from: &Path, to: &Path) -> Result<usize, FilesystemError> {
    let mut copied = 0;
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(|e| FilesystemError::ReadFile {
            path: from.to_path_buf(),
            error: e.to_string(),
        })?;
        let rel = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let dest = to.join(rel);

        if entry.file_type().is_dir() {
            create_dir_all(&dest)?;
        } else if entry.file_type().is_symlink() {
            let target = std::fs::read_link(entry.path()).map_err(|e| FilesystemError::ReadFile {
                path: entry.path().to_path_buf(),
                error: e.to_string(),
            })?;
            if dest.symlink_metadata().is_err() {
                symlink(&target, &dest)?;
            }
        } else {
            copy_file(entry.path(), &dest)?;
            copied += 1;
        }
    }
    Ok(copied)
}
