// File discovery module
// Expands command line arguments into the list of image files to decode

use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expand the given arguments into a flat list of files.
///
/// Arguments that cannot be accessed are logged and skipped. Directories are
/// replaced by their image candidates; everything else is passed through as is.
pub fn find_files(args: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for arg in args {
        match fs::metadata(arg) {
            Err(e) => warn!("Can't access {}: {}", arg.display(), e),
            Ok(meta) if meta.is_dir() => files.extend(dir_images(arg)),
            Ok(_) => files.push(arg.clone()),
        }
    }
    files
}

/// Direct entries of `dir` whose file name has an extension, in natural name order.
pub fn dir_images(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Can't read directory {}: {}", dir.display(), e);
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        if has_extension(entry.path()) {
            files.push(entry.into_path());
        } else {
            debug!("Skipping {} (no extension)", entry.path().display());
        }
    }

    files.sort_by(|a, b| natord::compare(&file_name(a), &file_name(b)));
    files
}

/// Any dot in the file name counts, so `.hidden` and `photo.` are kept;
/// `Path::extension` would reject both.
fn has_extension(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().contains('.'))
}

/// Base name of a path, used for display and ordering
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn test_dir_expands_to_files_with_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.png");
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "README");
        fs::create_dir(dir.path().join("nested.d")).unwrap();

        let names: Vec<String> = dir_images(dir.path()).iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
    }

    #[test]
    fn test_dot_names_count_as_having_an_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "photo.");
        touch(dir.path(), ".hidden");
        touch(dir.path(), "plain");

        let mut names: Vec<String> = dir_images(dir.path()).iter().map(|p| file_name(p)).collect();
        names.sort();
        assert_eq!(names, vec![".hidden", "photo."]);
    }

    #[test]
    fn test_missing_dir_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");
        assert!(dir_images(&gone).is_empty());

        let after = touch(dir.path(), "after.png");
        assert_eq!(find_files(&[gone, after.clone()]), vec![after]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_dir_yields_nothing() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        touch(&locked, "inside.png");
        let after = touch(dir.path(), "after.png");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not stop root
        let readable = fs::read_dir(&locked).is_ok();
        if !readable {
            assert!(dir_images(&locked).is_empty());
            assert_eq!(find_files(&[locked.clone(), after.clone()]), vec![after]);
        }

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_dir_uses_natural_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "img10.png");
        touch(dir.path(), "img2.png");
        touch(dir.path(), "img1.png");

        let names: Vec<String> = dir_images(dir.path()).iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["img1.png", "img2.png", "img10.png"]);
    }

    #[test]
    fn test_find_files_keeps_argument_order_and_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("shots");
        fs::create_dir(&sub).unwrap();
        let inner = touch(&sub, "inner.gif");
        let first = touch(dir.path(), "first.png");
        // Plain files are kept even without an extension
        let last = touch(dir.path(), "last");
        let missing = dir.path().join("missing.png");

        let files = find_files(&[first.clone(), missing, sub, last.clone()]);
        assert_eq!(files, vec![first, inner, last]);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("/tmp/pics/cat.png")), "cat.png");
        assert_eq!(file_name(Path::new("cat.png")), "cat.png");
    }
}
