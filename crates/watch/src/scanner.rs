//! Filesystem enumeration for watch scans.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Collect regular files under `root` whose modification time is
/// strictly newer than `since`. `None` matches everything, which is
/// what a watch's first scan wants.
///
/// Hidden files (leading `.`) are skipped. Results are sorted so scan
/// order is deterministic.
pub fn collect_changed_files(
    root: &Path,
    since: Option<SystemTime>,
    recursive: bool,
) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk(root, since, recursive, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk(
    dir: &Path,
    since: Option<SystemTime>,
    recursive: bool,
    out: &mut Vec<PathBuf>,
) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if is_hidden(&path) {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if recursive {
                walk(&path, since, recursive, out)?;
            }
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        let changed = match since {
            Some(cutoff) => modified > cutoff,
            None => true,
        };
        if changed {
            out.push(path);
        }
    }
    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"content").unwrap();
        path
    }

    #[test]
    fn first_scan_collects_everything() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.png");
        let b = touch(dir.path(), "b.png");

        let files = collect_changed_files(dir.path(), None, false).unwrap();
        assert_eq!(files, vec![a, b]);
    }

    #[test]
    fn old_cutoff_includes_files_future_cutoff_excludes_them() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");

        let past = SystemTime::now() - Duration::from_secs(3_600);
        assert_eq!(
            collect_changed_files(dir.path(), Some(past), false)
                .unwrap()
                .len(),
            1
        );

        let future = SystemTime::now() + Duration::from_secs(3_600);
        assert!(collect_changed_files(dir.path(), Some(future), false)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn hidden_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), ".hidden");
        let visible = touch(dir.path(), "visible.png");

        let files = collect_changed_files(dir.path(), None, false).unwrap();
        assert_eq!(files, vec![visible]);
    }

    #[test]
    fn subdirectories_require_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let nested = touch(&dir.path().join("nested"), "deep.png");
        let top = touch(dir.path(), "top.png");

        let flat = collect_changed_files(dir.path(), None, false).unwrap();
        assert_eq!(flat, vec![top.clone()]);

        let deep = collect_changed_files(dir.path(), None, true).unwrap();
        assert_eq!(deep, vec![nested, top]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(collect_changed_files(&gone, None, false).is_err());
    }
}
