use std::path::{Path, PathBuf};

#[cfg(unix)]
fn owner_uid(path: &Path) -> Option<u32> {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(path).ok().map(|m| m.uid())
}

#[cfg(not(unix))]
fn owner_uid(_path: &Path) -> Option<u32> {
    // No notion of a UID owner; treat every directory as same-owner so the
    // search never stops early on these platforms.
    Some(0)
}

/// Search upward from `start` for a marker file or directory named
/// `marker` (e.g. `.git`), stopping the walk as soon as it would cross an
/// ownership boundary: once a directory's owner differs from `start`'s
/// owner, that directory and everything above it is treated as not-found.
///
/// Returns the directory containing the marker, or `None` if no same-owner
/// ancestor has it.
pub fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    let start_uid = owner_uid(start)?;
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(marker).exists() {
            return Some(dir);
        }
        let parent = dir.parent()?.to_path_buf();
        let parent_uid = owner_uid(&parent)?;
        if parent_uid != start_uid {
            return None;
        }
        dir = parent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_marker_in_starting_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let found = find_upward(dir.path(), ".git");
        assert_eq!(found.as_deref(), Some(dir.path()));
    }

    #[test]
    fn finds_marker_in_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let sub = dir.path().join("a/b/c");
        fs::create_dir_all(&sub).unwrap();
        let found = find_upward(&sub, ".git");
        assert_eq!(found.as_deref(), Some(dir.path()));
    }

    #[test]
    fn returns_none_when_marker_is_absent_everywhere_reachable() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("a/b");
        fs::create_dir_all(&sub).unwrap();
        assert_eq!(find_upward(&sub, "nonexistent.marker"), None);
    }
}
