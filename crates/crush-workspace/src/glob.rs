use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::globmatch::doublestar_to_regex;
use crate::ignore::IgnoreResolver;

/// One matched file, with the metadata needed to sort results by recency.
#[derive(Debug, Clone)]
pub struct GlobMatch {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Result of a glob search: matches sorted most-recently-modified first,
/// and whether the result set was truncated to `limit`.
#[derive(Debug, Clone)]
pub struct GlobResult {
    pub matches: Vec<PathBuf>,
    pub truncated: bool,
}

/// Search `root` for files whose path relative to `root` matches the
/// doublestar `pattern`, skipping anything `ignore` reports as ignored.
/// Matches are returned newest-modified first; at most `limit` are kept,
/// with `truncated` set when more were found than `limit` allows.
///
/// Internally over-fetches up to `limit * 2` candidates before sorting and
/// truncating, so that a cheap prefix of a huge tree doesn't bias the
/// result toward directory-walk order instead of recency.
pub fn search(root: &Path, pattern: &str, ignore: &IgnoreResolver, limit: usize) -> GlobResult {
    let Some(re) = doublestar_to_regex(pattern) else {
        return GlobResult { matches: Vec::new(), truncated: false };
    };

    let overfetch = limit.saturating_mul(2).max(limit);
    let mut candidates: Vec<GlobMatch> = Vec::new();
    let mut saw_more = false;

    for entry in WalkDir::new(root).into_iter().filter_entry(|e| {
        let is_dir = e.file_type().is_dir();
        !ignore.is_ignored(e.path(), is_dir)
    }) {
        let Ok(entry) = entry else { continue };
        if entry.file_type().is_dir() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else { continue };
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        if !re.is_match(&rel_str) {
            continue;
        }
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        if candidates.len() >= overfetch {
            saw_more = true;
            continue;
        }
        candidates.push(GlobMatch { path: entry.path().to_path_buf(), modified });
    }

    candidates.sort_by(|a, b| b.modified.cmp(&a.modified));
    let truncated = saw_more || candidates.len() > limit;
    candidates.truncate(limit);
    GlobResult {
        matches: candidates.into_iter().map(|m| m.path).collect(),
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread::sleep;
    use std::time::Duration;

    fn touch(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn matches_doublestar_across_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("src/lib.rs"), "a");
        touch(&dir.path().join("src/nested/mod.rs"), "b");
        touch(&dir.path().join("README.md"), "c");
        let ignore = IgnoreResolver::new(dir.path());
        let result = search(dir.path(), "**/*.rs", &ignore, 100);
        assert_eq!(result.matches.len(), 2);
        assert!(!result.truncated);
    }

    #[test]
    fn respects_ignore_rules() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("target/debug/build.rs"), "a");
        touch(&dir.path().join("src/lib.rs"), "b");
        let ignore = IgnoreResolver::new(dir.path());
        let result = search(dir.path(), "**/*.rs", &ignore, 100);
        assert_eq!(result.matches.len(), 1);
        assert!(result.matches[0].ends_with("lib.rs"));
    }

    #[test]
    fn newest_modified_file_sorts_first() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.txt"), "a");
        sleep(Duration::from_millis(20));
        touch(&dir.path().join("b.txt"), "b");
        let ignore = IgnoreResolver::new(dir.path());
        let result = search(dir.path(), "*.txt", &ignore, 100);
        assert_eq!(result.matches[0].file_name().unwrap(), "b.txt");
    }

    #[test]
    fn truncates_and_reports_when_over_limit() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            touch(&dir.path().join(format!("f{i}.txt")), "x");
        }
        let ignore = IgnoreResolver::new(dir.path());
        let result = search(dir.path(), "*.txt", &ignore, 3);
        assert_eq!(result.matches.len(), 3);
        assert!(result.truncated);
    }
}
