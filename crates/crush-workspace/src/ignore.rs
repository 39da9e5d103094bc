use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::globmatch::Pattern;

/// Names always treated as ignored, regardless of any ignore file.
const COMMON_IGNORE: &[&str] = &[
    ".git", "node_modules", "target", "dist", "build", "__pycache__", ".crush",
];

fn load_lines(dir: &Path, filename: &str) -> Vec<String> {
    let path = dir.join(filename);
    std::fs::read_to_string(&path)
        .map(|contents| contents.lines().map(str::to_owned).collect())
        .unwrap_or_default()
}

fn compile_lines(lines: &[String]) -> Vec<Pattern> {
    lines.iter().filter_map(|l| Pattern::compile(l)).collect()
}

fn home_wide_lines() -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(home) = dirs::home_dir() {
        for rel in [".gitignore", ".config/git/ignore", ".config/crush/ignore"] {
            lines.extend(load_lines(&home, rel));
        }
    }
    lines
}

/// Hierarchical ignore resolution for a single workspace root.
///
/// Per-directory pattern lists are built lazily and memoized, since walking
/// a large tree would otherwise re-parse the same `.gitignore` file once
/// per sibling.
pub struct IgnoreResolver {
    root: PathBuf,
    home_lines: Vec<String>,
    common: Vec<Pattern>,
    /// Raw pattern lines per directory, memoized so a large walk doesn't
    /// re-read the same `.gitignore` once per sibling. Compiled lazily on
    /// each lookup since `Regex` isn't cheaply cloneable.
    cache: Mutex<HashMap<PathBuf, Vec<String>>>,
}

impl IgnoreResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let common = COMMON_IGNORE
            .iter()
            .map(|name| Pattern::compile(name).expect("builtin pattern compiles"))
            .collect();
        Self {
            root: root.into(),
            home_lines: home_wide_lines(),
            common,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn layer_for(&self, dir: &Path) -> Vec<Pattern> {
        let mut cache = self.cache.lock().unwrap();
        let lines = cache.entry(dir.to_path_buf()).or_insert_with(|| {
            let mut lines = load_lines(dir, ".gitignore");
            lines.extend(load_lines(dir, ".crushignore"));
            lines
        });
        compile_lines(lines)
    }

    /// Is `abs_path` (anywhere under `self.root`) ignored?
    ///
    /// The workspace root itself is never ignored, regardless of any
    /// pattern — this is a hard invariant, not a convenience default.
    pub fn is_ignored(&self, abs_path: &Path, is_dir: bool) -> bool {
        if abs_path == self.root {
            return false;
        }
        let Ok(rel) = abs_path.strip_prefix(&self.root) else {
            return false;
        };
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        if rel_str.is_empty() {
            return false;
        }

        let home_patterns = compile_lines(&self.home_lines);
        let mut ignored = false;
        for pattern in self.common.iter().chain(home_patterns.iter()) {
            if pattern.matches(&rel_str, is_dir) {
                ignored = !pattern.negate;
            }
        }

        // Layer patterns top-down (root to leaf) so deeper directories can
        // override shallower ones, matching git's last-match-wins rule.
        let mut ancestors = vec![self.root.clone()];
        let mut cur = self.root.clone();
        if let Some(parent_rel) = rel.parent() {
            for component in parent_rel.components() {
                cur.push(component);
                ancestors.push(cur.clone());
            }
        }
        for ancestor in ancestors {
            for pattern in self.layer_for(&ancestor) {
                if pattern.matches(&rel_str, is_dir) {
                    ignored = !pattern.negate;
                }
            }
        }
        ignored
    }
}
