use regex::Regex;

/// A single compiled gitignore-style pattern line.
pub struct Pattern {
    pub negate: bool,
    pub dir_only: bool,
    /// Anchored patterns (containing a `/` before the final segment) only
    /// match relative to the directory the pattern file lives in; others
    /// match a basename at any depth.
    pub anchored: bool,
    re: Regex,
}

impl Pattern {
    /// Compile one `.gitignore`/`.crushignore` line. Returns `None` for
    /// blank lines and comments.
    pub fn compile(line: &str) -> Option<Self> {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let negate = line.starts_with('!');
        let mut body = if negate { &line[1..] } else { line };
        let dir_only = body.ends_with('/');
        if dir_only {
            body = &body[..body.len() - 1];
        }
        // A separator anywhere but the very end anchors the pattern to the
        // directory level of the ignore file; no separator at all lets it
        // match at any depth (git's documented rule).
        let anchored = body.contains('/');
        let body = body.trim_start_matches('/');
        let re = Regex::new(&format!("^{}$", translate(body))).ok()?;
        Some(Self { negate, dir_only, anchored, re })
    }

    /// `rel_path` is workspace-relative, slash-separated, no leading slash.
    /// `is_dir` tells the matcher whether the candidate is itself a
    /// directory, which matters for `dir_only` patterns.
    pub fn matches(&self, rel_path: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        if self.anchored {
            self.re.is_match(rel_path)
        } else {
            // Unanchored: match the basename, or any suffix starting at a
            // path boundary (mirrors git's "matches at any depth").
            self.re.is_match(rel_path)
                || rel_path
                    .rsplit('/')
                    .next()
                    .map(|base| self.re.is_match(base))
                    .unwrap_or(false)
        }
    }
}

/// Translate a gitignore-style glob body (no leading/trailing slash, no
/// leading `!`, no trailing `/`) into a regex body (unanchored ends added
/// by the caller).
fn translate(pattern: &str) -> String {
    let mut out = String::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    // `**` — match any number of path segments, including none.
                    if chars.get(i + 2) == Some(&'/') {
                        out.push_str("(?:.*/)?");
                        i += 3;
                        continue;
                    } else {
                        out.push_str(".*");
                        i += 2;
                        continue;
                    }
                }
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }
    out
}

/// A doublestar glob pattern used by the `glob` tool (not a gitignore
/// pattern): `**` spans directories, `*` spans one segment, matching is
/// always anchored to the search root.
pub fn doublestar_to_regex(pattern: &str) -> Option<Regex> {
    let body = pattern.trim_start_matches("./");
    Regex::new(&format!("^{}$", translate(body))).ok()
}
