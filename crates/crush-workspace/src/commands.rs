use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

/// A custom command discovered from a markdown file.
#[derive(Debug, Clone)]
pub struct Command {
    /// `user:<relpath>` or `project:<relpath>`, path separators replaced by
    /// `:`, extension stripped.
    pub id: String,
    pub path: PathBuf,
    pub body: String,
    /// Distinct `$ARG_NAME` placeholders found in the body, in first-seen
    /// order.
    pub arguments: Vec<String>,
}

fn arg_pattern() -> Regex {
    Regex::new(r"\$([A-Z][A-Z0-9_]*)").expect("static regex compiles")
}

fn extract_arguments(body: &str) -> Vec<String> {
    let re = arg_pattern();
    let mut seen = Vec::new();
    for cap in re.captures_iter(body) {
        let name = cap[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

fn relpath_id(root: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(root).ok()?;
    let without_ext = rel.with_extension("");
    let parts: Vec<String> = without_ext
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join(":"))
}

fn scan_dir(root: &Path, scope: &str, out: &mut Vec<Command>) {
    if !root.is_dir() {
        return;
    }
    for entry in WalkDir::new(root) {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let Some(rel_id) = relpath_id(root, entry.path()) else { continue };
        let Ok(body) = std::fs::read_to_string(entry.path()) else { continue };
        let arguments = extract_arguments(&body);
        out.push(Command {
            id: format!("{scope}:{rel_id}"),
            path: entry.path().to_path_buf(),
            body,
            arguments,
        });
    }
}

/// Discover custom commands from the three configured locations. `config_home`
/// is `$XDG_CONFIG_HOME` (falls back to `~/.config` if `None` upstream), and
/// `data_dir` is the crush data directory's own `commands` subdirectory.
///
/// `~/.crush/commands` and `<dataDir>/commands` are treated as project-scoped
/// (`project:`); `$XDG_CONFIG_HOME/crush/commands` is user-scoped (`user:`).
pub fn discover(config_home: &Path, home: &Path, data_dir: &Path) -> Vec<Command> {
    let mut commands = Vec::new();
    scan_dir(&config_home.join("crush/commands"), "user", &mut commands);
    scan_dir(&home.join(".crush/commands"), "project", &mut commands);
    scan_dir(&data_dir.join("commands"), "project", &mut commands);
    commands.sort_by(|a, b| a.id.cmp(&b.id));
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_user_scoped_command_with_id() {
        let dir = tempfile::tempdir().unwrap();
        let cmd_dir = dir.path().join("config/crush/commands");
        fs::create_dir_all(cmd_dir.join("git")).unwrap();
        fs::write(cmd_dir.join("git/commit.md"), "Commit with message $MESSAGE").unwrap();
        let empty = dir.path().join("nope");
        let commands = discover(&dir.path().join("config"), &empty, &empty);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].id, "user:git:commit");
        assert_eq!(commands[0].arguments, vec!["MESSAGE".to_string()]);
    }

    #[test]
    fn distinct_argument_names_preserve_first_seen_order() {
        let body = "Do $FOO then $BAR then $FOO again";
        assert_eq!(extract_arguments(body), vec!["FOO".to_string(), "BAR".to_string()]);
    }

    #[test]
    fn project_scoped_commands_found_under_home_and_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        fs::create_dir_all(home.join(".crush/commands")).unwrap();
        fs::write(home.join(".crush/commands/deploy.md"), "Deploy to $ENV").unwrap();
        let empty = dir.path().join("nope");
        let commands = discover(&empty, &home, &empty);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].id, "project:deploy");
    }

    #[test]
    fn missing_directories_yield_no_commands_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let commands = discover(&dir.path().join("a"), &dir.path().join("b"), &dir.path().join("c"));
        assert!(commands.is_empty());
    }
}
