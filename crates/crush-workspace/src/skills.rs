use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

#[derive(Debug, Clone, Deserialize)]
struct Frontmatter {
    name: String,
    description: String,
    #[allow(dead_code)]
    license: Option<String>,
    #[allow(dead_code)]
    compatibility: Option<String>,
    #[allow(dead_code)]
    metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub location: PathBuf,
    pub body: String,
}

#[derive(Debug)]
pub enum SkillError {
    MissingFrontmatter,
    InvalidYaml(String),
    NameTooLong,
    NameNotAlphanumericHyphen,
    NameDoesNotMatchDirectory { name: String, dir: String },
    DescriptionTooLong,
}

impl std::fmt::Display for SkillError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFrontmatter => write!(f, "SKILL.md has no --- front-matter block"),
            Self::InvalidYaml(e) => write!(f, "invalid front-matter: {e}"),
            Self::NameTooLong => write!(f, "skill name exceeds 64 characters"),
            Self::NameNotAlphanumericHyphen => {
                write!(f, "skill name must be alphanumeric with single hyphens")
            }
            Self::NameDoesNotMatchDirectory { name, dir } => {
                write!(f, "skill name `{name}` does not match directory `{dir}`")
            }
            Self::DescriptionTooLong => write!(f, "skill description exceeds 1024 characters"),
        }
    }
}

impl std::error::Error for SkillError {}

fn valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 64 {
        return false;
    }
    let mut prev_hyphen = false;
    for (i, c) in name.chars().enumerate() {
        if c == '-' {
            if prev_hyphen || i == 0 || i == name.chars().count() - 1 {
                return false;
            }
            prev_hyphen = true;
        } else if c.is_ascii_alphanumeric() {
            prev_hyphen = false;
        } else {
            return false;
        }
    }
    true
}

/// Parse one `SKILL.md` file's contents. `dir_basename` is the name of the
/// directory the file lives in, used to validate the `name` field matches
/// case-insensitively.
fn parse_skill_md(contents: &str, dir_basename: &str, location: PathBuf) -> Result<Skill, SkillError> {
    let rest = contents.strip_prefix("---\n").or_else(|| contents.strip_prefix("---\r\n"));
    let Some(rest) = rest else { return Err(SkillError::MissingFrontmatter) };
    let end = rest.find("\n---").ok_or(SkillError::MissingFrontmatter)?;
    let yaml = &rest[..end];
    let body = rest[end..]
        .splitn(2, '\n')
        .nth(1)
        .unwrap_or("")
        .trim_start_matches(['\n', '\r'])
        .to_string();

    let fm: Frontmatter =
        serde_yaml::from_str(yaml).map_err(|e| SkillError::InvalidYaml(e.to_string()))?;

    if fm.name.len() > 64 {
        return Err(SkillError::NameTooLong);
    }
    if !valid_name(&fm.name) {
        return Err(SkillError::NameNotAlphanumericHyphen);
    }
    if !fm.name.eq_ignore_ascii_case(dir_basename) {
        return Err(SkillError::NameDoesNotMatchDirectory {
            name: fm.name.clone(),
            dir: dir_basename.to_string(),
        });
    }
    if fm.description.len() > 1024 {
        return Err(SkillError::DescriptionTooLong);
    }

    Ok(Skill { name: fm.name, description: fm.description, location, body })
}

/// Discover all valid skills under `root`, one directory level at a time
/// (a `SKILL.md` nested inside another skill's own subdirectories is not a
/// second skill). Directories whose `SKILL.md` fails validation are
/// skipped, not fatal to the overall discovery.
pub fn discover(root: &Path) -> Vec<Skill> {
    let mut skills = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_dir() {
            continue;
        }
        let skill_md = entry.path().join("SKILL.md");
        let Ok(contents) = std::fs::read_to_string(&skill_md) else { continue };
        let Some(dir_basename) = entry.file_name().to_str() else { continue };
        if let Ok(skill) = parse_skill_md(&contents, dir_basename, entry.path().to_path_buf()) {
            skills.push(skill);
        }
    }
    skills.sort_by(|a, b| a.name.cmp(&b.name));
    skills
}

fn escape_xml(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&apos;".to_string(),
            other => other.to_string(),
        })
        .collect()
}

/// Render the catalog the model sees: one `<skill>` entry per discovered
/// skill, in the order given.
pub fn catalog_xml(skills: &[Skill]) -> String {
    let mut out = String::from("<available_skills>");
    for skill in skills {
        out.push_str("<skill><name>");
        out.push_str(&escape_xml(&skill.name));
        out.push_str("</name><description>");
        out.push_str(&escape_xml(&skill.description));
        out.push_str("</description><location>");
        out.push_str(&escape_xml(&skill.location.to_string_lossy()));
        out.push_str("</location></skill>");
    }
    out.push_str("</available_skills>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_skill(root: &Path, dir: &str, name: &str, description: &str, body: &str) {
        let skill_dir = root.join(dir);
        fs::create_dir_all(&skill_dir).unwrap();
        let contents = format!("---\nname: {name}\ndescription: {description}\n---\n{body}");
        fs::write(skill_dir.join("SKILL.md"), contents).unwrap();
    }

    #[test]
    fn discovers_a_well_formed_skill() {
        let dir = tempfile::tempdir().unwrap();
        write_skill(dir.path(), "pdf-tools", "pdf-tools", "Work with PDF files", "Use pdftotext.");
        let skills = discover(dir.path());
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "pdf-tools");
        assert_eq!(skills[0].body.trim(), "Use pdftotext.");
    }

    #[test]
    fn rejects_name_mismatched_with_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_skill(dir.path(), "pdf-tools", "other-name", "desc", "body");
        assert!(discover(dir.path()).is_empty());
    }

    #[test]
    fn name_matching_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        write_skill(dir.path(), "PDF-Tools", "pdf-tools", "desc", "body");
        assert_eq!(discover(dir.path()).len(), 1);
    }

    #[test]
    fn catalog_escapes_special_characters() {
        let skill = Skill {
            name: "a".to_string(),
            description: "uses <tags> & \"quotes\"".to_string(),
            location: PathBuf::from("/skills/a"),
            body: String::new(),
        };
        let xml = catalog_xml(&[skill]);
        assert!(xml.contains("uses &lt;tags&gt; &amp; &quot;quotes&quot;"));
    }

    #[test]
    fn missing_frontmatter_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("broken")).unwrap();
        fs::write(dir.path().join("broken/SKILL.md"), "no frontmatter here").unwrap();
        assert!(discover(dir.path()).is_empty());
    }
}
