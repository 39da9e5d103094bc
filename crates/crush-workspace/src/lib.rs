//! Workspace filesystem services: ignore resolution, glob search, upward
//! marker lookup with ownership-boundary stop, custom command discovery,
//! and agent skill discovery.

pub mod commands;
pub mod glob;
pub mod globmatch;
pub mod ignore;
pub mod ownership;
pub mod skills;

pub use commands::{discover as discover_commands, Command};
pub use glob::{search as glob_search, GlobMatch, GlobResult};
pub use ignore::IgnoreResolver;
pub use ownership::find_upward;
pub use skills::{catalog_xml as skills_catalog_xml, discover as discover_skills, Skill, SkillError};
