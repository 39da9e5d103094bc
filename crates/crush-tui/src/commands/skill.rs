// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Skill-based slash commands loaded from `<skills-dir>/<name>/SKILL.md`.
//!
//! Skills are discovered by [`crush_workspace::discover_skills`]; each one
//! becomes a slash command that sends the skill body as the user message
//! (optionally followed by the typed arguments), letting the agent pick the
//! skill up through its normal tool-call flow.

use std::path::{Path, PathBuf};

use crate::commands::{
    CommandArgument, CommandContext, CommandResult, CompletionItem, SlashCommand,
};

/// A slash command backed by a `<name>/SKILL.md` file.
pub struct SkillCommand {
    pub name: String,
    pub path: PathBuf,
    pub body: String,
}

impl SlashCommand for SkillCommand {
    fn name(&self) -> &str { &self.name }

    fn description(&self) -> &str { "Skill command (from SKILL.md)" }

    fn arguments(&self) -> Vec<CommandArgument> {
        vec![CommandArgument::optional("args", "extra context appended to the skill body")]
    }

    fn complete(&self, _arg_index: usize, _partial: &str, _ctx: &CommandContext) -> Vec<CompletionItem> {
        vec![]
    }

    fn execute(&self, args: Vec<String>) -> CommandResult {
        let message = if args.is_empty() {
            self.body.clone()
        } else {
            format!("{}\n\n{}", self.body, args.join(" "))
        };
        CommandResult {
            message_to_send: Some(message),
            ..Default::default()
        }
    }
}

/// Scan `skills_dir` for `SKILL.md` files and turn each into a slash command.
pub fn discover_skills(skills_dir: &Path) -> Vec<SkillCommand> {
    crush_workspace::discover_skills(skills_dir)
        .into_iter()
        .map(|skill| SkillCommand {
            name: skill.name,
            path: skill.location,
            body: skill.body,
        })
        .collect()
}
