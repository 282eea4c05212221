//! List command implementation

use clap::{Args, ValueEnum};
use hitch_config::Stage;
use hitch_engine::{Git2Provider, HookDefinition, Resolver};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::IsTerminal;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;
use crate::ui::{StatusIcon, create_spinner};

/// Output format for `list`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    /// One hook per line
    #[default]
    Simple,
    /// JSON array
    Json,
}

/// List the hooks the document resolves to
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only hooks that run in this stage
    #[arg(long)]
    pub hook_stage: Option<Stage>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: ListFormat,
}

#[derive(Debug, Serialize)]
struct ListedHook<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    alias: Option<&'a str>,
    name: &'a str,
    repo: &'a str,
    language: &'a str,
    stages: Vec<&'static str>,
}

impl<'a> From<&'a HookDefinition> for ListedHook<'a> {
    fn from(hook: &'a HookDefinition) -> Self {
        let stages = match &hook.stages {
            Some(stages) => stages.iter().map(Stage::name).collect(),
            None => Stage::ALL.iter().map(Stage::name).collect(),
        };
        Self {
            id: &hook.id,
            alias: hook.alias.as_deref(),
            name: &hook.name,
            repo: &hook.repo,
            language: hook.language.as_str(),
            stages,
        }
    }
}

fn render_simple(hooks: &[ListedHook<'_>], color: bool) -> String {
    let width = hooks.iter().map(|h| h.id.len()).max().unwrap_or_default();
    hooks
        .iter()
        .map(|hook| {
            let id = format!("{:width$}", hook.id);
            let id = if color { id.bold().to_string() } else { id };
            format!("{id}  {} ({})\n", hook.name, hook.repo)
        })
        .collect()
}

impl Command for ListCommand {
    type Output = i32;

    fn execute(&self, context: &RuntimeContext) -> Result<i32> {
        let work_tree = context.work_tree()?;
        let (_, config) = context.load_config(&work_tree)?;

        let spinner = create_spinner(
            "Resolving hook repositories...",
            std::io::stderr().is_terminal(),
        );
        let provider = Git2Provider::new();
        let resolution = Resolver::new(&context.cache, &provider).resolve(&config);
        spinner.finish_and_clear();
        let (hooks, errors) = resolution?.into_parts();

        for error in &errors {
            eprintln!("{} {error}", StatusIcon::Error.get());
        }

        let listed: Vec<ListedHook<'_>> = hooks
            .iter()
            .filter(|h| self.hook_stage.is_none_or(|stage| h.runs_in(stage)))
            .map(ListedHook::from)
            .collect();

        match self.format {
            ListFormat::Simple => print!("{}", render_simple(&listed, context.color)),
            ListFormat::Json => {
                let json = serde_json::to_string_pretty(&listed)
                    .map_err(|e| anyhow::anyhow!("Failed to serialize hooks: {e}"))?;
                println!("{json}");
            }
        }

        Ok(i32::from(!errors.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    fn listed<'a>(id: &'a str, name: &'a str) -> ListedHook<'a> {
        ListedHook {
            id,
            alias: None,
            name,
            repo: "builtin",
            language: "builtin",
            stages: vec!["pre-commit"],
        }
    }

    #[test]
    fn test_simple_output_aligns_ids() {
        let text = render_simple(
            &[listed("check-json", "check json"), listed("x", "ex")],
            false,
        );
        assert_eq!(
            text,
            "check-json  check json (builtin)\nx           ex (builtin)\n"
        );
    }

    #[test]
    fn test_json_omits_missing_alias() {
        let json = serde_json::to_value([listed("x", "ex")]).unwrap();
        assert_eq!(json[0]["id"], "x");
        assert!(json[0].get("alias").is_none());
        assert_eq!(json[0]["stages"][0], "pre-commit");
    }
}
