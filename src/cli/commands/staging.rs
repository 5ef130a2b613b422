//! One-shot staging area commands.

use clap::Subcommand;
use tokio::runtime::Runtime;

use super::finish;
use crate::settings::{
    ACTION_STAGING, STAGING_APPEND_MULTI, STAGING_CONVERT_MULTI, STAGING_PUSH, STAGING_REMOVE,
    STAGING_UNSTAGE, Settings,
};
use crate::staging::StagingRepository;
use crate::workflow::WorkflowController;

/// Staging area subcommands
#[derive(Subcommand)]
pub enum StagingCommand {
    /// List staged albums
    List,
    /// Push an album to the share and unstage it
    Push {
        /// Staging key (album title)
        key: String,
    },
    /// Turn an album into the first disc of a multi disk album
    Convert {
        key: String,
        /// Title of the multi disk album
        title: String,
    },
    /// Append an album as the next disc of the pending multi disk album
    Append { key: String },
    /// Stop tracking an album, keeping its files
    Unstage { key: String },
    /// Delete an album's files and stop tracking it
    Remove { key: String },
}

impl StagingCommand {
    /// The settings object a front end would submit for this command.
    fn settings(&self) -> Option<Settings> {
        let (staging_action, key, title) = match self {
            StagingCommand::List => return None,
            StagingCommand::Push { key } => (STAGING_PUSH, key, None),
            StagingCommand::Convert { key, title } => (STAGING_CONVERT_MULTI, key, Some(title)),
            StagingCommand::Append { key } => (STAGING_APPEND_MULTI, key, None),
            StagingCommand::Unstage { key } => (STAGING_UNSTAGE, key, None),
            StagingCommand::Remove { key } => (STAGING_REMOVE, key, None),
        };
        Some(Settings {
            action: Some(ACTION_STAGING.to_string()),
            staging_action: Some(staging_action.to_string()),
            staging_key: Some(key.clone()),
            multi_disk_title: title.cloned(),
            ..Settings::default()
        })
    }
}

pub fn cmd_staging(
    rt: &Runtime,
    controller: WorkflowController,
    command: &StagingCommand,
) -> anyhow::Result<()> {
    let Some(settings) = command.settings() else {
        controller.with_staging(|staging| print!("{}", render_list(staging)));
        return Ok(());
    };

    let request = settings
        .to_request(&controller.snapshot())?
        .ok_or_else(|| anyhow::anyhow!("Nothing to do"))?;
    rt.block_on(controller.run_action(request))?;
    finish(&controller)
}

fn render_list(staging: &StagingRepository) -> String {
    if staging.is_empty() {
        return "Staging area is empty.\n".to_string();
    }

    let pending = staging.pending_multi_disk().map(|e| e.title.as_str());
    let mut out = String::new();
    for (key, entry) in staging.iter() {
        let marker = if Some(key.as_str()) == pending {
            format!(" [multi disk, {} disc(s)]", entry.multi_disk_count.unwrap_or(1))
        } else {
            String::new()
        };
        out.push_str(&format!("{}{}\n", entry.describe(), marker));
        for track in &entry.tracks {
            out.push_str(&format!("    {}\n", track));
        }
    }
    out
}
