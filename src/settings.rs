//! The flat settings object a front end submits, and the snapshot it reads.
//!
//! A front end renders choices from a [`WorkflowSnapshot`] and answers with a
//! [`Settings`] object naming the next action. Fields that do not matter for
//! the chosen action are ignored.

use serde::{Deserialize, Serialize};

use crate::ripper::DriveStatus;
use crate::staging::{StagingEntry, StagingRepository};
use crate::status::Status;
use crate::transfer::ShareCredentials;
use crate::workflow::{Action, ActionRequest, StagingAction, WorkflowState};

pub const ACTION_SCAN: &str = "scan";
pub const ACTION_CONFIGURE: &str = "configure";
pub const ACTION_RIP: &str = "rip";
pub const ACTION_RIP_PUSH: &str = "rip_push";
pub const ACTION_STAGING: &str = "staging";

pub const STAGING_PUSH: &str = "push";
pub const STAGING_CONVERT_MULTI: &str = "convert_multi";
pub const STAGING_APPEND_MULTI: &str = "append_multi";
pub const STAGING_UNSTAGE: &str = "unstage";
pub const STAGING_REMOVE: &str = "remove";

/// Errors turning settings into a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Unknown action \"{0}\"")]
    UnknownAction(String),

    #[error("Unknown staging action \"{0}\"")]
    UnknownStagingAction(String),

    #[error("Please select an album")]
    MissingStagingKey,

    #[error("No staged album named \"{0}\"")]
    UnknownStagingKey(String),

    #[error("Please enter a Multi Disk Title")]
    MissingMultiDiskTitle,

    #[error("Multi Disk Title should differ from original title")]
    MultiDiskTitleUnchanged,

    #[error("There is no Multi Disk album to append to")]
    NoPendingMultiDisk,

    #[error("Multi Disk album \"{0}\" is still open, append to it or push it first")]
    MultiDiskPending(String),
}

/// The user's next requested action, as a flat key/value object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub action: Option<String>,
    pub staging_action: Option<String>,
    pub staging_key: Option<String>,
    pub multi_disk_title: Option<String>,
    pub share: Option<String>,
    pub user: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Settings {
    /// Typed request for these settings, or `None` when no action is selected.
    pub fn to_request(
        &self,
        snapshot: &WorkflowSnapshot,
    ) -> Result<Option<ActionRequest>, SettingsError> {
        let Some(action) = non_empty(&self.action) else {
            return Ok(None);
        };

        let action = match action {
            ACTION_SCAN => Action::Scan,
            ACTION_CONFIGURE => Action::Configure,
            ACTION_RIP => Action::Rip,
            ACTION_RIP_PUSH => Action::RipThenTransfer,
            ACTION_STAGING => match self.staging_action(snapshot)? {
                Some(staging) => Action::Staging(staging),
                None => return Ok(None),
            },
            other => return Err(SettingsError::UnknownAction(other.to_string())),
        };

        Ok(Some(ActionRequest {
            action,
            credentials: self.credentials(),
        }))
    }

    fn staging_action(
        &self,
        snapshot: &WorkflowSnapshot,
    ) -> Result<Option<StagingAction>, SettingsError> {
        let Some(staging_action) = non_empty(&self.staging_action) else {
            return Ok(None);
        };
        let key = self
            .staging_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(SettingsError::MissingStagingKey)?;
        let entry = snapshot
            .entry(&key)
            .ok_or_else(|| SettingsError::UnknownStagingKey(key.clone()))?;

        let action = match staging_action {
            STAGING_PUSH => StagingAction::Push { key },
            STAGING_CONVERT_MULTI => {
                if let Some(pending) = &snapshot.pending_multi_disk {
                    return Err(SettingsError::MultiDiskPending(pending.clone()));
                }
                let new_title = non_empty(&self.multi_disk_title)
                    .ok_or(SettingsError::MissingMultiDiskTitle)?;
                if new_title == entry.title {
                    return Err(SettingsError::MultiDiskTitleUnchanged);
                }
                StagingAction::ConvertToMulti {
                    new_title: new_title.to_string(),
                    key,
                }
            }
            STAGING_APPEND_MULTI => {
                let target = snapshot
                    .pending_multi_disk
                    .clone()
                    .ok_or(SettingsError::NoPendingMultiDisk)?;
                StagingAction::AppendToMulti { key, target }
            }
            STAGING_UNSTAGE => StagingAction::Unstage { key },
            STAGING_REMOVE => StagingAction::Remove { key },
            other => return Err(SettingsError::UnknownStagingAction(other.to_string())),
        };
        Ok(Some(action))
    }

    pub fn credentials(&self) -> ShareCredentials {
        ShareCredentials {
            share: non_empty(&self.share).map(str::to_string),
            user: non_empty(&self.user).map(str::to_string),
            password: self.password.clone().filter(|p| !p.is_empty()),
        }
    }
}

/// A staged album as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagingSummary {
    pub key: String,
    pub artist: String,
    pub title: String,
    pub tracks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_disk_count: Option<u32>,
}

impl StagingSummary {
    fn from_entry(key: &str, entry: &StagingEntry) -> Self {
        Self {
            key: key.to_string(),
            artist: entry.artist.clone(),
            title: entry.title.clone(),
            tracks: entry.tracks.iter().map(|t| t.to_string()).collect(),
            multi_disk_count: entry.multi_disk_count,
        }
    }
}

/// Read-only view of the workflow for rendering choices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowSnapshot {
    pub busy: bool,
    pub state: WorkflowState,
    pub drive: DriveStatus,
    pub staging: Vec<StagingSummary>,
    /// Title of the multi-disc album accepting discs
    pub pending_multi_disk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<Status>,
}

impl WorkflowSnapshot {
    pub fn new(
        state: WorkflowState,
        drive: DriveStatus,
        staging: &StagingRepository,
        last_status: Option<Status>,
    ) -> Self {
        Self {
            busy: !state.is_idle(),
            state,
            drive,
            staging: staging
                .iter()
                .map(|(key, entry)| StagingSummary::from_entry(key, entry))
                .collect(),
            pending_multi_disk: staging.pending_multi_disk().map(|e| e.title.clone()),
            last_status,
        }
    }

    pub fn entry(&self, key: &str) -> Option<&StagingSummary> {
        self.staging.iter().find(|s| s.key == key)
    }
}

/// One choice offered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub title: String,
    pub value: &'static str,
}

impl Choice {
    fn new(title: impl Into<String>, value: &'static str) -> Self {
        Self {
            title: title.into(),
            value,
        }
    }
}

/// Actions that make sense in the current state; empty while busy.
pub fn available_actions(snapshot: &WorkflowSnapshot) -> Vec<Choice> {
    if snapshot.busy {
        return Vec::new();
    }

    let mut choices = Vec::new();
    match (snapshot.drive.present, snapshot.drive.configured) {
        (Some(true), Some(true)) => {
            choices.push(Choice::new("Rip", ACTION_RIP));
            choices.push(Choice::new("Rip & Transfer", ACTION_RIP_PUSH));
        }
        (Some(true), _) => choices.push(Choice::new("Configure Drive", ACTION_CONFIGURE)),
        _ => choices.push(Choice::new("Scan Drive", ACTION_SCAN)),
    }
    if !snapshot.staging.is_empty() {
        choices.push(Choice::new("Manage Staging Area", ACTION_STAGING));
    }
    choices
}

/// Staging actions offered for the album `key`.
pub fn available_staging_actions(snapshot: &WorkflowSnapshot, key: &str) -> Vec<Choice> {
    let Some(entry) = snapshot.entry(key) else {
        return Vec::new();
    };

    let mut choices = Vec::new();
    if snapshot.staging.len() > 1 {
        match &snapshot.pending_multi_disk {
            Some(multi) if *multi != entry.title => {
                choices.push(Choice::new(
                    format!("Append to \"{}\"", multi),
                    STAGING_APPEND_MULTI,
                ));
            }
            Some(_) => {}
            None => choices.push(Choice::new("Convert to Multi Disk", STAGING_CONVERT_MULTI)),
        }
    }
    choices.push(Choice::new("Push", STAGING_PUSH));
    choices.push(Choice::new("Unstage", STAGING_UNSTAGE));
    choices.push(Choice::new("Remove", STAGING_REMOVE));
    choices
}
