//! Workflow states and the actions that move between them.

use serde::Serialize;

use crate::transfer::ShareCredentials;

/// What the controller is doing right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Idle,
    Scanning,
    Configuring,
    Ripping,
    RippingThenTransferring,
    ManagingStaging,
}

impl WorkflowState {
    pub fn is_idle(&self) -> bool {
        matches!(self, WorkflowState::Idle)
    }
}

/// Staging area maintenance, addressed by staging key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingAction {
    Push { key: String },
    ConvertToMulti { key: String, new_title: String },
    AppendToMulti { key: String, target: String },
    Unstage { key: String },
    Remove { key: String },
}

impl StagingAction {
    pub fn key(&self) -> &str {
        match self {
            StagingAction::Push { key }
            | StagingAction::ConvertToMulti { key, .. }
            | StagingAction::AppendToMulti { key, .. }
            | StagingAction::Unstage { key }
            | StagingAction::Remove { key } => key,
        }
    }
}

/// A requested workflow step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Scan,
    Configure,
    Rip,
    RipThenTransfer,
    Staging(StagingAction),
}

impl Action {
    /// State held while this action runs.
    pub fn state(&self) -> WorkflowState {
        match self {
            Action::Scan => WorkflowState::Scanning,
            Action::Configure => WorkflowState::Configuring,
            Action::Rip => WorkflowState::Ripping,
            Action::RipThenTransfer => WorkflowState::RippingThenTransferring,
            Action::Staging(_) => WorkflowState::ManagingStaging,
        }
    }
}

/// An action plus the share settings a transfer would use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub action: Action,
    pub credentials: ShareCredentials,
}

impl From<Action> for ActionRequest {
    fn from(action: Action) -> Self {
        Self {
            action,
            credentials: ShareCredentials::default(),
        }
    }
}

/// Rejection of a request made while another action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("There is currently an action in progress, please try again later")]
pub struct Busy(pub WorkflowState);

/// Next state for `action` requested in `current`.
pub fn transition(current: WorkflowState, action: &Action) -> Result<WorkflowState, Busy> {
    if current.is_idle() {
        Ok(action.state())
    } else {
        Err(Busy(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_actions() -> Vec<Action> {
        vec![
            Action::Scan,
            Action::Configure,
            Action::Rip,
            Action::RipThenTransfer,
            Action::Staging(StagingAction::Remove {
                key: "Album".to_string(),
            }),
        ]
    }

    #[test]
    fn test_idle_accepts_every_action() {
        for action in all_actions() {
            assert_eq!(transition(WorkflowState::Idle, &action), Ok(action.state()));
        }
        assert_eq!(Action::RipThenTransfer.state(), WorkflowState::RippingThenTransferring);
    }

    #[test]
    fn test_busy_rejects_every_action() {
        for current in [
            WorkflowState::Scanning,
            WorkflowState::Configuring,
            WorkflowState::Ripping,
            WorkflowState::RippingThenTransferring,
            WorkflowState::ManagingStaging,
        ] {
            for action in all_actions() {
                assert_eq!(transition(current, &action), Err(Busy(current)));
            }
        }
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&WorkflowState::RippingThenTransferring).unwrap(),
            "\"ripping_then_transferring\""
        );
    }
}
