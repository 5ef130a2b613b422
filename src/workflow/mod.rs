//! Sequencing drive scan, drive configuration, ripping, transfer and
//! staging maintenance.
//!
//! Exactly one action runs at a time. [`transition`] decides whether a
//! request is accepted; the [`WorkflowController`] runs the accepted step
//! and always returns to [`WorkflowState::Idle`] afterwards.

mod controller;
mod state;

pub use controller::{ActionGuard, ControllerOptions, WorkflowController, WorkflowHandle};
pub use state::{Action, ActionRequest, Busy, StagingAction, WorkflowState, transition};
