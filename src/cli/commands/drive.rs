//! One-shot drive commands: scan, configure, rip.

use tokio::runtime::Runtime;
use tracing::info;

use super::finish;
use crate::settings::{WorkflowSnapshot, available_actions};
use crate::workflow::{Action, WorkflowController};

/// Scan for the drive
pub fn cmd_scan(rt: &Runtime, controller: WorkflowController) -> anyhow::Result<()> {
    rt.block_on(controller.start());
    finish(&controller)
}

/// Scan, then configure the drive
pub fn cmd_configure(rt: &Runtime, controller: WorkflowController) -> anyhow::Result<()> {
    rt.block_on(async {
        controller.start().await;
        if controller.drive().present != Some(true) {
            return;
        }
        let _ = controller.run_action(Action::Configure.into()).await;
    });
    finish(&controller)
}

/// Scan, then rip the inserted disc (and push it when asked to)
pub fn cmd_rip(rt: &Runtime, controller: WorkflowController, push: bool) -> anyhow::Result<()> {
    rt.block_on(async {
        controller.start().await;

        let drive = controller.drive();
        if drive.present != Some(true) {
            anyhow::bail!("No drive found!");
        }
        if drive.configured != Some(true) {
            anyhow::bail!("Please configure drive (rip-minder configure)");
        }

        let action = if push {
            Action::RipThenTransfer
        } else {
            Action::Rip
        };
        info!(target: "workflow", ?action, "Ripping from the command line");
        let _ = controller.run_action(action.into()).await;
        Ok::<_, anyhow::Error>(())
    })?;
    finish(&controller)
}

/// Scan, then print the snapshot and the choices it allows
pub fn cmd_snapshot(rt: &Runtime, controller: WorkflowController) -> anyhow::Result<()> {
    rt.block_on(controller.start());
    let snapshot = controller.snapshot();
    println!("{}", render_snapshot(&snapshot)?);
    controller.save_staging()?;
    Ok(())
}

/// Snapshot JSON with the available actions attached.
pub(super) fn render_snapshot(snapshot: &WorkflowSnapshot) -> crate::error::Result<String> {
    use crate::error::ResultExt;

    let mut value = serde_json::to_value(snapshot).with_context("serializing snapshot")?;
    if let serde_json::Value::Object(map) = &mut value {
        let actions = serde_json::to_value(available_actions(snapshot))
            .with_context("serializing actions")?;
        map.insert("actions".to_string(), actions);
    }
    serde_json::to_string_pretty(&value).with_context("serializing snapshot")
}
