//! Long-running mode: settings objects in, status updates out.
//!
//! Each stdin line is either a JSON [`Settings`] object or the word
//! `snapshot`. Actions run in the background, so a request made while one
//! is running is rejected as busy. SIGINT, SIGTERM or the end of stdin
//! flush the staging area and exit.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::drive::render_snapshot;
use crate::settings::Settings;
use crate::status::Status;
use crate::workflow::{WorkflowController, WorkflowHandle};

pub fn cmd_serve(rt: &Runtime, controller: WorkflowController) -> anyhow::Result<()> {
    let handle = WorkflowHandle::new(controller);
    rt.block_on(serve(
        &handle,
        BufReader::new(tokio::io::stdin()),
        shutdown_signal(),
    ))
}

/// Initial scan, then one request per input line until `shutdown` or EOF.
///
/// The staging area is saved on every way out.
async fn serve<R, S>(handle: &WorkflowHandle, input: R, shutdown: S) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut shutdown = std::pin::pin!(shutdown);

    let interrupted = tokio::select! {
        _ = handle.controller().start() => false,
        _ = &mut shutdown => true,
    };

    if interrupted {
        info!(target: "workflow", "Shutting down during the initial scan");
    } else {
        read_requests(handle, input, shutdown).await;
    }

    handle.controller().save_staging()?;
    info!(target: "staging", "Staging area saved");
    Ok(())
}

async fn read_requests<R, S>(handle: &WorkflowHandle, input: R, mut shutdown: std::pin::Pin<&mut S>)
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = input.lines();
    let mut running: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(task) = handle_line(handle, line.trim()) {
                        running = Some(task);
                    }
                }
                Ok(None) => {
                    info!(target: "workflow", "End of input");
                    // Let the running action finish before flushing
                    if let Some(task) = running.take() {
                        let _ = task.await;
                    }
                    return;
                }
                Err(e) => {
                    warn!(target: "workflow", error = %e, "Failed to read input");
                    return;
                }
            },
            _ = shutdown.as_mut() => {
                info!(target: "workflow", "Shutting down");
                return;
            }
        }
    }
}

/// Act on one input line; returns the task of a started action.
fn handle_line(handle: &WorkflowHandle, line: &str) -> Option<JoinHandle<()>> {
    let controller = handle.controller();
    if line.is_empty() {
        return None;
    }

    if line == "snapshot" {
        match render_snapshot(&controller.snapshot()) {
            Ok(json) => println!("{}", json),
            Err(e) => warn!(target: "workflow", error = %e, "Failed to render snapshot"),
        }
        return None;
    }

    let settings: Settings = match serde_json::from_str(line) {
        Ok(settings) => settings,
        Err(e) => {
            controller.post_status(Status::error(format!("Invalid settings: {}", e)));
            return None;
        }
    };

    match settings.to_request(&controller.snapshot()) {
        Ok(Some(request)) => handle.request(request).ok(),
        Ok(None) => None,
        Err(e) => {
            controller.post_status(Status::error(e.to_string()));
            None
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(target: "workflow", error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(target: "workflow", error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
