//! The workflow controller: one action at a time, always back to idle.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::state::{Action, ActionRequest, Busy, StagingAction, WorkflowState, transition};
use crate::config::Config;
use crate::ripper::drive::{self, RIP_ARGS, SCAN_ARGS};
use crate::ripper::{
    ConfigurePhase, ConfigureStep, DriveScan, DriveStatus, OutputStream, ProcessEvent,
    ProcessRunner, RipSession,
};
use crate::settings::WorkflowSnapshot;
use crate::staging::{StagingError, StagingRepository};
use crate::status::{Status, StatusSink, TrackedStatus};
use crate::transfer::{PushRequest, ShareCredentials, Transfer, TransferError};

/// Controller settings taken from the configuration.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Ripping tool executable
    pub command: String,
    pub output_dir: PathBuf,
    pub staging_path: PathBuf,
    pub persist_on_change: bool,
    /// Ripping tool config file to create before configuring the drive
    pub tool_config: Option<PathBuf>,
    /// Share settings used when a request leaves them out
    pub credentials: ShareCredentials,
}

impl ControllerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            command: config.ripper.command.clone(),
            output_dir: config.ripper.output_dir.clone(),
            staging_path: config.ripper.staging_path(),
            persist_on_change: config.ripper.persist_on_change,
            tool_config: config
                .ripper
                .write_tool_config
                .then(drive::tool_config_path)
                .flatten(),
            credentials: ShareCredentials {
                share: config.transfer.share.clone(),
                user: config.transfer.user.clone(),
                password: None,
            },
        }
    }
}

/// Returns the controller to [`WorkflowState::Idle`] when dropped.
#[must_use]
pub struct ActionGuard {
    state: Arc<Mutex<WorkflowState>>,
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        tracing::debug!(target: "workflow", from = ?*state, "Back to idle");
        *state = WorkflowState::Idle;
    }
}

/// Owns the workflow state, the drive status and the staging area.
pub struct WorkflowController {
    state: Arc<Mutex<WorkflowState>>,
    drive: Mutex<DriveStatus>,
    staging: Mutex<StagingRepository>,
    runner: Arc<dyn ProcessRunner>,
    transfer: Arc<dyn Transfer>,
    status: Arc<TrackedStatus>,
    options: ControllerOptions,
}

impl WorkflowController {
    pub fn new(
        options: ControllerOptions,
        staging: StagingRepository,
        runner: Arc<dyn ProcessRunner>,
        transfer: Arc<dyn Transfer>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(WorkflowState::Idle)),
            drive: Mutex::new(DriveStatus::default()),
            staging: Mutex::new(staging),
            runner,
            transfer,
            status: Arc::new(TrackedStatus::new(status)),
            options,
        }
    }

    pub fn state(&self) -> WorkflowState {
        *self.state.lock()
    }

    pub fn drive(&self) -> DriveStatus {
        self.drive.lock().clone()
    }

    /// Run `f` against the staging area.
    pub fn with_staging<R>(&self, f: impl FnOnce(&StagingRepository) -> R) -> R {
        f(&self.staging.lock())
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let state = self.state();
        let drive = self.drive();
        let staging = self.staging.lock();
        WorkflowSnapshot::new(state, drive, &staging, self.status.last())
    }

    /// Claim the workflow for `action`.
    ///
    /// A rejected request changes nothing besides posting a status.
    pub fn begin(&self, action: &Action) -> Result<ActionGuard, Busy> {
        let mut state = self.state.lock();
        match transition(*state, action) {
            Ok(next) => {
                tracing::info!(target: "workflow", ?action, state = ?next, "Starting action");
                *state = next;
                Ok(ActionGuard {
                    state: Arc::clone(&self.state),
                })
            }
            Err(busy) => {
                drop(state);
                tracing::warn!(target: "workflow", ?action, current = ?busy.0, "Rejected action while busy");
                self.status.error(&busy.to_string());
                Err(busy)
            }
        }
    }

    /// Run one action to completion on the calling task.
    pub async fn run_action(&self, request: ActionRequest) -> Result<(), Busy> {
        let _guard = self.begin(&request.action)?;
        self.execute(request).await;
        Ok(())
    }

    /// Scan for the drive, as done once at startup.
    pub async fn start(&self) {
        let _ = self.run_action(Action::Scan.into()).await;
    }

    /// Post a status update on behalf of a front end.
    pub fn post_status(&self, status: Status) {
        self.status.set_status(status);
    }

    /// Write the staging area to disk regardless of `persist_on_change`.
    pub fn save_staging(&self) -> Result<(), StagingError> {
        self.staging.lock().save(&self.options.staging_path)
    }

    async fn execute(&self, request: ActionRequest) {
        let ActionRequest {
            action,
            credentials,
        } = request;

        match action {
            Action::Scan => self.scan().await,
            Action::Configure => self.configure().await,
            Action::Rip => {
                self.rip().await;
            }
            Action::RipThenTransfer => match self.rip().await {
                Some(key) => self.push(&key, credentials).await,
                None => {
                    tracing::info!(target: "workflow", "Nothing ripped, skipping transfer");
                }
            },
            Action::Staging(staging) => self.manage_staging(staging, credentials).await,
        }
    }

    /// Run the ripping tool, feeding each output line to `on_line`.
    ///
    /// Returns the exit code, or `None` when the tool could not be started.
    async fn run_tool<F>(&self, args: &[String], mut on_line: F) -> Option<i32>
    where
        F: FnMut(OutputStream, &str) -> Option<Status> + Send,
    {
        if let Err(e) = tokio::fs::create_dir_all(&self.options.output_dir).await {
            tracing::error!(target: "workflow", dir = %self.options.output_dir.display(), error = %e, "Cannot create output directory");
            self.status.error(&format!(
                "Cannot create {}: {}",
                self.options.output_dir.display(),
                e
            ));
            return None;
        }

        let mut events = match self
            .runner
            .run(&self.options.command, args, Some(&self.options.output_dir))
            .await
        {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(target: "workflow", error = %e, "Ripping tool did not start");
                self.status.error(&e.to_string());
                return None;
            }
        };

        let mut exit = -1;
        while let Some(event) = events.recv().await {
            match event {
                ProcessEvent::Line(stream, line) => {
                    if let Some(status) = on_line(stream, &line) {
                        self.status.set_status(status);
                    }
                }
                ProcessEvent::Exit(code) => exit = code,
            }
        }
        Some(exit)
    }

    async fn scan(&self) {
        *self.drive.lock() = DriveStatus::default();
        self.status.info("Drive scanning in progress...");

        let mut scan = DriveScan::new();
        let Some(code) = self
            .run_tool(&drive::args(SCAN_ARGS), |stream, line| match stream {
                OutputStream::Stdout => scan.stdout_line(line),
                OutputStream::Stderr => scan.stderr_line(line),
            })
            .await
        else {
            return;
        };

        let (drive, status) = scan.finish(code);
        tracing::info!(target: "workflow", present = ?drive.present, configured = ?drive.configured, "Drive scan finished");
        *self.drive.lock() = drive;
        if let Some(status) = status {
            self.status.set_status(status);
        }
    }

    async fn configure(&self) {
        self.status.info("Drive configuration in progress...");

        if let Some(path) = &self.options.tool_config {
            if let Err(e) = drive::write_tool_config(path) {
                tracing::warn!(target: "workflow", path = %path.display(), error = %e, "Could not write ripping tool config");
            }
        }

        for phase in [ConfigurePhase::Analyze, ConfigurePhase::OffsetFind] {
            let mut step = ConfigureStep::new(phase);
            let code = self
                .run_tool(&phase.args(), |stream, line| match stream {
                    OutputStream::Stdout => step.stdout_line(line),
                    OutputStream::Stderr => step.stderr_line(line),
                })
                .await;

            let (ok, status) = match code {
                Some(code) => step.finish(code),
                None => (false, None),
            };
            if let Some(status) = status {
                self.status.set_status(status);
            }
            if !ok {
                tracing::info!(target: "workflow", ?phase, "Drive configuration failed");
                self.drive.lock().configured = Some(false);
                return;
            }
        }

        self.drive.lock().configured = Some(true);
        self.status.info("Drive configuration successful!");
    }

    /// Rip the inserted disc and stage it.
    ///
    /// Returns the staging key on success.
    async fn rip(&self) -> Option<String> {
        self.status.info("CD Ripping in preparation...");

        let mut session = RipSession::new();
        let code = self
            .run_tool(&drive::args(RIP_ARGS), |stream, line| match stream {
                OutputStream::Stdout => session.stdout_line(line),
                OutputStream::Stderr => session.stderr_line(line),
            })
            .await?;

        if code != 0 {
            tracing::warn!(target: "workflow", code, "Rip failed, partial output left in place");
            self.status
                .set_status(session.decorate(Status::error(format!("Ripping failed (exit code {})", code))));
            return None;
        }

        self.status
            .set_status(session.decorate(Status::info("Successfully ripped!")));

        let Some(entry) = session.finish() else {
            tracing::warn!(target: "workflow", "Rip finished without release metadata, nothing staged");
            self.status.error("No release information found, album not staged");
            return None;
        };

        let key = entry.key().to_string();
        tracing::info!(target: "workflow", key = %key, tracks = entry.tracks.len(), "Staging ripped album");
        self.staging.lock().insert(entry);
        self.persist();
        Some(key)
    }

    async fn push(&self, key: &str, credentials: ShareCredentials) {
        let entry = self.staging.lock().get(key).cloned();
        let Some(entry) = entry else {
            self.status
                .error(&StagingError::NotFound(key.to_string()).to_string());
            return;
        };

        self.status
            .info(&format!("Pushing \"{}\"...", entry.describe()));

        let destination = match credentials.or(&self.options.credentials).destination() {
            Ok(destination) => destination,
            Err(e) => {
                self.status.error(&e.to_string());
                return;
            }
        };

        let (artist, album) = entry.album_dir();
        let request = PushRequest {
            output_dir: &self.options.output_dir,
            artist,
            album,
        };
        let sink: Arc<dyn StatusSink> = self.status.clone();
        let result = self.transfer.push(request, &destination, sink).await;

        match result {
            Ok(()) => {
                self.status.info("Successfully pushed!");
                self.remove_staged(key);
            }
            Err(TransferError::SourceMissing(path)) => {
                tracing::warn!(target: "workflow", path = %path.display(), "Album missing from output directory, unstaging");
                self.status.error("Album not found!\nStaging Area updated");
                self.remove_staged(key);
            }
            Err(e) => {
                tracing::error!(target: "workflow", key = %key, error = %e, "Push failed, album stays staged");
                self.status.error(&e.to_string());
            }
        }
    }

    fn remove_staged(&self, key: &str) {
        let result = self.staging.lock().remove(key);
        if let Err(e) = result {
            tracing::error!(target: "workflow", key = %key, error = %e, "Failed to remove pushed album");
            self.status.error(&e.to_string());
        }
        self.persist();
    }

    async fn manage_staging(&self, action: StagingAction, credentials: ShareCredentials) {
        match action {
            StagingAction::Push { key } => self.push(&key, credentials).await,
            StagingAction::ConvertToMulti { key, new_title } => {
                let result = self
                    .staging
                    .lock()
                    .convert_to_multi(&key, &new_title)
                    .map(|entry| entry.title.clone());
                match result {
                    Ok(title) => self
                        .status
                        .info(&format!("Multi Disk album \"{}\" created", title)),
                    Err(e) => self.status.error(&e.to_string()),
                }
                self.persist();
            }
            StagingAction::AppendToMulti { key, target } => {
                let result = self
                    .staging
                    .lock()
                    .append_to_multi(&key, &target)
                    .map(|entry| entry.title.clone());
                match result {
                    Ok(title) => self
                        .status
                        .info(&format!("Multi Disk album \"{}\" extended", title)),
                    Err(e) => self.status.error(&e.to_string()),
                }
                self.persist();
            }
            StagingAction::Unstage { key } => {
                let removed = self.staging.lock().unstage(&key);
                match removed {
                    Some(entry) => self
                        .status
                        .info(&format!("\"{}\" unstaged", entry.describe())),
                    None => self
                        .status
                        .error(&StagingError::NotFound(key).to_string()),
                }
                self.persist();
            }
            StagingAction::Remove { key } => {
                let result = self.staging.lock().remove(&key);
                match result {
                    Ok(Some(entry)) => self
                        .status
                        .info(&format!("\"{}\" removed", entry.describe())),
                    Ok(None) => self.status.info(&format!("\"{}\" is not staged", key)),
                    Err(e) => self.status.error(&e.to_string()),
                }
                self.persist();
            }
        }
    }

    fn persist(&self) {
        if !self.options.persist_on_change {
            return;
        }
        if let Err(e) = self.save_staging() {
            tracing::error!(target: "workflow", path = %self.options.staging_path.display(), error = %e, "Failed to save staging area");
            self.status.error(&e.to_string());
        }
    }
}

/// Shared handle that runs actions on background tasks.
#[derive(Clone)]
pub struct WorkflowHandle {
    controller: Arc<WorkflowController>,
}

impl WorkflowHandle {
    pub fn new(controller: WorkflowController) -> Self {
        Self {
            controller: Arc::new(controller),
        }
    }

    pub fn controller(&self) -> &WorkflowController {
        &self.controller
    }

    /// Start `request` on a background task.
    ///
    /// The workflow is claimed before this returns, so a second request
    /// right after is rejected as busy.
    pub fn request(&self, request: ActionRequest) -> Result<JoinHandle<()>, Busy> {
        let guard = self.controller.begin(&request.action)?;
        let controller = Arc::clone(&self.controller);
        Ok(tokio::spawn(async move {
            let _guard = guard;
            controller.execute(request).await;
        }))
    }
}
