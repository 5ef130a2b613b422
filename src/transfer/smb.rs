//! Copying an album to an SMB share with the `smbclient` command.

use super::{Destination, PushRequest, TransferError};
use crate::ripper::{OutputStream, ProcessEvent, ProcessRunner};
use crate::status::StatusSink;

/// Arguments for one `smbclient` session that uploads the album.
///
/// `-E` sends messages to stderr so stdout only carries transfer progress.
pub fn smb_args(request: &PushRequest<'_>, destination: &Destination) -> Option<Vec<String>> {
    let Destination::Smb {
        share,
        path,
        user,
        password,
    } = destination
    else {
        return None;
    };

    let mut command = format!("lcd \"{}\";", request.output_dir.display());
    if let Some(path) = path {
        command.push_str(&format!("cd \"{}\";", path));
    }
    let (artist, album) = (request.artist, request.album);
    command.push_str(&format!(
        "lcd \"{artist}/{album}\";mkdir \"{artist}\";cd \"{artist}\";mkdir \"{album}\";cd \"{album}\";"
    ));
    command.push_str("prompt;recurse;mput *.flac;mput *.log");

    let credentials = match password {
        Some(password) => format!("{}%{}", user, password),
        None => user.clone(),
    };

    Some(vec![
        "-E".to_string(),
        "-U".to_string(),
        credentials,
        share.clone(),
        "-c".to_string(),
        command,
    ])
}

pub(super) async fn push_smb(
    runner: &dyn ProcessRunner,
    smb_command: &str,
    request: PushRequest<'_>,
    destination: &Destination,
    status: &dyn StatusSink,
) -> Result<(), TransferError> {
    let args = smb_args(&request, destination).ok_or(TransferError::NotConfigured)?;
    if let Destination::Smb { share, .. } = destination {
        tracing::info!(target: "transfer", %share, album = %request.relative_path().display(), "Pushing to SMB share");
    }

    let mut events = runner.run(smb_command, &args, None).await?;
    let mut exit = -1;
    while let Some(event) = events.recv().await {
        match event {
            ProcessEvent::Line(OutputStream::Stdout, line) => {
                let line = line.trim();
                if !line.is_empty() {
                    status.info(line);
                }
            }
            ProcessEvent::Line(OutputStream::Stderr, line) => {
                let line = line.trim();
                if !line.is_empty() {
                    status.error(line);
                }
            }
            ProcessEvent::Exit(code) => exit = code,
        }
    }

    if exit == 0 {
        Ok(())
    } else {
        Err(TransferError::Remote(exit))
    }
}
