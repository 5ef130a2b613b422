//! Drive scan and drive configuration output.
//!
//! Scanning runs `drive list`; configuring runs `drive analyze` followed by
//! `offset find`. Both report their verdict through tagged stderr lines,
//! with the exit code deciding only when no tag was seen.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::event::{Severity, StderrLine};
use crate::status::Status;

/// Arguments for listing the drive.
pub const SCAN_ARGS: &[&str] = &["drive", "list"];
/// Arguments for the first configuration phase.
pub const ANALYZE_ARGS: &[&str] = &["drive", "analyze"];
/// Arguments for the second configuration phase.
pub const OFFSET_ARGS: &[&str] = &["offset", "find"];
/// Arguments for ripping the inserted disc.
pub const RIP_ARGS: &[&str] = &["--eject", "never", "cd", "rip"];

/// Track and disc naming the staging area relies on (`artist/album/...`).
const TOOL_CONFIG: &str = "[whipper.cd.rip]\n\
                           track_template = %%A/%%d/%%t - %%n\n\
                           disc_template  = %%A/%%d/%%A - %%d\n\n";

pub fn args(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// Drive description reported by a scan (`vendor`, `model`, `release`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriveProperties(pub BTreeMap<String, String>);

impl DriveProperties {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// `"vendor model release"`, skipping unknown parts.
    pub fn describe(&self) -> String {
        ["vendor", "model", "release"]
            .iter()
            .filter_map(|k| self.get(k))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Parse the drive line: `drive: /dev/sr0, vendor: X, model: Y, release: Z`.
pub fn parse_drive_line(line: &str) -> DriveProperties {
    let props = line
        .split(", ")
        .filter_map(|field| {
            let (key, value) = field.trim().split_once(": ")?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect();
    DriveProperties(props)
}

/// What is known about the drive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriveStatus {
    /// `None` until a scan gave a verdict
    pub present: Option<bool>,
    /// `None` until a scan or configuration gave a verdict
    pub configured: Option<bool>,
    pub properties: Option<DriveProperties>,
}

/// Interpretation of one `drive list` run.
#[derive(Debug, Default)]
pub struct DriveScan {
    properties: Option<DriveProperties>,
    verdict: Option<DriveStatus>,
}

impl DriveScan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout_line(&mut self, line: &str) -> Option<Status> {
        // Only the first line describes the drive
        if self.properties.is_none() && !line.trim().is_empty() {
            let props = parse_drive_line(line);
            tracing::debug!(target: "ripper::drive", ?props, "Drive properties");
            self.properties = Some(props);
        }
        None
    }

    pub fn stderr_line(&mut self, line: &str) -> Option<Status> {
        let parsed = StderrLine::parse(line)?;
        match parsed.severity {
            Severity::Critical => {
                self.verdict = Some(DriveStatus {
                    present: Some(false),
                    configured: Some(false),
                    properties: None,
                });
                Some(Status::error("No drive found!"))
            }
            Severity::Warning => {
                self.verdict = Some(DriveStatus {
                    present: Some(true),
                    configured: Some(false),
                    properties: None,
                });
                Some(Status::error("Please configure drive"))
            }
            _ => None,
        }
    }

    /// Final drive status and, when the exit code decides, the closing status.
    pub fn finish(self, code: i32) -> (DriveStatus, Option<Status>) {
        if let Some(mut verdict) = self.verdict {
            if verdict.present == Some(true) {
                verdict.properties = self.properties;
            }
            return (verdict, None);
        }

        if code == 0 {
            let props = self.properties.unwrap_or_default();
            let status = Status::info(format!("Drive found:\n{}", props.describe()));
            let drive = DriveStatus {
                present: Some(true),
                configured: Some(true),
                properties: Some(props),
            };
            (drive, Some(status))
        } else {
            (
                DriveStatus::default(),
                Some(Status::error(format!("Drive scan failed (exit code {})", code))),
            )
        }
    }
}

/// The two configuration phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurePhase {
    Analyze,
    OffsetFind,
}

impl ConfigurePhase {
    pub fn args(&self) -> Vec<String> {
        match self {
            ConfigurePhase::Analyze => args(ANALYZE_ARGS),
            ConfigurePhase::OffsetFind => args(OFFSET_ARGS),
        }
    }
}

/// Interpretation of one configuration phase run.
#[derive(Debug)]
pub struct ConfigureStep {
    phase: ConfigurePhase,
    failed: bool,
}

impl ConfigureStep {
    pub fn new(phase: ConfigurePhase) -> Self {
        Self {
            phase,
            failed: false,
        }
    }

    pub fn stdout_line(&mut self, line: &str) -> Option<Status> {
        let line = line.trim();
        (!self.failed && !line.is_empty()).then(|| Status::info(line))
    }

    pub fn stderr_line(&mut self, line: &str) -> Option<Status> {
        let parsed = StderrLine::parse(line)?;
        match (self.phase, parsed.severity) {
            (ConfigurePhase::Analyze, Severity::Critical) => {
                self.failed = true;
                Some(Status::error(
                    "Please insert a CD and restart drive configuration",
                ))
            }
            (ConfigurePhase::OffsetFind, Severity::Error) => {
                self.failed = true;
                Some(Status::error(
                    "Drive offset can't be determined, try another disc",
                ))
            }
            _ => None,
        }
    }

    /// Whether the phase succeeded; the status explains a failure not
    /// already reported through stderr.
    pub fn finish(self, code: i32) -> (bool, Option<Status>) {
        if self.failed {
            return (false, None);
        }
        if code == 0 {
            return (true, None);
        }
        let what = match self.phase {
            ConfigurePhase::Analyze => "Drive analysis",
            ConfigurePhase::OffsetFind => "Drive offset detection",
        };
        (
            false,
            Some(Status::error(format!("{} failed (exit code {})", what, code))),
        )
    }
}

/// Location of the ripping tool's own config file.
pub fn tool_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("whipper").join("whipper.conf"))
}

/// Write the ripping tool's config file unless it exists.
///
/// Returns whether a file was written.
pub fn write_tool_config(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, TOOL_CONFIG)?;
    tracing::info!(target: "ripper::drive", path = %path.display(), "Wrote ripping tool config");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_drive_line() {
        let props = parse_drive_line(
            "drive: /dev/sr0, vendor: HL-DT-ST, model: DVDRAM GH24NSD1, release: LG00",
        );
        assert_eq!(props.get("drive"), Some("/dev/sr0"));
        assert_eq!(props.get("vendor"), Some("HL-DT-ST"));
        assert_eq!(props.describe(), "HL-DT-ST DVDRAM GH24NSD1 LG00");
    }

    #[test]
    fn test_scan_success() {
        let mut scan = DriveScan::new();
        scan.stdout_line("drive: /dev/sr0, vendor: ASUS, model: DRW-24D5MT, release: 1.00");
        scan.stdout_line("second line is ignored: yes");
        let (drive, status) = scan.finish(0);

        assert_eq!(drive.present, Some(true));
        assert_eq!(drive.configured, Some(true));
        assert_eq!(drive.properties.unwrap().get("model"), Some("DRW-24D5MT"));
        assert_eq!(status.unwrap().message, "Drive found:\nASUS DRW-24D5MT 1.00");
    }

    #[test]
    fn test_scan_no_drive() {
        let mut scan = DriveScan::new();
        let status = scan
            .stderr_line("CRITICAL:whipper.command.main:No CD-DA drives found!")
            .unwrap();
        assert!(status.is_error);
        assert_eq!(status.message, "No drive found!");

        let (drive, status) = scan.finish(3);
        assert_eq!(drive.present, Some(false));
        assert_eq!(drive.configured, Some(false));
        assert!(status.is_none());
    }

    #[test]
    fn test_scan_unconfigured_drive() {
        let mut scan = DriveScan::new();
        scan.stdout_line("drive: /dev/sr0, vendor: ASUS, model: X, release: 1");
        scan.stderr_line("WARNING:whipper.command.drive:offset not configured");
        let (drive, _) = scan.finish(0);
        assert_eq!(drive.present, Some(true));
        assert_eq!(drive.configured, Some(false));
        assert!(drive.properties.is_some());
    }

    #[test]
    fn test_scan_failure_without_tag() {
        let (drive, status) = DriveScan::new().finish(1);
        assert_eq!(drive, DriveStatus::default());
        assert!(status.unwrap().is_error);
    }

    #[test]
    fn test_configure_phases() {
        let mut analyze = ConfigureStep::new(ConfigurePhase::Analyze);
        assert_eq!(
            analyze.stdout_line("  analyzing drive  ").unwrap().message,
            "analyzing drive"
        );
        assert!(analyze.stdout_line("   ").is_none());
        // ERROR does not fail the analyze phase
        assert!(analyze.stderr_line("ERROR:x:something").is_none());
        assert_eq!(analyze.finish(0), (true, None));

        let mut analyze = ConfigureStep::new(ConfigurePhase::Analyze);
        analyze.stderr_line("CRITICAL:x:no disc");
        assert!(analyze.stdout_line("more output").is_none());
        assert_eq!(analyze.finish(0), (false, None));

        let mut offset = ConfigureStep::new(ConfigurePhase::OffsetFind);
        let status = offset.stderr_line("ERROR:whipper.command.offset:no match").unwrap();
        assert_eq!(status.message, "Drive offset can't be determined, try another disc");
        assert_eq!(offset.finish(0).0, false);

        let (ok, status) = ConfigureStep::new(ConfigurePhase::OffsetFind).finish(2);
        assert!(!ok);
        assert!(status.unwrap().is_error);
    }

    #[test]
    fn test_write_tool_config_once() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("whipper").join("whipper.conf");

        assert!(write_tool_config(&path).unwrap());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("track_template = %%A/%%d/%%t - %%n"));

        std::fs::write(&path, "custom").unwrap();
        assert!(!write_tool_config(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "custom");
    }
}
