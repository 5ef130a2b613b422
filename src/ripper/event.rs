//! Recognizing the ripping tool's output lines.
//!
//! The tool mixes several unframed sub-grammars on its two output streams.
//! This module only recognizes lines; it turns each one into a [`RipEvent`]
//! and leaves accumulation to [`RipSession`](super::RipSession). Stdout
//! recognition depends on where the session is inside the release block and
//! the accuracy block, which the caller passes in as a [`StdoutContext`].

/// Marker of the disc identification result that precedes the release list.
pub const RELEASE_MARKER: &str = "disc id";
/// Header line of the matching releases list.
pub const RELEASE_HEADER: &str = "Matching releases:";
/// Marker the tool prints when the disc was ripped before.
pub const FINISHED_RIP_MARKER: &str = "is a finished rip";
/// Separator between a progress label and its value.
pub const PROGRESS_DELIMITER: &str = " ... ";
/// Marker of the accuracy summary.
pub const ACCURACY_MARKER: &str = "rip accurate";
/// Marker of a track start (or, without a track name, the end of ripping).
pub const TRACK_MARKER: &str = "ripping track ";
/// Marker of the cue sheet path report.
pub const CUE_MARKER: &str = "parsing .cue file";

/// Severity tag leading a stderr line (`SEVERITY:logger:message`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
    Other(String),
}

impl Severity {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "CRITICAL" => Severity::Critical,
            "ERROR" => Severity::Error,
            "WARNING" => Severity::Warning,
            "INFO" => Severity::Info,
            "DEBUG" => Severity::Debug,
            other => Severity::Other(other.to_string()),
        }
    }
}

/// A stderr line split into its severity tag, logger name and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StderrLine<'a> {
    pub severity: Severity,
    pub source: &'a str,
    pub message: &'a str,
}

impl<'a> StderrLine<'a> {
    /// Split on the first two colons. Lines without a colon are untagged.
    pub fn parse(line: &'a str) -> Option<Self> {
        let mut fields = line.splitn(3, ':');
        let tag = fields.next()?;
        let second = fields.next()?;
        let (source, message) = match fields.next() {
            Some(message) => (second, message),
            None => ("", second),
        };
        Some(Self {
            severity: Severity::from_tag(tag.trim()),
            source,
            message,
        })
    }
}

/// Where the session currently is inside the release metadata block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleasePhase {
    /// No disc identification seen yet
    #[default]
    Waiting,
    /// Identification seen, waiting for the releases header
    AwaitHeader,
    /// Skipping the releases list up to its blank line
    SkipList,
    /// Reading `key: value` lines of the first release
    Fields,
    /// Metadata complete; later blocks are ignored
    Done,
}

/// Parser context that stdout recognition depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StdoutContext {
    pub release: ReleasePhase,
    pub in_accuracy_block: bool,
}

/// One recognized piece of rip output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RipEvent {
    ReleaseMarker,
    ReleaseHeader,
    ReleaseField { key: String, value: String },
    Blank,
    AlreadyRipped,
    Progress(String),
    /// First line of the accuracy summary, with its confidence if it carries one
    AccuracyStart { confidence: Option<String> },
    Confidence(String),
    TrackStart(String),
    TrackEnd,
    CuePath { artist: String, album: String },
    Severity { severity: Severity, message: String },
    /// A line in a recognized block that does not have the expected shape
    Malformed(String),
    Text(String),
}

/// Recognize one stdout line of a rip.
pub fn classify_stdout(line: &str, ctx: StdoutContext) -> RipEvent {
    if line.contains(FINISHED_RIP_MARKER) {
        return RipEvent::AlreadyRipped;
    }

    match ctx.release {
        ReleasePhase::Waiting if line.contains(RELEASE_MARKER) => return RipEvent::ReleaseMarker,
        ReleasePhase::AwaitHeader => {
            return if line == RELEASE_HEADER {
                RipEvent::ReleaseHeader
            } else {
                RipEvent::Text(line.to_string())
            };
        }
        ReleasePhase::SkipList => {
            return if line.is_empty() {
                RipEvent::Blank
            } else {
                RipEvent::Text(line.to_string())
            };
        }
        ReleasePhase::Fields => {
            if line.is_empty() {
                return RipEvent::Blank;
            }
            return match line.split_once(": ") {
                Some((key, value)) => RipEvent::ReleaseField {
                    key: key.trim().to_string(),
                    value: value.trim().to_string(),
                },
                None => RipEvent::Malformed(line.to_string()),
            };
        }
        _ => {}
    }

    if line.is_empty() {
        return RipEvent::Blank;
    }

    if let Some((_, progress)) = line.split_once(PROGRESS_DELIMITER) {
        return RipEvent::Progress(progress.trim().to_string());
    }

    if ctx.in_accuracy_block {
        return match parenthesized(line) {
            Some(confidence) => RipEvent::Confidence(confidence.to_string()),
            None => RipEvent::Malformed(line.to_string()),
        };
    }

    if line.contains(ACCURACY_MARKER) {
        return RipEvent::AccuracyStart {
            confidence: parenthesized(line).map(str::to_string),
        };
    }

    RipEvent::Text(line.to_string())
}

/// Recognize one stderr line of a rip.
pub fn classify_stderr(line: &str) -> RipEvent {
    let Some(parsed) = StderrLine::parse(line) else {
        return RipEvent::Text(line.to_string());
    };

    if parsed.severity == Severity::Info {
        if let Some(pos) = parsed.message.find(TRACK_MARKER) {
            let after = &parsed.message[pos + TRACK_MARKER.len()..];
            return match after.split_once(':').map(|(_, name)| name.trim()) {
                Some(name) if !name.is_empty() => RipEvent::TrackStart(name.to_string()),
                _ => RipEvent::TrackEnd,
            };
        }
        if parsed.message.contains(CUE_MARKER) {
            return match parse_cue_path(parsed.message) {
                Some((artist, album)) => RipEvent::CuePath { artist, album },
                None => RipEvent::Malformed(line.to_string()),
            };
        }
    }

    RipEvent::Severity {
        severity: parsed.severity,
        message: parsed.message.trim().to_string(),
    }
}

/// Contents of the first parenthesized group.
fn parenthesized(line: &str) -> Option<&str> {
    let (_, rest) = line.split_once('(')?;
    let (inner, _) = rest.split_once(')')?;
    Some(inner)
}

/// Extract `artist/album` from the cue sheet report.
///
/// The path is quoted with whatever character follows the marker text.
fn parse_cue_path(message: &str) -> Option<(String, String)> {
    let pos = message.find(CUE_MARKER)?;
    let rest = message[pos + CUE_MARKER.len()..].trim_start();
    let delimiter = rest.chars().next()?;
    let quoted = &rest[delimiter.len_utf8()..];
    let end = quoted.find(delimiter)?;

    let mut parts = quoted[..end].split('/');
    let artist = parts.next().filter(|s| !s.is_empty())?;
    let album = parts.next().filter(|s| !s.is_empty())?;
    Some((artist.to_string(), album.to_string()))
}
