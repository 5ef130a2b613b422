//! Driving the CD ripping tool and reading its output.
//!
//! - [`process`]: starting commands and streaming their output lines
//! - [`event`]: recognizing output lines as [`RipEvent`]s
//! - [`session`]: folding rip events into a [`RipSession`]
//! - [`drive`]: drive scan / configuration output and tool setup

pub mod drive;
pub mod event;
pub mod process;
pub mod session;

pub use drive::{ConfigurePhase, ConfigureStep, DriveProperties, DriveScan, DriveStatus};
pub use event::{RipEvent, Severity, StderrLine};
pub use process::{OutputStream, ProcessError, ProcessEvent, ProcessRunner, TokioRunner};
pub use session::RipSession;
