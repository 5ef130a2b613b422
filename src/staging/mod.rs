//! Staging area for ripped albums.
//!
//! Ripped albums stay in the output directory until they are pushed to
//! their destination. This module tracks them:
//! - [`StagingEntry`] / [`Track`]: one staged album and its tracks
//! - [`StagingRepository`]: the title-keyed collection, including the
//!   multi-disc convert / append operations
//! - `store`: JSON persistence of the whole collection
//! - `relocate`: moving disc files into a multi-disc album directory

mod entry;
mod relocate;
mod repository;
mod store;

pub use entry::{AUDIO_EXTENSION, StagingEntry, Track};
pub use relocate::disc_prefixed;
pub use repository::{StagingError, StagingRepository};
