//! # rollbook-store
//!
//! Record store layer for scored entries.
//!
//! This crate provides:
//! - `Record` (id, name, score) with its line encoding and validation
//! - flat-file read/write with temp-file + rename persistence
//! - `Store` (authoritative in-memory map) with a background load worker
//!
//! Terminal I/O and menu dispatch live in `rollbook-cli`.
//!
//! ## Data model
//!
//! ```text
//! flat file (on disk, one `id,name,score` line per record)
//!     ↕  load (background worker, bounded wait) / save (temp + rename)
//! Store (lock-protected map keyed by id)
//! ```

pub mod flatfile;
pub mod loader;
pub mod record;
pub mod store;

pub use flatfile::{FlatFileError, ParsedLine, RecordLines, SaveMode};
pub use loader::LoadHandle;
pub use record::{
    MAX_SCORE, MIN_SCORE, Record, RecordId, RecordParseError, ValidationError, sort_by_score_desc,
};
pub use store::{
    DEFAULT_LOAD_WAIT, LoadOutcome, LoadReport, SaveReport, Store, StoreConfig, StoreError,
};
