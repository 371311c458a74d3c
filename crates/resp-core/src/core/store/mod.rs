//! # Bundle Storage Module
//!
//! Content-addressed persistence for task bundles.
//!
//! ## Overview
//!
//! A store maps a [`TaskKey`] to at most one bundle document. The filesystem
//! backend ([`fs::FsStore`]) is the production store: one JSON file per task in
//! a flat working directory, named `{label}_{structure16}_{options16}.json` so
//! files sort by molecule and stay human-recognizable. The in-memory backend
//! ([`memory::MemStore`]) backs tests.
//!
//! ## Robustness Rules
//!
//! Lookups never take a file at face value. A missing, unparsable, or
//! wrong-schema file reads as "not yet computed"; only a parsable bundle whose
//! embedded key matches the request counts as found. Writes follow a fixed
//! overwrite table (see [`resolve_put`]): completed results are immutable,
//! conflicting completions are an error, and failure records survive until
//! they are either replaced by a real result or cleaned explicitly.

pub mod fs;
pub mod memory;

use super::qm::bundle::{TaskBundle, TaskStatus};
use super::qm::task::TaskKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create store directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read bundle at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize bundle {label}: {source}")]
    Serialize {
        label: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("store already holds a different result for key {key} at {locator}")]
    Conflict { key: String, locator: String },
}

/// Result of a store lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// No record exists for the key.
    Absent,
    /// A record exists but is unreadable or does not parse as a bundle.
    /// Treated exactly like [`Lookup::Absent`] by the pipeline, except that a
    /// subsequent put replaces the file.
    Corrupt,
    /// A well-formed bundle with the requested key.
    Found(TaskBundle),
}

/// Abstract bundle storage keyed by task content.
pub trait BundleStore {
    /// Retrieves the bundle for a key, tolerating damaged records.
    fn lookup(&self, key: &TaskKey, label: &str) -> Result<Lookup, StoreError>;

    /// Writes a bundle, honoring the overwrite rules of [`resolve_put`].
    fn put(&mut self, bundle: &TaskBundle) -> Result<(), StoreError>;

    /// Returns the locator external programs use to address the bundle
    /// (a filesystem path for the production store).
    fn locator(&self, key: &TaskKey, label: &str) -> String;

    /// Writes a dispatch script next to the bundles and returns its locator.
    fn write_script(&mut self, name: &str, contents: &str) -> Result<String, StoreError>;
}

/// What a put should do given the record already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PutDecision {
    Write,
    Keep,
    Conflict,
}

/// The overwrite table shared by every store backend.
///
/// - Nothing (or damage) on disk: write.
/// - Existing `Complete`: immutable. An equal completion is a no-op, a
///   different completion is a conflict, and pending or error writes are
///   ignored.
/// - Existing `Error`: a pending write is ignored so failures stay visible
///   across re-runs; a new completion or a new error replaces it.
/// - Existing `Pending`: always replaced.
pub(crate) fn resolve_put(existing: &Lookup, incoming: &TaskBundle) -> PutDecision {
    let current = match existing {
        Lookup::Absent | Lookup::Corrupt => return PutDecision::Write,
        Lookup::Found(bundle) => bundle,
    };
    match (current.status, incoming.status) {
        (TaskStatus::Complete, TaskStatus::Complete) => {
            if current.output == incoming.output {
                PutDecision::Keep
            } else {
                PutDecision::Conflict
            }
        }
        (TaskStatus::Complete, _) => PutDecision::Keep,
        (TaskStatus::Error, TaskStatus::Pending) => PutDecision::Keep,
        (TaskStatus::Error, _) => PutDecision::Write,
        (TaskStatus::Pending, _) => PutDecision::Write,
    }
}

/// The filename every backend derives from a task identity.
pub(crate) fn bundle_file_name(key: &TaskKey, label: &str) -> String {
    format!(
        "{}_{}_{}.json",
        label,
        key.structure.short(),
        key.options.short()
    )
}
