use super::{BundleStore, Lookup, PutDecision, StoreError, bundle_file_name, resolve_put};
use crate::core::qm::bundle::TaskBundle;
use crate::core::qm::task::TaskKey;
use std::collections::HashMap;

/// In-memory bundle store used by tests and embedding callers that do not
/// want a working directory. Follows the same overwrite table as [`super::fs::FsStore`].
#[derive(Debug, Default)]
pub struct MemStore {
    bundles: HashMap<TaskKey, TaskBundle>,
    scripts: HashMap<String, String>,
    writes: usize,
}

impl MemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bundles currently held.
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Returns `true` when the store holds no bundles.
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Returns how many puts actually replaced content. Cache-behavior tests
    /// use this to prove that finished work is never redone.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Returns the dispatch scripts written so far, keyed by name.
    pub fn scripts(&self) -> &HashMap<String, String> {
        &self.scripts
    }
}

impl BundleStore for MemStore {
    fn lookup(&self, key: &TaskKey, _label: &str) -> Result<Lookup, StoreError> {
        Ok(match self.bundles.get(key) {
            Some(bundle) => Lookup::Found(bundle.clone()),
            None => Lookup::Absent,
        })
    }

    fn put(&mut self, bundle: &TaskBundle) -> Result<(), StoreError> {
        let existing = self.lookup(&bundle.key, &bundle.label)?;
        match resolve_put(&existing, bundle) {
            PutDecision::Keep => Ok(()),
            PutDecision::Conflict => Err(StoreError::Conflict {
                key: bundle.key.to_string(),
                locator: self.locator(&bundle.key, &bundle.label),
            }),
            PutDecision::Write => {
                self.bundles.insert(bundle.key.clone(), bundle.clone());
                self.writes += 1;
                Ok(())
            }
        }
    }

    fn locator(&self, key: &TaskKey, label: &str) -> String {
        format!("mem://{}", bundle_file_name(key, label))
    }

    fn write_script(&mut self, name: &str, contents: &str) -> Result<String, StoreError> {
        self.scripts.insert(name.to_string(), contents.to_string());
        Ok(format!("mem://{name}"))
    }
}
