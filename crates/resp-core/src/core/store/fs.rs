use super::{BundleStore, Lookup, PutDecision, StoreError, bundle_file_name, resolve_put};
use crate::core::qm::bundle::{BUNDLE_SCHEMA, TaskBundle, TaskStatus};
use crate::core::qm::task::TaskKey;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Filesystem-backed bundle store: one JSON document per task, plus the
/// dispatch scripts, all in a single flat working directory.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::CreateDir {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Returns the store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bundle_path(&self, key: &TaskKey, label: &str) -> PathBuf {
        self.root.join(bundle_file_name(key, label))
    }

    /// Reads every well-formed bundle in the store, skipping files that are
    /// not bundles. Used by status reporting; damaged files are logged and
    /// ignored rather than failing the whole scan.
    pub fn bundles(&self) -> Result<Vec<TaskBundle>, StoreError> {
        let entries = fs::read_dir(&self.root).map_err(|source| StoreError::Read {
            path: self.root.display().to_string(),
            source,
        })?;
        let mut bundles = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Read {
                path: self.root.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(text) => match TaskBundle::from_json(&text) {
                    Ok(bundle) if bundle.schema == BUNDLE_SCHEMA => bundles.push(bundle),
                    Ok(_) | Err(_) => {
                        debug!(path = %path.display(), "skipping non-bundle json during scan");
                    }
                },
                Err(source) => {
                    return Err(StoreError::Read {
                        path: path.display().to_string(),
                        source,
                    });
                }
            }
        }
        Ok(bundles)
    }

    /// Removes every bundle and dispatch script, returning how many files
    /// were deleted.
    pub fn clear(&mut self) -> Result<usize, StoreError> {
        self.remove_matching(|_path, _text| true)
    }

    /// Removes only bundles recording an external failure, returning how many
    /// files were deleted.
    pub fn clear_failed(&mut self) -> Result<usize, StoreError> {
        self.remove_matching(|path, text| {
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                return false;
            }
            matches!(
                text.and_then(|t| TaskBundle::from_json(t).ok()),
                Some(bundle) if bundle.status == TaskStatus::Error
            )
        })
    }

    fn remove_matching(
        &mut self,
        mut should_remove: impl FnMut(&Path, Option<&str>) -> bool,
    ) -> Result<usize, StoreError> {
        let entries = fs::read_dir(&self.root).map_err(|source| StoreError::Read {
            path: self.root.display().to_string(),
            source,
        })?;
        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Read {
                path: self.root.display().to_string(),
                source,
            })?;
            let path = entry.path();
            let extension = path.extension().and_then(|e| e.to_str());
            if extension != Some("json") && extension != Some("sh") {
                continue;
            }
            let text = fs::read_to_string(&path).ok();
            if !should_remove(&path, text.as_deref()) {
                continue;
            }
            fs::remove_file(&path).map_err(|source| StoreError::Write {
                path: path.display().to_string(),
                source,
            })?;
            removed += 1;
        }
        Ok(removed)
    }
}

impl BundleStore for FsStore {
    fn lookup(&self, key: &TaskKey, label: &str) -> Result<Lookup, StoreError> {
        let path = self.bundle_path(key, label);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Lookup::Absent),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        let bundle = match TaskBundle::from_json(&text) {
            Ok(bundle) => bundle,
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "bundle does not parse, treating as not yet computed"
                );
                return Ok(Lookup::Corrupt);
            }
        };
        if bundle.schema != BUNDLE_SCHEMA {
            warn!(
                path = %path.display(),
                schema = %bundle.schema,
                "bundle has an unknown schema, treating as not yet computed"
            );
            return Ok(Lookup::Corrupt);
        }
        if &bundle.key != key {
            return Err(StoreError::Conflict {
                key: key.to_string(),
                locator: path.display().to_string(),
            });
        }
        Ok(Lookup::Found(bundle))
    }

    fn put(&mut self, bundle: &TaskBundle) -> Result<(), StoreError> {
        let path = self.bundle_path(&bundle.key, &bundle.label);
        let existing = self.lookup(&bundle.key, &bundle.label)?;
        match resolve_put(&existing, bundle) {
            PutDecision::Keep => {
                debug!(path = %path.display(), "existing bundle kept on put");
                Ok(())
            }
            PutDecision::Conflict => Err(StoreError::Conflict {
                key: bundle.key.to_string(),
                locator: path.display().to_string(),
            }),
            PutDecision::Write => {
                let text = bundle.to_json().map_err(|source| StoreError::Serialize {
                    label: bundle.label.clone(),
                    source,
                })?;
                fs::write(&path, text).map_err(|source| StoreError::Write {
                    path: path.display().to_string(),
                    source,
                })
            }
        }
    }

    fn locator(&self, key: &TaskKey, label: &str) -> String {
        self.bundle_path(key, label).display().to_string()
    }

    fn write_script(&mut self, name: &str, contents: &str) -> Result<String, StoreError> {
        let path = self.root.join(name);
        fs::write(&path, contents).map_err(|source| StoreError::Write {
            path: path.display().to_string(),
            source,
        })?;
        Ok(path.display().to_string())
    }
}
