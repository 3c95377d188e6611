//! C4 TargetPathFactory: chooses the absolute on-disk path bytes are written to (§4.4-adjacent, §2).

use std::collections::HashMap;
use std::path::PathBuf;

/// Given an identifier and the client-supplied metadata, yields the absolute path the
/// upload's bytes will be written to. Pluggable so a host can shard across directories or
/// route to a different mount.
pub trait TargetPathFactory: Send + Sync {
    fn target_path(&self, id: &str, metadata: &HashMap<String, String>) -> String;
}

/// Default [`TargetPathFactory`]: one flat directory, `<root>/<id>.bin`, grounded on
/// `salvo-tus`'s `DiskStore::data_path`.
pub struct DirectoryTargetPathFactory {
    pub root: PathBuf,
}

impl DirectoryTargetPathFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TargetPathFactory for DirectoryTargetPathFactory {
    fn target_path(&self, id: &str, _metadata: &HashMap<String, String>) -> String {
        self.root.join(format!("{id}.bin")).to_string_lossy().into_owned()
    }
}
