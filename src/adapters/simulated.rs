use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::hardware::{MountMap, MountResolver};

/// Resolver backed by a fixed volume-id -> path table.
///
/// Used in simulation mode (the table comes from the `mounts` config section)
/// and in tests, where fixture directories stand in for removable media.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    mounts: BTreeMap<String, PathBuf>,
}

impl StaticResolver {
    pub fn new(mounts: BTreeMap<String, PathBuf>) -> Self {
        Self { mounts }
    }

    pub fn with_mount(mut self, volume_id: &str, path: impl Into<PathBuf>) -> Self {
        self.mounts.insert(volume_id.to_string(), path.into());
        self
    }
}

impl MountResolver for StaticResolver {
    fn resolve(&self, volume_ids: &[String]) -> anyhow::Result<MountMap> {
        Ok(volume_ids
            .iter()
            .filter_map(|id| {
                self.mounts
                    .get(id)
                    .map(|path| (id.clone(), Some(path.clone())))
            })
            .collect())
    }
}
