use std::collections::HashMap;
use std::path::PathBuf;

use crate::core::models::Volume;

/// Mount table as reported by a resolver: volume id -> mount path.
/// A missing key or `None` means the volume is not mounted.
pub type MountMap = HashMap<String, Option<PathBuf>>;

pub trait MountResolver: Send + Sync {
    /// Look up the current mount point of each requested volume.
    fn resolve(&self, volume_ids: &[String]) -> anyhow::Result<MountMap>;
}

/// Pair every configured volume id with its mount path, keeping configured order.
///
/// Reported paths that do not exist on disk are treated as unmounted.
pub fn resolve_volumes(
    resolver: &dyn MountResolver,
    volume_ids: &[String],
) -> anyhow::Result<Vec<Volume>> {
    let mut mounts = resolver.resolve(volume_ids)?;

    Ok(volume_ids
        .iter()
        .map(|id| Volume {
            id: id.clone(),
            mount_path: mounts
                .remove(id)
                .flatten()
                .filter(|path| path.exists()),
        })
        .collect())
}
