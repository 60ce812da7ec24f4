use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::hardware::MountResolver;

mod linux;
mod simulated;

pub use linux::{LsblkResolver, parse_lsblk};
pub use simulated::StaticResolver;

pub fn get_resolver(simulation: bool, mounts: &BTreeMap<String, PathBuf>) -> Arc<dyn MountResolver> {
    if simulation {
        return Arc::new(StaticResolver::new(mounts.clone()));
    }

    Arc::new(LsblkResolver)
}
