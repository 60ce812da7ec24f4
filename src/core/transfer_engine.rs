use std::io;
use std::path::Path;
use std::sync::Arc;

mod native_copy;

pub use native_copy::{BUFFER_SIZE, NativeCopyEngine, is_device_removed_error};

/// Copies a single file's bytes and metadata. Overwrites the destination if present.
///
/// Implementations are called from blocking worker threads.
pub trait CopyEngine: Send + Sync {
    fn copy_file(&self, source: &Path, destination: &Path) -> io::Result<u64>;
}

pub fn create_engine() -> Arc<dyn CopyEngine> {
    Arc::new(NativeCopyEngine::default())
}
