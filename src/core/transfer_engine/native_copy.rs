use crate::core::transfer_engine::CopyEngine;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use tracing::debug;

/// Buffer size for file I/O operations (128KB for optimal throughput)
pub const BUFFER_SIZE: usize = 128 * 1024;

/// Native single-file copy.
///
/// - Large buffered I/O
/// - Metadata preservation (permissions, timestamps)
/// - Per-file fsync for durability
pub struct NativeCopyEngine {
    /// Whether to fsync each file after writing (safer but slower)
    pub sync_files: bool,
}

impl Default for NativeCopyEngine {
    fn default() -> Self {
        Self { sync_files: true }
    }
}

impl CopyEngine for NativeCopyEngine {
    fn copy_file(&self, source: &Path, destination: &Path) -> io::Result<u64> {
        copy_single_file(source, destination, self.sync_files)
    }
}

/// Copy a single file with metadata preservation
fn copy_single_file(source: &Path, dest: &Path, sync_file: bool) -> io::Result<u64> {
    let source_metadata = fs::metadata(source)?;

    let source_file = File::open(source)?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, source_file);

    // File::create truncates an existing destination
    let dest_file = File::create(dest)?;
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, dest_file);

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut bytes_written: u64 = 0;

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }

        writer.write_all(&buffer[..bytes_read])?;
        bytes_written += bytes_read as u64;
    }

    writer.flush()?;

    if sync_file {
        let inner = writer.into_inner().map_err(|e| e.into_error())?;
        inner.sync_all()?;
    }

    if let Err(e) = fs::set_permissions(dest, source_metadata.permissions()) {
        // Permission errors are common on vfat/exfat targets
        debug!(
            dest = %dest.display(),
            error = %e,
            "Failed to set file permissions"
        );
    }

    if let Err(e) = preserve_timestamps(&source_metadata, dest) {
        debug!(
            dest = %dest.display(),
            error = %e,
            "Failed to preserve file timestamps"
        );
    }

    Ok(bytes_written)
}

/// Preserve access and modification timestamps from source to destination
fn preserve_timestamps(source_metadata: &fs::Metadata, dest: &Path) -> io::Result<()> {
    let atime = filetime::FileTime::from_last_access_time(source_metadata);
    let mtime = filetime::FileTime::from_last_modification_time(source_metadata);

    filetime::set_file_times(dest, atime, mtime)
}

/// Check if an I/O error indicates the device has been removed
pub fn is_device_removed_error(error: &io::Error) -> bool {
    match error.kind() {
        ErrorKind::NotFound => true,
        ErrorKind::PermissionDenied => false,
        ErrorKind::BrokenPipe => true,
        ErrorKind::NotConnected => true,
        _ => {
            if let Some(os_error) = error.raw_os_error() {
                matches!(
                    os_error,
                    libc::EIO
                        | libc::ENODEV
                        | libc::ENXIO
                        | libc::ENOMEDIUM
                        | libc::EMEDIUMTYPE
                )
            } else {
                false
            }
        }
    }
}
