//! Turns one top-level source directory into an ordered list of copy jobs.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::core::models::CopyJob;

/// Destination root for one source directory: `<root>/<basename>_<date>`.
pub fn mirror_root(source_dir: &Path, destination_root: &Path, run_date: &str) -> PathBuf {
    let base = source_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination_root.join(format!("{}_{}", base, run_date))
}

/// Walk `source_dir` and emit one job per regular file.
///
/// Entries are visited in file-name order. Each destination directory is
/// created before any file inside it is queued, unless `dry_run` is set.
/// Symlinks, special files and unreadable entries never become jobs.
pub fn build_jobs(
    source_dir: &Path,
    destination_root: &Path,
    run_date: &str,
    dry_run: bool,
) -> Vec<CopyJob> {
    let dest_dir = mirror_root(source_dir, destination_root, run_date);
    let mut jobs = Vec::new();
    walk(source_dir, &dest_dir, dry_run, &mut jobs);
    jobs
}

fn walk(current: &Path, dest_dir: &Path, dry_run: bool, jobs: &mut Vec<CopyJob>) {
    if !dry_run {
        if let Err(e) = fs::create_dir_all(dest_dir) {
            warn!(
                path = %dest_dir.display(),
                error = %e,
                "Failed to create destination directory"
            );
        }
    }

    let entries = match fs::read_dir(current) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %current.display(), error = %e, "Skipping unreadable directory");
            return;
        }
    };

    let mut entries: Vec<fs::DirEntry> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(path = %current.display(), error = %e, "Skipping unreadable entry");
                None
            }
        })
        .collect();
    entries.sort_by_key(|entry| entry.file_name());

    let mut subdirs = Vec::new();
    for entry in entries {
        let path = entry.path();

        // symlink_metadata so links are never followed
        let metadata = match path.symlink_metadata() {
            Ok(m) => m,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if metadata.is_dir() {
            subdirs.push(path);
        } else if metadata.is_file() {
            jobs.push(CopyJob {
                destination: dest_dir.join(entry.file_name()),
                source: path,
                dry_run,
            });
        } else {
            debug!(path = %path.display(), "Skipping special file");
        }
    }

    for subdir in subdirs {
        if let Some(name) = subdir.file_name() {
            let child_dest = dest_dir.join(name);
            walk(&subdir, &child_dest, dry_run, jobs);
        }
    }
}

/// Immediate subdirectories of a mount point, sorted by name. Symlinks are excluded.
pub fn top_level_directories(mount_path: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(mount_path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}
