use anyhow::{Context, Result, bail};
use regex::Regex;
use std::path::PathBuf;
use std::process::Command;
use std::sync::LazyLock;
use tracing::debug;

use crate::core::hardware::{MountMap, MountResolver};

/// `lsblk -r` escapes whitespace and other unsafe bytes in mount points as `\xHH`.
static HEX_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\x([0-9a-fA-F]{2})").expect("static regex is valid")
});

/// Resolves filesystem UUIDs to mount points with `lsblk`.
pub struct LsblkResolver;

impl MountResolver for LsblkResolver {
    fn resolve(&self, volume_ids: &[String]) -> Result<MountMap> {
        let output = Command::new("lsblk")
            .args(["-o", "UUID,MOUNTPOINT", "-nr"])
            .output()
            .context("Failed to run lsblk")?;

        if !output.status.success() {
            bail!(
                "lsblk exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mounts = parse_lsblk(&stdout, volume_ids);
        debug!(mounted = mounts.values().filter(|m| m.is_some()).count(), "Resolved volumes");
        Ok(mounts)
    }
}

/// Parse `lsblk -o UUID,MOUNTPOINT -nr` output, keeping only `volume_ids`.
pub fn parse_lsblk(output: &str, volume_ids: &[String]) -> MountMap {
    let mut mounts = MountMap::new();

    for line in output.lines() {
        let mut parts = line.splitn(2, ' ');
        let (Some(uuid), Some(mount)) = (parts.next(), parts.next()) else {
            continue;
        };
        let (uuid, mount) = (uuid.trim(), mount.trim());
        if uuid.is_empty() || mount.is_empty() {
            continue;
        }
        if volume_ids.iter().any(|id| id == uuid) {
            mounts.insert(uuid.to_string(), Some(PathBuf::from(unescape(mount))));
        }
    }

    mounts
}

fn unescape(field: &str) -> String {
    let mut bytes = Vec::with_capacity(field.len());
    let mut last = 0;

    for caps in HEX_ESCAPE.captures_iter(field) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        bytes.extend_from_slice(field[last..whole.start()].as_bytes());
        match u8::from_str_radix(&caps[1], 16) {
            Ok(byte) => bytes.push(byte),
            Err(_) => bytes.extend_from_slice(whole.as_str().as_bytes()),
        }
        last = whole.end();
    }
    bytes.extend_from_slice(field[last..].as_bytes());

    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parses_mounted_volumes() {
        let output = "8453-95FD /media/lexar/blink\n\
                      1111-2222 \n\
                      \n\
                      ABCD-0000 /media/other\n";

        let mounts = parse_lsblk(output, &ids(&["8453-95FD", "1111-2222"]));

        assert_eq!(mounts.len(), 1);
        assert_eq!(
            mounts.get("8453-95FD"),
            Some(&Some(PathBuf::from("/media/lexar/blink")))
        );
        assert!(!mounts.contains_key("ABCD-0000"));
    }

    #[test]
    fn test_decodes_multibyte_escapes() {
        let output = "8453-95FD /media/user/caf\\xc3\\xa9\n";
        let mounts = parse_lsblk(output, &ids(&["8453-95FD"]));

        assert_eq!(
            mounts.get("8453-95FD"),
            Some(&Some(PathBuf::from("/media/user/café")))
        );
    }

    #[test]
    fn test_decodes_escaped_mount_points() {
        let output = "8453-95FD /media/user/SD\\x20CARD\n";
        let mounts = parse_lsblk(output, &ids(&["8453-95FD"]));

        assert_eq!(
            mounts.get("8453-95FD"),
            Some(&Some(PathBuf::from("/media/user/SD CARD")))
        );
    }
}
