//! Local/network path mapping from the host's network mounts

use earmark_table::PathResolver;
use std::path::Path;
use tracing::{debug, info};

const NETWORK_FS_TYPES: [&str; 5] = ["cifs", "smb3", "smbfs", "nfs", "nfs4"];

/// One network share and where it is mounted locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Local mount point, e.g. `/mnt/dat`
    pub local_root: String,
    /// Network root in `//host/share` form
    pub network_root: String,
}

impl Mount {
    pub fn new(local_root: impl Into<String>, network_root: impl Into<String>) -> Self {
        Self {
            local_root: trim_root(local_root.into()),
            network_root: trim_root(network_root.into()),
        }
    }
}

fn trim_root(root: String) -> String {
    let trimmed = root.trim_end_matches('/');
    if trimmed.is_empty() {
        root
    } else {
        trimmed.to_string()
    }
}

/// Prefix-mapping resolver; the longest matching root wins
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    pub fn new(mounts: Vec<Mount>) -> Self {
        Self { mounts }
    }

    /// Network mounts listed in `/proc/mounts` format
    ///
    /// Lines are `device mountpoint fstype ...`; only network filesystems
    /// whose device is a `//host/share` or `host:/export` are kept.
    pub fn from_proc_mounts(content: &str) -> Self {
        let mounts = content
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let device = fields.next()?;
                let mount_point = fields.next()?;
                let fs_type = fields.next()?;
                if !NETWORK_FS_TYPES.contains(&fs_type) {
                    return None;
                }
                let network_root = if device.starts_with("//") {
                    device.to_string()
                } else {
                    let (host, export) = device.split_once(':')?;
                    format!("//{}/{}", host, export.trim_start_matches('/'))
                };
                Some(Mount::new(unescape_octal(mount_point), network_root))
            })
            .collect();
        Self::new(mounts)
    }

    /// Read the host mount table; an unreadable table yields no mounts
    pub fn load() -> Self {
        let path = Path::new("/proc/mounts");
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let table = Self::from_proc_mounts(&content);
                info!("Network path mapping found {} mounts", table.mounts.len());
                table
            }
            Err(e) => {
                debug!("No mount table at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }
}

/// `/proc/mounts` escapes spaces and tabs as `\040`-style octal
fn unescape_octal(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let digits: String = chars.clone().take(3).collect();
            if digits.len() == 3 {
                if let Ok(code) = u8::from_str_radix(&digits, 8) {
                    out.push(code as char);
                    for _ in 0..3 {
                        chars.next();
                    }
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn swap_prefix(path: &str, from: &str, to: &str) -> Option<String> {
    let rest = path.strip_prefix(from)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(format!("{}{}", to, rest))
    } else {
        None
    }
}

impl PathResolver for MountTable {
    fn local_to_network(&self, path: &str) -> Option<String> {
        self.mounts
            .iter()
            .filter_map(|m| {
                let mapped = swap_prefix(path, &m.local_root, &m.network_root)?;
                Some((m.local_root.len(), mapped))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, mapped)| mapped)
    }

    fn network_to_local(&self, path: &str) -> Option<String> {
        self.mounts
            .iter()
            .filter_map(|m| {
                let mapped = swap_prefix(path, &m.network_root, &m.local_root)?;
                Some((m.network_root.len(), mapped))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, mapped)| mapped)
    }
}
