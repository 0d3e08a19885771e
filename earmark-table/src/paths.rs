//! Path helpers shared by the parsers and the normalizer
//!
//! Paths are handled as `/`-separated strings: database files name network
//! locations such as `//dat/corpora/x.wav` that are not valid local paths.

/// Maps between the local and network path namespaces
///
/// Either direction may be unmappable. Callers fall back to the path they
/// started with and log; an unmappable path is never an error.
pub trait PathResolver: Send + Sync {
    fn local_to_network(&self, path: &str) -> Option<String>;
    fn network_to_local(&self, path: &str) -> Option<String>;
}

/// Resolver for hosts where both namespaces coincide
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl PathResolver for IdentityResolver {
    fn local_to_network(&self, path: &str) -> Option<String> {
        Some(path.to_string())
    }

    fn network_to_local(&self, path: &str) -> Option<String> {
        Some(path.to_string())
    }
}

/// True unless `path` is empty, starts with a drive letter (`C:`), or starts
/// with a separator
pub fn is_relative(path: &str) -> bool {
    let bytes = path.as_bytes();
    match bytes {
        [] => false,
        [b'/' | b'\\', ..] => false,
        [letter, b':', ..] if letter.is_ascii_alphabetic() => false,
        _ => true,
    }
}

/// Last `/`-separated segment of `path`
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// Resolve a relative `path` against `parent`; absolute paths are returned
/// untouched
pub fn resolve_relative(path: &str, parent: &str) -> String {
    if !is_relative(path) {
        return path.to_string();
    }
    let mut rest = path;
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    if parent.is_empty() {
        rest.to_string()
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), rest)
    }
}

/// Rewrites absolute paths into the canonical `//host/share` network form
#[derive(Debug, Clone)]
pub struct PathNormalizer {
    mount_alias: String,
    home_prefix: String,
}

impl PathNormalizer {
    /// `mount_alias` is the local mount point of the network root (`/smb/`);
    /// paths under `home_prefix` are treated as local and left alone. An
    /// empty `home_prefix` exempts nothing.
    pub fn new(mount_alias: impl Into<String>, home_prefix: impl Into<String>) -> Self {
        Self {
            mount_alias: mount_alias.into(),
            home_prefix: home_prefix.into(),
        }
    }

    pub fn normalize(&self, path: &str) -> String {
        if !self.mount_alias.is_empty() {
            if let Some(rest) = path.strip_prefix(self.mount_alias.as_str()) {
                return format!("//{}", rest);
            }
        }
        if !self.home_prefix.is_empty() && path.starts_with(self.home_prefix.as_str()) {
            return path.to_string();
        }
        let after_slash = path.strip_prefix('/').unwrap_or(path);
        if after_slash.starts_with(|c: char| c.is_ascii_alphabetic()) {
            format!("//{}", after_slash)
        } else {
            path.to_string()
        }
    }
}

impl Default for PathNormalizer {
    fn default() -> Self {
        Self::new("/smb/", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_forms() {
        for path in [
            "//dat/corpora/x.wav",
            "C:\\Users\\me\\x.wav",
            "C:/Users/me/x.wav",
            "c:x.wav",
            "/dat/corpora/x.wav",
            "\\\\dat\\corpora\\x.wav",
            "/smb/dat/x.wav",
            "",
        ] {
            assert!(!is_relative(path), "{path} should not be relative");
        }
    }

    #[test]
    fn test_relative_forms() {
        for path in ["./speaker/test.wav", "speaker\\test.wav", "speaker/test.wav", "test.wav"] {
            assert!(is_relative(path), "{path} should be relative");
        }
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("//dat/corpora/a.wav"), "a.wav");
        assert_eq!(file_name("a.wav"), "a.wav");
        assert_eq!(file_name("dir/"), "");
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(resolve_relative("./spk/a.wav", "//dat/db"), "//dat/db/spk/a.wav");
        assert_eq!(resolve_relative("a.wav", "/data/"), "/data/a.wav");
        assert_eq!(resolve_relative("/abs/a.wav", "/data"), "/abs/a.wav");
    }

    #[test]
    fn test_normalize() {
        let normalizer = PathNormalizer::new("/smb/", "/home/me");
        assert_eq!(normalizer.normalize("/dat/corpora"), "//dat/corpora");
        assert_eq!(normalizer.normalize("/smb/dat/corpora"), "//dat/corpora");
        assert_eq!(normalizer.normalize("//dat/corpora"), "//dat/corpora");
        assert_eq!(normalizer.normalize("/home/me/a.wav"), "/home/me/a.wav");
        assert_eq!(normalizer.normalize("dat/corpora"), "//dat/corpora");
        assert_eq!(normalizer.normalize("./a.wav"), "./a.wav");
    }

    #[test]
    fn test_empty_home_rewrites_everything_absolute() {
        let normalizer = PathNormalizer::new("/smb/", "");
        assert_eq!(normalizer.normalize("/home/me/a.wav"), "//home/me/a.wav");
    }
}
