use std::fmt;

/// A normalized, canonical GitHub repository URL.
///
/// Equality is byte-equality on the normalized form; there is no other
/// notion of "same repository" at this layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct RepoUrl(String);

impl RepoUrl {
    /// Normalize a user-supplied repository URL per the public contract:
    /// trim a trailing slash, strip a `http(s)://` scheme, require a
    /// `github.com/` prefix, collapse `.`/`..` path segments, and
    /// re-prefix with `https://`.
    ///
    /// Only GitHub is supported; anything else returns `None`.
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim_end_matches('/');
        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);

        if !without_scheme.starts_with("github.com/") {
            return None;
        }

        let cleaned = clean_path(without_scheme);
        Some(Self(format!("https://{cleaned}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `org/repo` path component, stripped of the `github.com/` prefix.
    pub fn path(&self) -> &str {
        self.0
            .strip_prefix("https://github.com/")
            .unwrap_or(self.0.as_str())
    }

    /// Filesystem-safe segments of `path()`, used to derive the mirror's
    /// on-disk location. A depth other than 2 (`org/repo`) is invalid.
    pub fn path_segments(&self) -> Vec<&str> {
        self.path().split('/').filter(|s| !s.is_empty()).collect()
    }
}

impl fmt::Display for RepoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collapse `.` and `..` path segments the way `path.Clean` does in the
/// reference implementation, without touching percent-encoding or query
/// strings (none are expected on a GitHub repo path).
fn clean_path(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let url = RepoUrl::normalize("https://github.com/a/b/").unwrap();
        assert_eq!(url.as_str(), "https://github.com/a/b");
    }

    #[test]
    fn upgrades_http_to_https() {
        let url = RepoUrl::normalize("http://github.com/a/b").unwrap();
        assert_eq!(url.as_str(), "https://github.com/a/b");
    }

    #[test]
    fn rejects_non_github_hosts() {
        assert!(RepoUrl::normalize("https://gitlab.com/a/b").is_none());
    }

    #[test]
    fn collapses_dot_segments() {
        let url = RepoUrl::normalize("https://github.com/a/../a/./b").unwrap();
        assert_eq!(url.as_str(), "https://github.com/a/b");
    }

    #[test]
    fn is_idempotent() {
        let first = RepoUrl::normalize("https://github.com/a/b/").unwrap();
        let second = RepoUrl::normalize(first.as_str()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn path_segments_detect_invalid_depth() {
        let url = RepoUrl::normalize("https://github.com/a/b/c").unwrap();
        assert_eq!(url.path_segments(), vec!["a", "b", "c"]);
    }
}
