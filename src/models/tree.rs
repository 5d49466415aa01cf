use serde::{Deserialize, Serialize};

/// One row of a `git ls-tree -r -t` listing.
///
/// `file` is repository-rooted (no leading slash). The sentinel entry
/// `{ file: "/", dir: true }` is not produced by git; it is written by
/// [`crate::repo_cache`] once a tree sync fully materializes, so that an
/// empty directory can be distinguished from "not yet synced".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DirectoryEntry {
    pub file: String,
    pub dir: bool,
}

impl DirectoryEntry {
    pub const ROOT_SENTINEL: &'static str = "/";

    pub fn root_sentinel() -> Self {
        Self { file: Self::ROOT_SENTINEL.to_string(), dir: true }
    }

    pub fn is_root_sentinel(&self) -> bool {
        self.file == Self::ROOT_SENTINEL && self.dir
    }
}

/// Mirrors Go's `path.Dir`: the immediate parent directory of a
/// repository-rooted path, used to tag every synced [`DirectoryEntry`]
/// with its `parentDir` (spec §6's `files` collection) so a listing for
/// one directory can be read back without re-walking the whole tree.
///
/// A top-level entry (no `/`) has parent `"."`. A query path of `""` or
/// `"/"` is normalized to `"."` to match that same root parent.
pub fn parent_dir_of(file: &str) -> String {
    match file.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => file[..idx].to_string(),
        None => ".".to_string(),
    }
}

pub fn normalize_query_path(path: &str) -> String {
    if path.is_empty() || path == "/" {
        ".".to_string()
    } else {
        path.trim_end_matches('/').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dir_of_top_level_file_is_dot() {
        assert_eq!(parent_dir_of("README.md"), ".");
    }

    #[test]
    fn parent_dir_of_nested_file_strips_last_segment() {
        assert_eq!(parent_dir_of("api/router/router.go"), "api/router");
        assert_eq!(parent_dir_of("api/authentication"), "api");
    }

    #[test]
    fn query_path_normalization_treats_root_forms_as_dot() {
        assert_eq!(normalize_query_path(""), ".");
        assert_eq!(normalize_query_path("/"), ".");
        assert_eq!(normalize_query_path("api/"), "api");
    }
}
