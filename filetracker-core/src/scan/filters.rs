//! Path filtering shared by the reconciler and the live watcher.
//!
//! Exclusions are folder names, not globs: an entry such as `node_modules`
//! or `build/out` matches when it appears as a contiguous run of directory
//! components anywhere below the collection root. Matching is
//! case-sensitive. Extensions compare case-insensitively against the
//! normalised allow-list.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use filetracker_model::Collection;

#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    include_extensions: Option<HashSet<String>>,
    exclude_folders: Vec<Vec<String>>,
}

impl PathFilter {
    pub fn new(
        root: impl Into<PathBuf>,
        include_extensions: Option<&[String]>,
        exclude_folders: &[String],
    ) -> Self {
        let include_extensions = include_extensions
            .filter(|exts| !exts.is_empty())
            .map(|exts| {
                exts.iter()
                    .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                    .collect()
            });

        let mut patterns: Vec<Vec<String>> = Vec::new();
        for entry in exclude_folders {
            let pattern: Vec<String> = entry
                .split(['/', '\\'])
                .filter(|seg| !seg.is_empty() && *seg != ".")
                .map(str::to_string)
                .collect();
            if !pattern.is_empty() && !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        }

        Self {
            root: root.into(),
            include_extensions,
            exclude_folders: patterns,
        }
    }

    /// Filter for a collection, with extra watcher-only exclusions merged in.
    pub fn for_collection(collection: &Collection, extra_excludes: &[String]) -> Self {
        let mut excludes = collection.exclude_folders.clone().unwrap_or_default();
        excludes.extend(extra_excludes.iter().cloned());
        Self::new(
            collection.source_folder.clone(),
            collection.include_extensions.as_deref(),
            &excludes,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `path` relative to the root, or `None` when it lies outside it.
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root).ok()
    }

    /// Whether a directory (given relative to the root) is excluded, either
    /// itself or through one of its ancestors.
    pub fn is_excluded_dir(&self, rel_dir: &Path) -> bool {
        let components = normal_components(rel_dir);
        self.matches_excluded(&components)
    }

    /// Whether a file (given relative to the root) passes both the folder
    /// exclusions and the extension allow-list.
    pub fn accepts_file(&self, rel_file: &Path) -> bool {
        let mut components = normal_components(rel_file);
        if components.pop().is_none() {
            return false;
        }
        if self.matches_excluded(&components) {
            return false;
        }
        self.extension_allowed(rel_file.extension())
    }

    /// Absolute-path variant used by the watcher. Paths outside the root
    /// are rejected.
    pub fn accepts(&self, path: &Path) -> bool {
        match self.relative(path) {
            Some(rel) => self.accepts_file(rel),
            None => false,
        }
    }

    fn extension_allowed(&self, extension: Option<&OsStr>) -> bool {
        let Some(allowed) = &self.include_extensions else {
            return true;
        };
        extension
            .and_then(OsStr::to_str)
            .map(|ext| allowed.contains(&ext.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    fn matches_excluded(&self, dirs: &[&str]) -> bool {
        self.exclude_folders.iter().any(|pattern| {
            pattern.len() <= dirs.len()
                && dirs
                    .windows(pattern.len())
                    .any(|window| window.iter().zip(pattern).all(|(a, b)| *a == b.as_str()))
        })
    }
}

fn normal_components(path: &Path) -> Vec<&str> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(seg) => seg.to_str(),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(exts: Option<&[&str]>, excludes: &[&str]) -> PathFilter {
        let exts: Option<Vec<String>> = exts.map(|e| e.iter().map(|s| s.to_string()).collect());
        let excludes: Vec<String> = excludes.iter().map(|s| s.to_string()).collect();
        PathFilter::new("/data/docs", exts.as_deref(), &excludes)
    }

    #[test]
    fn excluded_folder_matches_at_any_depth() {
        let f = filter(None, &["node_modules"]);
        assert!(!f.accepts(Path::new("/data/docs/node_modules/pkg/index.js")));
        assert!(!f.accepts(Path::new("/data/docs/web/node_modules/pkg/index.js")));
        assert!(f.accepts(Path::new("/data/docs/web/src/index.js")));
    }

    #[test]
    fn folder_names_are_not_substrings() {
        let f = filter(None, &["build"]);
        assert!(f.accepts(Path::new("/data/docs/builder/a.txt")));
        assert!(!f.accepts(Path::new("/data/docs/build/a.txt")));
    }

    #[test]
    fn file_named_like_excluded_folder_is_kept() {
        let f = filter(None, &["vendor"]);
        assert!(f.accepts(Path::new("/data/docs/vendor")));
    }

    #[test]
    fn multi_component_exclusion_must_be_contiguous() {
        let f = filter(None, &["build/out"]);
        assert!(!f.accepts(Path::new("/data/docs/app/build/out/a.txt")));
        assert!(f.accepts(Path::new("/data/docs/build/tmp/out/a.txt")));
        assert!(f.is_excluded_dir(Path::new("app/build/out")));
        assert!(!f.is_excluded_dir(Path::new("app/build")));
    }

    #[test]
    fn extension_allow_list_is_case_insensitive() {
        let f = filter(Some(&["pdf", ".MD"]), &[]);
        assert!(f.accepts(Path::new("/data/docs/a.PDF")));
        assert!(f.accepts(Path::new("/data/docs/notes/readme.md")));
        assert!(!f.accepts(Path::new("/data/docs/a.txt")));
        assert!(!f.accepts(Path::new("/data/docs/Makefile")));
    }

    #[test]
    fn empty_allow_list_accepts_everything() {
        let f = filter(Some(&[]), &[]);
        assert!(f.accepts(Path::new("/data/docs/Makefile")));
    }

    #[test]
    fn paths_outside_root_are_rejected() {
        let f = filter(None, &[]);
        assert!(!f.accepts(Path::new("/data/other/a.txt")));
        assert!(!f.accepts(Path::new("/data/docs")));
    }
}
