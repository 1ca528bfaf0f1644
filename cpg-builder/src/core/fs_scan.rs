//! Filesystem enumeration for extracted project trees.
//!
//! Produces a flat list of items (directories plus Lua source files) with
//! project-relative paths and parent links, ready for the two-pass
//! directory-structure insertion into the graph.

use crate::config::model::AnalyzerConfig;
use anyhow::{Result, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsItemKind {
    Dir,
    File,
}

impl FsItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FsItemKind::Dir => "dir",
            FsItemKind::File => "file",
        }
    }
}

/// One enumerated file-system item.
#[derive(Debug, Clone)]
pub struct FsItem {
    /// Base name of the item.
    pub name: String,
    /// Project-relative path, used as the secondary key in the graph.
    pub path: String,
    pub kind: FsItemKind,
    /// Project-relative path of the parent directory; `None` for the root.
    pub parent: Option<String>,
    /// Absolute path on disk (files only need it for parsing).
    pub abs_path: std::path::PathBuf,
}

#[derive(Debug, Clone)]
pub struct ScanResult {
    pub items: Vec<FsItem>,
}

impl ScanResult {
    /// The Lua source files, in enumeration order.
    pub fn lua_files(&self) -> impl Iterator<Item = &FsItem> {
        self.items
            .iter()
            .filter(|i| matches!(i.kind, FsItemKind::File))
    }
}

/// Enumerate the project tree under `root`.
///
/// The root directory itself is the first item (no parent). Directories are
/// always recorded; only `.lua` files are. Walk order is name-sorted so the
/// emitted graph is deterministic for a given tree.
pub fn analyze_project_structure(root: &Path, cfg: &AnalyzerConfig) -> Result<ScanResult> {
    if !root.is_dir() {
        bail!("fs_scan: root does not exist or is not a directory: {}", root.display());
    }

    info!("fs_scan: start -> {}", root.display());

    let ignore_globs = build_globset(&cfg.filters.ignore_globs);

    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| String::from("project"));

    let mut items = vec![FsItem {
        name: root_name.clone(),
        path: root_name.clone(),
        kind: FsItemKind::Dir,
        parent: None,
        abs_path: root.to_path_buf(),
    }];

    // counters for diagnostics
    let mut skipped_ignored = 0usize;
    let mut skipped_too_big = 0usize;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(keep_entry);

    for entry in walker.filter_map(Result::ok) {
        let path = entry.path();
        let rel = match path.strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };

        if is_ignored_by(rel, ignore_globs.as_ref()) {
            skipped_ignored += 1;
            debug!("fs_scan: ignore (glob) {}", path.display());
            continue;
        }

        let kind = if entry.file_type().is_dir() {
            FsItemKind::Dir
        } else if entry.file_type().is_file() {
            if path.extension().map(|e| e == "lua") != Some(true) {
                continue;
            }
            match fs::metadata(path) {
                Ok(meta) if meta.len() as usize > cfg.limits.max_file_bytes => {
                    skipped_too_big += 1;
                    debug!(
                        "fs_scan: skip (size {} > max {}) {}",
                        meta.len(),
                        cfg.limits.max_file_bytes,
                        path.display()
                    );
                    continue;
                }
                Ok(_) => FsItemKind::File,
                Err(err) => {
                    warn!("fs_scan: metadata failed for {}: {}", path.display(), err);
                    continue;
                }
            }
        } else {
            continue;
        };

        let rel_str = rel_path_string(&root_name, rel);
        let parent = match rel.parent() {
            Some(p) if p.as_os_str().is_empty() => Some(root_name.clone()),
            Some(p) => Some(rel_path_string(&root_name, p)),
            None => Some(root_name.clone()),
        };

        items.push(FsItem {
            name: entry.file_name().to_string_lossy().to_string(),
            path: rel_str,
            kind,
            parent,
            abs_path: path.to_path_buf(),
        });
    }

    let files = items
        .iter()
        .filter(|i| matches!(i.kind, FsItemKind::File))
        .count();
    info!(
        "fs_scan: done, items={} lua_files={} (ignored={}, too_big={})",
        items.len(),
        files,
        skipped_ignored,
        skipped_too_big
    );

    Ok(ScanResult { items })
}

/// Coarse directory filter to avoid descending into heavy/vendor folders.
fn keep_entry(entry: &DirEntry) -> bool {
    if entry.file_type().is_dir() {
        if let Some(name) = entry.file_name().to_str() {
            return !matches!(name, ".git" | "node_modules" | "build" | "target" | ".idea");
        }
    }
    true
}

fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for p in patterns {
        match Glob::new(p) {
            Ok(g) => {
                builder.add(g);
            }
            Err(err) => warn!("fs_scan: invalid ignore glob {p:?}: {err}"),
        }
    }
    builder.build().ok()
}

fn is_ignored_by(rel: &Path, globs: Option<&GlobSet>) -> bool {
    globs.map(|g| g.is_match(rel)).unwrap_or(false)
}

fn rel_path_string(root_name: &str, rel: &Path) -> String {
    let rel = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("{root_name}/{rel}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn enumerates_dirs_and_lua_files_only() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("proj");
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/main.lua"), "local a = 1\n").unwrap();
        fs::write(root.join("src/readme.md"), "nope").unwrap();
        fs::write(root.join("init.lua"), "print('hi')\n").unwrap();

        let scan = analyze_project_structure(&root, &AnalyzerConfig::default()).unwrap();

        let root_item = &scan.items[0];
        assert_eq!(root_item.path, "proj");
        assert!(root_item.parent.is_none());

        let paths: Vec<_> = scan.items.iter().map(|i| i.path.as_str()).collect();
        assert!(paths.contains(&"proj/src"));
        assert!(paths.contains(&"proj/src/main.lua"));
        assert!(paths.contains(&"proj/init.lua"));
        assert!(!paths.iter().any(|p| p.ends_with("readme.md")));

        let main = scan
            .items
            .iter()
            .find(|i| i.path == "proj/src/main.lua")
            .unwrap();
        assert_eq!(main.parent.as_deref(), Some("proj/src"));
        assert_eq!(scan.lua_files().count(), 2);
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        assert!(analyze_project_structure(&missing, &AnalyzerConfig::default()).is_err());
    }
}
