//! Directory loader for fmf trees.
//!
//! Layout:
//! - `main.fmf` holds the data of the directory's own node.
//! - `name.fmf` declares the child node `name`.
//! - Sub-directories declare child nodes; a directory with no `.fmf` data
//!   anywhere below it does not create a node.
//! - Hidden entries (`.fmf`, `.git`, ...) are skipped.
//!
//! Symlinked directories are followed. A directory that resolves to one of
//! its own ancestors is reported as a cyclic reference.

use std::path::{Path, PathBuf};

use super::{RawNode, TreeError, join_name, parse_document};

const MAIN_FILE: &str = "main.fmf";
const EXTENSION: &str = "fmf";

pub(crate) fn load_dir(root: &Path) -> Result<RawNode, TreeError> {
    let mut raw = RawNode::default();
    let mut ancestors = Vec::new();
    load_into(root, "/", &mut raw, &mut ancestors)?;
    Ok(raw)
}

fn load_into(
    dir: &Path,
    node: &str,
    raw: &mut RawNode,
    ancestors: &mut Vec<PathBuf>,
) -> Result<(), TreeError> {
    let canonical = dir.canonicalize().map_err(|source| io_error(dir, source))?;
    if ancestors.contains(&canonical) {
        return Err(TreeError::CyclicReference {
            path: dir.to_path_buf(),
        });
    }
    ancestors.push(canonical);

    let main = dir.join(MAIN_FILE);
    if main.is_file() {
        let data = read_mapping(&main, node)?;
        raw.absorb(data, node)?;
    }

    for path in sorted_entries(dir)? {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if file_name.starts_with('.') || file_name == MAIN_FILE {
            continue;
        }

        if path.is_dir() {
            let child_name = join_name(node, file_name);
            let mut child = RawNode::default();
            load_into(&path, &child_name, &mut child, ancestors)?;
            if child.is_defined() {
                raw.attach(file_name, child);
            }
        } else if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION) {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let child_name = join_name(node, stem);
            let data = read_mapping(&path, &child_name)?;
            let mut child = RawNode::default();
            child.absorb(data, &child_name)?;
            raw.attach(stem, child);
        }
    }

    ancestors.pop();
    Ok(())
}

/// Directory entries sorted by name, so node order is stable.
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, TreeError> {
    let entries = std::fs::read_dir(dir).map_err(|source| io_error(dir, source))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| io_error(dir, source))?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn read_mapping(path: &Path, node: &str) -> Result<serde_yaml::Mapping, TreeError> {
    let src = std::fs::read_to_string(path).map_err(|source| io_error(path, source))?;
    parse_document(&src, &path.display().to_string(), node)
}

fn io_error(path: &Path, source: std::io::Error) -> TreeError {
    TreeError::Io {
        path: path.to_path_buf(),
        source,
    }
}
