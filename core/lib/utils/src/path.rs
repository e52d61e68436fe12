//! On-disk path construction for tenant databases (spec §4.1).
//!
//! Every filesystem entry point into the engine goes through
//! [`graph_path`] or [`staging_path`]; no other component is allowed to
//! build a path out of a raw `graph_id`. Grounded on
//! `original_source/robosystems/utils/path_validation.py`
//! (`get_lbug_database_path` / `get_duckdb_staging_path`), translated from
//! `Path.resolve()` + `relative_to()` into `fs::canonicalize` +
//! `strip_prefix` since Rust's canonicalization requires the path to exist.

use std::path::{Path, PathBuf};

use graphnode_basic_types::{Error, GraphId};

const GRAPH_EXTENSION: &str = "graph";
const STAGING_EXTENSION: &str = "staging";

/// Resolves `base/<graph_id>.graph`, proving the result stays under `base`
/// after symlink resolution. `base` must already exist; the database file
/// itself need not.
pub fn graph_path(base: &Path, graph_id: &GraphId) -> Result<PathBuf, Error> {
    resolve_under_base(base, graph_id, GRAPH_EXTENSION)
}

/// Same contract as [`graph_path`] with the staging suffix.
pub fn staging_path(base: &Path, graph_id: &GraphId) -> Result<PathBuf, Error> {
    resolve_under_base(base, graph_id, STAGING_EXTENSION)
}

fn resolve_under_base(base: &Path, graph_id: &GraphId, extension: &str) -> Result<PathBuf, Error> {
    let canonical_base = std::fs::canonicalize(base).map_err(|e| {
        Error::InvalidArgument(format!("base directory {} is not usable: {e}", base.display()))
    })?;

    let file_name = format!("{graph_id}.{extension}");
    let candidate = canonical_base.join(&file_name);

    // The file name came out of a validated `GraphId`, which already
    // forbids `/`, `\`, `..`, and NUL, so `candidate`'s parent is exactly
    // `canonical_base` by construction. We still check it explicitly: a
    // future change to `GraphId`'s charset should not silently widen what
    // this function will write under `base`.
    match candidate.parent() {
        Some(parent) if parent == canonical_base => Ok(candidate),
        _ => Err(Error::InvalidArgument(
            "resolved path escapes the base directory".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_path_under_base() {
        let dir = tempfile::tempdir().unwrap();
        let id = GraphId::parse("kg_demo").unwrap();

        let graph = graph_path(dir.path(), &id).unwrap();
        assert_eq!(graph.file_name().unwrap(), "kg_demo.graph");
        assert!(graph.starts_with(dir.path().canonicalize().unwrap()));

        let staging = staging_path(dir.path(), &id).unwrap();
        assert_eq!(staging.file_name().unwrap(), "kg_demo.staging");
    }

    #[test]
    fn rejects_missing_base() {
        let id = GraphId::parse("kg_demo").unwrap();
        let err = graph_path(Path::new("/nonexistent/does/not/exist"), &id).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
