//! Loading static case content authored as JSON files.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{StorageError, StoreResult};
use crate::types::Case;

/// Read every `*.json` file in `dir` as a case, sorted by file name.
///
/// Each case is validated; an invalid case or a duplicated id aborts loading so
/// broken content never reaches visitors.
pub async fn load_seed_dir(dir: &Path) -> StoreResult<Vec<Case>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| StorageError::io(dir, e))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::io(dir, e))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut seen = HashSet::new();
    let mut cases = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        let case: Case =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::json(&path, e))?;

        case.validate()
            .map_err(|e| StorageError::Invalid(format!("{}: {}", path.display(), e)))?;
        if !seen.insert(case.id.clone()) {
            return Err(StorageError::Invalid(format!(
                "{}: duplicate case id '{}'",
                path.display(),
                case.id
            )));
        }

        tracing::debug!("Loaded seed case {} from {}", case.id, path.display());
        cases.push(case);
    }

    Ok(cases)
}
