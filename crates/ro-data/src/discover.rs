//! Grouping event files into sample groups.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ro_types::{validation_error, DataError, RoResult, SampleGroup};

/// Sample id of an event file: its file name up to the first `.`.
pub fn sample_id<P: AsRef<Path>>(path: P) -> Option<String> {
    let name = path.as_ref().file_name()?.to_str()?;
    let id = name.split('.').next()?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Expand shell-style patterns into existing files. A pattern that
/// matches nothing is an error.
pub fn expand_patterns<S: AsRef<str>>(patterns: &[S]) -> RoResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let matches = glob::glob(pattern)
            .map_err(|e| validation_error!("invalid file pattern {pattern}: {e}"))?;

        let before = files.len();
        for entry in matches {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable path"),
            }
        }
        if files.len() == before {
            return Err(DataError::NoMatches {
                pattern: pattern.to_string(),
            }
            .into());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Group files by sample id. Groups come back sorted by id, files within a
/// group sorted by path.
pub fn group_files(files: Vec<PathBuf>, tree_name: &str) -> RoResult<Vec<SampleGroup>> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for file in files {
        let id = sample_id(&file).ok_or_else(|| DataError::InvalidFormat {
            path: file.display().to_string(),
            message: "cannot derive a sample id from the file name".to_string(),
        })?;
        groups.entry(id).or_default().push(file);
    }

    Ok(groups
        .into_iter()
        .map(|(id, mut files)| {
            files.sort();
            SampleGroup::new(id, files, tree_name)
        })
        .collect())
}

/// [`expand_patterns`] followed by [`group_files`].
pub fn discover_groups<S: AsRef<str>>(patterns: &[S], tree_name: &str) -> RoResult<Vec<SampleGroup>> {
    let files = expand_patterns(patterns)?;
    let groups = group_files(files, tree_name)?;
    tracing::info!(groups = groups.len(), "Discovered sample groups");
    Ok(groups)
}

/// Sample ids named by `args`. Each is either a literal id (`410000`,
/// `410000.json` or a path to it) or a glob pattern expanded inside `dir`,
/// so `4100*.json` names every matching count table. A pattern that
/// matches no file is an error.
pub fn resolve_sample_ids<S: AsRef<str>>(dir: &Path, args: &[S]) -> RoResult<Vec<String>> {
    let mut ids = Vec::new();
    for arg in args {
        let arg = arg.as_ref();
        if !arg.contains(&['*', '?', '['][..]) {
            let id = sample_id(arg).ok_or_else(|| validation_error!("invalid sample id `{arg}`"))?;
            ids.push(id);
            continue;
        }
        let pattern = if Path::new(arg).is_absolute() {
            arg.to_string()
        } else {
            format!("{}/{arg}", glob::Pattern::escape(&dir.display().to_string()))
        };
        let files = expand_patterns(&[pattern])?;
        tracing::debug!(pattern = %arg, files = files.len(), "Expanded sample pattern");
        ids.extend(files.iter().filter_map(sample_id));
    }
    Ok(ids)
}

/// Does `name` match any of the glob `patterns`?
pub fn matches_any<S: AsRef<str>>(name: &str, patterns: &[S]) -> RoResult<bool> {
    for pattern in patterns {
        let compiled = glob::Pattern::new(pattern.as_ref())
            .map_err(|e| validation_error!("invalid pattern {}: {e}", pattern.as_ref()))?;
        if compiled.matches(name) {
            return Ok(true);
        }
    }
    Ok(false)
}
