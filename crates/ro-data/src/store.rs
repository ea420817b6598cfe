//! JSON persistence for supercuts, count tables and ranked results.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use ro_types::{
    config_error, CountKind, CountTable, CutDimension, DataError, MetadataTable, ResolvedCut,
    RoResult, SignificanceEntry, Supercuts,
};

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> RoResult<T> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DataError::InputNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        DataError::InvalidFormat {
            path: path.display().to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Pretty-print `value` to `path`, creating parent directories.
pub fn write_json<T: Serialize + ?Sized, P: AsRef<Path>>(path: P, value: &T) -> RoResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text)?;
    Ok(())
}

/// Pre-flight check for an output location.
pub fn ensure_absent<P: AsRef<Path>>(path: P, overwrite: bool) -> RoResult<()> {
    let path = path.as_ref();
    if path.exists() {
        if overwrite {
            tracing::warn!(path = %path.display(), "Output exists, overwriting");
        } else {
            return Err(DataError::OutputExists {
                path: path.display().to_string(),
            }
            .into());
        }
    }
    Ok(())
}

/// Load a supercut file. Any problem with it is a configuration error.
pub fn read_supercuts<P: AsRef<Path>>(path: P) -> RoResult<Supercuts> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => config_error!("supercuts file {} not found", path.display()),
        _ => e.into(),
    })?;
    let dimensions: Vec<CutDimension> = serde_json::from_str(&text)
        .map_err(|e| config_error!("invalid supercuts file {}: {}", path.display(), e))?;
    Ok(Supercuts::new(dimensions)?)
}

pub fn write_supercuts<P: AsRef<Path>>(path: P, supercuts: &Supercuts) -> RoResult<()> {
    write_json(path, supercuts)
}

/// Load a metadata table. A missing file is a configuration error.
pub fn read_metadata<P: AsRef<Path>>(path: P) -> RoResult<MetadataTable> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(config_error!("metadata file {} not found", path.display()));
    }
    read_json(path)
}

pub fn read_significances<P: AsRef<Path>>(path: P) -> RoResult<Vec<SignificanceEntry>> {
    read_json(path)
}

/// Identity of one `optimize` run, written as `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub backgrounds: Vec<String>,
    pub signals: Vec<String>,
    pub background_hash: String,
    /// Count kind the ranked files are ordered by.
    #[serde(default)]
    pub rank_by: CountKind,
    pub created_at: DateTime<Utc>,
    pub run_id: Uuid,
}

impl RunManifest {
    pub fn new(backgrounds: Vec<String>, signals: Vec<String>, background_hash: String) -> Self {
        Self {
            backgrounds,
            signals,
            background_hash,
            rank_by: CountKind::default(),
            created_at: Utc::now(),
            run_id: Uuid::new_v4(),
        }
    }

    pub fn with_rank_by(mut self, kind: CountKind) -> Self {
        self.rank_by = kind;
        self
    }
}

/// Layout of one output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    /// Wrap an existing directory for reading.
    pub fn open<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Create the directory, refusing one that already exists unless
    /// `overwrite` is set.
    pub fn create<P: AsRef<Path>>(root: P, overwrite: bool) -> RoResult<Self> {
        let root = root.as_ref().to_path_buf();
        ensure_absent(&root, overwrite)?;
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn count_table_path(&self, sample: &str) -> PathBuf {
        self.root.join(format!("{sample}.json"))
    }

    pub fn write_count_table(&self, sample: &str, table: &CountTable) -> RoResult<PathBuf> {
        let path = self.count_table_path(sample);
        write_json(&path, table)?;
        Ok(path)
    }

    pub fn read_count_table(&self, sample: &str) -> RoResult<CountTable> {
        read_json(self.count_table_path(sample))
    }

    pub fn significance_path(&self, signal: &str, background_hash: &str) -> PathBuf {
        self.root.join(format!("s{signal}.b{background_hash}.json"))
    }

    pub fn write_significances(
        &self,
        signal: &str,
        background_hash: &str,
        entries: &[SignificanceEntry],
    ) -> RoResult<PathBuf> {
        let path = self.significance_path(signal, background_hash);
        write_json(&path, entries)?;
        Ok(path)
    }

    /// `<bkgd-hash>.json`, holding the background sample ids.
    pub fn background_set_path(&self, background_hash: &str) -> PathBuf {
        self.root.join(format!("{background_hash}.json"))
    }

    pub fn write_background_set(&self, background_hash: &str, samples: &[String]) -> RoResult<()> {
        write_json(self.background_set_path(background_hash), samples)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn write_manifest(&self, manifest: &RunManifest) -> RoResult<()> {
        write_json(self.manifest_path(), manifest)
    }

    pub fn read_manifest(&self) -> RoResult<RunManifest> {
        read_json(self.manifest_path())
    }

    pub fn lookup_path(&self, hash: &str) -> PathBuf {
        self.root.join(format!("{hash}.json"))
    }

    pub fn write_lookup(&self, hash: &str, cut: &[ResolvedCut]) -> RoResult<PathBuf> {
        let path = self.lookup_path(hash);
        write_json(&path, cut)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ro_types::{CountRecord, CutHash, RoError, SupercutError};
    use tempfile::TempDir;

    #[test]
    fn supercuts_load_from_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("supercuts.json");
        fs::write(
            &path,
            r#"[
                {"selections": "m_eff > {0}", "grid": [[100, 300, 100]]},
                {"selections": "nJets >= {0}", "pivot": [4]}
            ]"#,
        )
        .unwrap();

        let supercuts = read_supercuts(&path).unwrap();
        assert_eq!(supercuts.len(), 2);
        assert_eq!(supercuts.grid_size(), Some(2));
        assert!(supercuts.dimensions()[1].is_fixed());
    }

    #[test]
    fn duplicate_selection_is_a_supercut_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("supercuts.json");
        fs::write(
            &path,
            r#"[
                {"selections": "met > {0}", "pivot": [100]},
                {"selections": "met > {0}", "grid": [[0, 10, 1]]}
            ]"#,
        )
        .unwrap();

        let err = read_supercuts(&path).unwrap_err();
        assert!(matches!(
            err,
            RoError::Supercut(SupercutError::DuplicateSelection { .. })
        ));
        assert!(err.is_configuration());
    }

    #[test]
    fn malformed_supercuts_are_configuration_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("supercuts.json");
        fs::write(&path, r#"[{"selections": "met > {0}"}]"#).unwrap();
        assert!(read_supercuts(&path).unwrap_err().is_configuration());
        assert!(read_supercuts(dir.path().join("missing.json"))
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn store_refuses_existing_directory() {
        let dir = TempDir::new().unwrap();
        let err = ResultStore::create(dir.path(), false).unwrap_err();
        assert!(matches!(err, RoError::Data(DataError::OutputExists { .. })));
        assert!(ResultStore::create(dir.path(), true).is_ok());
    }

    #[test]
    fn count_tables_round_trip_through_store() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::create(dir.path().join("cuts"), false).unwrap();
        let mut table = CountTable::new();
        table.insert(CutHash::from("abc"), CountRecord::new(3.0, 1.5, 2.0));

        let path = store.write_count_table("410000", &table).unwrap();
        assert!(path.ends_with("410000.json"));
        assert_eq!(store.read_count_table("410000").unwrap(), table);
    }

    #[test]
    fn file_naming() {
        let store = ResultStore::open("/out");
        assert_eq!(
            store.significance_path("370100", "ab12"),
            PathBuf::from("/out/s370100.bab12.json")
        );
        assert_eq!(store.manifest_path(), PathBuf::from("/out/config.json"));
    }

    #[test]
    fn manifest_records_run_identity() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::open(dir.path());
        let manifest = RunManifest::new(vec!["410000".into()], vec!["370100".into()], "ab12".into())
            .with_rank_by(CountKind::Weighted);
        store.write_manifest(&manifest).unwrap();
        assert_eq!(store.read_manifest().unwrap(), manifest);
    }
}
