//! Read-only cache of briefs and their substitution catalogs.
//!
//! Entries are loaded on first access and kept for the process lifetime.
//! Two callers racing on the same cold key may both read the file; the loads
//! are interchangeable, so whichever insert lands last simply wins. A failed
//! load never inserts anything.

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};

use crate::brief::{BriefSummary, Document};
use crate::catalog::Catalog;
use crate::logging::{info, obj, v_num, v_str, Domain};

pub struct ReferenceDataStore {
    data_dir: PathBuf,
    documents: RwLock<HashMap<String, Arc<Document>>>,
    catalogs: RwLock<HashMap<String, Arc<Catalog>>>,
}

static GLOBAL: OnceLock<ReferenceDataStore> = OnceLock::new();

impl ReferenceDataStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            documents: RwLock::new(HashMap::new()),
            catalogs: RwLock::new(HashMap::new()),
        }
    }

    /// Process-wide store rooted at `data_dir` on first call; later calls
    /// ignore the argument.
    pub fn global(data_dir: &Path) -> &'static ReferenceDataStore {
        GLOBAL.get_or_init(|| ReferenceDataStore::new(data_dir))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn brief_path(&self, brief_id: &str) -> PathBuf {
        self.data_dir.join("briefs").join(format!("{}.json", brief_id))
    }

    pub fn catalog_path(&self, brief_id: &str) -> PathBuf {
        self.data_dir
            .join("hallucinations")
            .join(format!("{}.json", brief_id))
    }

    pub fn document(&self, brief_id: &str) -> Result<Arc<Document>> {
        cached(&self.documents, brief_id, || {
            load_json::<Document>(&self.brief_path(brief_id), brief_id, "brief")
        })
    }

    pub fn catalog(&self, brief_id: &str) -> Result<Arc<Catalog>> {
        cached(&self.catalogs, brief_id, || {
            load_json::<Catalog>(&self.catalog_path(brief_id), brief_id, "catalog")
        })
    }

    /// Discover `brief_*.json` files under `briefs/`, sorted by id.
    pub fn list_briefs(&self) -> Result<Vec<BriefSummary>> {
        let dir = self.data_dir.join("briefs");
        let entries = fs::read_dir(&dir)
            .map_err(|e| anyhow!("cannot read brief dir {}: {}", dir.display(), e))?;
        let mut ids: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                let id = name.strip_suffix(".json")?;
                id.starts_with("brief_").then(|| id.to_string())
            })
            .collect();
        ids.sort();
        ids.iter()
            .map(|id| self.document(id).map(|doc| summarize(id, &doc)))
            .collect()
    }
}

fn summarize(brief_id: &str, doc: &Document) -> BriefSummary {
    let mut summary = doc.summary();
    // file name is authoritative for lookups
    summary.brief_id = brief_id.to_string();
    if doc.title.is_empty() {
        summary.title = brief_id.to_string();
    }
    summary
}

fn cached<T>(
    cache: &RwLock<HashMap<String, Arc<T>>>,
    key: &str,
    load: impl FnOnce() -> Result<T>,
) -> Result<Arc<T>> {
    if let Ok(map) = cache.read() {
        if let Some(hit) = map.get(key) {
            return Ok(Arc::clone(hit));
        }
    }
    let value = Arc::new(load()?);
    let mut map = cache
        .write()
        .map_err(|_| anyhow!("reference cache poisoned"))?;
    Ok(Arc::clone(map.entry(key.to_string()).or_insert(value)))
}

fn load_json<T: DeserializeOwned>(path: &Path, brief_id: &str, kind: &str) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| anyhow!("cannot read {} {}: {}", kind, path.display(), e))?;
    let value = serde_json::from_slice::<T>(&bytes)
        .map_err(|e| anyhow!("malformed {} {}: {}", kind, path.display(), e))?;
    let digest = hex::encode(Sha256::digest(&bytes));
    info(
        Domain::Store,
        "loaded",
        obj(&[
            ("brief_id", v_str(brief_id)),
            ("kind", v_str(kind)),
            ("path", v_str(&path.display().to_string())),
            ("bytes", v_num(bytes.len() as f64)),
            ("sha256", v_str(&digest)),
        ]),
    );
    Ok(value)
}
