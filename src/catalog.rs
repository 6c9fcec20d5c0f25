//! Disease Catalog
//!
//! Reference store of known disease records, queried by name only.
//!
//! ## Components
//! - **CatalogEntry**: `diseaseName` plus opaque descriptive fields
//! - **CatalogLookup**: the single read capability the matcher depends on
//! - **SledCatalog**: persistent store (sled), keyed by folded name
//! - **InMemoryCatalog**: map-backed store for tests and small deployments

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::warn;

type Result<T> = std::result::Result<T, CatalogError>;

/// Canonical disease record.
///
/// Only `diseaseName` has meaning here; symptoms, treatment and every other
/// field travel through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "diseaseName")]
    pub disease_name: String,
    #[serde(flatten)]
    pub details: Map<String, JsonValue>,
}

impl CatalogEntry {
    pub fn new(disease_name: impl Into<String>) -> Self {
        Self {
            disease_name: disease_name.into(),
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.details.insert(field.into(), value.into());
        self
    }

    /// Key under which the entry is stored and probed
    pub fn key(&self) -> String {
        catalog_key(&self.disease_name)
    }
}

/// Folding shared by every store: case-insensitive, and `_` is stored as a
/// space so catalog names kept in raw label form (`Tomato_Late_blight`)
/// answer the underscore-free raw probe. Still a whole-name comparison.
pub fn catalog_key(name: &str) -> String {
    name.replace('_', " ").to_lowercase()
}

/// Read capability used by the matcher
pub trait CatalogLookup: Send + Sync {
    /// Exact, case-insensitive, whole-string comparison against `diseaseName`
    fn find_by_name_case_insensitive_exact(&self, name: &str) -> Result<Option<CatalogEntry>>;
}

/// Browse access for the catalog read endpoints; the matcher never uses it
pub trait CatalogListing: Send + Sync {
    /// Every entry, ordered by folded name
    fn entries(&self) -> Result<Vec<CatalogEntry>>;
}

/// sled-backed catalog
#[derive(Clone)]
pub struct SledCatalog {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledCatalog {
    const TREE: &'static str = "diseases";

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        let tree = db.open_tree(Self::TREE)?;
        Ok(Self { db, tree })
    }

    /// Throwaway catalog that lives only as long as the handle
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        let tree = db.open_tree(Self::TREE)?;
        Ok(Self { db, tree })
    }

    /// Insert or replace the entry with the same folded name, returning the
    /// entry it displaced
    pub fn upsert(&self, entry: &CatalogEntry) -> Result<Option<CatalogEntry>> {
        if entry.disease_name.trim().is_empty() {
            return Err(CatalogError::InvalidEntry(
                "diseaseName must not be empty".to_string(),
            ));
        }
        let key = entry.key();
        let bytes = serde_json::to_vec(entry)
            .map_err(|source| CatalogError::Corrupt { key: key.clone(), source })?;
        let previous = match self.tree.insert(key.as_bytes(), bytes)? {
            Some(old) => Some(decode(key.as_bytes(), &old)?),
            None => None,
        };
        warn_on_collision(previous.as_ref(), entry);
        Ok(previous)
    }

    pub fn remove(&self, name: &str) -> Result<bool> {
        Ok(self.tree.remove(catalog_key(name).as_bytes())?.is_some())
    }

    pub fn list(&self) -> Result<Vec<CatalogEntry>> {
        let mut entries = Vec::with_capacity(self.tree.len());
        for item in self.tree.iter() {
            let (key, value) = item?;
            entries.push(decode(&key, &value)?);
        }
        Ok(entries)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Import a JSON array of entries, returning how many were written
    pub fn import_json(&self, json: &str) -> Result<usize> {
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(json).map_err(|e| CatalogError::Seed(e.to_string()))?;
        for entry in &entries {
            self.upsert(entry)?;
        }
        Ok(entries.len())
    }

    pub async fn import_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CatalogError::Seed(format!("{}: {}", path.display(), e)))?;
        self.import_json(&json)
    }

    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

impl CatalogLookup for SledCatalog {
    fn find_by_name_case_insensitive_exact(&self, name: &str) -> Result<Option<CatalogEntry>> {
        let key = catalog_key(name);
        match self.tree.get(key.as_bytes())? {
            Some(value) => decode(key.as_bytes(), &value).map(Some),
            None => Ok(None),
        }
    }
}

impl CatalogListing for SledCatalog {
    fn entries(&self) -> Result<Vec<CatalogEntry>> {
        self.list()
    }
}

/// `Tomato_Late_blight` and `Tomato Late blight` fold to one key; the later write wins
fn warn_on_collision(previous: Option<&CatalogEntry>, entry: &CatalogEntry) {
    if let Some(previous) = previous {
        if previous.disease_name != entry.disease_name {
            warn!(
                "Catalog entry {:?} replaced {:?} (same folded name {:?})",
                entry.disease_name,
                previous.disease_name,
                entry.key()
            );
        }
    }
}

fn decode(key: &[u8], value: &[u8]) -> Result<CatalogEntry> {
    serde_json::from_slice(value).map_err(|source| CatalogError::Corrupt {
        key: String::from_utf8_lossy(key).into_owned(),
        source,
    })
}

/// Map-backed catalog
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entries: RwLock<HashMap<String, CatalogEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same replacement rule as [`SledCatalog::upsert`]
    pub fn insert(&self, entry: CatalogEntry) -> Result<Option<CatalogEntry>> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let previous = entries.insert(entry.key(), entry.clone());
        warn_on_collision(previous.as_ref(), &entry);
        Ok(previous)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<CatalogEntry> for InMemoryCatalog {
    fn from_iter<I: IntoIterator<Item = CatalogEntry>>(iter: I) -> Self {
        let entries = iter.into_iter().map(|e| (e.key(), e)).collect();
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl CatalogLookup for InMemoryCatalog {
    fn find_by_name_case_insensitive_exact(&self, name: &str) -> Result<Option<CatalogEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| poisoned())?;
        Ok(entries.get(&catalog_key(name)).cloned())
    }
}

impl CatalogListing for InMemoryCatalog {
    fn entries(&self) -> Result<Vec<CatalogEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| poisoned())?;
        let mut keyed: Vec<_> = entries.iter().collect();
        keyed.sort_by(|a, b| a.0.cmp(b.0));
        Ok(keyed.into_iter().map(|(_, e)| e.clone()).collect())
    }
}

fn poisoned() -> CatalogError {
    CatalogError::Unavailable("catalog lock poisoned".to_string())
}
