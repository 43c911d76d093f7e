//! Overlap map cache keyed by `(geometry version, cell size)`.
//!
//! Maps are expensive to build and immutable afterwards, so they are built
//! once per key and shared as `Arc<OverlapMap>`. Persistence is pluggable
//! through [`MapStore`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{RebinError, StoreError};
use crate::overlap::{GeometryIndexer, OverlapMap, OverlapMapRecord};
use crate::sensor_layout::SensorGeometry;

/// Cache key. Cell sizes compare by exact bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapKey {
    geometry_version: String,
    cell_size_bits: u64,
}

impl MapKey {
    pub fn new(geometry_version: impl Into<String>, cell_size: f64) -> Self {
        Self {
            geometry_version: geometry_version.into(),
            cell_size_bits: cell_size.to_bits(),
        }
    }

    pub fn for_geometry(geometry: &SensorGeometry, cell_size: f64) -> Self {
        Self::new(geometry.version(), cell_size)
    }

    pub fn geometry_version(&self) -> &str {
        &self.geometry_version
    }

    pub fn cell_size(&self) -> f64 {
        f64::from_bits(self.cell_size_bits)
    }

    /// File-name-safe stem, unique per key up to version sanitizing.
    fn file_stem(&self) -> String {
        let version: String = self
            .geometry_version
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("overlap_{version}_{:016x}", self.cell_size_bits)
    }
}

/// Persistent storage for overlap maps.
pub trait MapStore: Send + Sync {
    /// `Ok(None)` when nothing is stored under `key`.
    fn load(&self, key: &MapKey) -> Result<Option<OverlapMap>, StoreError>;
    fn store(&self, key: &MapKey, map: &OverlapMap) -> Result<(), StoreError>;
}

/// Store that keeps nothing; the cache then only memoizes in memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl MapStore for NullStore {
    fn load(&self, _key: &MapKey) -> Result<Option<OverlapMap>, StoreError> {
        Ok(None)
    }

    fn store(&self, _key: &MapKey, _map: &OverlapMap) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    maps: Mutex<HashMap<MapKey, OverlapMap>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.maps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MapStore for MemoryStore {
    fn load(&self, key: &MapKey) -> Result<Option<OverlapMap>, StoreError> {
        let maps = self.maps.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(maps.get(key).cloned())
    }

    fn store(&self, key: &MapKey, map: &OverlapMap) -> Result<(), StoreError> {
        let mut maps = self.maps.lock().unwrap_or_else(PoisonError::into_inner);
        maps.insert(key.clone(), map.clone());
        Ok(())
    }
}

/// One JSON file per key inside a directory.
///
/// Writes go to a temporary file that is renamed into place, so readers
/// never observe a partially written map.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

/// On-disk wrapper recording the full key next to the map.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredMap<M> {
    geometry_version: String,
    cell_size: f64,
    map: M,
}

impl DirStore {
    /// Use `root`, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &MapKey) -> PathBuf {
        self.root.join(format!("{}.json", key.file_stem()))
    }
}

impl MapStore for DirStore {
    fn load(&self, key: &MapKey) -> Result<Option<OverlapMap>, StoreError> {
        let path = self.path_for(key);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredMap<OverlapMapRecord> = serde_json::from_str(&data)?;
        if stored.geometry_version != key.geometry_version
            || stored.cell_size.to_bits() != key.cell_size_bits
        {
            // Two versions sanitized to the same file name.
            tracing::warn!(
                "{} holds a map for '{}' / {}, not the requested key",
                path.display(),
                stored.geometry_version,
                stored.cell_size
            );
            return Ok(None);
        }
        let map = OverlapMap::try_from(stored.map)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))?;
        Ok(Some(map))
    }

    fn store(&self, key: &MapKey, map: &OverlapMap) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let stored = StoredMap {
            geometry_version: key.geometry_version.clone(),
            cell_size: key.cell_size(),
            map,
        };
        fs::write(&tmp, serde_json::to_string(&stored)?)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!("stored overlap map at {}", path.display());
        Ok(())
    }
}

/// Lookup counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_hits: usize,
    pub store_hits: usize,
    pub builds: usize,
}

#[derive(Default)]
struct CacheInner {
    maps: HashMap<MapKey, Arc<OverlapMap>>,
    stats: CacheStats,
}

/// Build-once cache of overlap maps backed by a [`MapStore`].
pub struct OverlapCache<S: MapStore> {
    indexer: GeometryIndexer,
    store: S,
    inner: Mutex<CacheInner>,
}

impl OverlapCache<NullStore> {
    /// Memory-only cache with the default tolerance.
    pub fn in_memory() -> Self {
        Self::new(GeometryIndexer::default(), NullStore)
    }
}

impl<S: MapStore> OverlapCache<S> {
    pub fn new(indexer: GeometryIndexer, store: S) -> Self {
        Self {
            indexer,
            store,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn indexer(&self) -> &GeometryIndexer {
        &self.indexer
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    /// Shared map for `(geometry, cell_size)`: from memory, else from the
    /// store, else freshly built and stored.
    ///
    /// A stored map that does not fit the request (pixel count, grid or
    /// tolerance) is rebuilt and overwritten.
    pub fn get_or_build(
        &self,
        geometry: &SensorGeometry,
        cell_size: f64,
    ) -> Result<Arc<OverlapMap>, RebinError> {
        let key = MapKey::for_geometry(geometry, cell_size);
        let mut guard = self.lock();
        let inner = &mut *guard;
        if let Some(map) = inner.maps.get(&key) {
            inner.stats.memory_hits += 1;
            return Ok(Arc::clone(map));
        }

        let map = match self.store.load(&key)? {
            Some(map) if self.fits(&map, geometry, cell_size) => {
                inner.stats.store_hits += 1;
                tracing::debug!(
                    "loaded overlap map for '{}' / {}",
                    key.geometry_version(),
                    cell_size
                );
                map
            }
            stored => {
                if stored.is_some() {
                    tracing::warn!(
                        "stored overlap map for '{}' / {} is stale; rebuilding",
                        key.geometry_version(),
                        cell_size
                    );
                }
                let map = self.indexer.build(geometry, cell_size)?;
                self.store.store(&key, &map)?;
                inner.stats.builds += 1;
                map
            }
        };

        let map = Arc::new(map);
        inner.maps.insert(key, Arc::clone(&map));
        Ok(map)
    }

    fn fits(&self, map: &OverlapMap, geometry: &SensorGeometry, cell_size: f64) -> bool {
        let grid = map.grid();
        map.n_pixels() == geometry.n_pixels()
            && grid.cell_size.to_bits() == cell_size.to_bits()
            && grid.extent.to_bits() == geometry.extent().to_bits()
            && map.epsilon().to_bits() == self.indexer.epsilon().to_bits()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
