//! HNSW index implementation using usearch.
//!
//! Parameters tuned for quality over speed:
//! - M = 16 (connections per layer)
//! - ef_construction = 200 (build-time quality)
//! - ef_search = 100 (search-time quality)

use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::VectorError;
use crate::store::check_dimension;

const INDEX_FILE: &str = "hnsw.usearch";

/// HNSW index configuration
#[derive(Debug, Clone)]
pub struct HnswConfig {
    /// Embedding dimension (must match the embedder)
    pub dimension: usize,
    /// Number of connections per layer (M parameter)
    pub connectivity: usize,
    /// Build-time search depth (ef_construction)
    pub expansion_add: usize,
    /// Query-time search depth (ef_search)
    pub expansion_search: usize,
    /// Directory holding the index file and its metadata database
    pub index_path: PathBuf,
    /// Initial capacity; grows by doubling when full
    pub capacity: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            dimension: 1536,
            connectivity: 16,
            expansion_add: 200,
            expansion_search: 100,
            index_path: PathBuf::from("./vector-index"),
            capacity: 10_000,
        }
    }
}

impl HnswConfig {
    pub fn new(dimension: usize, index_path: impl Into<PathBuf>) -> Self {
        Self {
            dimension,
            index_path: index_path.into(),
            ..Default::default()
        }
    }

    pub fn with_connectivity(mut self, m: usize) -> Self {
        self.connectivity = m;
        self
    }

    pub fn with_expansion(mut self, ef_add: usize, ef_search: usize) -> Self {
        self.expansion_add = ef_add;
        self.expansion_search = ef_search;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    fn options(&self) -> IndexOptions {
        IndexOptions {
            dimensions: self.dimension,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
            multi: false,
        }
    }
}

/// A raw nearest-neighbour hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyHit {
    pub key: u64,
    /// 1 - cosine distance
    pub score: f32,
}

/// HNSW index wrapper around usearch, keyed by `u64`.
pub struct HnswIndex {
    index: RwLock<Index>,
    config: HnswConfig,
}

impl HnswIndex {
    /// Create a new HNSW index or open the existing one.
    pub fn open_or_create(config: HnswConfig) -> Result<Self, VectorError> {
        let index_file = config.index_path.join(INDEX_FILE);
        let options = config.options();

        let index = Index::new(&options).map_err(|e| VectorError::Index(e.to_string()))?;
        if index_file.exists() {
            info!(path = ?index_file, "Opening existing vector index");
            index
                .load(path_str(&index_file)?)
                .map_err(|e| VectorError::Index(format!("Failed to load: {}", e)))?;
        } else {
            info!(path = ?index_file, dim = config.dimension, "Creating new vector index");
            std::fs::create_dir_all(&config.index_path)?;
        }
        if index.capacity() < config.capacity {
            index
                .reserve(config.capacity)
                .map_err(|e| VectorError::Index(e.to_string()))?;
        }

        Ok(Self {
            index: RwLock::new(index),
            config,
        })
    }

    pub fn index_file(&self) -> PathBuf {
        self.config.index_path.join(INDEX_FILE)
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Index>, VectorError> {
        self.index
            .read()
            .map_err(|_| VectorError::LockPoisoned("hnsw index"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Index>, VectorError> {
        self.index
            .write()
            .map_err(|_| VectorError::LockPoisoned("hnsw index"))
    }

    pub fn len(&self) -> Result<usize, VectorError> {
        Ok(self.read()?.size())
    }

    pub fn is_empty(&self) -> Result<bool, VectorError> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, key: u64) -> Result<bool, VectorError> {
        Ok(self.read()?.contains(key))
    }

    /// Add a vector, growing the index when it is full.
    #[allow(clippy::readonly_write_lock)] // usearch::Index uses interior mutability
    pub fn add(&self, key: u64, vector: &[f32]) -> Result<(), VectorError> {
        check_dimension(vector.len(), self.config.dimension)?;

        let index = self.write()?;
        if index.size() >= index.capacity() {
            let grown = (index.capacity() * 2).max(self.config.capacity);
            debug!(capacity = grown, "Growing vector index");
            index
                .reserve(grown)
                .map_err(|e| VectorError::Index(e.to_string()))?;
        }
        index
            .add(key, vector)
            .map_err(|e| VectorError::Index(e.to_string()))?;

        debug!(key = key, "Added vector");
        Ok(())
    }

    #[allow(clippy::readonly_write_lock)]
    pub fn remove(&self, key: u64) -> Result<bool, VectorError> {
        let index = self.write()?;
        let removed = index
            .remove(key)
            .map_err(|e| VectorError::Index(e.to_string()))?;
        Ok(removed > 0)
    }

    /// Search for the k nearest keys accepted by `keep`, best first.
    pub fn search<F>(&self, query: &[f32], k: usize, keep: F) -> Result<Vec<KeyHit>, VectorError>
    where
        F: Fn(u64) -> bool,
    {
        check_dimension(query.len(), self.config.dimension)?;

        let index = self.read()?;
        if k == 0 || index.size() == 0 {
            return Ok(Vec::new());
        }

        let matches = index
            .filtered_search(query, k, keep)
            .map_err(|e| VectorError::Index(e.to_string()))?;

        let hits: Vec<KeyHit> = matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .map(|(&key, &dist)| KeyHit {
                key,
                score: 1.0 - dist,
            })
            .collect();

        debug!(k = k, found = hits.len(), "Search complete");
        Ok(hits)
    }

    pub fn save(&self) -> Result<(), VectorError> {
        let index = self.read()?;
        let path = self.index_file();
        index
            .save(path_str(&path)?)
            .map_err(|e| VectorError::Index(format!("Failed to save: {}", e)))?;

        info!(path = ?path, vectors = index.size(), "Saved vector index");
        Ok(())
    }
}

fn path_str(path: &std::path::Path) -> Result<&str, VectorError> {
    path.to_str()
        .ok_or_else(|| VectorError::Index("Invalid path encoding".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use tempfile::TempDir;

    fn random_vector(dim: usize) -> Vec<f32> {
        let mut rng = rand::rng();
        (0..dim).map(|_| rng.random()).collect()
    }

    #[test]
    fn test_add_and_search() {
        let temp = TempDir::new().unwrap();
        let index =
            HnswIndex::open_or_create(HnswConfig::new(32, temp.path()).with_capacity(16)).unwrap();

        for key in 0..10 {
            index.add(key, &random_vector(32)).unwrap();
        }
        assert_eq!(index.len().unwrap(), 10);

        let hits = index.search(&random_vector(32), 5, |_| true).unwrap();
        assert_eq!(hits.len(), 5);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_filtered_search() {
        let temp = TempDir::new().unwrap();
        let index = HnswIndex::open_or_create(HnswConfig::new(16, temp.path())).unwrap();
        for key in 0..20 {
            index.add(key, &random_vector(16)).unwrap();
        }

        let hits = index.search(&random_vector(16), 20, |key| key % 2 == 0).unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.key % 2 == 0));
    }

    #[test]
    fn test_grows_past_capacity() {
        let temp = TempDir::new().unwrap();
        let index =
            HnswIndex::open_or_create(HnswConfig::new(8, temp.path()).with_capacity(2)).unwrap();
        for key in 0..9 {
            index.add(key, &random_vector(8)).unwrap();
        }
        assert_eq!(index.len().unwrap(), 9);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let config = HnswConfig::new(16, temp.path()).with_capacity(10);
        {
            let index = HnswIndex::open_or_create(config.clone()).unwrap();
            for key in 0..5 {
                index.add(key, &random_vector(16)).unwrap();
            }
            index.save().unwrap();
        }

        let index = HnswIndex::open_or_create(config).unwrap();
        assert_eq!(index.len().unwrap(), 5);
        assert!(index.contains(3).unwrap());
    }

    #[test]
    fn test_remove_and_dimension_mismatch() {
        let temp = TempDir::new().unwrap();
        let index = HnswIndex::open_or_create(HnswConfig::new(16, temp.path())).unwrap();

        index.add(42, &random_vector(16)).unwrap();
        assert!(index.remove(42).unwrap());
        assert!(!index.contains(42).unwrap());

        assert!(matches!(
            index.add(1, &random_vector(8)),
            Err(VectorError::DimensionMismatch { .. })
        ));
    }
}
