//! In-memory similarity index.
//!
//! An [`IndexSnapshot`] is an `(N, D)` matrix of unit vectors plus the parallel list of
//! the N items that contributed a row. [`IndexCache`] hands out shared snapshots and
//! rebuilds a fresh one, off to the side, whenever the catalog has changed since the
//! current snapshot was built. Snapshots are never mutated after construction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use ndarray::{Array2, ArrayView1};

use super::store::CatalogStore;
use super::types::CatalogItem;
use crate::embedding::{codec, l2_normalize};
use crate::error::{CapError, Result};

/// Immutable matrix/item pair. Row `i` of `matrix` belongs to `items[i]`.
#[derive(Debug)]
pub struct IndexSnapshot {
    matrix: Array2<f32>,
    items: Vec<CatalogItem>,
    epoch: u64,
    skipped: usize,
}

impl IndexSnapshot {
    pub fn empty(dimensions: usize) -> Self {
        Self {
            matrix: Array2::zeros((0, dimensions)),
            items: Vec::new(),
            epoch: 0,
            skipped: 0,
        }
    }

    /// Decode stored rows into a snapshot. Rows whose blob has the wrong length or holds
    /// NaN/infinite values are skipped with a warning; every kept row is re-normalized after the `f16` round trip.
    pub fn build(rows: Vec<(CatalogItem, Vec<u8>)>, dimensions: usize, epoch: u64) -> Self {
        let mut vectors = Vec::with_capacity(rows.len());
        let mut items = Vec::with_capacity(rows.len());
        let mut skipped = 0;

        for (item, blob) in rows {
            match codec::decode(&blob, dimensions) {
                Ok(v) if v.iter().all(|x| x.is_finite()) => {
                    vectors.push(l2_normalize(&v));
                    items.push(item);
                }
                Ok(_) => {
                    tracing::warn!(id = item.id, "skipping embedding with non-finite values");
                    skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(id = item.id, error = %e, "skipping corrupt embedding");
                    skipped += 1;
                }
            }
        }

        let mut matrix = Array2::<f32>::zeros((vectors.len(), dimensions));
        for (mut row, v) in matrix.rows_mut().into_iter().zip(&vectors) {
            row.assign(&ArrayView1::from(v.as_slice()));
        }

        Self {
            matrix,
            items,
            epoch,
            skipped,
        }
    }

    pub fn matrix(&self) -> &Array2<f32> {
        &self.matrix
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.matrix.ncols()
    }

    /// Rows left out because their stored embedding was corrupt.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Lazily built, shared index over the catalog's embeddings.
///
/// `invalidate` bumps an epoch counter; a snapshot is current only while its epoch
/// matches, so an invalidation that lands mid-rebuild forces another rebuild.
#[derive(Debug)]
pub struct IndexCache {
    dimensions: usize,
    current: RwLock<Option<Arc<IndexSnapshot>>>,
    epoch: AtomicU64,
    rebuild: Mutex<()>,
    builds: AtomicU64,
}

impl IndexCache {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            current: RwLock::new(None),
            epoch: AtomicU64::new(0),
            rebuild: Mutex::new(()),
            builds: AtomicU64::new(0),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Mark the index stale. Cheap; the next `ensure_loaded` rebuilds.
    pub fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Number of rebuilds performed so far.
    pub fn rebuild_count(&self) -> u64 {
        self.builds.load(Ordering::SeqCst)
    }

    /// Whether a current (non-stale) snapshot is loaded.
    pub fn is_loaded(&self) -> bool {
        matches!(self.fresh(), Ok(Some(_)))
    }

    fn fresh(&self) -> Result<Option<Arc<IndexSnapshot>>> {
        let epoch = self.epoch();
        let guard = self.current.read().map_err(|_| CapError::LockPoisoned)?;
        Ok(guard
            .as_ref()
            .filter(|snapshot| snapshot.epoch == epoch)
            .map(Arc::clone))
    }

    /// Return the current snapshot, rebuilding it from `store` if it is missing or stale.
    ///
    /// Readers holding an older snapshot keep using it; the new one is swapped in whole.
    pub fn ensure_loaded(&self, store: &CatalogStore) -> Result<Arc<IndexSnapshot>> {
        if let Some(snapshot) = self.fresh()? {
            return Ok(snapshot);
        }

        let _rebuilding = self.rebuild.lock().map_err(|_| CapError::LockPoisoned)?;
        // Another caller may have finished a rebuild while we waited.
        if let Some(snapshot) = self.fresh()? {
            return Ok(snapshot);
        }

        let epoch = self.epoch();
        let rows = store.rows_with_embeddings()?;
        let snapshot = Arc::new(IndexSnapshot::build(rows, self.dimensions, epoch));

        *self.current.write().map_err(|_| CapError::LockPoisoned)? = Some(Arc::clone(&snapshot));
        self.builds.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(
            rows = snapshot.len(),
            skipped = snapshot.skipped(),
            epoch,
            "index rebuilt"
        );
        Ok(snapshot)
    }
}
