use crate::error::{ApiError, Result};
use crate::models::{Batch, IdentifierSet};

/// Split `items` into consecutive groups of at most `n`, keeping order.
/// Empty input gives zero groups.
///
/// # Panics
///
/// Panics if `n` is zero. [`build_batches`] checks this and returns an
/// error instead.
pub fn chunk<T: Clone>(items: &[T], n: usize) -> Vec<Vec<T>> {
    assert!(n > 0, "chunk size must be non-zero");
    items.chunks(n).map(|c| c.to_vec()).collect()
}

/// Pair hash group `i` with key group `i`. There is always at least one
/// batch, so a playlist with nothing valid still yields one empty batch.
pub fn build_batches(ids: &IdentifierSet, batch_size: usize) -> Result<Vec<Batch>> {
    if batch_size == 0 {
        return Err(ApiError::InvalidInput("batch size must be greater than zero".into()));
    }
    let hash_groups = chunk(&ids.hashes, batch_size);
    let key_groups = chunk(&ids.keys, batch_size);
    let total = hash_groups.len().max(key_groups.len()).max(1);

    let mut hash_groups = hash_groups.into_iter();
    let mut key_groups = key_groups.into_iter();
    let batches = (0..total)
        .map(|index| Batch {
            index,
            hashes: hash_groups.next().unwrap_or_default(),
            keys: key_groups.next().unwrap_or_default(),
        })
        .collect();
    Ok(batches)
}
