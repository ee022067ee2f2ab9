//! A small fork-join executor shared by the aggregate and set-operation
//! modules. Work is split into independent shards, each shard is reduced on
//! a rayon worker thread, and the partial results are combined with a
//! caller-supplied associative reducer -- the same join-barrier-then-reduce
//! shape used throughout this crate instead of a channel-based pipeline.

use bsi_base::Bitmap;
use rayon::prelude::*;

/// Number of shards to split driver work into: one per available rayon
/// thread, capped so a tiny driver bitmap doesn't get sliced into shards
/// with nothing in them.
pub(crate) fn effective_parallelism(cardinality: u64) -> usize {
    let threads = rayon::current_num_threads().max(1);
    threads.min(cardinality.max(1) as usize)
}

/// Splits `driver`'s column ids into `shard_count` roughly equal, ordered
/// chunks. Each shard is itself a `Bitmap`, so the caller can intersect it
/// against other bitmaps with the usual adapter methods.
pub(crate) fn shard_ids(driver: &Bitmap, shard_count: usize) -> Vec<Bitmap> {
    if shard_count <= 1 || driver.is_empty() {
        return vec![driver.clone()];
    }
    let ids: Vec<u64> = driver.iter().collect();
    let chunk = ids.len().div_ceil(shard_count);
    ids.chunks(chunk.max(1))
        .map(|c| c.iter().copied().collect())
        .collect()
}

/// Shards `driver`, maps each shard to a `Bitmap` with `f`, and reduces the
/// results with bitmap union. `f` runs once per shard on a rayon worker.
pub(crate) fn map_reduce_bitmap<F>(driver: &Bitmap, f: F) -> Bitmap
where
    F: Fn(&Bitmap) -> Bitmap + Sync,
{
    let shards = shard_ids(driver, effective_parallelism(driver.len()));
    shards
        .par_iter()
        .map(|shard| f(shard))
        .reduce(Bitmap::new, |mut a, b| {
            a.or_inplace(&b);
            a
        })
}

/// Shards `driver`, maps each shard to a `T` with `f`, and reduces the
/// results with the caller's associative `combine`. `zero` is the reduction
/// identity.
pub(crate) fn map_reduce<T, F, C>(driver: &Bitmap, zero: impl Fn() -> T + Sync, f: F, combine: C) -> T
where
    T: Send,
    F: Fn(&Bitmap) -> T + Sync,
    C: Fn(T, T) -> T + Sync + Send,
{
    let shards = shard_ids(driver, effective_parallelism(driver.len()));
    shards
        .par_iter()
        .map(|shard| f(shard))
        .reduce(&zero, &combine)
}
