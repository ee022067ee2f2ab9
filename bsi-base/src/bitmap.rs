// A thin wrapper over a real compressed 64-bit bitmap, so the rest of this
// crate depends on a fixed, narrow surface (contains/insert/remove, the
// boolean set algebra, cardinality, iteration, and stream (de)serialization)
// rather than on the backing crate directly.
//
// Column ids are unsigned and can range over the full 64-bit space, so this
// wraps a treemap-flavoured roaring bitmap rather than the 32-bit one.

use std::io::{Read, Write};

use rayon::prelude::*;
use roaring::RoaringTreemap;

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct Bitmap(RoaringTreemap);

impl Bitmap {
    pub fn new() -> Self {
        Bitmap(RoaringTreemap::new())
    }

    pub fn contains(&self, id: u64) -> bool {
        self.0.contains(id)
    }

    pub fn insert(&mut self, id: u64) -> bool {
        self.0.insert(id)
    }

    pub fn remove(&mut self, id: u64) -> bool {
        self.0.remove(id)
    }

    pub fn len(&self) -> u64 {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn or_inplace(&mut self, other: &Self) {
        self.0 |= &other.0;
    }

    pub fn and_inplace(&mut self, other: &Self) {
        self.0 &= &other.0;
    }

    pub fn xor_inplace(&mut self, other: &Self) {
        self.0 ^= &other.0;
    }

    pub fn and_not_inplace(&mut self, other: &Self) {
        self.0 -= &other.0;
    }

    pub fn and(&self, other: &Self) -> Self {
        Bitmap(&self.0 & &other.0)
    }

    pub fn or(&self, other: &Self) -> Self {
        Bitmap(&self.0 | &other.0)
    }

    pub fn xor(&self, other: &Self) -> Self {
        Bitmap(&self.0 ^ &other.0)
    }

    pub fn and_not(&self, other: &Self) -> Self {
        Bitmap(&self.0 - &other.0)
    }

    pub fn and_cardinality(&self, other: &Self) -> u64 {
        self.0.intersection_len(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.iter()
    }

    /// Bulk iterator: fills `buf` with up to `buf.len()` column ids at or
    /// after `from`, in ascending order, and returns how many were written.
    /// Mirrors the compressed-bitmap library's "NextMany"-style chunked
    /// iterator, which callers use to avoid per-id dynamic dispatch.
    pub fn next_many(&self, from: u64, buf: &mut [u64]) -> usize {
        let mut n = 0;
        for v in self.0.iter().skip_while(|&v| v < from) {
            if n >= buf.len() {
                break;
            }
            buf[n] = v;
            n += 1;
        }
        n
    }

    /// Advisory run-length compression directive. The roaring-rs backend
    /// this adapter wraps only implements array and bitmap containers, not
    /// run containers, so there is nothing to do here; the method exists so
    /// callers (and `Bsi::run_optimize`) have a stable place to invoke it if
    /// a future backend adds run-container support.
    pub fn run_optimize(&mut self) {}

    pub fn size_in_bytes(&self) -> usize {
        self.0.serialized_size()
    }

    pub fn serialize_into<W: Write>(&self, w: W) -> std::io::Result<()> {
        self.0.serialize_into(w)
    }

    pub fn deserialize_from<R: Read>(r: R) -> std::io::Result<Self> {
        Ok(Bitmap(RoaringTreemap::deserialize_from(r)?))
    }
}

impl FromIterator<u64> for Bitmap {
    fn from_iter<T: IntoIterator<Item = u64>>(iter: T) -> Self {
        Bitmap(RoaringTreemap::from_iter(iter))
    }
}

/// Parallel union over any number of bitmaps, reduced via a work-stealing
/// pool rather than a sequential fold.
pub fn parallel_or(bitmaps: &[&Bitmap]) -> Bitmap {
    bitmaps
        .par_iter()
        .map(|b| (*b).clone())
        .reduce(Bitmap::new, |mut a, b| {
            a.or_inplace(&b);
            a
        })
}
