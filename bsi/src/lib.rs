// A bit-sliced index (BSI) maps a sparse set of u64 column ids to signed
// i64 values by storing one bitmap per value bit plus an existence bitmap:
//
//   E        -- existence mask: c in E iff c has an assigned value
//   B[0]     -- bit 0 of each assigned value
//   B[1]     -- bit 1
//   ...
//   B[k-1]   -- bit k-1 (the sign bit, two's complement, iff k == 64)
//
// GetValue(c) reconstructs v = sum( [c in B[j]] * 2^j ) for c in E, and
// reports "no value" otherwise. Because the value is spread bit-by-bit
// across k bitmaps rather than packed per-column, range and equality
// predicates can be evaluated by walking planes from the high bit down,
// without ever materializing the decoded value -- the same trick that
// makes bit-sliced indexes a fast predicate-pushdown structure for
// analytical column stores.
//
// Module layout, leaves first:
//   container   -- the Bsi struct itself: construction, SetValue/GetValue,
//                   Equals, size accounting, RunOptimize.
//   predicate   -- CompareValue (<, <=, ==, >=, >, RANGE) and BatchEqual.
//   aggregate   -- Sum, MinMax, Transpose, TransposeWithCounts.
//   arithmetic  -- in-place Add / Increment via ripple-carry plane XOR/AND.
//   setops      -- ClearValues, Retain, NewBSIRetainSet, ParOr.
//   exec        -- the parallel fork-join executor the other modules share.
//   io          -- the byte-array and stream wire formats.

#![allow(clippy::len_without_is_empty)]

mod aggregate;
mod arithmetic;
mod container;
mod exec;
mod io;
mod predicate;
mod setops;

pub use aggregate::{MinMaxOp, SumResult};
pub use bsi_base::{Bitmap, Error, Result};
pub use container::Bsi;
pub use predicate::Operation;
