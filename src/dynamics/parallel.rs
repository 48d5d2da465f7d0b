//! Data-parallel row passes. Rows own disjoint blocks of a slab, so a pass can hand each row
//! to a different worker.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::core::soa::{ChainRowMut, ChainSlab};

/// Runs `f` on every row of `slab`, using rayon when available and `parallel` is set.
pub fn for_each_row<F>(slab: &mut ChainSlab, parallel: bool, f: F)
where
    F: Fn(ChainRowMut<'_>) + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        if parallel {
            slab.par_rows_mut().for_each(f);
            return;
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    slab.rows_mut().for_each(f);
}

/// Runs `f` on every row of every slab.
pub fn for_each_row_in<F>(slabs: &mut [ChainSlab], parallel: bool, f: F)
where
    F: Fn(ChainRowMut<'_>) + Send + Sync,
{
    for slab in slabs {
        for_each_row(slab, parallel, &f);
    }
}
