//! Deterministic row subsampling.

use arrow::array::UInt32Array;
use arrow::record_batch::RecordBatch;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::Result;
use crate::utils;

/// Draw a `round(density * n)` row subsample without replacement.
///
/// The draw is seeded, so the same seed and density reproduce the exact row
/// subset. Selected rows keep their original relative order, which makes the
/// output independent of the draw order and stable across runs.
pub fn subsample(batch: &RecordBatch, density: f64, random_seed: u64) -> Result<RecordBatch> {
    let n = batch.num_rows();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let amount = ((density * n as f64).round() as usize).min(n);

    let mut rng = StdRng::seed_from_u64(random_seed);
    let mut indices = rand::seq::index::sample(&mut rng, n, amount).into_vec();
    indices.sort_unstable();

    log::debug!("Subsampled {amount} of {n} rows (density {density}, seed {random_seed})");
    #[allow(clippy::cast_possible_truncation)]
    let indices = UInt32Array::from_iter_values(indices.iter().map(|&i| i as u32));
    utils::take_batch(batch, &indices)
}
