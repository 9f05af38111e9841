// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles the training rows with a seeded RNG and carves off
// a validation partition.
//
//   - Validation size = ceil(total * val_fraction), so even a
//     tiny dataset keeps at least one validation row
//   - The remaining rows, in shuffled order, are for training
//   - The same seed always produces the same split
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.
//
// Reference: rand crate documentation (StdRng, SeedableRng)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation).
///
/// # Arguments
/// * `samples`      - All rows of the training source (consumed)
/// * `val_fraction` - Proportion for validation, e.g. 0.1 = 10%
/// * `seed`         - RNG seed; fixed for reproducible runs
pub fn split_train_val<T>(mut samples: Vec<T>, val_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total = samples.len();
    let n_val = ((total as f64) * val_fraction).ceil() as usize;
    // Clamp to valid range to avoid panics on tiny datasets
    let n_val = n_val.min(total);

    // Validation rows come first in the shuffled order
    let train = samples.split_off(n_val);

    tracing::debug!(
        "Dataset split (seed {}): {} training, {} validation",
        seed,
        train.len(),
        samples.len(),
    );

    (train, samples)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_size_rounds_up() {
        let items: Vec<usize> = (0..25).collect();
        let (train, val)      = split_train_val(items, 0.1, 42);
        // ceil(2.5) = 3
        assert_eq!(val.len(),   3);
        assert_eq!(train.len(), 22);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..50).collect();
        let (train, val)      = split_train_val(items, 0.1, 7);
        let mut all: Vec<usize> = train.into_iter().chain(val).collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = split_train_val((0..100).collect::<Vec<usize>>(), 0.1, 42);
        let b = split_train_val((0..100).collect::<Vec<usize>>(), 0.1, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, val)      = split_train_val(items, 0.1, 42);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }
}
