//! Presentation ordering.
//!
//! New items are mailed in random order so the digest does not simply mirror
//! whichever feed was listed first.  The random source is passed in by the
//! caller; production uses a per-run entropy-seeded [`rand::rngs::StdRng`],
//! tests use a fixed seed.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::source::CandidateItem;

/// Uniform random permutation (Fisher-Yates) of `items`.
pub fn shuffle<T, R>(mut items: Vec<T>, rng: &mut R) -> Vec<T>
where
    R: Rng + ?Sized,
{
    items.shuffle(rng);
    items
}

/// The ordered items selected for one digest.
///
/// Only built from a delta, so every member was absent from the ledger at
/// selection time.
#[derive(Debug, Clone)]
pub struct DigestBatch {
    items: Vec<CandidateItem>,
}

impl DigestBatch {
    /// Shuffle `delta` into presentation order.
    pub fn shuffled<R: Rng + ?Sized>(delta: Vec<CandidateItem>, rng: &mut R) -> Self {
        Self {
            items: shuffle(delta, rng),
        }
    }

    pub fn items(&self) -> &[CandidateItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Identifiers to record in the ledger once the batch is delivered.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::make_item;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let input: Vec<u32> = (0..20).collect();

        let mut output = shuffle(input.clone(), &mut rng);
        assert_eq!(output.len(), input.len());
        output.sort_unstable();
        assert_eq!(output, input);
    }

    #[test]
    fn shuffle_does_not_always_keep_input_order() {
        let mut rng = StdRng::seed_from_u64(42);
        let input = vec!['a', 'b', 'c', 'd'];

        let reordered = (0..50)
            .filter(|_| shuffle(input.clone(), &mut rng) != input)
            .count();
        assert!(reordered > 0, "50 shuffles all kept the original order");
    }

    #[test]
    fn shuffle_reaches_every_position() {
        // First element should land in each slot at least once.
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = [false; 3];
        for _ in 0..200 {
            let out = shuffle(vec![0, 1, 2], &mut rng);
            let pos = out.iter().position(|&x| x == 0).unwrap();
            seen[pos] = true;
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn shuffle_handles_empty_and_single() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(shuffle(Vec::<u8>::new(), &mut rng).is_empty());
        assert_eq!(shuffle(vec![9], &mut rng), vec![9]);
    }

    #[test]
    fn batch_exposes_ids_of_every_item() {
        let mut rng = StdRng::seed_from_u64(3);
        let batch = DigestBatch::shuffled(
            vec![make_item("x", "X"), make_item("y", "Y"), make_item("z", "Z")],
            &mut rng,
        );

        let mut ids: Vec<&str> = batch.ids().collect();
        ids.sort_unstable();
        assert_eq!(ids, ["x", "y", "z"]);
        assert_eq!(batch.len(), 3);
    }
}
