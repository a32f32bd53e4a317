//! Collision-checked node ids: `<YYYYMMDDHHMMSS><6 uppercase letters>`.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::graph::NodeId;

pub const ID_LEN: usize = 20;
const TIMESTAMP_LEN: usize = 14;
const SUFFIX_LEN: usize = 6;

type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Id source for one migration run.
///
/// The caller owns the set of ids already in use; uniqueness is only
/// guaranteed against that set.
pub struct IdGenerator {
    rng: StdRng,
    clock: Clock,
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator").finish_non_exhaustive()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            clock: Box::new(|| chrono::Local::now().naive_local()),
        }
    }

    /// Deterministic suffixes, for tests and reproducible migrations.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new()
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    fn candidate(&mut self) -> NodeId {
        let mut id = (self.clock)().format("%Y%m%d%H%M%S").to_string();
        id.extend((0..SUFFIX_LEN).map(|_| self.rng.gen_range(b'A'..=b'Z') as char));
        NodeId::new(id)
    }

    /// Draw candidates until one is not in `existing`.
    ///
    /// The caller must add the result to `existing` before the next call.
    pub fn generate(&mut self, existing: &HashSet<NodeId>) -> NodeId {
        loop {
            let candidate = self.candidate();
            if !existing.contains(&candidate) {
                return candidate;
            }
            tracing::trace!(id = %candidate, "id collision, retrying");
        }
    }

    /// [`generate`](Self::generate) and record the id in `existing`.
    pub fn generate_into(&mut self, existing: &mut HashSet<NodeId>) -> NodeId {
        let id = self.generate(existing);
        existing.insert(id.clone());
        id
    }
}

/// Whether `id` has the generated shape.
pub fn is_generated_id(id: &str) -> bool {
    id.len() == ID_LEN
        && id.as_bytes()[..TIMESTAMP_LEN].iter().all(u8::is_ascii_digit)
        && id.as_bytes()[TIMESTAMP_LEN..].iter().all(u8::is_ascii_uppercase)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use proptest::prelude::*;

    use super::*;

    fn fixed_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(14, 5, 7))
            .unwrap()
    }

    #[test]
    fn shape() {
        let mut generator = IdGenerator::seeded(7).with_clock(fixed_clock);
        let id = generator.generate(&HashSet::new());
        assert!(is_generated_id(id.as_str()), "{id}");
        assert!(id.as_str().starts_with("20240309140507"));
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = IdGenerator::seeded(42).with_clock(fixed_clock);
        let mut b = IdGenerator::seeded(42).with_clock(fixed_clock);
        assert_eq!(a.generate(&HashSet::new()), b.generate(&HashSet::new()));
    }

    #[test]
    fn retries_past_existing() {
        let mut probe = IdGenerator::seeded(1).with_clock(fixed_clock);
        let first = probe.generate(&HashSet::new());

        let mut generator = IdGenerator::seeded(1).with_clock(fixed_clock);
        let existing = HashSet::from([first.clone()]);
        let id = generator.generate(&existing);
        assert_ne!(id, first);
    }

    proptest! {
        #[test]
        fn batch_is_pairwise_distinct(seed in any::<u64>(), n in 1usize..300, preexisting in 0usize..20) {
            let mut generator = IdGenerator::seeded(seed).with_clock(fixed_clock);
            let mut initial = HashSet::new();
            for _ in 0..preexisting {
                generator.generate_into(&mut initial);
            }
            let mut existing = initial.clone();
            let mut produced = Vec::with_capacity(n);
            for _ in 0..n {
                produced.push(generator.generate_into(&mut existing));
            }
            let distinct: HashSet<_> = produced.iter().collect();
            prop_assert_eq!(distinct.len(), n);
            prop_assert!(produced.iter().all(|id| !initial.contains(id)));
        }
    }
}
