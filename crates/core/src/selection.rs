use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::model::{Question, QuestionSet};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
    #[error("no questions available to select from")]
    EmptyPool,

    #[error("pool size must be >= 1")]
    ZeroPoolSize,
}

/// Where the questions of a selection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionTier {
    /// A fixed, numbered set (or final-pool chunk) in stored order.
    Fixed(u32),
    /// Uniform random draw from the whole pool.
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub questions: Vec<Question>,
    pub tier: SelectionTier,
    /// 1-based number of the attempt this selection is for.
    pub attempt_number: u32,
}

impl Selection {
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Three-tier question rotation across retakes.
///
/// Attempt 1 gets the first tier, attempt 2 the second tier when one exists,
/// and every later attempt a random draw over the union of all tiers. A tier
/// shorter than the pool size is topped up from the rest of the union. When
/// the union itself is smaller than the pool, the whole union is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptSelector {
    pool_size: usize,
}

impl AttemptSelector {
    /// # Errors
    ///
    /// Returns `SelectionError::ZeroPoolSize` for a zero pool size.
    pub fn new(pool_size: usize) -> Result<Self, SelectionError> {
        if pool_size == 0 {
            return Err(SelectionError::ZeroPoolSize);
        }
        Ok(Self { pool_size })
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Knowledge-check selection over one module's sets.
    ///
    /// Sets are ordered by set number; the lowest set is the first tier.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::EmptyPool` if the sets hold no questions.
    pub fn select<R: Rng + ?Sized>(
        &self,
        sets: &[QuestionSet],
        prior_attempts: u32,
        rng: &mut R,
    ) -> Result<Selection, SelectionError> {
        let mut ordered: Vec<&QuestionSet> = sets.iter().collect();
        ordered.sort_by_key(|s| s.set_number());

        let tiers: Vec<(u32, Vec<&Question>)> = ordered
            .iter()
            .map(|s| (s.set_number(), s.questions().iter().collect()))
            .collect();
        let union = union_of(ordered.iter().flat_map(|s| s.questions()));
        self.pick(&tiers, union, prior_attempts, rng)
    }

    /// Final-assessment selection over the pools of every content module.
    ///
    /// The union (in module, set, position order) is cut into chunks of the
    /// pool size. Chunk 1 is the first tier and chunk 2 the second, the
    /// latter only when it is a full chunk.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::EmptyPool` if the pool holds no questions.
    pub fn select_final<R: Rng + ?Sized>(
        &self,
        pool: &[QuestionSet],
        prior_attempts: u32,
        rng: &mut R,
    ) -> Result<Selection, SelectionError> {
        let mut ordered: Vec<&QuestionSet> = pool.iter().collect();
        ordered.sort_by_key(|s| (s.module(), s.set_number()));

        let union = union_of(ordered.iter().flat_map(|s| s.questions()));
        let tiers: Vec<(u32, Vec<&Question>)> = union
            .chunks(self.pool_size)
            .take(2)
            .enumerate()
            .filter(|(i, chunk)| *i == 0 || chunk.len() == self.pool_size)
            .map(|(i, chunk)| (i as u32 + 1, chunk.to_vec()))
            .collect();
        self.pick(&tiers, union, prior_attempts, rng)
    }

    fn pick<'a, R: Rng + ?Sized>(
        &self,
        tiers: &[(u32, Vec<&'a Question>)],
        mut union: Vec<&'a Question>,
        prior_attempts: u32,
        rng: &mut R,
    ) -> Result<Selection, SelectionError> {
        if union.is_empty() {
            return Err(SelectionError::EmptyPool);
        }
        let attempt_number = prior_attempts.saturating_add(1);

        let fixed = match prior_attempts {
            0 => tiers.first(),
            1 => tiers.get(1),
            _ => None,
        };

        let (questions, tier) = match fixed {
            Some((set_number, tier_questions)) => {
                let mut chosen: Vec<&Question> =
                    tier_questions.iter().take(self.pool_size).copied().collect();
                if chosen.len() < self.pool_size {
                    let taken: HashSet<_> = chosen.iter().map(|q| q.id()).collect();
                    let mut rest: Vec<&Question> = union
                        .into_iter()
                        .filter(|q| !taken.contains(&q.id()))
                        .collect();
                    rest.shuffle(rng);
                    rest.truncate(self.pool_size - chosen.len());
                    chosen.extend(rest);
                }
                (chosen, SelectionTier::Fixed(*set_number))
            }
            None => {
                union.shuffle(rng);
                union.truncate(self.pool_size);
                (union, SelectionTier::Random)
            }
        };

        Ok(Selection {
            questions: questions.into_iter().cloned().collect(),
            tier,
            attempt_number,
        })
    }
}

/// Questions in order of first appearance, without repeated ids.
fn union_of<'a>(questions: impl Iterator<Item = &'a Question>) -> Vec<&'a Question> {
    let mut seen = HashSet::new();
    questions.filter(|q| seen.insert(q.id())).collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModuleId, OptionLabel, QuestionId};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn question(id: u64) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Question {id}?"),
            ["a".into(), "b".into(), "c".into(), "d".into()],
            OptionLabel::C,
            "explained",
        )
        .unwrap()
    }

    fn set(module: u64, set_number: u32, ids: std::ops::RangeInclusive<u64>) -> QuestionSet {
        QuestionSet::new(
            ModuleId::new(module),
            set_number,
            ids.map(question).collect(),
        )
        .unwrap()
    }

    fn ids(selection: &Selection) -> Vec<u64> {
        selection.questions.iter().map(|q| q.id().value()).collect()
    }

    fn two_sets() -> Vec<QuestionSet> {
        vec![set(1, 2, 6..=10), set(1, 1, 1..=5)]
    }

    #[test]
    fn first_attempt_is_set_one_regardless_of_seed() {
        let selector = AttemptSelector::new(5).unwrap();
        let a = selector
            .select(&two_sets(), 0, &mut StdRng::seed_from_u64(1))
            .unwrap();
        let b = selector
            .select(&two_sets(), 0, &mut StdRng::seed_from_u64(999))
            .unwrap();
        assert_eq!(ids(&a), vec![1, 2, 3, 4, 5]);
        assert_eq!(a, b);
        assert_eq!(a.tier, SelectionTier::Fixed(1));
        assert_eq!(a.attempt_number, 1);
    }

    #[test]
    fn second_attempt_uses_set_two() {
        let selector = AttemptSelector::new(5).unwrap();
        let selection = selector
            .select(&two_sets(), 1, &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(ids(&selection), vec![6, 7, 8, 9, 10]);
        assert_eq!(selection.tier, SelectionTier::Fixed(2));
    }

    #[test]
    fn third_attempt_draws_from_union() {
        let selector = AttemptSelector::new(5).unwrap();
        let selection = selector
            .select(&two_sets(), 2, &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(selection.tier, SelectionTier::Random);
        assert_eq!(selection.len(), 5);
        let unique: HashSet<u64> = ids(&selection).into_iter().collect();
        assert_eq!(unique.len(), 5);
        assert!(unique.iter().all(|id| (1..=10).contains(id)));
    }

    #[test]
    fn single_set_falls_back_to_random_on_second_attempt() {
        let selector = AttemptSelector::new(5).unwrap();
        let sets = vec![set(1, 1, 1..=5)];
        let selection = selector
            .select(&sets, 1, &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert_eq!(selection.tier, SelectionTier::Random);
        assert_eq!(selection.len(), 5);
    }

    #[test]
    fn exhausted_single_set_returns_full_pool_without_error() {
        let selector = AttemptSelector::new(5).unwrap();
        let sets = vec![set(1, 1, 1..=3)];
        for prior in 2..6 {
            let selection = selector
                .select(&sets, prior, &mut StdRng::seed_from_u64(u64::from(prior)))
                .unwrap();
            let mut got = ids(&selection);
            got.sort_unstable();
            assert_eq!(got, vec![1, 2, 3]);
        }
    }

    #[test]
    fn short_tier_is_topped_up_from_union() {
        let selector = AttemptSelector::new(5).unwrap();
        let sets = vec![set(1, 1, 1..=3), set(1, 2, 4..=9)];
        let selection = selector
            .select(&sets, 0, &mut StdRng::seed_from_u64(11))
            .unwrap();
        let got = ids(&selection);
        assert_eq!(&got[..3], &[1, 2, 3]);
        assert_eq!(got.len(), 5);
        assert!(got[3..].iter().all(|id| (4..=9).contains(id)));
    }

    #[test]
    fn empty_pool_is_an_error() {
        let selector = AttemptSelector::new(5).unwrap();
        let err = selector
            .select(&[], 0, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert_eq!(err, SelectionError::EmptyPool);
        assert_eq!(
            AttemptSelector::new(0).unwrap_err(),
            SelectionError::ZeroPoolSize
        );
    }

    #[test]
    fn final_selection_chunks_the_union() {
        let selector = AttemptSelector::new(4).unwrap();
        let pool = vec![set(2, 1, 5..=7), set(1, 1, 1..=4), set(3, 1, 8..=9)];

        let first = selector
            .select_final(&pool, 0, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(ids(&first), vec![1, 2, 3, 4]);

        let second = selector
            .select_final(&pool, 1, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(ids(&second), vec![5, 6, 7, 8]);
        assert_eq!(second.tier, SelectionTier::Fixed(2));

        let third = selector
            .select_final(&pool, 2, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(third.tier, SelectionTier::Random);
        assert_eq!(third.len(), 4);
    }

    #[test]
    fn final_second_tier_requires_a_full_chunk() {
        let selector = AttemptSelector::new(4).unwrap();
        let pool = vec![set(1, 1, 1..=6)];
        let second = selector
            .select_final(&pool, 1, &mut StdRng::seed_from_u64(5))
            .unwrap();
        assert_eq!(second.tier, SelectionTier::Random);
    }
}
