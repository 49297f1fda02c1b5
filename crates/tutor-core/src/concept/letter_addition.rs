use super::{Concept, ConceptError, StateActionValues};
use crate::action::{ActionCosts, ItemId, ModelKind, NoiseParams, Observation};
use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::Arc;

const MIN_LETTERS: usize = 2;

/// Letters `A, B, ...` bound to a permutation of `0..n`, taught through pairwise sums.
///
/// Hypotheses are all permutations of `0..n` in lexicographic order; items are the
/// unordered letter pairs `(i, j)` with `i < j`, also in lexicographic order.
#[derive(Debug, Clone)]
pub struct LetterAddition {
    assignment: Vec<Observation>,
    hypotheses: Vec<Vec<Observation>>,
    pairs: Vec<(usize, usize)>,
    prior: Vec<f64>,
    observations: Vec<Observation>,
    true_index: usize,
    values: Arc<StateActionValues>,
}

impl LetterAddition {
    /// Draws a random assignment for `letters` letters.
    pub fn new<R: Rng + ?Sized>(letters: usize, rng: &mut R) -> Result<Self, ConceptError> {
        let mut assignment: Vec<Observation> = (0..letters as Observation).collect();
        assignment.shuffle(rng);
        Self::with_assignment(assignment)
    }

    /// Uses `assignment[i]` as the number of the i-th letter.
    pub fn with_assignment(assignment: Vec<Observation>) -> Result<Self, ConceptError> {
        let letters = assignment.len();
        if letters < MIN_LETTERS {
            return Err(ConceptError::TooFewLetters {
                min: MIN_LETTERS,
                found: letters,
            });
        }

        let mut sorted = assignment.clone();
        sorted.sort_unstable();
        if sorted
            .iter()
            .enumerate()
            .any(|(idx, value)| *value != idx as Observation)
        {
            return Err(ConceptError::InvalidAssignment(assignment));
        }

        let hypotheses = all_permutations(letters);
        let true_index = hypotheses
            .iter()
            .position(|candidate| *candidate == assignment)
            .ok_or_else(|| ConceptError::InvalidAssignment(assignment.clone()))?;

        let mut pairs = Vec::with_capacity(letters * (letters - 1) / 2);
        for first in 0..letters {
            for second in first + 1..letters {
                pairs.push((first, second));
            }
        }

        let max_sum = 2 * letters as Observation - 3;
        let observations = (1..=max_sum).collect();
        let prior = vec![1.0 / hypotheses.len() as f64; hypotheses.len()];
        let values = StateActionValues::build(pairs.len(), &hypotheses, |item, hypothesis| {
            let (a, b) = pairs[item];
            hypothesis[a] + hypothesis[b]
        });

        Ok(Self {
            assignment,
            hypotheses,
            pairs,
            prior,
            observations,
            true_index,
            values: Arc::new(values),
        })
    }

    pub fn letter_count(&self) -> usize {
        self.assignment.len()
    }

    /// The true number of every letter.
    pub fn assignment(&self) -> &[Observation] {
        &self.assignment
    }

    /// Letter indices added by `item`.
    pub fn pair(&self, item: ItemId) -> (usize, usize) {
        self.pairs[item]
    }

    /// Item id of the pair `(a, b)` in either order.
    pub fn item_for_pair(&self, a: usize, b: usize) -> Option<ItemId> {
        let key = (a.min(b), a.max(b));
        self.pairs.iter().position(|pair| *pair == key)
    }

    pub fn letter(index: usize) -> char {
        (b'A' + index as u8) as char
    }
}

impl Concept for LetterAddition {
    type Hypothesis = Vec<Observation>;

    fn hypothesis_space(&self) -> &[Self::Hypothesis] {
        &self.hypotheses
    }

    fn true_hypothesis_index(&self) -> usize {
        self.true_index
    }

    fn default_prior(&self) -> &[f64] {
        &self.prior
    }

    fn item_count(&self) -> usize {
        self.pairs.len()
    }

    fn evaluate(&self, item: ItemId, hypothesis: &Self::Hypothesis) -> Observation {
        let (a, b) = self.pairs[item];
        hypothesis[a] + hypothesis[b]
    }

    fn observation_space(&self) -> &[Observation] {
        &self.observations
    }

    fn action_costs(&self) -> ActionCosts {
        ActionCosts::new(7.0, 6.6, 12.0)
    }

    fn noise(&self, model: ModelKind) -> NoiseParams {
        match model {
            ModelKind::Memoryless => NoiseParams::new(0.15, 0.019),
            ModelKind::Discrete => NoiseParams::new(0.34, 0.046),
            ModelKind::Continuous => NoiseParams::new(0.14, 0.12),
        }
    }

    fn state_action_values(&self) -> &Arc<StateActionValues> {
        &self.values
    }

    fn describe_item(&self, item: ItemId, value: Option<Observation>) -> String {
        let (a, b) = self.pairs[item];
        let right = value.map_or_else(|| "?".to_string(), |v| v.to_string());
        format!("{} + {} = {}", Self::letter(a), Self::letter(b), right)
    }
}

/// All permutations of `0..n` in lexicographic order.
fn all_permutations(n: usize) -> Vec<Vec<Observation>> {
    let mut current: Vec<Observation> = (0..n as Observation).collect();
    let mut out = vec![current.clone()];
    while next_permutation(&mut current) {
        out.push(current.clone());
    }
    out
}

fn next_permutation(data: &mut [Observation]) -> bool {
    if data.len() < 2 {
        return false;
    }
    let mut pivot = data.len() - 1;
    while pivot > 0 && data[pivot - 1] >= data[pivot] {
        pivot -= 1;
    }
    if pivot == 0 {
        return false;
    }
    let mut swap = data.len() - 1;
    while data[swap] <= data[pivot - 1] {
        swap -= 1;
    }
    data.swap(pivot - 1, swap);
    data[pivot..].reverse();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn three_letters_enumerate_six_permutations() {
        let concept = LetterAddition::with_assignment(vec![0, 2, 1]).unwrap();
        assert_eq!(
            concept.hypothesis_space(),
            &[
                vec![0, 1, 2],
                vec![0, 2, 1],
                vec![1, 0, 2],
                vec![1, 2, 0],
                vec![2, 0, 1],
                vec![2, 1, 0],
            ]
        );
        assert_eq!(concept.true_hypothesis_index(), 1);
        assert_eq!(concept.observation_space(), &[1, 2, 3]);
        assert_eq!(concept.item_count(), 3);
        assert_eq!(concept.pair(2), (1, 2));
    }

    #[test]
    fn readable_format_hides_unrevealed_value() {
        let concept = LetterAddition::with_assignment(vec![0, 3, 1, 4, 5, 2]).unwrap();
        let item = concept.item_for_pair(3, 0).unwrap();
        assert_eq!(concept.describe_item(item, Some(concept.true_value(item))), "A + D = 4");
        assert_eq!(concept.describe_item(item, None), "A + D = ?");
    }

    #[test]
    fn rejects_non_permutations() {
        assert!(matches!(
            LetterAddition::with_assignment(vec![0, 0, 1]),
            Err(ConceptError::InvalidAssignment(_))
        ));
        assert!(matches!(
            LetterAddition::with_assignment(vec![0]),
            Err(ConceptError::TooFewLetters { .. })
        ));
    }

    #[test]
    fn random_assignment_is_seeded() {
        let mut rng_a = SmallRng::seed_from_u64(123);
        let mut rng_b = SmallRng::seed_from_u64(123);
        let a = LetterAddition::new(6, &mut rng_a).unwrap();
        let b = LetterAddition::new(6, &mut rng_b).unwrap();
        assert_eq!(a.assignment(), b.assignment());
        assert_eq!(a.hypothesis_count(), 720);
        assert_eq!(a.default_prior().iter().sum::<f64>().round(), 1.0);
    }

    #[test]
    fn cache_matches_direct_evaluation() {
        let concept = LetterAddition::with_assignment(vec![2, 0, 3, 1]).unwrap();
        for item in concept.candidate_items() {
            for (idx, hypothesis) in concept.hypothesis_space().iter().enumerate() {
                assert_eq!(
                    concept.evaluate(item, hypothesis),
                    concept.evaluate_indexed(item, idx)
                );
            }
        }
    }
}
