use super::{Concept, ConceptError, StateActionValues};
use crate::action::{ActionCosts, ItemId, ModelKind, NoiseParams, Observation};
use core::fmt;
use rand::RngCore;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

const MAX_NUMBER: u32 = 100;
const ERLANG_SIGMA: f64 = 10.0;
const ASSESSMENT_PER_SIDE: usize = 5;
const PRIMES: [u32; 25] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

/// A candidate rule describing which numbers in `1..=100` belong to the concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberRule {
    Odd,
    Even,
    Square,
    Cube,
    Primes,
    Multiples(u32),
    /// Numbers `n` with `n % of == of - minus`.
    MultiplesMinus { of: u32, minus: u32 },
    Powers { base: u32, include_zero: bool },
    Ending(u32),
    Interval { start: u32, end: u32 },
}

impl NumberRule {
    pub fn contains(&self, number: u32) -> bool {
        match *self {
            NumberRule::Odd => number % 2 == 1,
            NumberRule::Even => number % 2 == 0,
            NumberRule::Square => is_power_of_root(number, 2),
            NumberRule::Cube => is_power_of_root(number, 3),
            NumberRule::Primes => PRIMES.contains(&number),
            NumberRule::Multiples(of) => number % of == 0,
            NumberRule::MultiplesMinus { of, minus } => number % of == of - minus,
            NumberRule::Powers { base, include_zero } => {
                let mut power = if include_zero { 1 } else { base };
                while power < number {
                    power *= base;
                }
                power == number
            }
            NumberRule::Ending(digit) => number % 10 == digit,
            NumberRule::Interval { start, end } => (start..=end).contains(&number),
        }
    }

    /// Numbers of `1..=100` inside and outside the rule.
    pub fn partition(&self) -> (Vec<u32>, Vec<u32>) {
        (1..=MAX_NUMBER).partition(|n| self.contains(*n))
    }
}

fn is_power_of_root(number: u32, exponent: u32) -> bool {
    (1..=number).map(|root| root.pow(exponent)).take_while(|v| *v <= number).any(|v| v == number)
}

impl fmt::Display for NumberRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberRule::Odd => f.write_str("odd numbers"),
            NumberRule::Even => f.write_str("even numbers"),
            NumberRule::Square => f.write_str("square numbers"),
            NumberRule::Cube => f.write_str("cube numbers"),
            NumberRule::Primes => f.write_str("prime numbers"),
            NumberRule::Multiples(of) => write!(f, "multiples of {of}"),
            NumberRule::MultiplesMinus { of, minus } => write!(f, "multiples of {of} -{minus}"),
            NumberRule::Powers {
                base,
                include_zero: true,
            } => write!(f, "powers of {base} (incl. ^0)"),
            NumberRule::Powers {
                base,
                include_zero: false,
            } => write!(f, "powers of {base} (excl. ^0)"),
            NumberRule::Ending(digit) => write!(f, "numbers ending in {digit}"),
            NumberRule::Interval { start, end } => write!(f, "numbers between {start}-{end}"),
        }
    }
}

/// The rules a session can ask the learner to discover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetRule {
    #[serde(rename = "mul7")]
    Mul7,
    #[serde(rename = "mul4-1")]
    Mul4Minus1,
    #[serde(rename = "64-83")]
    Interval64To83,
}

impl TargetRule {
    pub const fn rule(self) -> NumberRule {
        match self {
            TargetRule::Mul7 => NumberRule::Multiples(7),
            TargetRule::Mul4Minus1 => NumberRule::MultiplesMinus { of: 4, minus: 1 },
            TargetRule::Interval64To83 => NumberRule::Interval { start: 64, end: 83 },
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            TargetRule::Mul7 => "mul7",
            TargetRule::Mul4Minus1 => "mul4-1",
            TargetRule::Interval64To83 => "64-83",
        }
    }
}

impl FromStr for TargetRule {
    type Err = ConceptError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "mul7" => Ok(TargetRule::Mul7),
            "mul4-1" => Ok(TargetRule::Mul4Minus1),
            "64-83" => Ok(TargetRule::Interval64To83),
            other => Err(ConceptError::UnknownTarget(other.to_string())),
        }
    }
}

/// Shape of the hypothesis space.
///
/// `Original` reproduces the published space: multiples appear several times and the
/// math/interval split uses a fitted lambda.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceMode {
    #[default]
    Default,
    Original,
}

impl SpaceMode {
    fn prior_lambda(self) -> f64 {
        match self {
            SpaceMode::Default => 0.5,
            SpaceMode::Original => 0.55519,
        }
    }
}

/// Number classification over `1..=100`. Item `i` asks about the number `i + 1`;
/// observations are `1` (inside the rule) and `0`.
#[derive(Debug, Clone)]
pub struct NumberGame {
    hypotheses: Vec<NumberRule>,
    prior: Vec<f64>,
    true_index: usize,
    inside: Vec<u32>,
    outside: Vec<u32>,
    observations: Vec<Observation>,
    values: Arc<StateActionValues>,
}

impl NumberGame {
    pub fn new(target: TargetRule, mode: SpaceMode) -> Result<Self, ConceptError> {
        let (hypotheses, prior) = plausible_rules(mode);
        let rule = target.rule();
        let true_index = hypotheses
            .iter()
            .position(|candidate| *candidate == rule)
            .ok_or_else(|| ConceptError::TargetNotInSpace(target.as_str().to_string()))?;
        let (inside, outside) = rule.partition();
        let values = StateActionValues::build(MAX_NUMBER as usize, &hypotheses, |item, rule| {
            Observation::from(rule.contains(item_number(item)))
        });

        Ok(Self {
            hypotheses,
            prior,
            true_index,
            inside,
            outside,
            observations: vec![0, 1],
            values: Arc::new(values),
        })
    }

    pub fn item_for_number(number: u32) -> Option<ItemId> {
        (1..=MAX_NUMBER)
            .contains(&number)
            .then(|| (number - 1) as ItemId)
    }
}

fn item_number(item: ItemId) -> u32 {
    item as u32 + 1
}

fn plausible_rules(mode: SpaceMode) -> (Vec<NumberRule>, Vec<f64>) {
    let mut math = vec![
        NumberRule::Odd,
        NumberRule::Even,
        NumberRule::Square,
        NumberRule::Cube,
        NumberRule::Primes,
    ];
    let mut modular = Vec::new();

    for of in 3..=50 {
        let copies = match (mode, of <= 12) {
            (SpaceMode::Default, _) => 1,
            (SpaceMode::Original, true) => 3,
            (SpaceMode::Original, false) => 2,
        };
        if of <= 12 {
            math.push(NumberRule::Multiples(of));
            modular.extend(std::iter::repeat_n(NumberRule::Multiples(of), copies - 1));
        } else {
            modular.extend(std::iter::repeat_n(NumberRule::Multiples(of), copies));
        }
        modular.extend((1..of).map(|minus| NumberRule::MultiplesMinus { of, minus }));
    }

    for base in 2..=10 {
        math.push(NumberRule::Powers {
            base,
            include_zero: false,
        });
        math.push(NumberRule::Powers {
            base,
            include_zero: true,
        });
    }
    math.extend((1..=9).map(NumberRule::Ending));

    let mut intervals = Vec::new();
    let mut interval_weights = Vec::new();
    for start in 1..=MAX_NUMBER {
        for end in start..=MAX_NUMBER {
            let size = f64::from(end - start + 1);
            intervals.push(NumberRule::Interval { start, end });
            interval_weights.push(size / ERLANG_SIGMA.powi(2) * (-size / ERLANG_SIGMA).exp());
        }
    }

    let lambda = mode.prior_lambda();
    let weight_total: f64 = interval_weights.iter().sum();
    let math_share = lambda / 2.0 / math.len() as f64;
    let modular_share = lambda / 2.0 / modular.len() as f64;

    let mut prior = Vec::with_capacity(math.len() + modular.len() + intervals.len());
    prior.extend(std::iter::repeat_n(math_share, math.len()));
    prior.extend(std::iter::repeat_n(modular_share, modular.len()));
    prior.extend(
        interval_weights
            .iter()
            .map(|weight| weight / weight_total * (1.0 - lambda)),
    );

    let mut rules = math;
    rules.extend(modular);
    rules.extend(intervals);
    (rules, prior)
}

impl Concept for NumberGame {
    type Hypothesis = NumberRule;

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
        MAX_NUMBER as usize
    }

    fn evaluate(&self, item: ItemId, hypothesis: &Self::Hypothesis) -> Observation {
        Observation::from(hypothesis.contains(item_number(item)))
    }

    fn observation_space(&self) -> &[Observation] {
        &self.observations
    }

    fn action_costs(&self) -> ActionCosts {
        ActionCosts::new(2.4, 2.8, 4.8)
    }

    fn noise(&self, model: ModelKind) -> NoiseParams {
        match model {
            ModelKind::Memoryless => NoiseParams::new(0.14, 0.25),
            ModelKind::Discrete => NoiseParams::new(0.10, 0.18),
            ModelKind::Continuous => NoiseParams::new(0.15, 0.21),
        }
    }

    fn state_action_values(&self) -> &Arc<StateActionValues> {
        &self.values
    }

    fn describe_item(&self, item: ItemId, value: Option<Observation>) -> String {
        let number = item_number(item);
        match value {
            Some(1) => format!("Number {number}: yes"),
            Some(_) => format!("Number {number}: no"),
            None => format!("Number {number}: ?"),
        }
    }

    /// Five numbers inside the target and five outside, shuffled.
    fn assessment_items(&self, rng: &mut dyn RngCore) -> Vec<ItemId> {
        let mut numbers: Vec<u32> = self
            .inside
            .choose_multiple(rng, ASSESSMENT_PER_SIDE)
            .chain(self.outside.choose_multiple(rng, ASSESSMENT_PER_SIDE))
            .copied()
            .collect();
        numbers.shuffle(rng);
        numbers.into_iter().map(|n| (n - 1) as ItemId).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn default_space_has_expected_size() {
        let game = NumberGame::new(TargetRule::Mul7, SpaceMode::Default).unwrap();
        // 42 math rules, 1262 modular rules, 5050 intervals.
        assert_eq!(game.hypothesis_count(), 42 + 1262 + 5050);
        let total: f64 = game.default_prior().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn targets_resolve_to_their_rules() {
        for target in [
            TargetRule::Mul7,
            TargetRule::Mul4Minus1,
            TargetRule::Interval64To83,
        ] {
            let game = NumberGame::new(target, SpaceMode::Default).unwrap();
            let idx = game.true_hypothesis_index();
            assert_eq!(game.hypothesis_space()[idx], target.rule());
            assert_eq!(target.as_str().parse::<TargetRule>(), Ok(target));
        }
        assert!("mul9".parse::<TargetRule>().is_err());
    }

    #[test]
    fn rules_match_their_definitions() {
        assert!(NumberRule::Square.contains(81));
        assert!(!NumberRule::Square.contains(80));
        assert!(NumberRule::Cube.contains(64));
        assert!(NumberRule::Cube.contains(1));
        let powers_no_zero = NumberRule::Powers {
            base: 2,
            include_zero: false,
        };
        assert!(!powers_no_zero.contains(1));
        assert!(powers_no_zero.contains(64));
        let powers_zero = NumberRule::Powers {
            base: 10,
            include_zero: true,
        };
        assert!(powers_zero.contains(1));
        assert!(powers_zero.contains(100));
        let mul4_minus1 = NumberRule::MultiplesMinus { of: 4, minus: 1 };
        assert!(mul4_minus1.contains(3));
        assert!(mul4_minus1.contains(99));
        assert!(!mul4_minus1.contains(4));
        assert_eq!(mul4_minus1.to_string(), "multiples of 4 -1");
    }

    #[test]
    fn original_mode_duplicates_multiples() {
        let game = NumberGame::new(TargetRule::Mul7, SpaceMode::Original).unwrap();
        let copies = game
            .hypothesis_space()
            .iter()
            .filter(|rule| **rule == NumberRule::Multiples(7))
            .count();
        assert_eq!(copies, 3);
        let total: f64 = game.default_prior().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn assessment_balances_inside_and_outside() {
        let game = NumberGame::new(TargetRule::Interval64To83, SpaceMode::Default).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        let items = game.assessment_items(&mut rng);
        assert_eq!(items.len(), 10);
        let inside = items.iter().filter(|item| game.true_value(**item) == 1).count();
        assert_eq!(inside, 5);
    }

    #[test]
    fn readable_format() {
        let game = NumberGame::new(TargetRule::Mul7, SpaceMode::Default).unwrap();
        let item = NumberGame::item_for_number(14).unwrap();
        assert_eq!(game.describe_item(item, Some(game.true_value(item))), "Number 14: yes");
        assert_eq!(game.describe_item(item, None), "Number 14: ?");
        assert_eq!(NumberGame::item_for_number(0), None);
    }
}
