use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_PREPLAN_DEPTH: usize = 9;
pub const DEFAULT_PREPLAN_SAMPLES: usize = 10;

/// Tuning of the forward search. Environment variables override the defaults:
/// `TUTOR_SEARCH_HORIZON`, `TUTOR_SEARCH_SAMPLES` (comma separated, one per level),
/// `TUTOR_SEARCH_TIME_CAP_MS` and `TUTOR_SEARCH_NODE_CAP`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub horizon: usize,
    /// Items sampled at each level of the search, root first.
    pub samples: Vec<usize>,
    pub discount: f64,
    /// Leaf value is `(1 - p_true) * leaf_scale * min_action_cost`.
    pub leaf_scale: f64,
    pub time_cap_ms: Option<u64>,
    pub node_cap: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            horizon: 2,
            samples: vec![5, 5],
            discount: 0.99,
            leaf_scale: 10.0,
            time_cap_ms: None,
            node_cap: None,
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Self {
        let horizon = parse_env::<usize>("TUTOR_SEARCH_HORIZON").unwrap_or(self.horizon);
        let samples = env::var("TUTOR_SEARCH_SAMPLES")
            .ok()
            .and_then(|raw| parse_samples(&raw))
            .unwrap_or(self.samples);
        let time_cap_ms = parse_env::<u64>("TUTOR_SEARCH_TIME_CAP_MS").or(self.time_cap_ms);
        let node_cap = parse_env::<usize>("TUTOR_SEARCH_NODE_CAP").or(self.node_cap);

        Self {
            horizon: horizon.max(1),
            samples,
            time_cap_ms,
            node_cap,
            ..self
        }
    }

    /// One sample count per level; short lists repeat their first entry.
    pub fn samples_per_level(&self, horizon: usize) -> Vec<usize> {
        if self.samples.len() >= horizon {
            return self.samples.clone();
        }
        let first = self.samples.first().copied().unwrap_or(DEFAULT_PREPLAN_SAMPLES);
        vec![first; horizon]
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.trim().parse::<T>().ok())
}

fn parse_samples(raw: &str) -> Option<Vec<usize>> {
    let samples: Option<Vec<usize>> = raw
        .split(',')
        .map(|part| part.trim().parse::<usize>().ok().filter(|n| *n > 0))
        .collect();
    samples.filter(|list| !list.is_empty())
}
