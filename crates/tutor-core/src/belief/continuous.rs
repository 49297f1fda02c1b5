use super::{BeliefError, BeliefModel, normalize, sanitize};
use crate::action::{ItemId, ItemResult, ModelKind, NoiseParams, Observation, TeachingAction};
use crate::concept::{Concept, StateActionValues};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_PARTICLE_CAP: usize = 16;

/// Total particle weight below which the particle set is rebuilt from history.
pub const DEPLETION_LIMIT: f64 = 0.005;

/// One weighted candidate distribution over hypotheses.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub distribution: Vec<f64>,
    pub weight: f64,
}

impl Particle {
    fn consistent_mass(&self, row: &[Observation], observation: Observation) -> f64 {
        self.distribution
            .iter()
            .zip(row)
            .filter(|(_, value)| **value == observation)
            .map(|(p, _)| *p)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousSnapshot {
    particles: Vec<Particle>,
    history: Vec<(TeachingAction, ItemResult, Option<Observation>)>,
}

/// Particle approximation for a learner whose state is itself a distribution.
///
/// Every content-revealing step splits each particle into a copy that ignored the content
/// and a copy that absorbed it, so the set holds at most `2 * cap` particles between
/// pruning passes.
#[derive(Debug, Clone)]
pub struct ContinuousBelief {
    particles: Vec<Particle>,
    history: Vec<(TeachingAction, ItemResult, Option<Observation>)>,
    prior: Arc<[f64]>,
    values: Arc<StateActionValues>,
    noise: NoiseParams,
    noise_per_observation: f64,
    particle_cap: usize,
    history_replays: usize,
}

impl ContinuousBelief {
    pub fn new<C: Concept + ?Sized>(concept: &C, particle_cap: usize) -> Self {
        let noise = concept.noise(ModelKind::Continuous);
        let observations = concept.observation_space().len().max(1);
        let prior: Arc<[f64]> = Arc::from(concept.default_prior());
        Self {
            particles: initial_particles(&prior),
            history: Vec::new(),
            prior,
            values: Arc::clone(concept.state_action_values()),
            noise,
            noise_per_observation: noise.production / observations as f64,
            particle_cap: particle_cap.max(1),
            history_replays: 0,
        }
    }

    pub fn with_noise(mut self, noise: NoiseParams, observations: usize) -> Self {
        self.noise = noise;
        self.noise_per_observation = noise.production / observations.max(1) as f64;
        self
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// History steps replayed by depletion recovery so far.
    pub fn history_replays(&self) -> usize {
        self.history_replays
    }

    pub fn noise(&self) -> NoiseParams {
        self.noise
    }

    fn reweight(&mut self, item: ItemId, response: Observation) -> Result<(), BeliefError> {
        let row = self.values.row(item);
        for particle in &mut self.particles {
            let consistent = particle.consistent_mass(row, response);
            particle.weight *=
                (1.0 - self.noise.production) * consistent + self.noise_per_observation;
        }
        self.check_particles()
    }

    fn split(&mut self, item: ItemId, value: Observation) -> Result<(), BeliefError> {
        let row = self.values.row(item);
        let stay = self.noise.transition;
        let mut next = Vec::with_capacity(self.particles.len() * 2);

        for particle in self.particles.drain(..) {
            let mut moved = particle.distribution.clone();
            absorb(&mut moved, row, value);
            if !normalize(&mut moved) {
                moved = self.prior.to_vec();
                absorb(&mut moved, row, value);
                if !normalize(&mut moved) {
                    next.push(Particle {
                        distribution: particle.distribution,
                        weight: particle.weight * stay,
                    });
                    continue;
                }
            }
            let weight = particle.weight;
            next.push(Particle {
                distribution: particle.distribution,
                weight: weight * stay,
            });
            next.push(Particle {
                distribution: moved,
                weight: weight * (1.0 - stay),
            });
        }

        self.particles = next;
        self.check_particles()
    }

    fn check_particles(&mut self) -> Result<(), BeliefError> {
        let total: f64 = self.particles.iter().map(|p| p.weight).sum();
        if total < DEPLETION_LIMIT {
            return self.recreate_particles();
        }
        self.prune();
        let kept: f64 = self.particles.iter().map(|p| p.weight).sum();
        for particle in &mut self.particles {
            particle.weight /= kept;
        }
        Ok(())
    }

    /// Drops the lightest particles until at most `particle_cap` remain.
    fn prune(&mut self) {
        while self.particles.len() > self.particle_cap {
            let lightest = self
                .particles
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.weight.total_cmp(&b.weight))
                .map(|(idx, _)| idx);
            match lightest {
                Some(idx) => {
                    self.particles.remove(idx);
                }
                None => break,
            }
        }
    }

    /// Replaces the particle set with the prior and the prior replayed through history.
    fn recreate_particles(&mut self) -> Result<(), BeliefError> {
        debug!(
            target: "tutor_core::belief",
            history = self.history.len(),
            "particle depletion, rebuilding from history"
        );
        let mut replayed = self.prior.to_vec();
        for (step, (_, result, _)) in self.history.iter().enumerate() {
            let Some(value) = result.value else {
                continue;
            };
            absorb(&mut replayed, self.values.row(result.item), value);
            if !normalize(&mut replayed) {
                return Err(BeliefError::InconsistentHistory { step });
            }
        }
        self.history_replays += self.history.len();

        self.particles = vec![
            Particle {
                distribution: self.prior.to_vec(),
                weight: 0.5,
            },
            Particle {
                distribution: replayed,
                weight: 0.5,
            },
        ];
        Ok(())
    }
}

fn initial_particles(prior: &[f64]) -> Vec<Particle> {
    vec![Particle {
        distribution: prior.to_vec(),
        weight: 1.0,
    }]
}

/// Zeroes the mass of hypotheses whose value on the item differs from `value`.
fn absorb(distribution: &mut [f64], row: &[Observation], value: Observation) {
    for (p, v) in distribution.iter_mut().zip(row) {
        if *v != value {
            *p = 0.0;
        }
    }
}

impl BeliefModel for ContinuousBelief {
    type Snapshot = ContinuousSnapshot;

    fn kind(&self) -> ModelKind {
        ModelKind::Continuous
    }

    fn hypothesis_count(&self) -> usize {
        self.prior.len()
    }

    fn update(
        &mut self,
        action: TeachingAction,
        result: ItemResult,
        response: Option<Observation>,
    ) -> Result<(), BeliefError> {
        let (result, response) = sanitize(action, result, response);
        self.history.push((action, result, response));

        if let Some(observed) = response {
            self.reweight(result.item, observed)?;
        }
        if let Some(value) = result.value {
            self.split(result.item, value)?;
        }
        Ok(())
    }

    fn observation_probability(&self, item: ItemId, observation: Observation) -> f64 {
        let row = self.values.row(item);
        self.particles
            .iter()
            .map(|particle| {
                let consistent = particle.consistent_mass(row, observation);
                particle.weight
                    * ((1.0 - self.noise.production) * consistent + self.noise_per_observation)
            })
            .sum()
    }

    fn concept_probability(&self, index: usize) -> f64 {
        self.particles
            .iter()
            .map(|particle| particle.weight * particle.distribution[index])
            .sum()
    }

    fn snapshot(&self) -> Self::Snapshot {
        ContinuousSnapshot {
            particles: self.particles.clone(),
            history: self.history.clone(),
        }
    }

    fn restore(&mut self, snapshot: &Self::Snapshot) {
        self.particles.clone_from(&snapshot.particles);
        self.history.clone_from(&snapshot.history);
    }

    fn reset(&mut self) {
        self.particles = initial_particles(&self.prior);
        self.history.clear();
        self.history_replays = 0;
    }

    fn marginal(&self) -> Vec<f64> {
        let mut mixture = vec![0.0; self.prior.len()];
        for particle in &self.particles {
            for (m, p) in mixture.iter_mut().zip(&particle.distribution) {
                *m += particle.weight * p;
            }
        }
        mixture
    }
}
